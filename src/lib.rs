#![forbid(unsafe_code)]

//! Client for a video merge backend: fetch format metadata for a YouTube
//! URL, pick one video-only and one audio-only variant, and save the merged
//! file the backend produces.

pub mod action;
pub mod api;
pub mod config;
pub mod details;
pub mod display;
pub mod download;
pub mod error;
pub mod input;
pub mod model;
pub mod selection;
pub mod session;
pub mod video_id;

pub use api::{BackendClient, MergeOutcome, MergeRequest, VideoBackend};
pub use error::{ClientError, ErrorKind, ValidationError};
pub use model::{FormatVariant, TrackKind, VideoMetadata};
pub use video_id::{VideoId, extract_video_id};
