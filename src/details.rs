#![forbid(unsafe_code)]

//! Format selection and the merge request for one fetched video.

use std::path::PathBuf;

use chrono::Utc;
use tracing::{info, warn};

use crate::action::ActionState;
use crate::api::{MergeOutcome, MergeRequest, VideoBackend};
use crate::config::MergeSource;
use crate::download::{
    DownloadSink, extension_for_content_type, format_file_name, suggested_file_name,
};
use crate::error::{ClientError, ValidationError};
use crate::model::{FormatVariant, TrackKind, VideoMetadata};
use crate::selection::{ReadySelection, Selection};

/// Where a saved file came from.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOrigin {
    Payload,
    Link {
        url: String,
        reported_size_mb: Option<f64>,
    },
    /// One variant fetched straight from its source URL, without merging.
    Format {
        kind: TrackKind,
        format_id: String,
    },
}

/// A merged file that has been written by the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedDownload {
    pub path: PathBuf,
    pub bytes: u64,
    pub origin: DownloadOrigin,
}

#[derive(Debug)]
pub struct VideoDetails {
    video: VideoMetadata,
    selection: Selection,
    source: MergeSource,
    merge: ActionState<SavedDownload>,
}

impl VideoDetails {
    pub fn new(video: VideoMetadata, source: MergeSource) -> Self {
        Self {
            video,
            selection: Selection::default(),
            source,
            merge: ActionState::Idle,
        }
    }

    pub fn video(&self) -> &VideoMetadata {
        &self.video
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn merge_state(&self) -> &ActionState<SavedDownload> {
        &self.merge
    }

    pub fn error(&self) -> Option<&str> {
        self.merge.error()
    }

    /// The merge control is enabled once both tracks are picked and no merge
    /// is running.
    pub fn can_merge(&self) -> bool {
        self.merge.is_ready() && self.selection.is_complete()
    }

    pub fn select(&mut self, kind: TrackKind, format_id: &str) -> Result<(), ValidationError> {
        let format = self
            .video
            .find_format(kind, format_id)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownFormat(kind, format_id.trim().to_string()))?;
        self.select_variant(kind, format);
        Ok(())
    }

    pub fn select_video(&mut self, format_id: &str) -> Result<(), ValidationError> {
        self.select(TrackKind::Video, format_id)
    }

    pub fn select_audio(&mut self, format_id: &str) -> Result<(), ValidationError> {
        self.select(TrackKind::Audio, format_id)
    }

    /// Selects a variant directly, for front ends that already hold one.
    pub fn select_variant(&mut self, kind: TrackKind, format: FormatVariant) {
        let current = std::mem::take(&mut self.selection);
        self.selection = current.with(kind, format);
    }

    pub fn clear_selection(&mut self) {
        self.selection = Selection::cleared();
    }

    /// Validates the selection and marks the merge as pending. Nothing is
    /// sent when validation fails.
    pub fn begin_merge(&mut self) -> Result<MergeRequest, ClientError> {
        if self.merge.is_pending() {
            return Err(ValidationError::Busy.into());
        }
        let request = self
            .selection
            .ready()
            .and_then(|ready| self.build_request(ready));
        match request {
            Ok(request) => {
                self.merge = ActionState::Pending;
                Ok(request)
            }
            Err(err) => {
                let err = ClientError::from(err);
                self.merge = ActionState::Failed(err.user_message());
                Err(err)
            }
        }
    }

    fn build_request(&self, ready: ReadySelection<'_>) -> Result<MergeRequest, ValidationError> {
        match self.source {
            MergeSource::WatchPage => {
                let id = self
                    .video
                    .video_id()
                    .ok_or(ValidationError::MissingVideoId)?;
                Ok(MergeRequest {
                    video_url: id.format_url(&ready.video.format_id),
                    audio_url: id.format_url(&ready.audio.format_id),
                })
            }
            MergeSource::DirectUrl => Ok(MergeRequest {
                video_url: ready.video.url.trim().to_string(),
                audio_url: ready.audio.url.trim().to_string(),
            }),
        }
    }

    /// Saves the merge result through `sink` and records the outcome.
    ///
    /// Link results are fetched through `backend` first. Whatever was staged
    /// is released exactly once, including when committing fails.
    pub fn complete_merge<B, S>(
        &mut self,
        outcome: Result<MergeOutcome, ClientError>,
        backend: &B,
        sink: &mut S,
    ) -> Result<SavedDownload, ClientError>
    where
        B: VideoBackend + ?Sized,
        S: DownloadSink,
    {
        let result = outcome.and_then(|outcome| self.save(outcome, backend, sink));
        match result {
            Ok(saved) => {
                info!(path = %saved.path.display(), bytes = saved.bytes, "merged file saved");
                self.merge = ActionState::Succeeded(saved.clone());
                Ok(saved)
            }
            Err(err) => {
                warn!(error = %err, "merge failed");
                self.merge = ActionState::Failed(err.user_message());
                Err(err)
            }
        }
    }

    /// Runs a full merge: validate, request, save.
    pub fn merge<B, S>(&mut self, backend: &B, sink: &mut S) -> Result<SavedDownload, ClientError>
    where
        B: VideoBackend + ?Sized,
        S: DownloadSink,
    {
        let request = self.begin_merge()?;
        info!(video = %request.video_url, audio = %request.audio_url, "requesting merge");
        let outcome = backend.merge(&request);
        self.complete_merge(outcome, backend, sink)
    }

    /// Saves a single variant as-is from its source URL. The selection and
    /// merge state are left alone.
    pub fn download_format<B, S>(
        &self,
        kind: TrackKind,
        format_id: &str,
        backend: &B,
        sink: &mut S,
    ) -> Result<SavedDownload, ClientError>
    where
        B: VideoBackend + ?Sized,
        S: DownloadSink,
    {
        let format = self
            .video
            .find_format(kind, format_id)
            .ok_or_else(|| ValidationError::UnknownFormat(kind, format_id.trim().to_string()))?;
        let source = format.url.trim();
        if source.is_empty() {
            return Err(ValidationError::MissingSourceUrl(kind).into());
        }
        let file_name = format_file_name(
            self.video.display_title(),
            &format.format_id,
            format.ext.as_deref(),
        );
        info!(kind = kind.label(), format_id = %format.format_id, "downloading single format");
        let mut reader = backend.open_download(source)?;
        let (path, len) = stage_and_commit(sink, &mut reader, &file_name)?;
        info!(path = %path.display(), bytes = len, "format saved");
        Ok(SavedDownload {
            path,
            bytes: len,
            origin: DownloadOrigin::Format {
                kind,
                format_id: format.format_id.clone(),
            },
        })
    }

    /// Default file name for a merged payload of `content_type`.
    pub fn suggested_file_name(&self, content_type: Option<&str>) -> String {
        suggested_file_name(
            self.video.display_title(),
            extension_for_content_type(content_type),
            Utc::now().timestamp_millis(),
        )
    }

    fn save<B, S>(
        &self,
        outcome: MergeOutcome,
        backend: &B,
        sink: &mut S,
    ) -> Result<SavedDownload, ClientError>
    where
        B: VideoBackend + ?Sized,
        S: DownloadSink,
    {
        match outcome {
            MergeOutcome::BinaryPayload {
                bytes,
                content_type,
            } => {
                if bytes.is_empty() {
                    return Err(ClientError::EmptyPayload);
                }
                let file_name = self.suggested_file_name(content_type.as_deref());
                let (path, len) = stage_and_commit(sink, &mut bytes.as_slice(), &file_name)?;
                Ok(SavedDownload {
                    path,
                    bytes: len,
                    origin: DownloadOrigin::Payload,
                })
            }
            MergeOutcome::DownloadLink {
                url,
                file_size_mb,
                file_name,
            } => {
                let file_name = file_name.unwrap_or_else(|| self.suggested_file_name(None));
                let mut reader = backend.open_download(&url)?;
                let (path, len) = stage_and_commit(sink, &mut reader, &file_name)?;
                Ok(SavedDownload {
                    path,
                    bytes: len,
                    origin: DownloadOrigin::Link {
                        url,
                        reported_size_mb: file_size_mb,
                    },
                })
            }
        }
    }
}

fn stage_and_commit<S: DownloadSink>(
    sink: &mut S,
    source: &mut dyn std::io::Read,
    file_name: &str,
) -> Result<(PathBuf, u64), ClientError> {
    let staged = sink.stage(source)?;
    if staged.len == 0 {
        sink.release(staged.handle);
        return Err(ClientError::EmptyPayload);
    }
    let committed = sink.commit(&staged.handle, file_name);
    sink.release(staged.handle);
    Ok((committed?, staged.len))
}
