#![forbid(unsafe_code)]

//! URL entry and the metadata request.

use tracing::{info, warn};

use crate::action::ActionState;
use crate::api::VideoBackend;
use crate::error::{ClientError, ValidationError};
use crate::model::VideoMetadata;
use crate::video_id::{VideoId, extract_video_id};

/// A validated metadata request that is now in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoRequest {
    pub video_id: VideoId,
    /// Normalized watch URL sent to the backend.
    pub url: String,
}

#[derive(Debug, Default)]
pub struct VideoInput {
    url: String,
    state: ActionState<VideoMetadata>,
}

impl VideoInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn state(&self) -> &ActionState<VideoMetadata> {
        &self.state
    }

    pub fn metadata(&self) -> Option<&VideoMetadata> {
        self.state.value()
    }

    pub fn error(&self) -> Option<&str> {
        self.state.error()
    }

    /// The submit control stays enabled unless a request is outstanding.
    pub fn can_submit(&self) -> bool {
        self.state.is_ready()
    }

    /// Validates the current URL and marks the request as pending. A
    /// validation failure is recorded and returned without touching the
    /// network.
    pub fn begin_submit(&mut self) -> Result<InfoRequest, ClientError> {
        if self.state.is_pending() {
            return Err(ValidationError::Busy.into());
        }
        match parse_request(&self.url) {
            Ok(request) => {
                self.state = ActionState::Pending;
                Ok(request)
            }
            Err(err) => {
                self.state = ActionState::Failed(ClientError::from(err.clone()).user_message());
                Err(err.into())
            }
        }
    }

    /// Records the outcome. On success the metadata is kept for display and
    /// handed back to the caller.
    pub fn complete_submit(
        &mut self,
        result: Result<VideoMetadata, ClientError>,
    ) -> Result<VideoMetadata, ClientError> {
        match result {
            Ok(metadata) => {
                self.state = ActionState::Succeeded(metadata.clone());
                Ok(metadata)
            }
            Err(err) => {
                warn!(error = %err, "video info request failed");
                self.state = ActionState::Failed(err.user_message());
                Err(err)
            }
        }
    }

    /// Runs a full submission against `backend`.
    pub fn submit<B>(&mut self, backend: &B) -> Result<VideoMetadata, ClientError>
    where
        B: VideoBackend + ?Sized,
    {
        let request = self.begin_submit()?;
        info!(video_id = %request.video_id, "fetching video info");
        let result = backend.fetch_video_info(&request.url);
        self.complete_submit(result)
    }
}

fn parse_request(raw: &str) -> Result<InfoRequest, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyUrl);
    }
    let video_id = extract_video_id(trimmed)
        .ok_or_else(|| ValidationError::UnrecognizedUrl(trimmed.to_string()))?;
    Ok(InfoRequest {
        url: video_id.watch_url(),
        video_id,
    })
}
