#![forbid(unsafe_code)]

//! Error types shared by the input and details views.

use thiserror::Error;

use crate::model::TrackKind;

/// Coarse classification used when deciding how to present a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any request was made.
    Validation,
    /// Transport failure, non-2xx status or unreadable response.
    Network,
    /// The backend answered but the media could not be obtained or saved.
    Resource,
}

/// Problems detected locally, before a request leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a YouTube URL")]
    EmptyUrl,
    #[error("Could not find a YouTube video id in {0:?}")]
    UnrecognizedUrl(String),
    #[error("Please select both video and audio formats")]
    MissingSelection,
    #[error("The selected {} format has no format id", .0.label())]
    MissingFormatId(TrackKind),
    #[error("The selected {} format has no source URL", .0.label())]
    MissingSourceUrl(TrackKind),
    #[error("No {} format with id {:?}", .0.label(), .1)]
    UnknownFormat(TrackKind, String),
    #[error("Video ID not found in the video metadata")]
    MissingVideoId,
    #[error("A request is already in progress")]
    Busy,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Could not reach the backend: {0}")]
    Transport(#[source] Box<ureq::Transport>),
    #[error("{message}")]
    Service { status: u16, message: String },
    #[error("Unexpected response from the backend: {0}")]
    MalformedResponse(String),
    #[error("Received empty file from server")]
    EmptyPayload,
    #[error("Could not save the download: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Validation(_) => ErrorKind::Validation,
            ClientError::Transport(_)
            | ClientError::Service { .. }
            | ClientError::MalformedResponse(_) => ErrorKind::Network,
            ClientError::EmptyPayload | ClientError::Io(_) => ErrorKind::Resource,
        }
    }

    /// Text shown to the user. Never empty.
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            match self.kind() {
                ErrorKind::Validation => "Invalid input".to_string(),
                ErrorKind::Network => "The backend request failed".to_string(),
                ErrorKind::Resource => "The download could not be completed".to_string(),
            }
        } else {
            message
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            ClientError::from(ValidationError::MissingSelection).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ClientError::Service {
                status: 500,
                message: "boom".into()
            }
            .kind(),
            ErrorKind::Network
        );
        assert_eq!(ClientError::EmptyPayload.kind(), ErrorKind::Resource);
    }

    #[test]
    fn user_message_is_never_empty() {
        let err = ClientError::Service {
            status: 502,
            message: "   ".into(),
        };
        assert_eq!(err.user_message(), "The backend request failed");
        assert_eq!(
            ClientError::from(ValidationError::MissingFormatId(TrackKind::Audio)).user_message(),
            "The selected audio format has no format id"
        );
    }
}
