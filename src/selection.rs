#![forbid(unsafe_code)]

//! The pair of formats the user has picked for a merge.

use crate::error::ValidationError;
use crate::model::{FormatVariant, TrackKind};

/// At most one video and one audio variant. Updates return a new value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selection {
    video: Option<FormatVariant>,
    audio: Option<FormatVariant>,
}

/// Both halves of a selection that satisfies the merge invariant.
#[derive(Debug, Clone, Copy)]
pub struct ReadySelection<'a> {
    pub video: &'a FormatVariant,
    pub audio: &'a FormatVariant,
}

impl Selection {
    pub fn with_video(self, format: FormatVariant) -> Self {
        Self {
            video: Some(format),
            ..self
        }
    }

    pub fn with_audio(self, format: FormatVariant) -> Self {
        Self {
            audio: Some(format),
            ..self
        }
    }

    pub fn with(self, kind: TrackKind, format: FormatVariant) -> Self {
        match kind {
            TrackKind::Video => self.with_video(format),
            TrackKind::Audio => self.with_audio(format),
        }
    }

    pub fn cleared() -> Self {
        Self::default()
    }

    pub fn video(&self) -> Option<&FormatVariant> {
        self.video.as_ref()
    }

    pub fn audio(&self) -> Option<&FormatVariant> {
        self.audio.as_ref()
    }

    pub fn get(&self, kind: TrackKind) -> Option<&FormatVariant> {
        match kind {
            TrackKind::Video => self.video(),
            TrackKind::Audio => self.audio(),
        }
    }

    pub fn is_selected(&self, kind: TrackKind, format_id: &str) -> bool {
        self.get(kind)
            .is_some_and(|format| format.format_id == format_id)
    }

    pub fn is_empty(&self) -> bool {
        self.video.is_none() && self.audio.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.video.is_some() && self.audio.is_some()
    }

    /// Combined size of both picks. Unknown sizes count as zero and the sum
    /// saturates; `None` until both tracks are chosen.
    pub fn total_size(&self) -> Option<u64> {
        let (video, audio) = (self.video.as_ref()?, self.audio.as_ref()?);
        Some(
            video
                .filesize
                .unwrap_or(0)
                .saturating_add(audio.filesize.unwrap_or(0)),
        )
    }

    /// Checks that a merge may be requested with this selection.
    pub fn ready(&self) -> Result<ReadySelection<'_>, ValidationError> {
        let (Some(video), Some(audio)) = (self.video.as_ref(), self.audio.as_ref()) else {
            return Err(ValidationError::MissingSelection);
        };
        for (kind, format) in [(TrackKind::Video, video), (TrackKind::Audio, audio)] {
            if format.format_id.trim().is_empty() {
                return Err(ValidationError::MissingFormatId(kind));
            }
            if format.url.trim().is_empty() {
                return Err(ValidationError::MissingSourceUrl(kind));
            }
        }
        Ok(ReadySelection { video, audio })
    }
}
