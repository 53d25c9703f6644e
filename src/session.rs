#![forbid(unsafe_code)]

//! Ties the input view to the details view: a successful fetch replaces the
//! details, which starts over with an empty selection.

use crate::api::VideoBackend;
use crate::config::MergeSource;
use crate::details::VideoDetails;
use crate::error::ClientError;
use crate::input::VideoInput;

#[derive(Debug, Default)]
pub struct Session {
    input: VideoInput,
    details: Option<VideoDetails>,
    merge_source: MergeSource,
}

impl Session {
    pub fn new(merge_source: MergeSource) -> Self {
        Self {
            merge_source,
            ..Self::default()
        }
    }

    pub fn input(&self) -> &VideoInput {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut VideoInput {
        &mut self.input
    }

    pub fn details(&self) -> Option<&VideoDetails> {
        self.details.as_ref()
    }

    pub fn details_mut(&mut self) -> Option<&mut VideoDetails> {
        self.details.as_mut()
    }

    /// Submits the current input. On failure the previous details, if any,
    /// stay on screen.
    pub fn submit<B>(&mut self, backend: &B) -> Result<&mut VideoDetails, ClientError>
    where
        B: VideoBackend + ?Sized,
    {
        let metadata = self.input.submit(backend)?;
        Ok(self
            .details
            .insert(VideoDetails::new(metadata, self.merge_source)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MergeOutcome, MergeRequest};
    use crate::model::{FormatVariant, VideoMetadata};
    use std::cell::Cell;
    use std::io::Read;

    struct StaticBackend {
        fail: Cell<bool>,
    }

    impl VideoBackend for StaticBackend {
        fn fetch_video_info(&self, _url: &str) -> Result<VideoMetadata, ClientError> {
            if self.fail.get() {
                return Err(ClientError::Service {
                    status: 500,
                    message: "down".into(),
                });
            }
            let format = |id: &str| FormatVariant {
                format_id: id.into(),
                url: format!("https://cdn.example/{id}"),
                ..FormatVariant::default()
            };
            Ok(VideoMetadata {
                id: Some("dQw4w9WgXcQ".into()),
                title: "clip".into(),
                video_only_formats: vec![format("137")],
                audio_only_formats: vec![format("140")],
                ..VideoMetadata::default()
            })
        }

        fn merge(&self, _request: &MergeRequest) -> Result<MergeOutcome, ClientError> {
            Err(ClientError::EmptyPayload)
        }

        fn open_download(&self, _url: &str) -> Result<Box<dyn Read + Send>, ClientError> {
            Err(ClientError::EmptyPayload)
        }
    }

    #[test]
    fn new_fetch_clears_previous_selection() {
        let backend = StaticBackend {
            fail: Cell::new(false),
        };
        let mut session = Session::new(MergeSource::WatchPage);
        session
            .input_mut()
            .set_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        let details = session.submit(&backend).unwrap();
        details.select_video("137").unwrap();
        details.select_audio("140").unwrap();
        assert!(details.selection().is_complete());

        let details = session.submit(&backend).unwrap();
        assert!(details.selection().is_empty());
    }

    #[test]
    fn failed_fetch_keeps_previous_details() {
        let backend = StaticBackend {
            fail: Cell::new(false),
        };
        let mut session = Session::default();
        session.input_mut().set_url("https://youtu.be/dQw4w9WgXcQ");
        session.submit(&backend).unwrap();

        backend.fail.set(true);
        assert!(session.submit(&backend).is_err());
        assert_eq!(session.input().error(), Some("down"));
        assert_eq!(session.details().unwrap().video().title, "clip");
    }
}
