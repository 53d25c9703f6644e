#![forbid(unsafe_code)]

//! Blocking client for the two backend endpoints.
//!
//! `POST /api/video-info` returns [`VideoMetadata`]. `POST /api/merge`
//! answers in one of two shapes depending on the backend generation: the
//! merged file itself, or a JSON document pointing at a download URL. Both
//! are folded into [`MergeOutcome`] here so callers handle a single type.

use std::io::Read;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ClientError;
use crate::model::{VideoMetadata, lenient_f64};

const VIDEO_INFO_PATH: &str = "api/video-info";
const MERGE_PATH: &str = "api/merge";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = concat!("newtube-merge/", env!("CARGO_PKG_VERSION"));

/// Body of a merge request: one source reference per track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub video_url: String,
    pub audio_url: String,
}

/// Normalized result of a successful merge.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// The merged file was returned inline.
    BinaryPayload {
        bytes: Vec<u8>,
        content_type: Option<String>,
    },
    /// The backend stored the file and returned where to fetch it.
    DownloadLink {
        url: String,
        file_size_mb: Option<f64>,
        file_name: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadLinkBody {
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default, rename = "fileSizeMB", deserialize_with = "lenient_f64")]
    file_size_mb: Option<f64>,
    #[serde(default)]
    file_name: Option<String>,
}

/// Operations the views need from a backend.
pub trait VideoBackend {
    fn fetch_video_info(&self, url: &str) -> Result<VideoMetadata, ClientError>;

    fn merge(&self, request: &MergeRequest) -> Result<MergeOutcome, ClientError>;

    /// Streams a file the backend published through a download link.
    fn open_download(&self, url: &str) -> Result<Box<dyn Read + Send>, ClientError>;
}

#[derive(Clone)]
pub struct BackendClient {
    agent: ureq::Agent,
    base: Url,
}

impl BackendClient {
    pub fn new(mut base: Url, timeout: Duration) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        Self { agent, base }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path)
            .map_err(|err| ClientError::MalformedResponse(format!("invalid URL {path}: {err}")))
    }

    fn post_json(
        &self,
        path: &str,
        body: Value,
        fallback: &str,
    ) -> Result<ureq::Response, ClientError> {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        match self.agent.post(url.as_str()).send_json(body) {
            Ok(response) => Ok(response),
            Err(err) => Err(request_error(err, fallback)),
        }
    }
}

impl VideoBackend for BackendClient {
    fn fetch_video_info(&self, url: &str) -> Result<VideoMetadata, ClientError> {
        let response = self.post_json(
            VIDEO_INFO_PATH,
            json!({ "url": url }),
            "Failed to fetch video info",
        )?;
        let status = response.status();
        let body = response
            .into_string()
            .map_err(|err| ClientError::MalformedResponse(format!("reading body: {err}")))?;
        let value: Value = serde_json::from_str(&body)
            .map_err(|err| ClientError::MalformedResponse(format!("invalid JSON: {err}")))?;
        if let Some(message) = error_message(&value) {
            return Err(ClientError::Service { status, message });
        }
        let metadata: VideoMetadata = serde_json::from_value(value)
            .map_err(|err| ClientError::MalformedResponse(format!("video info: {err}")))?;
        info!(
            title = %metadata.title,
            video_formats = metadata.video_only_formats.len(),
            audio_formats = metadata.audio_only_formats.len(),
            "fetched video info"
        );
        Ok(metadata)
    }

    fn merge(&self, request: &MergeRequest) -> Result<MergeOutcome, ClientError> {
        let body = serde_json::to_value(request)
            .map_err(|err| ClientError::MalformedResponse(format!("encoding request: {err}")))?;
        let response = self.post_json(MERGE_PATH, body, "Failed to merge video")?;
        let status = response.status();
        let content_type = response.header("content-type").map(str::to_string);

        if content_type.as_deref().is_some_and(is_json_content_type) {
            let value: Value = response
                .into_json()
                .map_err(|err| ClientError::MalformedResponse(format!("invalid JSON: {err}")))?;
            if let Some(message) = error_message(&value) {
                return Err(ClientError::Service { status, message });
            }
            let link: DownloadLinkBody = serde_json::from_value(value)
                .map_err(|err| ClientError::MalformedResponse(format!("merge result: {err}")))?;
            let target = link
                .download_url
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| {
                    ClientError::MalformedResponse("Server returned an error".to_string())
                })?;
            let resolved = self.base.join(target.trim()).map_err(|err| {
                ClientError::MalformedResponse(format!("invalid download URL {target}: {err}"))
            })?;
            info!(url = %resolved, "merge produced a download link");
            return Ok(MergeOutcome::DownloadLink {
                url: resolved.to_string(),
                file_size_mb: link.file_size_mb,
                file_name: link.file_name.filter(|name| !name.trim().is_empty()),
            });
        }

        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|err| ClientError::MalformedResponse(format!("reading payload: {err}")))?;
        if bytes.is_empty() {
            warn!("merge returned an empty payload");
            return Err(ClientError::EmptyPayload);
        }
        info!(bytes = bytes.len(), "merge returned the file inline");
        Ok(MergeOutcome::BinaryPayload {
            bytes,
            content_type,
        })
    }

    fn open_download(&self, url: &str) -> Result<Box<dyn Read + Send>, ClientError> {
        let target = self.base.join(url).map_err(|err| {
            ClientError::MalformedResponse(format!("invalid download URL {url}: {err}"))
        })?;
        debug!(url = %target, "GET");
        match self.agent.get(target.as_str()).call() {
            Ok(response) => Ok(response.into_reader()),
            Err(err) => Err(request_error(err, "Failed to download merged file")),
        }
    }
}

fn is_json_content_type(value: &str) -> bool {
    value.to_ascii_lowercase().contains("application/json")
}

/// Pulls `error`, then `details`, out of a JSON error document.
fn error_message(value: &Value) -> Option<String> {
    ["error", "details"].into_iter().find_map(|key| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .map(str::to_string)
    })
}

fn request_error(err: ureq::Error, fallback: &str) -> ClientError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|value| error_message(&value))
                .unwrap_or_else(|| format!("{fallback} (HTTP {status})"));
            warn!(status, %message, "backend returned an error status");
            ClientError::Service { status, message }
        }
        ureq::Error::Transport(transport) => {
            warn!(error = %transport, "backend unreachable");
            ClientError::Transport(Box::new(transport))
        }
    }
}
