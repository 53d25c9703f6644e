#![forbid(unsafe_code)]

//! Extraction of YouTube video identifiers from the URL shapes users paste.
//!
//! Everything in here is pure string handling so it can be tested without a
//! backend. Supported shapes:
//!
//! - `https://youtu.be/<id>`
//! - `https://www.youtube.com/watch?v=<id>`
//! - `https://www.youtube.com/shorts/<id>`
//! - `https://www.youtube.com/v/<id>`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

const MAX_ID_LEN: usize = 64;
const WATCH_BASE: &str = "https://www.youtube.com/watch";
// Path words of the main site that never name a video on the short host.
const RESERVED_PATHS: [&str; 3] = ["watch", "shorts", "v"];

/// Validated platform video identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VideoId(String);

impl VideoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch page, used as the normalized request URL.
    pub fn watch_url(&self) -> String {
        format!("{WATCH_BASE}?v={}", self.0)
    }

    /// Watch page pinned to a single format (`itag`). The merge endpoint
    /// resolves these back to stream URLs on its side.
    pub fn format_url(&self, format_id: &str) -> String {
        format!("{WATCH_BASE}?v={}&itag={}", self.0, format_id.trim())
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<VideoId> for String {
    fn from(value: VideoId) -> Self {
        value.0
    }
}

impl TryFrom<String> for VideoId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_valid_id(&value) {
            Ok(Self(value))
        } else {
            Err(format!("invalid video id: {value}"))
        }
    }
}

impl FromStr for VideoId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::try_from(value.trim().to_string())
    }
}

fn is_valid_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_ID_LEN
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

/// A scheme only counts when `://` comes before the first path or query
/// delimiter, so URLs nested in a query string are not mistaken for one.
fn has_scheme(input: &str) -> bool {
    input.find("://").is_some_and(|pos| {
        let prefix = &input[..pos];
        !prefix.is_empty() && !prefix.contains(|ch| matches!(ch, '/' | '?' | '#'))
    })
}

fn is_short_host(host: &str) -> bool {
    host == "youtu.be" || host.ends_with(".youtu.be")
}

fn is_main_host(host: &str) -> bool {
    host == "youtube.com" || host.ends_with(".youtube.com")
}

/// Returns the video identifier embedded in `input`, or `None` when the
/// input is not one of the supported YouTube URL shapes.
pub fn extract_video_id(input: &str) -> Option<VideoId> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parsed = if has_scheme(trimmed) {
        Url::parse(trimmed).ok()?
    } else {
        Url::parse(&format!("https://{trimmed}")).ok()?
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }

    let host = parsed.host_str()?.to_ascii_lowercase();
    let mut segments = parsed
        .path_segments()
        .map(|parts| parts.filter(|part| !part.is_empty()).collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter();

    let candidate = if is_short_host(&host) {
        match (segments.next(), segments.next()) {
            (Some(id), None) if !RESERVED_PATHS.contains(&id) => Some(id.to_string()),
            _ => None,
        }
    } else if is_main_host(&host) {
        match segments.next() {
            Some("watch") => parsed
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            Some("shorts") | Some("v") => segments.next().map(str::to_string),
            _ => None,
        }
    } else {
        None
    };

    candidate.and_then(|value| VideoId::try_from(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "dQw4w9WgXcQ";

    fn extracted(input: &str) -> Option<String> {
        extract_video_id(input).map(String::from)
    }

    #[test]
    fn extracts_from_watch_urls() {
        assert_eq!(
            extracted("https://www.youtube.com/watch?v=dQw4w9WgXcQ").as_deref(),
            Some(ID)
        );
        assert_eq!(
            extracted("https://m.youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=42").as_deref(),
            Some(ID)
        );
        assert_eq!(
            extracted("youtube.com/watch?v=dQw4w9WgXcQ&redirect=https://x.y").as_deref(),
            Some(ID)
        );
        assert_eq!(
            extracted("https://www.youtube.com/watch?v=dQw4w9WgXcQ&next=https://x.y/a").as_deref(),
            Some(ID)
        );
    }

    #[test]
    fn extracts_from_short_links() {
        assert_eq!(extracted("https://youtu.be/dQw4w9WgXcQ").as_deref(), Some(ID));
        assert_eq!(
            extracted("youtu.be/dQw4w9WgXcQ?si=abc&t=30").as_deref(),
            Some(ID)
        );
    }

    #[test]
    fn extracts_from_shorts_and_v_paths() {
        assert_eq!(
            extracted("https://www.youtube.com/shorts/dQw4w9WgXcQ").as_deref(),
            Some(ID)
        );
        assert_eq!(
            extracted("https://youtube.com/v/dQw4w9WgXcQ?version=3").as_deref(),
            Some(ID)
        );
        assert_eq!(
            extracted("  www.youtube.com/shorts/dQw4w9WgXcQ/  ").as_deref(),
            Some(ID)
        );
    }

    #[test]
    fn extracted_id_matches_any_valid_id() {
        for id in ["a", "abc-DEF_123", "x1y2z3", "___---"] {
            for url in [
                format!("https://www.youtube.com/watch?v={id}"),
                format!("https://youtu.be/{id}"),
                format!("https://www.youtube.com/shorts/{id}"),
                format!("https://www.youtube.com/v/{id}"),
            ] {
                assert_eq!(extracted(&url).as_deref(), Some(id), "url: {url}");
            }
        }
    }

    #[test]
    fn rejects_urls_without_identifier() {
        for input in [
            "",
            "   ",
            "not a url",
            "https://www.youtube.com/",
            "https://www.youtube.com/watch",
            "https://www.youtube.com/watch?list=PL123",
            "https://www.youtube.com/watch?v=",
            "https://www.youtube.com/shorts/",
            "https://www.youtube.com/@channel",
            "https://youtu.be/",
            "https://youtu.be/shorts/dQw4w9WgXcQ",
            "https://youtu.be/v/dQw4w9WgXcQ",
            "https://youtu.be/watch?v=dQw4w9WgXcQ",
            "youtu.be/dQw4w9WgXcQ/extra",
            "https://vimeo.com/123456",
            "https://notyoutube.com/watch?v=dQw4w9WgXcQ",
            "ftp://youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=bad%20id",
        ] {
            assert!(extract_video_id(input).is_none(), "input: {input:?}");
        }
    }

    #[test]
    fn builds_watch_and_format_urls() {
        let id: VideoId = ID.parse().unwrap();
        assert_eq!(id.watch_url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(
            id.format_url(" 137 "),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&itag=137"
        );
    }

    #[test]
    fn serde_rejects_invalid_ids() {
        let ok: VideoId = serde_json::from_str("\"dQw4w9WgXcQ\"").unwrap();
        assert_eq!(ok.as_str(), ID);
        assert!(serde_json::from_str::<VideoId>("\"has space\"").is_err());
    }
}
