#![forbid(unsafe_code)]

//! Wire models returned by the metadata endpoint.
//!
//! Backends built on yt-dlp are loose about types: numbers may arrive as
//! strings, placeholders such as `"N/A"` show up in place of missing values,
//! and the identifier has gone by several names. The decoders below accept
//! all of those shapes.

use serde::{Deserialize, Deserializer, Serialize};

use crate::video_id::{VideoId, extract_video_id};

/// Which track a format variant carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    pub fn label(self) -> &'static str {
        match self {
            TrackKind::Video => "video",
            TrackKind::Audio => "audio",
        }
    }
}

/// One selectable audio-only or video-only encoding.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FormatVariant {
    #[serde(default, deserialize_with = "lenient_string")]
    pub format_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,
    #[serde(
        default,
        deserialize_with = "lenient_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub filesize: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub fps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcodec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acodec: Option<String>,
    /// Audio bitrate in kbps.
    #[serde(
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub abr: Option<f64>,
    /// Total bitrate in kbps.
    #[serde(
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub tbr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_note: Option<String>,
}

/// Everything the metadata endpoint reports about one video.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VideoMetadata {
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub video_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    /// Length in seconds.
    #[serde(
        default,
        deserialize_with = "lenient_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<u64>,
    #[serde(
        default,
        deserialize_with = "lenient_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub view_count: Option<u64>,
    #[serde(
        default,
        deserialize_with = "lenient_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub filesize_approx: Option<u64>,
    #[serde(default, deserialize_with = "lenient_formats")]
    pub video_only_formats: Vec<FormatVariant>,
    #[serde(default, deserialize_with = "lenient_formats")]
    pub audio_only_formats: Vec<FormatVariant>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub url: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub webpage_url: Option<String>,
    #[serde(
        default,
        rename = "fullUrl",
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub full_url: Option<String>,
}

impl VideoMetadata {
    /// Resolves the platform identifier: explicit id fields first, then
    /// whatever can be extracted from the reported URLs.
    pub fn video_id(&self) -> Option<VideoId> {
        let explicit = [self.id.as_deref(), self.video_id.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|id| id.parse::<VideoId>().ok());
        if explicit.is_some() {
            return explicit;
        }
        [
            self.url.as_deref(),
            self.full_url.as_deref(),
            self.webpage_url.as_deref(),
        ]
            .into_iter()
            .flatten()
            .find_map(extract_video_id)
    }

    pub fn formats(&self, kind: TrackKind) -> &[FormatVariant] {
        match kind {
            TrackKind::Video => &self.video_only_formats,
            TrackKind::Audio => &self.audio_only_formats,
        }
    }

    pub fn find_format(&self, kind: TrackKind, format_id: &str) -> Option<&FormatVariant> {
        let wanted = format_id.trim();
        self.formats(kind)
            .iter()
            .find(|format| format.format_id == wanted)
    }

    pub fn display_title(&self) -> &str {
        let trimmed = self.title.trim();
        if trimmed.is_empty() { "video" } else { trimmed }
    }
}

/// Returns `None` for the placeholder strings backends use for missing data.
pub fn meaningful(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case("n/a"))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Number(f64),
    Text(String),
    Bool(bool),
}

impl Loose {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Loose::Number(value) => Some(*value),
            Loose::Text(text) => text.trim().parse::<f64>().ok(),
            Loose::Bool(_) => None,
        }
        .filter(|value| value.is_finite())
    }

    fn into_text(self) -> String {
        match self {
            Loose::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                format!("{}", value as i64)
            }
            Loose::Number(value) => value.to_string(),
            Loose::Text(text) => text,
            Loose::Bool(value) => value.to_string(),
        }
    }
}

pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Loose>::deserialize(deserializer)?;
    Ok(value.and_then(|value| value.as_f64()))
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_f64(deserializer)?
        .filter(|value| *value >= 0.0)
        .map(|value| value.round() as u64))
}

fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Loose>::deserialize(deserializer)?;
    Ok(value
        .map(Loose::into_text)
        .filter(|text| !text.trim().is_empty()))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

fn lenient_formats<'de, D>(deserializer: D) -> Result<Vec<FormatVariant>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<FormatVariant>>::deserialize(deserializer)?.unwrap_or_default())
}
