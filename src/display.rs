#![forbid(unsafe_code)]

//! Human-readable renderings of sizes, durations and format variants.

use crate::model::{FormatVariant, meaningful};
use crate::selection::Selection;

const MIB: f64 = 1024.0 * 1024.0;

/// `12.34 MB` below one gigabyte, `1.23 GB` above. Missing or zero sizes
/// read as unknown.
pub fn format_file_size(bytes: Option<u64>) -> String {
    match bytes {
        None | Some(0) => "Unknown size".to_string(),
        Some(bytes) => {
            let mb = bytes as f64 / MIB;
            if mb < 1024.0 {
                format!("{mb:.2} MB")
            } else {
                format!("{:.2} GB", mb / 1024.0)
            }
        }
    }
}

/// `H:MM:SS` when at least an hour long, `M:SS` otherwise.
pub fn format_duration(seconds: Option<u64>) -> String {
    match seconds {
        None | Some(0) => "Unknown duration".to_string(),
        Some(total) => {
            let hours = total / 3600;
            let minutes = (total % 3600) / 60;
            let secs = total % 60;
            if hours > 0 {
                format!("{hours}:{minutes:02}:{secs:02}")
            } else {
                format!("{minutes}:{secs:02}")
            }
        }
    }
}

/// Groups digits in threes: `1234567` becomes `1,234,567`.
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn format_bitrate(kbps: Option<f64>) -> Option<String> {
    kbps.filter(|value| *value > 0.0)
        .map(|value| format!("{value:.0} kbps"))
}

/// One line describing a video-only variant, e.g.
/// `1920x1080 @ 30fps • Codec: avc1 • Bitrate: 2500 kbps • Size: 12.00 MB`.
pub fn describe_video_format(format: &FormatVariant) -> String {
    let mut headline = meaningful(format.resolution.as_deref())
        .unwrap_or("Unknown resolution")
        .to_string();
    if let Some(fps) = format.fps.filter(|fps| *fps > 0.0) {
        headline.push_str(&format!(" @ {fps}fps"));
    }
    let mut parts = vec![headline];
    if let Some(codec) = meaningful(format.vcodec.as_deref()) {
        parts.push(format!("Codec: {codec}"));
    }
    if let Some(bitrate) = format_bitrate(format.tbr) {
        parts.push(format!("Bitrate: {bitrate}"));
    }
    parts.push(format!("Size: {}", format_file_size(format.filesize)));
    parts.join(" • ")
}

/// One line describing an audio-only variant, e.g.
/// `129kbps • Codec: mp4a.40.2 • medium • Size: 3.10 MB`.
pub fn describe_audio_format(format: &FormatVariant) -> String {
    let headline = match format.abr.filter(|abr| *abr > 0.0) {
        Some(abr) => format!("{abr:.0}kbps"),
        None => "Unknown bitrate".to_string(),
    };
    let mut parts = vec![headline];
    if let Some(codec) = meaningful(format.acodec.as_deref()) {
        parts.push(format!("Codec: {codec}"));
    }
    if let Some(note) = meaningful(format.format_note.as_deref()) {
        parts.push(note.to_string());
    }
    parts.push(format!("Size: {}", format_file_size(format.filesize)));
    parts.join(" • ")
}

/// Summary of the current picks, including the combined size once both are
/// chosen.
pub fn describe_selection(selection: &Selection) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(video) = selection.video() {
        lines.push(format!("Video: {}", describe_video_format(video)));
    }
    if let Some(audio) = selection.audio() {
        lines.push(format!("Audio: {}", describe_audio_format(audio)));
    }
    if let Some(total) = selection.total_size() {
        lines.push(format!(
            "Total Download Size: {}",
            format_file_size(Some(total))
        ));
    }
    lines
}
