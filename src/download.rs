#![forbid(unsafe_code)]

//! Saving merged files.
//!
//! A download goes through three steps. `stage` buffers the media somewhere
//! temporary, `commit` publishes it under its final name, and `release`
//! discards whatever is still staged. Callers release every staged handle
//! exactly once, whether or not the commit succeeded.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

const DEFAULT_EXTENSION: &str = "mp4";
const MAX_STEM_CHARS: usize = 150;

/// A staged payload and how many bytes it holds.
#[derive(Debug)]
pub struct Staged<H> {
    pub handle: H,
    pub len: u64,
}

pub trait DownloadSink {
    type Handle;

    fn stage(&mut self, source: &mut dyn Read) -> io::Result<Staged<Self::Handle>>;

    /// Publishes a staged payload as `file_name` and returns where it landed.
    fn commit(&mut self, handle: &Self::Handle, file_name: &str) -> io::Result<PathBuf>;

    fn release(&mut self, handle: Self::Handle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StagedId(u64);

/// Writes downloads into a directory. Payloads are staged as hidden
/// temporary files next to their destination so committing is a rename.
#[derive(Debug)]
pub struct FileSink {
    dir: PathBuf,
    staged: HashMap<StagedId, NamedTempFile>,
    next_id: u64,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            staged: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }
}

impl DownloadSink for FileSink {
    type Handle = StagedId;

    fn stage(&mut self, source: &mut dyn Read) -> io::Result<Staged<StagedId>> {
        fs::create_dir_all(&self.dir)?;
        let mut temp = tempfile::Builder::new()
            .prefix(".newtube-merge-")
            .suffix(".part")
            .tempfile_in(&self.dir)?;
        let len = io::copy(source, &mut temp)?;
        temp.flush()?;
        let id = StagedId(self.next_id);
        self.next_id += 1;
        debug!(path = %temp.path().display(), len, "staged download");
        self.staged.insert(id, temp);
        Ok(Staged { handle: id, len })
    }

    fn commit(&mut self, handle: &StagedId, file_name: &str) -> io::Result<PathBuf> {
        let temp = self.staged.remove(handle).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "staged download is no longer available")
        })?;
        let destination = unique_destination(&self.dir, &sanitize_file_name(file_name));
        temp.persist_noclobber(&destination)
            .map_err(io::Error::from)?;
        Ok(destination)
    }

    fn release(&mut self, handle: StagedId) {
        if self.staged.remove(&handle).is_some() {
            debug!("discarded uncommitted download");
        }
    }
}

/// Replaces characters that are not allowed in file names on common
/// platforms and trims the result. Never returns an empty string.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.').trim();
    if trimmed.is_empty() {
        "video".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `{title}_{millis}.{extension}` with the title made filesystem safe.
pub fn suggested_file_name(title: &str, extension: &str, millis: i64) -> String {
    let stem: String = sanitize_file_name(title)
        .chars()
        .take(MAX_STEM_CHARS)
        .collect();
    format!("{}_{millis}.{extension}", stem.trim_end())
}

/// `{title}_{format_id}.{ext}` for a single-format download. The variant's
/// own extension is kept when it looks like one, otherwise `mp4`.
pub fn format_file_name(title: &str, format_id: &str, extension: Option<&str>) -> String {
    let stem: String = sanitize_file_name(title)
        .chars()
        .take(MAX_STEM_CHARS)
        .collect();
    let extension = extension
        .map(str::trim)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|ch| ch.is_ascii_alphanumeric()))
        .unwrap_or(DEFAULT_EXTENSION);
    format!(
        "{}_{}.{extension}",
        stem.trim_end(),
        sanitize_file_name(format_id)
    )
}

/// Picks a file extension for a media content type, `mp4` when unknown.
pub fn extension_for_content_type(content_type: Option<&str>) -> &'static str {
    let Some(essence) = content_type
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
    else {
        return DEFAULT_EXTENSION;
    };
    if !(essence.starts_with("video/") || essence.starts_with("audio/")) {
        return DEFAULT_EXTENSION;
    }
    match mime_guess::get_mime_extensions_str(&essence) {
        Some(extensions) if extensions.contains(&DEFAULT_EXTENSION) => DEFAULT_EXTENSION,
        Some(extensions) => extensions.first().copied().unwrap_or(DEFAULT_EXTENSION),
        None => DEFAULT_EXTENSION,
    }
}

/// Appends ` (n)` before the extension until the name is free, the way
/// browsers avoid overwriting earlier downloads.
fn unique_destination(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, extension) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    };
    (1u32..)
        .map(|index| match extension {
            Some(ext) => dir.join(format!("{stem} ({index}).{ext}")),
            None => dir.join(format!("{stem} ({index})")),
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}
