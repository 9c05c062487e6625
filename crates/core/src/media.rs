use crate::config::AppConfig;
use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Only still images carry EXIF capture dates worth reading.
    pub fn has_embedded_metadata(self) -> bool {
        matches!(self, MediaKind::Image)
    }
}

/// Snapshot of a file taken when the tree was scanned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFile {
    pub path: PathBuf,
    pub extension: String,
    pub size: u64,
    pub modified: NaiveDateTime,
}

impl MediaFile {
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let meta = fs::metadata(path)?;
        let modified: DateTime<Local> = DateTime::from(meta.modified()?);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::path::absolute(path)?
        };
        Ok(Self {
            extension: lowercase_extension(&path).unwrap_or_default(),
            size: meta.len(),
            modified: modified.naive_local(),
            path,
        })
    }

    /// Lossy for names that are not valid UTF-8, so date digits survive.
    pub fn file_name(&self) -> Cow<'_, str> {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default()
    }
}

pub fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Image wins when an extension is listed in both sets.
pub fn classify(path: &Path, config: &AppConfig) -> Option<MediaKind> {
    let ext = lowercase_extension(path)?;
    if contains_ext(&config.image_extensions, &ext) {
        Some(MediaKind::Image)
    } else if contains_ext(&config.video_extensions, &ext) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

pub fn has_extension_in(path: &Path, extensions: &[String]) -> bool {
    lowercase_extension(path)
        .map(|ext| contains_ext(extensions, &ext))
        .unwrap_or(false)
}

fn contains_ext(list: &[String], ext: &str) -> bool {
    list.iter()
        .any(|candidate| candidate.trim_start_matches('.').eq_ignore_ascii_case(ext))
}
