use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One pending copy. The destination is where the file should land; the
/// materialize step may pick a suffixed sibling if that path is taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyPlanEntry {
    pub source: PathBuf,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CopyPlan {
    pub destination_root: PathBuf,
    /// Created before any copy, so empty source directories survive.
    pub directories: Vec<PathBuf>,
    pub entries: Vec<CopyPlanEntry>,
}

impl CopyPlan {
    pub fn new(destination_root: impl Into<PathBuf>) -> Self {
        Self {
            destination_root: destination_root.into(),
            directories: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, source: impl Into<PathBuf>, destination: impl Into<PathBuf>) {
        self.entries.push(CopyPlanEntry {
            source: source.into(),
            destination: destination.into(),
        });
    }

    pub fn push_directory(&mut self, dir: impl Into<PathBuf>) {
        self.directories.push(dir.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `photo.jpg` -> `photo_3.jpg`; `README` -> `README_3`.
pub fn suffixed_path(path: &Path, n: usize) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let stem = path
        .file_stem()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    let mut name = format!("{}_{}", stem, n);
    if let Some(ext) = path.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    parent.join(name)
}
