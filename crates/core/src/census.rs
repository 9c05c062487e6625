use crate::media::has_extension_in;
use crate::scan::{validate_root, walk_tree};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderMediaCount {
    pub folder: PathBuf,
    pub media_count: usize,
}

/// Counts files directly inside each folder of `root` (the root included)
/// whose extension is listed, keeping folders with more than `threshold`.
/// Results are in path order.
pub fn count_media_by_folder(
    root: &Path,
    extensions: &[String],
    threshold: usize,
) -> Result<Vec<FolderMediaCount>> {
    let root = validate_root(root)?;
    let listing = walk_tree(&root, None);

    let mut counts: BTreeMap<PathBuf, usize> = BTreeMap::new();
    for file in listing.files.iter().filter(|f| has_extension_in(f, extensions)) {
        if let Some(folder) = file.parent() {
            *counts.entry(folder.to_path_buf()).or_default() += 1;
        }
    }

    let folders: Vec<FolderMediaCount> = counts
        .into_iter()
        .filter(|(_, count)| *count > threshold)
        .map(|(folder, media_count)| FolderMediaCount {
            folder,
            media_count,
        })
        .collect();

    info!(root = %root.display(), folders = folders.len(), threshold, "census finished");
    Ok(folders)
}
