use crate::config::AppConfig;
use crate::materialize::{materialize, record_run_log, FileFailure};
use crate::media::classify;
use crate::plan::CopyPlan;
use crate::scan::{validate_root, walk_tree};
use crate::ProgressCallback;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectReport {
    pub collect_root: PathBuf,
    pub scanned: usize,
    pub media_files: usize,
    pub copied: usize,
    pub already_present: usize,
    pub errors: Vec<FileFailure>,
    pub unreadable: usize,
    pub log_path: Option<PathBuf>,
}

/// Lists every media file under `root` and its flat destination inside the
/// collect folder. The collect folder itself is not scanned.
fn plan_collect(root: &Path, config: &AppConfig) -> Result<(CopyPlan, usize, usize)> {
    let root = validate_root(root)?;
    let collect_root = root.join(&config.collect_dir_name);
    let listing = walk_tree(&root, Some(&collect_root));

    let mut plan = CopyPlan::new(&collect_root);
    for path in &listing.files {
        if classify(path, config).is_none() {
            continue;
        }
        let Some(name) = path.file_name() else {
            continue;
        };
        plan.push(path, collect_root.join(name));
    }
    Ok((plan, listing.files.len(), listing.unreadable))
}

/// Copies all media found anywhere under `root` into one flat folder,
/// `<root>/<collect_dir_name>`. Sources are left in place.
pub fn collect_media(
    root: &Path,
    config: &AppConfig,
    progress: &ProgressCallback,
) -> Result<CollectReport> {
    let (plan, scanned, unreadable) = plan_collect(root, config)?;
    let collect_root = plan.destination_root.clone();
    fs::create_dir_all(&collect_root).with_context(|| {
        format!(
            "could not create collect directory: {}",
            collect_root.display()
        )
    })?;

    let result = materialize(&plan, config.hash_block_size, "collect", progress);
    let mut errors = result.failures;
    let log_path = record_run_log(
        &collect_root,
        &config.collect_log_name,
        &result.copied,
        &mut errors,
    );

    info!(
        root = %collect_root.display(),
        copied = result.copied.len(),
        already_present = result.already_present.len(),
        errors = errors.len(),
        "collect finished"
    );

    Ok(CollectReport {
        collect_root,
        scanned,
        media_files: plan.len(),
        copied: result.copied.len(),
        already_present: result.already_present.len(),
        errors,
        unreadable,
        log_path,
    })
}
