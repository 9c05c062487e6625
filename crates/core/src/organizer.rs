use crate::config::AppConfig;
use crate::materialize::{materialize, record_run_log, FileFailure};
use crate::media::{classify, MediaFile, MediaKind};
use crate::plan::CopyPlan;
use crate::resolver::{DateResolver, ResolvedDate};
use crate::scan::{validate_root, walk_tree, TreeListing};
use crate::ProgressCallback;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketAssignment {
    pub source: PathBuf,
    pub kind: MediaKind,
    pub date: ResolvedDate,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OrganizeStats {
    pub scanned_files: usize,
    pub media_files: usize,
    pub skipped_non_media: usize,
    pub unreadable: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizePlan {
    pub source_root: PathBuf,
    pub output_root: PathBuf,
    pub assignments: Vec<BucketAssignment>,
    pub skipped: Vec<FileFailure>,
    pub stats: OrganizeStats,
}

impl OrganizePlan {
    pub fn copy_plan(&self) -> CopyPlan {
        let mut plan = CopyPlan::new(&self.output_root);
        for assignment in &self.assignments {
            plan.push(&assignment.source, &assignment.destination);
        }
        plan
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizeReport {
    pub output_root: PathBuf,
    pub scanned: usize,
    pub copied: usize,
    pub already_present: usize,
    pub errors: Vec<FileFailure>,
    pub log_path: Option<PathBuf>,
    pub assignments: Vec<BucketAssignment>,
}

/// Scans `source` and decides a `YYYY/YYYY_MM` bucket for every media file.
/// Nothing on disk is touched.
pub fn plan_organize(source: &Path, config: &AppConfig) -> Result<OrganizePlan> {
    let source_root = validate_root(source)?;
    let output_root = source_root.join(&config.sorted_dir_name);
    let listing = walk_tree(&source_root, Some(&output_root));
    let plan = plan_listing(source_root, output_root, listing, config);

    info!(
        root = %plan.source_root.display(),
        scanned = plan.stats.scanned_files,
        media = plan.stats.media_files,
        "organize plan ready"
    );
    Ok(plan)
}

fn plan_listing(
    source_root: PathBuf,
    output_root: PathBuf,
    listing: TreeListing,
    config: &AppConfig,
) -> OrganizePlan {
    let resolver = DateResolver::new(config);

    let mut stats = OrganizeStats {
        scanned_files: listing.files.len(),
        unreadable: listing.unreadable,
        ..OrganizeStats::default()
    };
    let mut assignments = Vec::new();
    let mut skipped = Vec::new();

    for path in listing.files {
        let Some(kind) = classify(&path, config) else {
            stats.skipped_non_media += 1;
            continue;
        };
        stats.media_files += 1;

        let file = match MediaFile::from_path(&path) {
            Ok(file) => file,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not read file, skipping");
                stats.unreadable += 1;
                skipped.push(FileFailure {
                    path,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        let date = resolver.resolve(&file, kind);
        let (year, month) = date.bucket();
        let destination = output_root
            .join(year)
            .join(month)
            .join(file.path.file_name().unwrap_or_default());
        debug!(
            path = %file.path.display(),
            when = %date.when,
            source = ?date.source,
            "bucket assigned"
        );
        assignments.push(BucketAssignment {
            source: file.path,
            kind,
            date,
            destination,
        });
    }

    OrganizePlan {
        source_root,
        output_root,
        assignments,
        skipped,
        stats,
    }
}

/// Copies every planned file into its bucket and writes the run log.
pub fn apply_organize(
    plan: &OrganizePlan,
    config: &AppConfig,
    progress: &ProgressCallback,
) -> Result<OrganizeReport> {
    fs::create_dir_all(&plan.output_root).with_context(|| {
        format!(
            "could not create output directory: {}",
            plan.output_root.display()
        )
    })?;

    let result = materialize(
        &plan.copy_plan(),
        config.hash_block_size,
        "organize",
        progress,
    );
    let mut errors = plan.skipped.clone();
    errors.extend(result.failures);
    let log_path = record_run_log(
        &plan.output_root,
        &config.organize_log_name,
        &result.copied,
        &mut errors,
    );

    info!(
        copied = result.copied.len(),
        already_present = result.already_present.len(),
        errors = errors.len(),
        "organize finished"
    );

    Ok(OrganizeReport {
        output_root: plan.output_root.clone(),
        scanned: plan.stats.scanned_files,
        copied: result.copied.len(),
        already_present: result.already_present.len(),
        errors,
        log_path,
        assignments: plan.assignments.clone(),
    })
}

pub fn organize(
    source: &Path,
    config: &AppConfig,
    progress: &ProgressCallback,
) -> Result<OrganizeReport> {
    let plan = plan_organize(source, config)?;
    apply_organize(&plan, config, progress)
}
