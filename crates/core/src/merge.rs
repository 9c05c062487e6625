//! Merges a secondary tree into a copy of a primary tree, keeping only
//! content the primary does not already hold.
//!
//! Neither input is modified. The primary is mirrored into the merged root,
//! every file there is fingerprinted into a [`ContentIndex`], and then each
//! secondary file is either recognised as a duplicate or copied to its
//! relative path. Accepted files enter the index as soon as they land, so
//! duplicates inside the secondary tree are caught too.

use crate::config::AppConfig;
use crate::fingerprint::{fingerprint_file, ContentIndex};
use crate::materialize::{
    create_directories, is_run_log, materialize, materialize_entry, record_run_log, FileFailure,
    MaterializeReport, Placement, RunLogEntry,
};
use crate::plan::{CopyPlan, CopyPlanEntry};
use crate::scan::{ensure_outside, relative_to, validate_root, walk_tree};
use crate::ProgressCallback;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub primary: PathBuf,
    pub secondary: PathBuf,
    /// Defaults to a `<primary><merged_suffix>` sibling of the primary.
    pub destination: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateFile {
    pub path: PathBuf,
    /// Where the same content already lives in the merged tree.
    pub matches: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MergeReport {
    pub merged_root: PathBuf,
    pub primary_files: usize,
    pub primary_copied: usize,
    pub secondary_files: usize,
    pub copied: Vec<RunLogEntry>,
    pub duplicates: Vec<DuplicateFile>,
    pub errors: Vec<FileFailure>,
    pub unreadable: usize,
    pub log_path: Option<PathBuf>,
}

pub fn default_merged_root(primary: &Path, config: &AppConfig) -> Result<PathBuf> {
    let name = primary
        .file_name()
        .with_context(|| format!("primary tree has no name: {}", primary.display()))?;
    let parent = primary
        .parent()
        .with_context(|| format!("primary tree has no parent: {}", primary.display()))?;
    let mut merged = name.to_os_string();
    merged.push(&config.merged_suffix);
    Ok(parent.join(merged))
}

pub fn merge_trees(
    options: &MergeOptions,
    config: &AppConfig,
    progress: &ProgressCallback,
) -> Result<MergeReport> {
    let primary = validate_root(&options.primary)?;
    let secondary = validate_root(&options.secondary)?;
    let merged_root = match &options.destination {
        Some(dest) => std::path::absolute(dest)
            .with_context(|| format!("could not resolve destination: {}", dest.display()))?,
        None => default_merged_root(&primary, config)?,
    };
    ensure_outside(&merged_root, &primary)?;
    ensure_outside(&merged_root, &secondary)?;

    fs::create_dir_all(&merged_root).with_context(|| {
        format!("could not create merged directory: {}", merged_root.display())
    })?;

    let mut report = MergeReport {
        merged_root: merged_root.clone(),
        ..MergeReport::default()
    };

    let base = copy_primary(&primary, &merged_root, config, progress, &mut report);
    report.errors.extend(base.failures);

    let mut index = build_index(&merged_root, config, progress, &mut report);
    info!(entries = index.len(), "content index built");

    let added = merge_secondary(
        &secondary,
        &merged_root,
        config,
        progress,
        &mut index,
        &mut report,
    );
    report.errors.extend(added.failures);
    report.copied = added.copied;
    report
        .duplicates
        .extend(added.already_present.into_iter().map(|entry| DuplicateFile {
            path: entry.original,
            matches: entry.final_path,
        }));

    report.log_path = record_run_log(
        &merged_root,
        &config.merge_log_name,
        &report.copied,
        &mut report.errors,
    );

    info!(
        merged = %merged_root.display(),
        copied = report.copied.len(),
        duplicates = report.duplicates.len(),
        errors = report.errors.len(),
        "merge finished"
    );
    Ok(report)
}

fn copy_primary(
    primary: &Path,
    merged_root: &Path,
    config: &AppConfig,
    progress: &ProgressCallback,
    report: &mut MergeReport,
) -> MaterializeReport {
    let listing = walk_tree(primary, None);
    report.primary_files = listing.files.len();
    report.unreadable += listing.unreadable;

    let mut plan = CopyPlan::new(merged_root);
    for dir in &listing.dirs {
        plan.push_directory(merged_root.join(relative_to(primary, dir)));
    }
    for file in &listing.files {
        plan.push(file, merged_root.join(relative_to(primary, file)));
    }

    info!(root = %primary.display(), files = plan.len(), "copying primary tree");
    let result = materialize(&plan, config.hash_block_size, "primary", progress);
    report.primary_copied = result.copied.len();
    result
}

fn build_index(
    merged_root: &Path,
    config: &AppConfig,
    progress: &ProgressCallback,
    report: &mut MergeReport,
) -> ContentIndex {
    let listing = walk_tree(merged_root, None);
    report.unreadable += listing.unreadable;

    let mut index = ContentIndex::new();
    let total = listing.files.len() as u64;
    for (i, path) in listing.files.into_iter().enumerate() {
        progress("index", i as u64, total, &path.to_string_lossy());
        if is_run_log(merged_root, &path, &config.merge_log_name) {
            continue;
        }
        match fingerprint_file(&path, config.hash_block_size) {
            Ok(fingerprint) => {
                index.insert(fingerprint, path);
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not hash merged file");
                report.errors.push(FileFailure {
                    path,
                    reason: err.to_string(),
                });
            }
        }
    }
    index
}

fn merge_secondary(
    secondary: &Path,
    merged_root: &Path,
    config: &AppConfig,
    progress: &ProgressCallback,
    index: &mut ContentIndex,
    report: &mut MergeReport,
) -> MaterializeReport {
    let listing = walk_tree(secondary, None);
    report.secondary_files = listing.files.len();
    report.unreadable += listing.unreadable;

    let mut added = MaterializeReport::default();
    let dirs: Vec<PathBuf> = listing
        .dirs
        .iter()
        .map(|dir| merged_root.join(relative_to(secondary, dir)))
        .collect();
    create_directories(&dirs, &mut added);

    info!(root = %secondary.display(), files = listing.files.len(), "merging secondary tree");
    let total = listing.files.len() as u64;
    for (i, path) in listing.files.into_iter().enumerate() {
        progress("secondary", i as u64, total, &path.to_string_lossy());

        let fingerprint = match fingerprint_file(&path, config.hash_block_size) {
            Ok(fingerprint) => fingerprint,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not hash file, skipping");
                added.failures.push(FileFailure {
                    path,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        if let Some(existing) = index.get(&fingerprint) {
            debug!(path = %path.display(), matches = %existing.display(), "duplicate");
            report.duplicates.push(DuplicateFile {
                matches: existing.to_path_buf(),
                path,
            });
            continue;
        }

        let entry = CopyPlanEntry {
            destination: merged_root.join(relative_to(secondary, &path)),
            source: path,
        };
        // Only content that actually landed may shadow later files.
        if let Some(placement) = materialize_entry(&entry, config.hash_block_size, &mut added) {
            let landed = match placement {
                Placement::Copied(to) => to,
                Placement::AlreadyPresent(at) => at,
            };
            index.insert(fingerprint, landed);
        }
    }

    added
}

#[cfg(test)]
mod tests {
    use super::{default_merged_root, merge_trees, MergeOptions};
    use crate::config::AppConfig;
    use crate::scan::RootError;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    fn silent(_: &str, _: u64, _: u64, _: &str) {}

    fn write(path: &Path, bytes: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, bytes).expect("write file");
    }

    fn options(primary: &Path, secondary: &Path) -> MergeOptions {
        MergeOptions {
            primary: primary.to_path_buf(),
            secondary: secondary.to_path_buf(),
            destination: None,
        }
    }

    fn snapshot(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
        let mut files: Vec<_> = walkdir::WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| {
                let bytes = fs::read(entry.path()).expect("read file");
                (entry.into_path(), bytes)
            })
            .collect();
        files.sort();
        files
    }

    #[test]
    fn merged_root_sits_next_to_primary() {
        let merged = default_merged_root(Path::new("/photos/2024"), &AppConfig::default())
            .expect("merged root");
        assert_eq!(merged, PathBuf::from("/photos/2024_merged"));
    }

    #[test]
    fn identical_secondary_file_is_a_duplicate() {
        let temp = tempdir().expect("tempdir");
        let primary = temp.path().join("primary");
        let secondary = temp.path().join("secondary");
        write(&primary.join("a.jpg"), b"same pixels");
        write(&secondary.join("b.jpg"), b"same pixels");

        let report = merge_trees(&options(&primary, &secondary), &AppConfig::default(), &silent)
            .expect("merge");

        let merged = temp.path().join("primary_merged");
        assert_eq!(report.merged_root, merged);
        assert_eq!(report.primary_copied, 1);
        assert!(report.copied.is_empty());
        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.duplicates[0].matches, merged.join("a.jpg"));
        assert!(!merged.join("b.jpg").exists());
        assert_eq!(report.log_path, None);
        assert!(!merged.join("merge_log.csv").exists());
    }

    #[test]
    fn duplicates_inside_secondary_are_copied_once() {
        let temp = tempdir().expect("tempdir");
        let primary = temp.path().join("primary");
        let secondary = temp.path().join("secondary");
        fs::create_dir_all(&primary).expect("create primary");
        write(&secondary.join("x/one.jpg"), b"twin");
        write(&secondary.join("y/two.jpg"), b"twin");
        write(&secondary.join("y/three.mov"), b"unique");

        let report = merge_trees(&options(&primary, &secondary), &AppConfig::default(), &silent)
            .expect("merge");

        let merged = temp.path().join("primary_merged");
        assert_eq!(report.secondary_files, 3);
        assert_eq!(report.copied.len(), 2);
        assert_eq!(report.duplicates.len(), 1);
        assert!(merged.join("x/one.jpg").exists());
        assert!(!merged.join("y/two.jpg").exists());
        assert!(merged.join("y/three.mov").exists());

        let log = fs::read_to_string(merged.join("merge_log.csv")).expect("read log");
        assert_eq!(log.lines().count(), 3);
        assert!(log.starts_with("original_path,final_path\n"));
    }

    #[test]
    fn merge_is_idempotent_and_leaves_inputs_alone() {
        let temp = tempdir().expect("tempdir");
        let primary = temp.path().join("primary");
        let secondary = temp.path().join("secondary");
        write(&primary.join("2024/a.jpg"), b"a");
        fs::create_dir_all(primary.join("empty")).expect("create empty");
        write(&secondary.join("2024/b.jpg"), b"b");
        write(&secondary.join("c.jpg"), b"a");

        let before_primary = snapshot(&primary);
        let before_secondary = snapshot(&secondary);
        let config = AppConfig::default();

        let first = merge_trees(&options(&primary, &secondary), &config, &silent).expect("first");
        assert_eq!(first.copied.len(), 1);
        assert_eq!(first.duplicates.len(), 1);
        assert!(first.errors.is_empty());
        assert!(first.merged_root.join("empty").is_dir());

        let second = merge_trees(&options(&primary, &secondary), &config, &silent).expect("second");
        assert_eq!(second.primary_copied, 0);
        assert!(second.copied.is_empty());
        assert_eq!(second.duplicates.len(), 2);
        assert_eq!(second.log_path, None);

        assert_eq!(snapshot(&primary), before_primary);
        assert_eq!(snapshot(&secondary), before_secondary);
    }

    #[test]
    fn name_clash_with_new_content_gets_a_suffix() {
        let temp = tempdir().expect("tempdir");
        let primary = temp.path().join("primary");
        let secondary = temp.path().join("secondary");
        write(&primary.join("img.jpg"), b"primary version");
        write(&secondary.join("img.jpg"), b"secondary version");

        let report = merge_trees(&options(&primary, &secondary), &AppConfig::default(), &silent)
            .expect("merge");

        let merged = temp.path().join("primary_merged");
        assert_eq!(report.copied.len(), 1);
        assert_eq!(report.copied[0].final_path, merged.join("img_1.jpg"));
        assert_eq!(fs::read(merged.join("img.jpg")).expect("read"), b"primary version");
        assert_eq!(fs::read(merged.join("img_1.jpg")).expect("read"), b"secondary version");
    }

    #[test]
    fn destination_inside_an_input_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let primary = temp.path().join("primary");
        let secondary = temp.path().join("secondary");
        write(&primary.join("a.jpg"), b"a");
        write(&secondary.join("b.jpg"), b"b");

        let mut opts = options(&primary, &secondary);
        opts.destination = Some(secondary.join("merged"));
        let err = merge_trees(&opts, &AppConfig::default(), &silent).expect_err("must fail");
        assert!(matches!(
            err.downcast_ref::<RootError>(),
            Some(RootError::Overlapping { .. })
        ));
        assert!(!secondary.join("merged").exists());
    }

    #[test]
    fn missing_secondary_fails_before_any_copy() {
        let temp = tempdir().expect("tempdir");
        let primary = temp.path().join("primary");
        write(&primary.join("a.jpg"), b"a");

        let err = merge_trees(
            &options(&primary, &temp.path().join("absent")),
            &AppConfig::default(),
            &silent,
        )
        .expect_err("must fail");
        assert!(err.downcast_ref::<RootError>().is_some());
        assert!(!temp.path().join("primary_merged").exists());
    }

    #[test]
    fn destination_reaching_back_into_primary_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let primary = temp.path().join("primary");
        let secondary = temp.path().join("secondary");
        write(&primary.join("a.jpg"), b"a");
        write(&secondary.join("b.jpg"), b"b");
        let before = snapshot(&primary);

        let mut opts = options(&primary, &secondary);
        opts.destination = Some(temp.path().join("other/../primary/out"));
        let err = merge_trees(&opts, &AppConfig::default(), &silent).expect_err("must fail");
        assert!(matches!(
            err.downcast_ref::<RootError>(),
            Some(RootError::Overlapping { .. })
        ));
        assert!(!primary.join("out").exists());
        assert_eq!(snapshot(&primary), before);
    }

    #[cfg(unix)]
    #[test]
    fn destination_through_a_link_into_primary_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let primary = temp.path().join("primary");
        let secondary = temp.path().join("secondary");
        write(&primary.join("a.jpg"), b"a");
        write(&secondary.join("b.jpg"), b"b");
        let alias = temp.path().join("alias");
        std::os::unix::fs::symlink(&primary, &alias).expect("create link");

        let mut opts = options(&primary, &secondary);
        opts.destination = Some(alias.join("out"));
        let err = merge_trees(&opts, &AppConfig::default(), &silent).expect_err("must fail");
        assert!(matches!(
            err.downcast_ref::<RootError>(),
            Some(RootError::Overlapping { .. })
        ));
        assert!(!primary.join("out").exists());
    }

    #[test]
    fn blocked_copy_is_recorded_and_does_not_hide_its_twin() {
        let temp = tempdir().expect("tempdir");
        let primary = temp.path().join("primary");
        let secondary = temp.path().join("secondary");
        // A file where the secondary needs a directory.
        write(&primary.join("x"), b"plain file");
        write(&secondary.join("x/a.jpg"), b"twin");
        write(&secondary.join("y/b.jpg"), b"twin");

        let report = merge_trees(&options(&primary, &secondary), &AppConfig::default(), &silent)
            .expect("merge");

        let merged = temp.path().join("primary_merged");
        assert_eq!(report.errors.len(), 2);
        assert!(report
            .errors
            .iter()
            .any(|failure| failure.path == secondary.join("x/a.jpg")));
        assert!(report.duplicates.is_empty());
        assert_eq!(report.copied.len(), 1);
        assert_eq!(report.copied[0].final_path, merged.join("y/b.jpg"));
        assert_eq!(fs::read(merged.join("y/b.jpg")).expect("read"), b"twin");
        assert_eq!(fs::read(merged.join("x")).expect("read"), b"plain file");
    }

    #[test]
    fn unwritable_run_log_is_an_error_not_a_lost_report() {
        let temp = tempdir().expect("tempdir");
        let primary = temp.path().join("primary");
        let secondary = temp.path().join("secondary");
        write(&primary.join("a.jpg"), b"a");
        write(&secondary.join("b.jpg"), b"b");

        let config = AppConfig {
            merge_log_name: "logs/merge.csv".to_string(),
            ..AppConfig::default()
        };
        let report = merge_trees(&options(&primary, &secondary), &config, &silent).expect("merge");

        let merged = temp.path().join("primary_merged");
        assert_eq!(report.copied.len(), 1);
        assert!(merged.join("b.jpg").exists());
        assert_eq!(report.log_path, None);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].path, merged.join("logs/merge.csv"));
    }
}
