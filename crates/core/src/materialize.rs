use crate::fingerprint::{fingerprint_file, Fingerprint, FingerprintError};
use crate::plan::{suffixed_path, CopyPlan, CopyPlanEntry};
use crate::ProgressCallback;
use anyhow::{Context, Result};
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// The file was written to this path.
    Copied(PathBuf),
    /// A file with identical content already sits at this path.
    AlreadyPresent(PathBuf),
}

impl Placement {
    pub fn path(&self) -> &Path {
        match self {
            Placement::Copied(path) | Placement::AlreadyPresent(path) => path,
        }
    }
}

#[derive(Debug, Error)]
pub enum PlaceError {
    #[error("could not create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not copy {from} -> {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),
}

/// One row of the run log artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub original: PathBuf,
    pub final_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterializeReport {
    pub copied: Vec<RunLogEntry>,
    pub already_present: Vec<RunLogEntry>,
    pub failures: Vec<FileFailure>,
}

/// Copies `source` to `destination` without ever overwriting. A taken path
/// holding identical bytes counts as already present; a taken path holding
/// anything else moves the copy to `<stem>_<n>.<ext>`.
pub fn place_file(
    source: &Path,
    destination: &Path,
    block_size: usize,
) -> Result<Placement, PlaceError> {
    let source_meta = fs::metadata(source).map_err(|err| copy_error(source, destination, err))?;
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|source| PlaceError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut source_fingerprint: Option<Fingerprint> = None;
    let mut n = 0usize;
    loop {
        let candidate = if n == 0 {
            destination.to_path_buf()
        } else {
            suffixed_path(destination, n)
        };
        n += 1;

        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(out) => {
                copy_into(source, &source_meta, out, &candidate)?;
                return Ok(Placement::Copied(candidate));
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                if holds_same_content(
                    source,
                    source_meta.len(),
                    &mut source_fingerprint,
                    &candidate,
                    block_size,
                )? {
                    return Ok(Placement::AlreadyPresent(candidate));
                }
            }
            Err(err) => return Err(copy_error(source, &candidate, err)),
        }
    }
}

fn copy_into(
    source: &Path,
    source_meta: &fs::Metadata,
    out: File,
    dest: &Path,
) -> Result<(), PlaceError> {
    let written = File::open(source).and_then(|mut input| {
        let mut writer = BufWriter::new(out);
        io::copy(&mut input, &mut writer)?;
        writer.flush()
    });
    if let Err(err) = written {
        if let Err(cleanup) = fs::remove_file(dest) {
            warn!(path = %dest.display(), error = %cleanup, "could not remove partial copy");
        }
        return Err(copy_error(source, dest, err));
    }

    let atime = FileTime::from_last_access_time(source_meta);
    let mtime = FileTime::from_last_modification_time(source_meta);
    if let Err(err) = filetime::set_file_times(dest, atime, mtime) {
        debug!(path = %dest.display(), error = %err, "could not carry over timestamps");
    }
    if let Err(err) = fs::set_permissions(dest, source_meta.permissions()) {
        debug!(path = %dest.display(), error = %err, "could not carry over permissions");
    }
    Ok(())
}

fn holds_same_content(
    source: &Path,
    source_len: u64,
    source_fingerprint: &mut Option<Fingerprint>,
    candidate: &Path,
    block_size: usize,
) -> Result<bool, PlaceError> {
    let Ok(meta) = fs::metadata(candidate) else {
        return Ok(false);
    };
    if !meta.is_file() || meta.len() != source_len {
        return Ok(false);
    }
    let source_fp = match *source_fingerprint {
        Some(fp) => fp,
        None => {
            let fp = fingerprint_file(source, block_size)?;
            *source_fingerprint = Some(fp);
            fp
        }
    };
    Ok(fingerprint_file(candidate, block_size)? == source_fp)
}

fn copy_error(from: &Path, to: &Path, source: io::Error) -> PlaceError {
    PlaceError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    }
}

/// Executes every entry of `plan` in order. Per-file failures are logged and
/// collected; they never stop the remaining copies.
pub fn materialize(
    plan: &CopyPlan,
    block_size: usize,
    stage: &str,
    progress: &ProgressCallback,
) -> MaterializeReport {
    let mut report = MaterializeReport::default();
    create_directories(&plan.directories, &mut report);

    let total = plan.entries.len() as u64;
    for (index, entry) in plan.entries.iter().enumerate() {
        progress(stage, index as u64, total, &entry.source.to_string_lossy());
        materialize_entry(entry, block_size, &mut report);
    }

    report
}

/// Creates each directory (idempotent). Failures are recorded, not returned.
pub fn create_directories(dirs: &[PathBuf], report: &mut MaterializeReport) {
    for dir in dirs {
        if let Err(err) = fs::create_dir_all(dir) {
            warn!(path = %dir.display(), error = %err, "could not create directory");
            report.failures.push(FileFailure {
                path: dir.clone(),
                reason: err.to_string(),
            });
        }
    }
}

/// Places a single entry and records the outcome in `report`. Returns the
/// placement so callers can track where the content ended up.
pub fn materialize_entry(
    entry: &CopyPlanEntry,
    block_size: usize,
    report: &mut MaterializeReport,
) -> Option<Placement> {
    match place_file(&entry.source, &entry.destination, block_size) {
        Ok(placement) => {
            let logged = RunLogEntry {
                original: entry.source.clone(),
                final_path: placement.path().to_path_buf(),
            };
            match &placement {
                Placement::Copied(to) => {
                    debug!(from = %entry.source.display(), to = %to.display(), "copied");
                    report.copied.push(logged);
                }
                Placement::AlreadyPresent(at) => {
                    debug!(from = %entry.source.display(), at = %at.display(), "already present");
                    report.already_present.push(logged);
                }
            }
            Some(placement)
        }
        Err(err) => {
            warn!(path = %entry.source.display(), error = %err, "copy failed, skipping");
            report.failures.push(FileFailure {
                path: entry.source.clone(),
                reason: err.to_string(),
            });
            None
        }
    }
}

/// Writes the `original_path,final_path` CSV into `root`. Nothing is written
/// for an empty run; an existing log is kept and the new one gets a suffix.
pub fn write_run_log(
    root: &Path,
    log_name: &str,
    entries: &[RunLogEntry],
) -> Result<Option<PathBuf>> {
    if entries.is_empty() {
        return Ok(None);
    }

    let base = root.join(log_name);
    let mut n = 0usize;
    let (path, file) = loop {
        let candidate = if n == 0 {
            base.clone()
        } else {
            suffixed_path(&base, n)
        };
        n += 1;
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => break (candidate, file),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("could not create run log: {}", candidate.display()))
            }
        }
    };

    let mut writer = csv::Writer::from_writer(file);
    writer
        .write_record(["original_path", "final_path"])
        .with_context(|| format!("could not write run log: {}", path.display()))?;
    for entry in entries {
        let original = entry.original.to_string_lossy();
        let final_path = entry.final_path.to_string_lossy();
        writer
            .write_record([&*original, &*final_path])
            .with_context(|| format!("could not write run log: {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("could not write run log: {}", path.display()))?;

    Ok(Some(path))
}

/// Like [`write_run_log`], but a failure is logged and recorded in `failures`
/// instead of aborting a run whose copies have already happened.
pub fn record_run_log(
    root: &Path,
    log_name: &str,
    entries: &[RunLogEntry],
    failures: &mut Vec<FileFailure>,
) -> Option<PathBuf> {
    match write_run_log(root, log_name, entries) {
        Ok(path) => path,
        Err(err) => {
            warn!(root = %root.display(), error = %format!("{err:#}"), "could not write run log");
            failures.push(FileFailure {
                path: root.join(log_name),
                reason: format!("{err:#}"),
            });
            None
        }
    }
}

/// True for the run log artifacts this tool leaves in a destination root.
pub fn is_run_log(root: &Path, path: &Path, log_name: &str) -> bool {
    if path.parent() != Some(root) {
        return false;
    }
    let base = Path::new(log_name);
    let (Some(stem), Some(name)) = (
        base.file_stem().map(|s| s.to_string_lossy().to_string()),
        path.file_name().map(|s| s.to_string_lossy().to_string()),
    ) else {
        return false;
    };
    let ext = base
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    if name == log_name {
        return true;
    }
    name.strip_prefix(&format!("{stem}_"))
        .and_then(|rest| rest.strip_suffix(&ext))
        .map(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}
