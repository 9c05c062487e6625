use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum RootError {
    #[error("root directory does not exist: {0}")]
    Missing(PathBuf),
    #[error("root is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("destination {destination} overlaps input tree {root}")]
    Overlapping { destination: PathBuf, root: PathBuf },
    #[error("could not resolve root path {path}: {source}")]
    Unresolvable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Checks that `root` is an existing directory and returns it as an absolute path.
pub fn validate_root(root: &Path) -> Result<PathBuf, RootError> {
    if !root.exists() {
        return Err(RootError::Missing(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(RootError::NotADirectory(root.to_path_buf()));
    }
    std::path::absolute(root).map_err(|source| RootError::Unresolvable {
        path: root.to_path_buf(),
        source,
    })
}

/// Physical location of `path`, which need not exist yet. The deepest existing
/// ancestor is canonicalized (links and `..` resolved) and the remaining
/// components are folded onto it.
pub fn resolve_location(path: &Path) -> Result<PathBuf, RootError> {
    let unresolvable = |source: io::Error| RootError::Unresolvable {
        path: path.to_path_buf(),
        source,
    };
    let absolute = std::path::absolute(path).map_err(unresolvable)?;
    let components: Vec<Component> = absolute.components().collect();

    for split in (1..=components.len()).rev() {
        let head: PathBuf = components[..split].iter().collect();
        let Ok(mut resolved) = fs::canonicalize(&head) else {
            continue;
        };
        for component in &components[split..] {
            match component {
                Component::ParentDir => {
                    resolved.pop();
                }
                Component::Normal(name) => resolved.push(name),
                _ => {}
            }
        }
        return Ok(resolved);
    }

    Err(unresolvable(io::Error::new(
        io::ErrorKind::NotFound,
        "no existing ancestor",
    )))
}

/// A destination may neither sit inside `root` nor contain it. Both paths
/// are compared by their resolved locations.
pub fn ensure_outside(destination: &Path, root: &Path) -> Result<(), RootError> {
    let resolved_destination = resolve_location(destination)?;
    let resolved_root = resolve_location(root)?;
    if resolved_destination.starts_with(&resolved_root)
        || resolved_root.starts_with(&resolved_destination)
    {
        return Err(RootError::Overlapping {
            destination: destination.to_path_buf(),
            root: root.to_path_buf(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct TreeListing {
    pub files: Vec<PathBuf>,
    pub dirs: Vec<PathBuf>,
    pub unreadable: usize,
}

/// Walks `root` in file-name order. Anything under `exclude` is skipped without
/// being descended into. Links to files are followed. Entries that cannot be
/// read, and anything that is neither a directory nor a file, are logged and
/// counted.
pub fn walk_tree(root: &Path, exclude: Option<&Path>) -> TreeListing {
    let mut listing = TreeListing::default();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| exclude.map_or(true, |ex| !entry.path().starts_with(ex)));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let at = err
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| root.display().to_string());
                warn!(path = %at, error = %err, "skipping unreadable entry");
                listing.unreadable += 1;
                continue;
            }
        };
        let file_type = entry.file_type();
        if file_type.is_dir() {
            listing.dirs.push(entry.into_path());
        } else if file_type.is_file() || entry.path().is_file() {
            listing.files.push(entry.into_path());
        } else {
            warn!(path = %entry.path().display(), "skipping entry that is not a regular file");
            listing.unreadable += 1;
        }
    }

    listing
}

/// Relative location of `path` under `root`, or just its file name when it is not under `root`.
pub fn relative_to(root: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
        _ => path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("file")),
    }
}
