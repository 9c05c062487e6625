use sha2::{Digest, Sha256};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// SHA-256 digest of a file's full contents.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("could not open {path} for hashing: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not read {path} while hashing: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub fn fingerprint_file(path: &Path, block_size: usize) -> Result<Fingerprint, FingerprintError> {
    let mut file = File::open(path).map_err(|source| FingerprintError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    fingerprint_reader(&mut file, block_size).map_err(|source| FingerprintError::Read {
        path: path.to_path_buf(),
        source,
    })
}

pub fn fingerprint_reader<R: Read>(reader: &mut R, block_size: usize) -> io::Result<Fingerprint> {
    let mut hasher = Sha256::new();
    let mut block = vec![0u8; block_size.max(1)];
    loop {
        let read = match reader.read(&mut block) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        hasher.update(&block[..read]);
    }
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    Ok(Fingerprint(digest))
}

/// Fingerprint -> first path seen with that content. Owned by a single merge run.
#[derive(Debug, Default)]
pub struct ContentIndex {
    entries: HashMap<Fingerprint, PathBuf>,
}

impl ContentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&Path> {
        self.entries.get(fingerprint).map(PathBuf::as_path)
    }

    /// Records `path` unless the content is already known. Returns the path that
    /// holds the content when it was already present.
    pub fn insert(&mut self, fingerprint: Fingerprint, path: PathBuf) -> Option<&Path> {
        match self.entries.entry(fingerprint) {
            Entry::Occupied(existing) => Some(existing.into_mut().as_path()),
            Entry::Vacant(slot) => {
                slot.insert(path);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
