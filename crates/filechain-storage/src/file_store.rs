use filechain_core::Fingerprint;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use crate::{ContentIndex, IndexEntry, Result, SledIndex, StoreError};

const PARTIAL_SUFFIX: &str = ".partial";

/// Streams a file through SHA-256.
pub fn fingerprint_file(path: impl AsRef<Path>) -> io::Result<Fingerprint> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(Fingerprint::from_digest(&hasher.finalize()))
}

/// Reduces `name` to its final path component.
pub fn sanitize_file_name(name: &str) -> Result<String> {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && !n.ends_with(PARTIAL_SUFFIX))
        .map(str::to_owned)
        .ok_or_else(|| StoreError::InvalidName(name.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileAlert {
    Missing {
        fingerprint: Fingerprint,
        path: PathBuf,
    },
    Modified {
        fingerprint: Fingerprint,
        path: PathBuf,
        actual: Fingerprint,
    },
}

/// A node's storage directory plus its content index.
///
/// Files keep their original names, so a second file with the same name
/// replaces the first on disk while both fingerprints stay indexed.
#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
    index: SledIndex,
}

impl FileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let index = SledIndex::temporary()?;
        info!(root = %root.display(), "file store opened");
        Ok(Self { root, index })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> Result<bool> {
        Ok(self.index.get(fingerprint)?.is_some())
    }

    /// Index entry for `fingerprint`, only if the backing file still exists.
    pub fn locate(&self, fingerprint: &Fingerprint) -> Result<Option<IndexEntry>> {
        Ok(self
            .index
            .get(fingerprint)?
            .filter(|entry| entry.path.is_file()))
    }

    pub fn entries(&self) -> Result<Vec<(Fingerprint, IndexEntry)>> {
        self.index.entries()
    }

    /// Writes `bytes` under `name` in the storage directory. Not indexed.
    pub fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.root.join(sanitize_file_name(name)?);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Where an in-flight download of `name` with content `fingerprint` is staged.
    pub fn partial_path(&self, name: &str, fingerprint: &Fingerprint) -> Result<PathBuf> {
        let name = sanitize_file_name(name)?;
        Ok(self.root.join(format!(".{name}.{fingerprint}{PARTIAL_SUFFIX}")))
    }

    /// Indexes a file that already lives in the storage directory.
    pub fn register(&self, fingerprint: &Fingerprint, path: &Path) -> Result<IndexEntry> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::InvalidName(path.display().to_string()))?
            .to_string();
        let entry = IndexEntry {
            file_name,
            path: path.to_path_buf(),
            size: fs::metadata(path)?.len(),
        };
        self.index.put(fingerprint, &entry)?;
        info!(%fingerprint, file = %entry.file_name, size = entry.size, "file registered");
        Ok(entry)
    }

    /// Rehashes every indexed file and reports the ones that vanished or changed.
    pub fn verify(&self) -> Result<Vec<FileAlert>> {
        let mut alerts = Vec::new();
        for (fingerprint, entry) in self.entries()? {
            if !entry.path.is_file() {
                warn!(%fingerprint, path = %entry.path.display(), "stored file missing");
                alerts.push(FileAlert::Missing {
                    fingerprint,
                    path: entry.path,
                });
                continue;
            }
            let actual = fingerprint_file(&entry.path)?;
            if actual != fingerprint {
                warn!(%fingerprint, %actual, "stored file modified");
                alerts.push(FileAlert::Modified {
                    fingerprint,
                    path: entry.path,
                    actual,
                });
            }
        }
        Ok(alerts)
    }
}
