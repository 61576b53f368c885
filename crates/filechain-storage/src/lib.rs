pub mod file_store;
pub mod sled_index;

use filechain_core::Fingerprint;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub use file_store::{fingerprint_file, sanitize_file_name, FileAlert, FileStore};
pub use sled_index::SledIndex;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index error: {0}")]
    Index(#[from] sled::Error),

    #[error("index entry encoding: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("invalid file name {0:?}")]
    InvalidName(String),

    #[error("corrupt index key {0:?}")]
    CorruptKey(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub file_name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Fingerprint -> stored file mapping. Nothing here survives a restart.
pub trait ContentIndex: Send + Sync {
    fn put(&self, fingerprint: &Fingerprint, entry: &IndexEntry) -> Result<()>;
    fn get(&self, fingerprint: &Fingerprint) -> Result<Option<IndexEntry>>;
    fn entries(&self) -> Result<Vec<(Fingerprint, IndexEntry)>>;
}
