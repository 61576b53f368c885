use crate::{ContentIndex, IndexEntry, Result, StoreError};
use filechain_core::Fingerprint;
use sled::{Db, IVec, Tree};
use tracing::debug;

const TREE_FILES: &str = "files";

/// Fingerprint index on a temporary sled database, removed when dropped.
#[derive(Clone)]
pub struct SledIndex {
  _db: Db,
  files: Tree,
}

impl SledIndex {
  pub fn temporary() -> Result<Self> {
    let db = sled::Config::new().temporary(true).open()?;
    let files = db.open_tree(TREE_FILES)?;
    debug!("temporary file index opened");
    Ok(Self { _db: db, files })
  }
}

impl ContentIndex for SledIndex {
  fn put(&self, fingerprint: &Fingerprint, entry: &IndexEntry) -> Result<()> {
    let bytes = bincode::serialize(entry)?;
    self.files.insert(fingerprint.as_str(), bytes)?;
    Ok(())
  }

  fn get(&self, fingerprint: &Fingerprint) -> Result<Option<IndexEntry>> {
    let opt = self.files.get(fingerprint.as_str())?;
    Ok(opt.map(|v: IVec| bincode::deserialize(&v)).transpose()?)
  }

  fn entries(&self) -> Result<Vec<(Fingerprint, IndexEntry)>> {
    self
      .files
      .iter()
      .map(|item| -> Result<(Fingerprint, IndexEntry)> {
        let (key, value) = item?;
        let key = String::from_utf8_lossy(&key).into_owned();
        let fingerprint = key
          .parse::<Fingerprint>()
          .map_err(|_| StoreError::CorruptKey(key.clone()))?;
        Ok((fingerprint, bincode::deserialize(&value)?))
      })
      .collect()
  }
}
