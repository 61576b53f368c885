use filechain_storage::FileStore;
use tempfile::{tempdir, TempDir};

pub fn create_temp_store() -> (TempDir, FileStore) {
    // Create a temporary storage root for the file store
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let store = FileStore::open(temp_dir.path().join("node_test_files"))
        .expect("Failed to open FileStore");
    (temp_dir, store)
}

pub fn random_payload(len: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}
