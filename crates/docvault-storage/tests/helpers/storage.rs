use docvault_storage::{LocalStorage, S3Storage, Storage};
use object_store::memory::InMemory;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Local storage rooted in a temporary directory.
pub struct TestStorage {
    pub temp_dir: TempDir,
    pub base_path: PathBuf,
}

impl TestStorage {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let base_path = temp_dir.path().join("content");
        Self {
            temp_dir,
            base_path,
        }
    }

    pub async fn local(&self) -> LocalStorage {
        LocalStorage::new(&self.base_path)
            .await
            .expect("Failed to create local storage")
    }
}

impl Default for TestStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// S3 backend over an in-memory object store.
pub fn in_memory_s3() -> S3Storage {
    S3Storage::with_store(
        Arc::new(InMemory::new()),
        "fineract".to_string(),
        "http://localhost:9000/fineract".to_string(),
    )
}

/// Every backend that can run without network access.
pub async fn offline_backends(test_storage: &TestStorage) -> Vec<Arc<dyn Storage>> {
    vec![
        Arc::new(test_storage.local().await),
        Arc::new(in_memory_s3()),
    ]
}
