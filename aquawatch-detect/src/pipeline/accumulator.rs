//! Append-only dataset accumulation over a blob store

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::DetectError;
use crate::types::{BlobError, BlobStore};

/// Join existing dataset bytes and new rows with exactly one newline
///
/// No row validation happens here; this is a byte-level append.
pub fn append_dataset(existing: &[u8], new_rows: &[u8]) -> Vec<u8> {
    if existing.is_empty() {
        return new_rows.to_vec();
    }

    let mut merged = Vec::with_capacity(existing.len() + new_rows.len() + 1);
    merged.extend_from_slice(existing);
    if !existing.ends_with(b"\n") {
        merged.push(b'\n');
    }
    merged.extend_from_slice(new_rows);
    merged
}

pub struct DatasetAccumulator {
    store: Arc<dyn BlobStore>,
}

impl DatasetAccumulator {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Merge `new_rows` into the dataset at `key` and store the result
    ///
    /// A failed load (missing key included) starts a fresh dataset. A failed
    /// save is returned as `Storage`; callers decide whether it is fatal.
    pub async fn accumulate(&self, new_rows: &[u8], key: &str) -> Result<Vec<u8>, DetectError> {
        let existing = match self.store.load(key).await {
            Ok(bytes) => bytes,
            Err(BlobError::NotFound(_)) => {
                info!(key, "No existing dataset, starting a new one");
                Vec::new()
            }
            Err(e) => {
                warn!(key, error = %e, "Dataset load failed, starting a new one");
                Vec::new()
            }
        };

        let merged = append_dataset(&existing, new_rows);

        self.store
            .save(&merged, key)
            .await
            .map_err(|e| DetectError::Storage(format!("save {}: {}", key, e)))?;

        info!(
            key,
            previous_bytes = existing.len(),
            bytes = merged.len(),
            "Dataset saved"
        );
        Ok(merged)
    }

    /// Load a stored dataset; absence is an error here
    pub async fn load(&self, key: &str) -> Result<Vec<u8>, DetectError> {
        self.store
            .load(key)
            .await
            .map_err(|e| DetectError::Storage(format!("load {}: {}", key, e)))
    }

    /// Store bytes as-is, replacing any previous content
    pub async fn store(&self, data: &[u8], key: &str) -> Result<(), DetectError> {
        self.store
            .save(data, key)
            .await
            .map_err(|e| DetectError::Storage(format!("save {}: {}", key, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MemoryBlobStore;

    #[test]
    fn test_append_to_content_without_trailing_newline() {
        assert_eq!(append_dataset(b"x,y", b"a,b\n"), b"x,y\na,b\n".to_vec());
    }

    #[test]
    fn test_append_to_content_with_trailing_newline() {
        assert_eq!(append_dataset(b"x,y\n", b"a,b\n"), b"x,y\na,b\n".to_vec());
    }

    #[test]
    fn test_append_to_empty() {
        assert_eq!(append_dataset(b"", b"a,b\n"), b"a,b\n".to_vec());
    }

    #[tokio::test]
    async fn test_accumulate_missing_key_starts_fresh() {
        let store = Arc::new(MemoryBlobStore::new());
        let accumulator = DatasetAccumulator::new(store.clone());

        let merged = accumulator.accumulate(b"a,b\n", "k.csv").await.unwrap();

        assert_eq!(merged, b"a,b\n".to_vec());
        assert_eq!(store.load("k.csv").await.unwrap(), b"a,b\n".to_vec());
    }

    #[tokio::test]
    async fn test_accumulate_appends_existing() {
        let store = Arc::new(MemoryBlobStore::new());
        store.save(b"x,y", "k.csv").await.unwrap();
        let accumulator = DatasetAccumulator::new(store.clone());

        accumulator.accumulate(b"a,b\n", "k.csv").await.unwrap();
        let merged = accumulator.accumulate(b"c,d\n", "k.csv").await.unwrap();

        assert_eq!(merged, b"x,y\na,b\nc,d\n".to_vec());
    }

    #[tokio::test]
    async fn test_load_missing_is_storage_error() {
        let accumulator = DatasetAccumulator::new(Arc::new(MemoryBlobStore::new()));
        let result = accumulator.load("absent.csv").await;
        assert!(matches!(result, Err(DetectError::Storage(_))));
    }
}
