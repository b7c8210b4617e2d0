//! Blob stores for datasets
//!
//! Keys are relative, `/`-separated paths such as `processed/03339000/1756052100.csv`.
//! Last write wins; concurrent writers to one key race.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tokio::sync::RwLock;

use crate::types::{BlobError, BlobStore};

/// Reject empty, absolute and parent-escaping keys
fn validate_key(key: &str) -> Result<&Path, BlobError> {
    let path = Path::new(key);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

    if key.trim().is_empty() || escapes {
        return Err(BlobError::InvalidKey(key.to_string()));
    }
    Ok(path)
}

/// Files under a root folder, one file per key
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, BlobError> {
        Ok(self.root.join(validate_key(key)?))
    }
}

#[async_trait::async_trait]
impl BlobStore for FsBlobStore {
    async fn load(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BlobError::NotFound(key.to_string())),
            Err(e) => Err(BlobError::Io(e)),
        }
    }

    async fn save(&self, data: &[u8], key: &str) -> Result<(), BlobError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;

        tracing::debug!(key, path = %path.display(), bytes = data.len(), "Blob written");
        Ok(())
    }
}

/// Process-local store, for tests and runs without a data folder
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait::async_trait]
impl BlobStore for MemoryBlobStore {
    async fn load(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        validate_key(key)?;
        self.blobs
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }

    async fn save(&self, data: &[u8], key: &str) -> Result<(), BlobError> {
        validate_key(key)?;
        self.blobs
            .write()
            .await
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }
}
