//! Byte storage for originals and derived assets.
//!
//! Paths are opaque, storage-relative identifiers such as
//! `converted/<id>.webp`. [`StorageProvider::replace`] is write-new-then-swap:
//! a reader sees either the old bytes or the new bytes, never a partial file.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::PipelineError;

/// URL prefix under which stored paths are served.
pub const MEDIA_URL_PREFIX: &str = "/media";

#[async_trait]
pub trait StorageProvider: Send + Sync + 'static {
    async fn write(&self, path: &str, bytes: &[u8]) -> Result<(), PipelineError>;

    /// Atomically replace whatever is stored at `path`.
    async fn replace(&self, path: &str, bytes: &[u8]) -> Result<(), PipelineError>;

    async fn read(&self, path: &str) -> Result<Vec<u8>, PipelineError>;

    async fn exists(&self, path: &str) -> Result<bool, PipelineError>;

    /// Remove `path`. Deleting a missing path is not an error.
    async fn delete(&self, path: &str) -> Result<(), PipelineError>;

    /// Public URL for a stored path.
    fn url_for(&self, path: &str) -> String {
        format!("{MEDIA_URL_PREFIX}/{path}")
    }
}

// ---------------------------------------------------------------------------
// LocalStorage
// ---------------------------------------------------------------------------

/// Files under a root directory.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a storage path, refusing anything that could escape the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, PipelineError> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(PipelineError::Storage(format!("Invalid storage path '{path}'")));
        }
        Ok(self.root.join(relative))
    }

    async fn ensure_parent(full: &Path) -> Result<(), PipelineError> {
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PipelineError::Storage(format!("{}: {e}", parent.display())))?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageProvider for LocalStorage {
    async fn write(&self, path: &str, bytes: &[u8]) -> Result<(), PipelineError> {
        let full = self.resolve(path)?;
        Self::ensure_parent(&full).await?;
        tokio::fs::write(&full, bytes)
            .await
            .map_err(|e| PipelineError::Storage(format!("{path}: {e}")))
    }

    async fn replace(&self, path: &str, bytes: &[u8]) -> Result<(), PipelineError> {
        let full = self.resolve(path)?;
        Self::ensure_parent(&full).await?;
        let mut staging = full.clone().into_os_string();
        staging.push(format!(".tmp-{}", uuid::Uuid::new_v4()));
        let staging = PathBuf::from(staging);

        if let Err(e) = tokio::fs::write(&staging, bytes).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(PipelineError::Storage(format!("{path}: {e}")));
        }
        if let Err(e) = tokio::fs::rename(&staging, &full).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(PipelineError::Storage(format!("{path}: {e}")));
        }
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, PipelineError> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full)
            .await
            .map_err(|e| PipelineError::Storage(format!("{path}: {e}")))
    }

    async fn exists(&self, path: &str) -> Result<bool, PipelineError> {
        let full = self.resolve(path)?;
        tokio::fs::try_exists(&full)
            .await
            .map_err(|e| PipelineError::Storage(format!("{path}: {e}")))
    }

    async fn delete(&self, path: &str) -> Result<(), PipelineError> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PipelineError::Storage(format!("{path}: {e}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// In-memory storage for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStorage {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }

    /// Stored paths, sorted.
    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl StorageProvider for MemoryStorage {
    async fn write(&self, path: &str, bytes: &[u8]) -> Result<(), PipelineError> {
        self.files
            .write()
            .await
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn replace(&self, path: &str, bytes: &[u8]) -> Result<(), PipelineError> {
        self.write(path, bytes).await
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, PipelineError> {
        self.files
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| PipelineError::Storage(format!("{path}: not found")))
    }

    async fn exists(&self, path: &str) -> Result<bool, PipelineError> {
        Ok(self.files.read().await.contains_key(path))
    }

    async fn delete(&self, path: &str) -> Result<(), PipelineError> {
        self.files.write().await.remove(path);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
