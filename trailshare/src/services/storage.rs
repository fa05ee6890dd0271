use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object key `{0}`")]
    InvalidKey(String),

    #[error("storage I/O failed for `{key}`: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Blob storage for uploaded images
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Removing a key that does not exist succeeds
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    fn public_url(&self, key: &str) -> String;
}

/// Objects stored as plain files under a root directory
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_prefix: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_prefix: public_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

/// Keys are relative, slash separated and never leave the root
fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = || StorageError::InvalidKey(key.to_string());
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(invalid());
    }
    let all_normal = Path::new(key)
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    if all_normal { Ok(()) } else { Err(invalid()) }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let io_err = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(&path, bytes).await.map_err(io_err)?;
        debug!(key, size = bytes.len(), "Stored object");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key, "Deleted object");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.public_prefix)
    }
}
