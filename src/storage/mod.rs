//! Blob storage for fetched artifacts
//! Uses Apache Arrow object_store crate

use async_trait::async_trait;
use bytes::Bytes;
use object_store::{ObjectStore, local::LocalFileSystem, memory::InMemory, path::Path as StoragePath};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{StorageConfig, StorageProvider};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Local storage requires a root directory")]
    MissingRoot,

    #[error("Location '{0}' does not belong to this store")]
    ForeignLocation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Metadata returned after a store or lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub location: String,
    pub etag: Option<String>,
    pub size: u64,
}

/// Key-value blob collaborator used by the artifact cache
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist `data` under `key`, returning where it now lives
    async fn store(&self, key: &str, data: Bytes) -> Result<StoredObject>;

    /// Read back an object by the location `store` returned
    async fn retrieve(&self, location: &str) -> Result<Bytes>;

    /// Metadata for `key` if it is already stored
    async fn head(&self, key: &str) -> Result<Option<StoredObject>>;
}

/// [`BlobStore`] over any object_store backend
#[derive(Clone)]
pub struct ObjectBlobStore {
    store: Arc<dyn ObjectStore>,
    base: String,
}

impl std::fmt::Debug for ObjectBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBlobStore")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl ObjectBlobStore {
    /// Wrap an object_store backend; locations are `{base}/{key}`
    pub fn new(store: Arc<dyn ObjectStore>, base: impl Into<String>) -> Self {
        Self {
            store,
            base: base.into(),
        }
    }

    /// Create in-memory storage for testing/development
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "memory://")
    }

    /// Create storage rooted at a local directory, creating it if needed
    pub fn local(root: &std::path::Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let root = root.canonicalize()?;
        let store = LocalFileSystem::new_with_prefix(&root)?;
        Ok(Self::new(
            Arc::new(store),
            format!("file://{}", root.display()),
        ))
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        match config.provider {
            StorageProvider::Memory => Ok(Self::in_memory()),
            StorageProvider::Local => {
                let root = config.root.as_deref().ok_or(StorageError::MissingRoot)?;
                Self::local(root)
            }
        }
    }

    fn location(&self, key: &str) -> String {
        if self.base.ends_with('/') {
            format!("{}{}", self.base, key)
        } else {
            format!("{}/{}", self.base, key)
        }
    }

    fn key_of<'a>(&self, location: &'a str) -> Result<&'a str> {
        location
            .strip_prefix(self.base.as_str())
            .map(|rest| rest.trim_start_matches('/'))
            .filter(|key| !key.is_empty())
            .ok_or_else(|| StorageError::ForeignLocation(location.to_string()))
    }
}

#[async_trait]
impl BlobStore for ObjectBlobStore {
    async fn store(&self, key: &str, data: Bytes) -> Result<StoredObject> {
        let path = StoragePath::from(key);
        let size = data.len() as u64;

        let put_result = self.store.put(&path, data.into()).await?;

        tracing::info!(key, size, "Uploaded to storage");

        Ok(StoredObject {
            key: key.to_string(),
            location: self.location(key),
            etag: put_result.e_tag,
            size,
        })
    }

    async fn retrieve(&self, location: &str) -> Result<Bytes> {
        let key = self.key_of(location)?;
        let path = StoragePath::from(key);

        let result = match self.store.get(&path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(StorageError::NotFound(location.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let bytes = result.bytes().await?;

        tracing::debug!(key, size = bytes.len(), "Read from storage");

        Ok(bytes)
    }

    async fn head(&self, key: &str) -> Result<Option<StoredObject>> {
        let path = StoragePath::from(key);

        match self.store.head(&path).await {
            Ok(meta) => Ok(Some(StoredObject {
                key: key.to_string(),
                location: self.location(key),
                etag: meta.e_tag,
                size: meta.size as u64,
            })),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
