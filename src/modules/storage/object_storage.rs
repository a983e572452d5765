use async_trait::async_trait;

use crate::core::error::Result;

/// Where an uploaded object ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Full object key inside the bucket
    pub key: String,
    pub url: String,
}

/// Blob storage used for uploaded document files
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `data` under `path` (relative to the storage prefix)
    async fn put(&self, path: &str, data: &[u8], content_type: &str) -> Result<StoredObject>;

    /// Remove an object by the key returned from [`ObjectStorage::put`]
    async fn delete(&self, key: &str) -> Result<()>;
}
