//! Blob store abstraction used by the history log.

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{BackendError, StorageError};

/// Metadata for a stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMeta {
    /// Full key of the blob.
    pub key: String,
    /// When the blob was written.
    pub last_modified: DateTime<Utc>,
    /// Size in bytes.
    pub size: u64,
}

/// Errors reported by a [`BlobStore`].
#[derive(Debug, Clone)]
pub enum BlobError {
    /// The store cannot be reached.
    Unavailable(String),
    /// The key is not acceptable to the store.
    InvalidKey(String),
    /// Any other failure.
    Internal(String),
}

impl std::fmt::Display for BlobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlobError::Unavailable(msg) => write!(f, "blob store unavailable: {msg}"),
            BlobError::InvalidKey(key) => write!(f, "invalid blob key: {key}"),
            BlobError::Internal(msg) => write!(f, "blob store error: {msg}"),
        }
    }
}

impl std::error::Error for BlobError {}

impl From<BlobError> for StorageError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::Unavailable(message) => StorageError::Backend(BackendError::Unavailable {
                backend_name: "blob".to_string(),
                message,
            }),
            other => StorageError::Backend(BackendError::Internal {
                backend_name: "blob".to_string(),
                message: other.to_string(),
                source: Some(Box::new(other)),
            }),
        }
    }
}

/// Keyed byte storage.
///
/// Keys are `/`-separated. `get` of a missing key yields `None` and `delete`
/// of a missing key succeeds.
#[async_trait]
pub trait BlobStore: Send + Sync + Debug {
    /// Writes a blob, replacing any existing one.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), BlobError>;

    /// Reads a blob.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError>;

    /// Deletes a blob.
    async fn delete(&self, key: &str) -> Result<(), BlobError>;

    /// Lists the blobs directly below `prefix`, treating it as a directory.
    async fn list(&self, prefix: &str) -> Result<Vec<BlobMeta>, BlobError>;
}
