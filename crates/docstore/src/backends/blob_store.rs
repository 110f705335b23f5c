//! History blob storage over `object_store`.
//!
//! [`ObjectStoreBlobs`] adapts any [`ObjectStore`] (in-memory, local
//! filesystem or S3) to the [`BlobStore`] seam used by the history log.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use object_store::ObjectStore;
use object_store::PutPayload;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{BlobError, BlobMeta, BlobStore, DEFAULT_HISTORY_PREFIX};
use crate::error::{BackendError, StorageError, StorageResult};

/// Where history blobs are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlobStoreKind {
    /// Process memory; contents are lost on exit.
    Memory,

    /// A directory on the local filesystem.
    Local {
        /// Root directory, created if missing.
        root: PathBuf,
    },

    /// An S3 bucket or S3-compatible endpoint.
    S3 {
        /// Bucket name.
        bucket: String,
        /// AWS region override.
        #[serde(default)]
        region: Option<String>,
        /// S3-compatible endpoint URL (for example, MinIO).
        #[serde(default)]
        endpoint: Option<String>,
        /// Allow plain HTTP endpoints.
        #[serde(default)]
        allow_http: bool,
    },
}

/// Configuration for the history blob store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStoreConfig {
    /// Storage location.
    #[serde(flatten)]
    pub kind: BlobStoreKind,

    /// Key prefix under which history entries are written.
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_prefix() -> String {
    DEFAULT_HISTORY_PREFIX.to_string()
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            kind: BlobStoreKind::Memory,
            prefix: default_prefix(),
        }
    }
}

impl BlobStoreConfig {
    /// Validates configuration invariants.
    pub fn validate(&self) -> StorageResult<()> {
        if self.prefix.trim_matches('/').is_empty() {
            return Err(invalid("prefix must not be empty"));
        }

        match &self.kind {
            BlobStoreKind::Memory => {}
            BlobStoreKind::Local { root } => {
                if root.as_os_str().is_empty() {
                    return Err(invalid("local root must not be empty"));
                }
            }
            BlobStoreKind::S3 {
                bucket,
                endpoint,
                allow_http,
                ..
            } => {
                if bucket.trim().is_empty() {
                    return Err(invalid("bucket must not be empty"));
                }
                if let Some(endpoint) = endpoint.as_deref() {
                    let lower = endpoint.trim().to_ascii_lowercase();
                    let is_http = lower.starts_with("http://");
                    if !is_http && !lower.starts_with("https://") {
                        return Err(invalid("endpoint must start with http:// or https://"));
                    }
                    if is_http && !allow_http {
                        return Err(invalid("http endpoint requires allow_http=true"));
                    }
                }
            }
        }

        Ok(())
    }
}

fn invalid(message: &str) -> StorageError {
    StorageError::Backend(BackendError::Internal {
        backend_name: "blob".to_string(),
        message: message.to_string(),
        source: None,
    })
}

/// [`BlobStore`] backed by an [`ObjectStore`].
#[derive(Debug, Clone)]
pub struct ObjectStoreBlobs {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreBlobs {
    /// Wraps an existing object store.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Creates an in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    /// Creates a store rooted at a local directory, creating it if needed.
    pub fn local(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(BackendError::from)?;
        let store = LocalFileSystem::new_with_prefix(&root)?;
        Ok(Self::new(Arc::new(store)))
    }

    /// Builds the store described by `config`.
    pub fn from_config(config: &BlobStoreConfig) -> StorageResult<Self> {
        config.validate()?;
        match &config.kind {
            BlobStoreKind::Memory => Ok(Self::in_memory()),
            BlobStoreKind::Local { root } => Self::local(root.clone()),
            #[cfg(feature = "s3")]
            BlobStoreKind::S3 {
                bucket,
                region,
                endpoint,
                allow_http,
            } => {
                let mut builder = object_store::aws::AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .with_allow_http(*allow_http);
                if let Some(region) = region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                Ok(Self::new(Arc::new(builder.build()?)))
            }
            #[cfg(not(feature = "s3"))]
            BlobStoreKind::S3 { .. } => Err(invalid(
                "S3 history storage requires the `s3` feature",
            )),
        }
    }
}

fn parse_key(key: &str) -> Result<Path, BlobError> {
    Path::parse(key).map_err(|_| BlobError::InvalidKey(key.to_string()))
}

fn map_error(err: object_store::Error) -> BlobError {
    BlobError::Internal(err.to_string())
}

#[async_trait]
impl BlobStore for ObjectStoreBlobs {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), BlobError> {
        let path = parse_key(key)?;
        self.store
            .put(&path, PutPayload::from(bytes))
            .await
            .map_err(map_error)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError> {
        let path = parse_key(key)?;
        let result = match self.store.get(&path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(err) => return Err(map_error(err)),
        };
        let bytes = result.bytes().await.map_err(map_error)?;
        Ok(Some(bytes.to_vec()))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = parse_key(key)?;
        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(err) => Err(map_error(err)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobMeta>, BlobError> {
        let path = parse_key(prefix)?;
        let listing = match self.store.list_with_delimiter(Some(&path)).await {
            Ok(listing) => listing,
            Err(object_store::Error::NotFound { .. }) => return Ok(Vec::new()),
            Err(err) => return Err(map_error(err)),
        };

        debug!(prefix, objects = listing.objects.len(), "listed blobs");

        Ok(listing
            .objects
            .into_iter()
            .map(|meta| BlobMeta {
                key: meta.location.to_string(),
                last_modified: meta.last_modified,
                size: meta.size as u64,
            })
            .collect())
    }
}
