//! Append-only resource history.
//!
//! Every committed version of a resource is written to a blob store under
//! `{prefix}/{type}/{id}/{versionId}` before the live document is touched.
//! Entries are never modified. They are removed only by the compensating
//! delete that follows a failed backend commit, and they outlive deletion of
//! the live document.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::DEFAULT_MAX_RESOURCE_BYTES;
use crate::core::blob::BlobStore;
use crate::error::{ResourceError, StorageResult, ValidationError};
use crate::types::Resource;

/// Default key prefix for history blobs.
pub const DEFAULT_HISTORY_PREFIX: &str = "fhirhistory";

/// A stored version together with its blob metadata.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// The resource type.
    pub resource_type: String,
    /// The resource's logical ID.
    pub id: String,
    /// The version this entry records.
    pub version_id: String,
    /// When the entry was written.
    pub timestamp: DateTime<Utc>,
    /// The exact bytes written.
    pub serialized: Vec<u8>,
}

#[derive(Debug, Clone)]
struct HistoryKeyspace {
    base_prefix: Option<String>,
}

impl HistoryKeyspace {
    fn new(base_prefix: &str) -> Self {
        let base_prefix = Some(base_prefix.trim_matches('/').to_string()).filter(|p| !p.is_empty());
        Self { base_prefix }
    }

    fn resource_prefix(&self, resource_type: &str, id: &str) -> String {
        self.join(&[resource_type, id])
    }

    fn version_key(&self, resource_type: &str, id: &str, version_id: &str) -> String {
        self.join(&[resource_type, id, version_id])
    }

    fn join(&self, parts: &[&str]) -> String {
        let mut segs: Vec<&str> = Vec::with_capacity(parts.len() + 1);
        if let Some(prefix) = &self.base_prefix {
            segs.push(prefix.as_str());
        }
        segs.extend(
            parts
                .iter()
                .map(|p| p.trim_matches('/'))
                .filter(|p| !p.is_empty()),
        );
        segs.join("/")
    }
}

/// Per-resource version log over a [`BlobStore`].
#[derive(Debug, Clone)]
pub struct HistoryLog {
    blobs: Arc<dyn BlobStore>,
    keyspace: HistoryKeyspace,
    max_entry_bytes: usize,
}

impl HistoryLog {
    /// Creates a history log with the default prefix and size cap.
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            blobs,
            keyspace: HistoryKeyspace::new(DEFAULT_HISTORY_PREFIX),
            max_entry_bytes: DEFAULT_MAX_RESOURCE_BYTES,
        }
    }

    /// Sets the key prefix. An empty prefix stores entries at the root.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.keyspace = HistoryKeyspace::new(prefix);
        self
    }

    /// Sets the maximum serialized size of an entry.
    pub fn with_max_entry_bytes(mut self, max: usize) -> Self {
        self.max_entry_bytes = max;
        self
    }

    /// Returns the size cap.
    pub fn max_entry_bytes(&self) -> usize {
        self.max_entry_bytes
    }

    /// Writes a new version and returns the bytes that were stored.
    ///
    /// Oversized resources are rejected before anything is written.
    pub async fn insert(&self, resource: &Resource) -> StorageResult<Vec<u8>> {
        require_identity(resource)?;

        let bytes = resource.to_bytes()?;
        if bytes.len() > self.max_entry_bytes {
            return Err(ResourceError::Oversize {
                resource_type: resource.resource_type().to_string(),
                id: resource.id().to_string(),
                size: bytes.len(),
                max: self.max_entry_bytes,
            }
            .into());
        }

        let key = self.keyspace.version_key(
            resource.resource_type(),
            resource.id(),
            resource.version_id(),
        );
        self.blobs.put(&key, bytes.clone()).await?;

        debug!(key = %key, size = bytes.len(), "History entry written");
        Ok(bytes)
    }

    /// Removes the entry for the resource's current version. Missing entries are ignored.
    pub async fn delete(&self, resource: &Resource) -> StorageResult<()> {
        let key = self.keyspace.version_key(
            resource.resource_type(),
            resource.id(),
            resource.version_id(),
        );
        self.blobs.delete(&key).await?;

        debug!(key = %key, "History entry deleted");
        Ok(())
    }

    /// Returns every stored version, newest first.
    pub async fn entries(&self, resource_type: &str, id: &str) -> StorageResult<Vec<Vec<u8>>> {
        Ok(self
            .records(resource_type, id)
            .await?
            .into_iter()
            .map(|entry| entry.serialized)
            .collect())
    }

    /// Returns every stored version with metadata, newest first.
    ///
    /// Entries with the same blob timestamp are ordered by version id, which
    /// the store assigns in creation order. An entry listed but removed
    /// before it could be read is skipped.
    pub async fn records(&self, resource_type: &str, id: &str) -> StorageResult<Vec<HistoryEntry>> {
        let prefix = self.keyspace.resource_prefix(resource_type, id);
        let mut listed = self.blobs.list(&prefix).await?;
        listed.sort_by(|a, b| {
            b.last_modified
                .cmp(&a.last_modified)
                .then_with(|| b.key.cmp(&a.key))
        });

        let mut entries = Vec::with_capacity(listed.len());
        for meta in listed {
            let Some(serialized) = self.blobs.get(&meta.key).await? else {
                continue;
            };
            let version_id = meta
                .key
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string();
            entries.push(HistoryEntry {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
                version_id,
                timestamp: meta.last_modified,
                serialized,
            });
        }
        Ok(entries)
    }

    /// Reads one version.
    pub async fn entry(
        &self,
        resource_type: &str,
        id: &str,
        version_id: &str,
    ) -> StorageResult<Option<Vec<u8>>> {
        let key = self.keyspace.version_key(resource_type, id, version_id);
        Ok(self.blobs.get(&key).await?)
    }
}

fn require_identity(resource: &Resource) -> StorageResult<()> {
    if resource.id().is_empty() {
        return Err(ValidationError::MissingRequiredField {
            field: "id".to_string(),
        }
        .into());
    }
    if resource.version_id().is_empty() {
        return Err(ValidationError::MissingRequiredField {
            field: "meta.versionId".to_string(),
        }
        .into());
    }
    Ok(())
}
