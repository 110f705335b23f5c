//! Helios FHIR document store
//!
//! Versioned persistence for FHIR resources over an indexed document
//! database, with a write-ahead history log kept in blob storage.
//!
//! # Features
//!
//! - **Versioning**: every write gets a fresh `versionId` and `lastUpdated`
//! - **Optimistic concurrency**: `If-Match` checks against the stored version
//! - **Write-ahead history**: each version lands in the history log before the
//!   live document is replaced, and is removed again if that replace fails
//! - **Rule-driven search**: `name=value` templates compile search parameters
//!   into backend queries
//! - **Batch submission**: sequential, non-atomic processing of batch bundles
//!
//! Available backend features:
//! - `sqlite` (default) - SQLite document backend with in-memory and file modes
//! - `s3` - S3 history storage through `object_store`
//!
//! # Architecture
//!
//! - [`types`] - resources, the type registry and pagination tokens
//! - [`error`] - error types for all operations
//! - [`config`] - store-wide configuration
//! - [`core`] - backend seams, history log, versioned store and batch processor
//! - [`search`] - search rules, query compilation and request parsing
//! - [`backends`] - SQLite and `object_store` implementations of the seams
//!
//! # Quick Start
//!
//! ```no_run
//! # #[cfg(feature = "sqlite")]
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use helios_docstore::backends::blob_store::ObjectStoreBlobs;
//! use helios_docstore::backends::sqlite::SqliteDocumentBackend;
//! use helios_docstore::{DocStoreConfig, Resource, ResourceTypeRegistry, VersionedResourceStore};
//! use serde_json::json;
//!
//! let store = VersionedResourceStore::new(
//!     Arc::new(SqliteDocumentBackend::in_memory()?),
//!     Arc::new(ObjectStoreBlobs::in_memory()),
//!     Arc::new(ResourceTypeRegistry::r4()),
//!     DocStoreConfig::default(),
//! );
//! store.initialize().await?;
//!
//! let patient = Resource::new("Patient", json!({"resourceType": "Patient", "id": "p1"}));
//! let saved = store.upsert(patient, None).await.into_result()?;
//!
//! // Updating with a stale version is rejected.
//! let stale = store.upsert(saved.clone(), Some("not-the-version")).await;
//! assert!(!stale.is_success());
//!
//! let current = store.upsert(saved.clone(), Some(saved.version_id())).await;
//! assert!(current.is_success());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod config;
pub mod core;
pub mod error;
pub mod search;
pub mod types;

// Re-export commonly used types at crate root
pub use config::{DocStoreConfig, EntryReporting};
pub use error::{StorageError, StorageResult};
pub use types::{PageCodec, QueryResult, Resource, ResourceTypeRegistry, SearchOutcome};

// Re-export core components
pub use core::{
    BatchProcessor, BatchResponse, BlobStore, DocumentBackend, HistoryLog, UpsertOutcome,
    VersionedResourceStore,
};
pub use search::{SearchQueryBuilder, SearchRequest, SearchRules};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
