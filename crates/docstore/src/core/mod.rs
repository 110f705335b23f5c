//! Core storage components.
//!
//! - [`DocumentBackend`] - seam to the external document database
//! - [`BlobStore`] - seam to the external blob store
//! - [`HistoryLog`] - append-only per-resource version log
//! - [`VersionedResourceStore`] - two-phase writes with optimistic concurrency
//! - [`BatchProcessor`] - sequential, non-atomic batch submission
//!
//! # Write path
//!
//! ```text
//! upsert(resource, if_match)
//!     ├── if_match? load current ── mismatch ──> Conflict
//!     ├── assign id / versionId / lastUpdated
//!     ├── HistoryLog::insert ── failure ──> Error
//!     └── DocumentBackend::upsert
//!             ├── ok ──> Created | Updated
//!             └── failure ──> HistoryLog::delete (best effort) ──> Error
//! ```

pub mod backend;
pub mod batch;
pub mod blob;
pub mod history;
pub mod store;
pub mod versioned;

pub use backend::{BackendKind, DocumentBackend, DocumentPage, UpsertAck};
pub use batch::{BATCH_BUNDLE_TYPE, BatchProcessor, BatchResponse};
pub use blob::{BlobError, BlobMeta, BlobStore};
pub use history::{DEFAULT_HISTORY_PREFIX, HistoryEntry, HistoryLog};
pub use store::{UpsertOutcome, UpsertStatus, VersionedResourceStore};
pub use versioned::{VersionConflictInfo, check_version_match, normalize_etag};
