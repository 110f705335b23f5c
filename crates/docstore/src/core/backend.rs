//! Document backend abstraction.
//!
//! [`DocumentBackend`] is the boundary between the store and an external
//! indexed document database. A backend handle is bound to one database when
//! it is constructed; collections are named after resource types.

use std::fmt::Debug;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageResult;

/// Identifies the type of document backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// SQLite database (file-based or in-memory).
    Sqlite,
    /// Custom or test backend.
    Custom(&'static str),
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Sqlite => write!(f, "sqlite"),
            BackendKind::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// Result of a backend upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertAck {
    /// True if no document with this id existed before the write.
    pub created: bool,
}

/// One page returned by [`DocumentBackend::query`].
#[derive(Debug, Clone, Default)]
pub struct DocumentPage {
    /// Documents on this page.
    pub documents: Vec<Value>,
    /// Backend-native cursor for the next page.
    pub raw_continuation: Option<String>,
    /// Count reported by the backend for this page.
    pub count: i64,
}

/// An indexed document database.
///
/// # Example
///
/// ```ignore
/// use helios_docstore::core::DocumentBackend;
///
/// async fn count_patients<B: DocumentBackend>(backend: &B) -> StorageResult<i64> {
///     backend.create_collection_if_absent("Patient").await?;
///     let page = backend
///         .query("Patient", backend.select_all_query(), 100, None)
///         .await?;
///     Ok(page.count)
/// }
/// ```
#[async_trait]
pub trait DocumentBackend: Send + Sync + Debug {
    /// Returns the kind of backend.
    fn kind(&self) -> BackendKind;

    /// Returns a short name used in logs and errors.
    fn backend_name(&self) -> &'static str;

    /// Query that selects every document of a collection.
    ///
    /// Search rule templates are written against this query, so it also fixes
    /// the alias (`c`) and dialect that rules must use.
    fn select_all_query(&self) -> &str;

    /// Opens the backend and creates the database if it does not exist.
    async fn initialize(&self) -> StorageResult<()>;

    /// Creates the collection unless it already exists.
    async fn create_collection_if_absent(&self, collection: &str) -> StorageResult<()>;

    /// Inserts or replaces the document with the given id.
    async fn upsert(&self, collection: &str, id: &str, document: &[u8])
    -> StorageResult<UpsertAck>;

    /// Reads a document by id.
    async fn read(&self, collection: &str, id: &str) -> StorageResult<Option<Value>>;

    /// Deletes a document by id, returning whether it existed.
    async fn delete(&self, collection: &str, id: &str) -> StorageResult<bool>;

    /// Executes one page of a query.
    async fn query(
        &self,
        collection: &str,
        query: &str,
        page_size: u32,
        continuation: Option<&str>,
    ) -> StorageResult<DocumentPage>;
}
