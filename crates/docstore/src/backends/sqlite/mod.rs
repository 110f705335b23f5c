//! SQLite document backend.
//!
//! Supports in-memory databases (tests, scratch use) and file databases.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE collections (name TEXT PRIMARY KEY, created_at TEXT NOT NULL);
//!
//! -- one table per collection, named after the resource type
//! CREATE TABLE "Patient" (
//!     id TEXT PRIMARY KEY,
//!     body TEXT NOT NULL,          -- JSON document
//!     last_modified TEXT NOT NULL
//! );
//! ```
//!
//! # Example
//!
//! ```no_run
//! use helios_docstore::backends::sqlite::SqliteDocumentBackend;
//! use helios_docstore::core::DocumentBackend;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteDocumentBackend::open("docstore.db")?;
//! backend.initialize().await?;
//! backend.create_collection_if_absent("Patient").await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod schema;

pub use backend::{SELECT_ALL_QUERY, SqliteDocumentBackend, SqliteDocumentBackendConfig};
