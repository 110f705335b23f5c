//! Backend implementations for the document and blob seams.
//!
//! | Backend | Feature | Seam |
//! |---------|---------|------|
//! | SQLite | `sqlite` (default) | [`DocumentBackend`](crate::core::DocumentBackend) |
//! | object_store (memory, local) | always | [`BlobStore`](crate::core::BlobStore) |
//! | object_store (S3) | `s3` | [`BlobStore`](crate::core::BlobStore) |
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "sqlite")]
//! use helios_docstore::backends::sqlite::SqliteDocumentBackend;
//! use helios_docstore::backends::blob_store::ObjectStoreBlobs;
//!
//! # #[cfg(feature = "sqlite")]
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let documents = SqliteDocumentBackend::open("./data/docstore.db")?;
//! let history = ObjectStoreBlobs::local("./data/history")?;
//! # Ok(())
//! # }
//! ```

pub mod blob_store;

#[cfg(feature = "sqlite")]
pub mod sqlite;
