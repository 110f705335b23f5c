//! Core types for the document store.
//!
//! - [`Resource`] - a FHIR resource with version metadata
//! - [`ResourceTypeRegistry`] - the explicit registry of known resource types
//! - [`PageCodec`], [`QueryResult`] - continuation tokens and query pages
//! - [`SearchOutcome`] - assembled search results
//!
//! # Examples
//!
//! ```
//! use helios_docstore::types::{Resource, ResourceTypeRegistry};
//! use serde_json::json;
//!
//! let registry = ResourceTypeRegistry::r4();
//! let resource = registry
//!     .parse_document(json!({
//!         "resourceType": "Patient",
//!         "id": "patient-123",
//!         "name": [{"family": "Smith", "given": ["John"]}]
//!     }))
//!     .unwrap();
//!
//! assert_eq!(resource.url(), "Patient/patient-123");
//! ```

mod pagination;
mod registry;
mod resource;

pub use pagination::{PageCodec, QueryResult, SearchEntry, SearchEntryMode, SearchOutcome};
pub use registry::{ResourceKind, ResourceTypeDescriptor, ResourceTypeRegistry};
pub use resource::{Resource, SYSTEM_PROPERTIES};
