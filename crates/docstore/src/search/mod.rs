//! Rule-driven search.
//!
//! - [`rules`] - the immutable `name=value` rule table
//! - [`query_builder`] - compiles parameters into a backend query string
//! - [`request`] - splits control parameters (`_count`, `_nextpage`, ...) from filters
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use helios_docstore::search::{SearchQueryBuilder, SearchRules};
//!
//! let rules = SearchRules::parse(
//!     "Patient.family=string\nPatient.family.default=name.family = '~v0~'",
//! )
//! .unwrap();
//! let builder = SearchQueryBuilder::new(Arc::new(rules), "SELECT * FROM c");
//!
//! let query = builder.build("Patient", &[("family", "Smith,Jones")]);
//! assert_eq!(
//!     query,
//!     "SELECT * FROM c WHERE (name.family = 'Smith' OR name.family = 'Jones')"
//! );
//! ```

pub mod query_builder;
pub mod request;
pub mod rules;

pub use query_builder::SearchQueryBuilder;
pub use request::{IncludeDirective, SearchRequest};
pub use rules::{SearchParamRule, SearchRules};
