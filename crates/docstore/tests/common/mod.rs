//! Shared test infrastructure for the document store.
//!
//! Not every suite uses every helper.
#![allow(dead_code)]

pub mod doubles;
pub mod fixtures;
pub mod harness;

pub use doubles::*;
pub use fixtures::*;
pub use harness::*;
