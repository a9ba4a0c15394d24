//! Test Utilities Crate
//!
//! Shared test infrastructure for the TISS claim engine.
//!
//! # Modules
//!
//! - `fixtures`: Fixed ids, dates, amounts and master data
//! - `builders`: Guides and batches in any lifecycle state
//! - `assertions`: Assertion helpers for money, XML and batch totals
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use assertions::*;
pub use generators::*;
