//! Shared helpers for baculum integration tests.
//!
//! - `CatalogHarness` builds a SQLite catalog file from the fixture and
//!   opens it through the regular config and connection path.
//! - `FakeConsole` answers console commands from a fixed table.

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::CatalogHarness;
