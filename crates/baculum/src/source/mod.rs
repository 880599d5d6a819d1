//! Backup sources: configured `(job, client, fileset)` targets joined with
//! their latest catalog run.

pub mod manager;

pub use manager::{SourceList, SourceManager, SourceMode, SourceProps};
