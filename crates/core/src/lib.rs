//! premerge core library.
//!
//! This crate provides the conflict-anticipation engine: git plumbing,
//! branch and merge-base resolution, change-set diffing, three-way
//! classification, line localization, the conflict registry and the
//! single-flight scan scheduler.

pub mod config;
pub mod conflict;
pub mod errors;
pub mod git;
pub mod models;
pub mod registry;
pub mod scan_engine;
pub mod scheduler;

#[cfg(test)]
mod testing;

// Re-exports for convenience.
pub use config::AppConfig;
pub use registry::ConflictRegistry;
pub use scan_engine::{ScanEngine, ScanOutcome, ScanRequest, ScanTarget};
pub use scheduler::{ScanEvent, ScanScheduler};
