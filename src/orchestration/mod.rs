//! Orchestration layer for npm publishing
//!
//! This module provides the publish orchestrator and the file guard that
//! keeps pre-existing `.npmrc` files intact across a run.

pub mod file_guard;
pub mod package_publisher;

// Re-export main types for convenience
pub use file_guard::FileGuard;
pub use package_publisher::{PackagePublisher, PublishReport};
