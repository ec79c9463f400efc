//! Publish NodeJS packages to an npm-compatible registry from a CI pipeline.

pub mod core;
pub mod orchestration;
pub mod plugins;
pub mod security;
pub mod validation;

pub use core::*;
pub use orchestration::{PackagePublisher, PublishReport};
pub use plugins::{ErrorPolicy, PublishedPackage, ToolVersions};
pub use security::{CommandError, ProcessRunner, SecretMasker};
