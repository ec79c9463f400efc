pub mod error_classifier;
pub mod npm_plugin;
pub mod npmrc;

pub use error_classifier::{CallSite, Disposition, ErrorBlock, ErrorPolicy, Outcome};
pub use npm_plugin::{NpmPlugin, PublishedPackage, ToolVersions};
