pub mod package_validator;
pub mod version_validator;

pub use package_validator::{MANIFEST, PackageJson, PackageValidationError, PublishConfig};
pub use version_validator::VersionValidator;
