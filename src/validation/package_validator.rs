//! package.json reading and validation
//!
//! A descriptor is read fresh for the root package and for each workspace
//! being published.

use super::version_validator::VersionValidator;
use crate::core::traits::FileSystem;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::trace;

/// Manifest file name inside every package directory
pub const MANIFEST: &str = "package.json";

/// Errors raised while reading or validating a package.json
#[derive(Error, Debug)]
pub enum PackageValidationError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("name not found in package.json")]
    MissingName,

    #[error("version not found in package.json")]
    MissingVersion,

    #[error("package version '{version}' is not a valid semantic version")]
    InvalidVersionFormat { version: String },

    #[error("publishConfig registry {declared} does not match given registry {configured}")]
    RegistryMismatch {
        declared: String,
        configured: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PublishConfig {
    #[serde(default)]
    pub registry: Option<String>,
}

/// `workspaces` is either a list of paths or `{ "packages": [...] }`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum WorkspacesField {
    List(Vec<String>),
    Object {
        #[serde(default)]
        packages: Vec<String>,
    },
}

/// The subset of package.json the publisher needs
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub publish_config: Option<PublishConfig>,
    #[serde(default, deserialize_with = "deserialize_workspaces")]
    pub workspaces: Vec<String>,
}

fn deserialize_workspaces<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let field = Option::<WorkspacesField>::deserialize(deserializer)?;
    Ok(match field {
        Some(WorkspacesField::List(list)) => list,
        Some(WorkspacesField::Object { packages }) => packages,
        None => Vec::new(),
    })
}

impl PackageJson {
    /// Read `<dir>/package.json`
    pub fn read(fs: &dyn FileSystem, dir: &Path) -> Result<Self, PackageValidationError> {
        let path = dir.join(MANIFEST);
        trace!(path = %path.display(), "reading package descriptor");

        let bytes = fs
            .read(&path)
            .map_err(|source| PackageValidationError::Read {
                path: path.clone(),
                source,
            })?;

        serde_json::from_slice(&bytes)
            .map_err(|source| PackageValidationError::Parse { path, source })
    }

    /// Registry declared under `publishConfig`, if non-empty
    pub fn publish_registry(&self) -> Option<&str> {
        self.publish_config
            .as_ref()
            .and_then(|c| c.registry.as_deref())
            .filter(|r| !r.is_empty())
    }

    /// Validate required fields and the publishConfig registry
    pub fn validate(&self, configured_registry: Option<&str>) -> Result<(), PackageValidationError> {
        if self.name.is_empty() {
            return Err(PackageValidationError::MissingName);
        }

        if self.version.is_empty() {
            return Err(PackageValidationError::MissingVersion);
        }

        if !VersionValidator::new().is_valid_constraint(&self.version) {
            return Err(PackageValidationError::InvalidVersionFormat {
                version: self.version.clone(),
            });
        }

        // https://docs.npmjs.com/cli/v8/configuring-npm/package-json#publishconfig
        if let Some(declared) = self.publish_registry()
            && let Some(configured) = configured_registry.filter(|r| !r.is_empty())
        {
            if declared != configured {
                return Err(PackageValidationError::RegistryMismatch {
                    declared: declared.to_string(),
                    configured: configured.to_string(),
                });
            }
            trace!(registry = configured, "publishConfig registry matches");
        }

        Ok(())
    }
}
