//! Error handling for npm publishing
//!
//! Every fatal condition of a publish run maps to one variant of
//! [`PublishError`]. Causes coming from the npm CLI, the file system or the
//! package manifest are chained through `source()` so the caller sees the
//! whole story in a single message.

use crate::core::config::AuditLevel;
use crate::security::CommandError;
use crate::validation::PackageValidationError;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed error used where the cause can come from several layers
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for publish operations
#[derive(Error, Debug)]
pub enum PublishError {
    // Configuration errors
    #[error("username not provided: set a token or a username")]
    MissingCredential,

    #[error("tag '{tag}' parses as a semantic version; dist-tags must not be versions")]
    InvalidTag { tag: String },

    #[error("access '{access}' is not recognized, use 'public' or 'restricted'")]
    InvalidAccess { access: String },

    #[error("you must either specify a workspace or all workspaces, but not both")]
    ConflictingWorkspaceSelection,

    #[error("invalid value for '{key}' from {origin}: {message}")]
    ConfigSource {
        key: String,
        origin: String,
        message: String,
    },

    // Tool and environment errors
    #[error("npm is not available or returned an unreadable version response")]
    ToolUnavailable {
        #[source]
        source: BoxError,
    },

    #[error("failed to write registry config file {}", path.display())]
    ConfigWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to move {} aside", path.display())]
    FileGuard {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Registry errors
    #[error("npm authentication failed")]
    AuthenticationFailed {
        #[source]
        source: CommandError,
    },

    #[error("ping failed, authentication unsuccessful")]
    PingFailed {
        #[source]
        source: CommandError,
    },

    #[error(
        "package.json declares workspaces ({}) but neither `workspaces` nor `workspace` is set",
        workspaces.join(", ")
    )]
    AmbiguousWorkspaceTarget { workspaces: Vec<String> },

    #[error("failed to verify {}", path.display())]
    PackageValidation {
        path: PathBuf,
        #[source]
        source: PackageValidationError,
    },

    #[error("package {name} of version {version} already exists")]
    VersionAlreadyPublished { name: String, version: String },

    #[error("failed to look up published versions of {name}: {summary}")]
    RegistryLookupFailed {
        name: String,
        code: Option<String>,
        summary: String,
        #[source]
        source: CommandError,
    },

    #[error(
        "audit failed for audit-level={level}: {reason}; run `npm audit --production --audit-level={level}` to view vulnerabilities that need fixed"
    )]
    AuditFailed {
        level: AuditLevel,
        reason: String,
        #[source]
        source: CommandError,
    },

    #[error("publish failed")]
    PublishFailed {
        #[source]
        source: CommandError,
    },
}

impl PublishError {
    /// Whether the error was raised before any external command ran
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential
                | Self::InvalidTag { .. }
                | Self::InvalidAccess { .. }
                | Self::ConflictingWorkspaceSelection
                | Self::ConfigSource { .. }
        )
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::MissingCredential => {
                vec!["Provide NPM_TOKEN, or NPM_USERNAME together with NPM_PASSWORD"]
            }
            Self::InvalidTag { .. } => vec![
                "Use a dist-tag name such as `beta` or `next`",
                "The version to publish comes from package.json",
            ],
            Self::InvalidAccess { .. } => vec!["Set access to `public` or `restricted`"],
            Self::ConflictingWorkspaceSelection => {
                vec!["Unset either `workspaces` or `workspace`"]
            }
            Self::ConfigSource { .. } => vec!["Check the flag, environment variable or file value"],
            Self::ToolUnavailable { .. } => vec![
                "Make sure npm and node are installed in the image",
                "Run `npm version --json` to check the installation",
            ],
            Self::ConfigWriteError { .. } | Self::FileGuard { .. } => {
                vec!["Check that the home and project directories are writable"]
            }
            Self::AuthenticationFailed { .. } => vec![
                "Check the token or username/password",
                "Check that the registry URL is correct",
            ],
            Self::PingFailed { .. } => vec![
                "Check that the registry is reachable",
                "Set skip_ping if the registry does not support `npm ping`",
            ],
            Self::AmbiguousWorkspaceTarget { .. } => {
                vec!["Set `workspaces: true` or name a single `workspace`"]
            }
            Self::PackageValidation { .. } => {
                vec!["Check name, version and publishConfig in package.json"]
            }
            Self::VersionAlreadyPublished { .. } => vec![
                "Bump the version in package.json",
                "Run npm version patch/minor/major",
            ],
            Self::RegistryLookupFailed { .. } => vec![
                "Check network connectivity and proxy settings",
                "Check that the registry URL is correct",
            ],
            Self::AuditFailed { .. } => vec![
                "Run the audit command locally and fix the reported vulnerabilities",
                "Lower audit_level or set it to `none` to skip the check",
            ],
            Self::PublishFailed { .. } => vec![
                "Check the npm output above",
                "Check the registry status",
            ],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "MISSING_CREDENTIAL",
            Self::InvalidTag { .. } => "INVALID_TAG",
            Self::InvalidAccess { .. } => "INVALID_ACCESS",
            Self::ConflictingWorkspaceSelection => "CONFLICTING_WORKSPACE_SELECTION",
            Self::ConfigSource { .. } => "CONFIG_SOURCE",
            Self::ToolUnavailable { .. } => "TOOL_UNAVAILABLE",
            Self::ConfigWriteError { .. } => "CONFIG_WRITE_ERROR",
            Self::FileGuard { .. } => "FILE_GUARD",
            Self::AuthenticationFailed { .. } => "AUTHENTICATION_FAILED",
            Self::PingFailed { .. } => "PING_FAILED",
            Self::AmbiguousWorkspaceTarget { .. } => "AMBIGUOUS_WORKSPACE_TARGET",
            Self::PackageValidation { .. } => "PACKAGE_VALIDATION_ERROR",
            Self::VersionAlreadyPublished { .. } => "VERSION_ALREADY_PUBLISHED",
            Self::RegistryLookupFailed { .. } => "REGISTRY_LOOKUP_FAILED",
            Self::AuditFailed { .. } => "AUDIT_FAILED",
            Self::PublishFailed { .. } => "PUBLISH_FAILED",
        }
    }
}
