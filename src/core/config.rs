//! Publish configuration and its validation
//!
//! A [`Config`] is resolved once at startup, validated once, and then handed
//! to the publisher. The only mutation validation performs is normalizing the
//! audit level to its canonical spelling.

use crate::core::error::PublishError;
use crate::validation::VersionValidator;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Default URL for the public npm registry
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";

/// Severity threshold at which `npm audit` fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    None,
    #[default]
    Low,
    Moderate,
    High,
    Critical,
}

impl AuditLevel {
    /// Resolve a user supplied alias (case-insensitive)
    pub fn from_alias(input: &str) -> Option<Self> {
        match input.to_lowercase().as_str() {
            "l" | "low" | "all" => Some(Self::Low),
            "m" | "mod" | "moderate" => Some(Self::Moderate),
            "h" | "high" => Some(Self::High),
            "c" | "crit" | "critical" => Some(Self::Critical),
            "n" | "no" | "none" => Some(Self::None),
            _ => None,
        }
    }

    /// Resolve an alias, falling back to npm's own default (`low`)
    pub fn normalize(input: &str) -> Self {
        Self::from_alias(input).unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-fatal finding produced while validating a configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    /// Field the warning is about (e.g. "password")
    pub field: String,
    pub message: String,
}

impl ConfigWarning {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Create a warning and log it immediately
    fn logged(field: &str, message: impl Into<String>) -> Self {
        let warning = Self::new(field, message);
        warn!(field = %warning.field, "{}", warning.message);
        warning
    }
}

/// Publish parameters
///
/// `strict_ssl` and `always_auth` are `None` when no source set them, so the
/// npm defaults stay in effect.
#[derive(Debug, Default)]
pub struct Config {
    pub token: Option<SecretString>,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub registry: String,
    pub email: Option<String>,
    pub strict_ssl: Option<bool>,
    pub always_auth: Option<bool>,
    pub skip_ping: bool,
    pub dry_run: bool,
    pub tag: Option<String>,
    /// Raw audit level; canonical after [`Config::validate`]
    pub audit_level: String,
    pub access: Option<String>,
    pub workspaces: bool,
    pub workspace: Option<String>,
}

impl Config {
    /// Whether a non-empty token was supplied
    pub fn has_token(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().is_empty())
    }

    /// Registry used for credential scoping, falling back to the default
    pub fn effective_registry(&self) -> &str {
        if self.registry.is_empty() {
            DEFAULT_REGISTRY
        } else {
            &self.registry
        }
    }

    /// Configured registry, if one was given
    pub fn registry(&self) -> Option<&str> {
        (!self.registry.is_empty()).then_some(self.registry.as_str())
    }

    pub fn audit_level(&self) -> AuditLevel {
        AuditLevel::normalize(&self.audit_level)
    }

    /// Whether either workspace mode is active
    pub fn workspace_mode(&self) -> bool {
        self.workspaces || self.workspace.as_deref().is_some_and(|w| !w.is_empty())
    }

    /// Validate the configuration, normalizing the audit level in place
    ///
    /// Rules are checked in order and the first failure wins. Warnings are
    /// logged as they are found and returned; they never fail validation.
    pub fn validate(&mut self) -> Result<Vec<ConfigWarning>, PublishError> {
        let mut warnings = Vec::new();

        if !self.has_token() {
            if self.username.as_deref().is_none_or(str::is_empty) {
                return Err(PublishError::MissingCredential);
            }

            // some test registries accept any password
            if self
                .password
                .as_ref()
                .is_none_or(|p| p.expose_secret().is_empty())
            {
                warnings.push(ConfigWarning::logged(
                    "password",
                    "Password not provided",
                ));
            }
        }

        if self.registry.is_empty() {
            info!(
                registry = DEFAULT_REGISTRY,
                "Registry not provided, using default registry"
            );
        }

        if self.email.as_deref().is_none_or(str::is_empty) {
            warnings.push(ConfigWarning::logged("email", "Email not provided"));
        }

        if self.skip_ping {
            warnings.push(ConfigWarning::logged(
                "skip_ping",
                "Pre-publish auth check with registry will be skipped",
            ));
        }

        // https://docs.npmjs.com/cli/dist-tag#caveats
        if let Some(tag) = self.tag.as_deref().filter(|t| !t.is_empty())
            && VersionValidator::new().is_version_like(tag)
        {
            return Err(PublishError::InvalidTag {
                tag: tag.to_string(),
            });
        }

        let level = match AuditLevel::from_alias(&self.audit_level) {
            Some(level) => level,
            None => {
                warnings.push(ConfigWarning::logged(
                    "audit_level",
                    format!(
                        "audit_level '{}' is not recognized, using the npm default (low)",
                        self.audit_level
                    ),
                ));
                AuditLevel::Low
            }
        };
        self.audit_level = level.as_str().to_string();
        debug!(audit_level = %level, "audit level set");

        // https://docs.npmjs.com/cli/v8/commands/npm-publish#access
        if let Some(access) = self.access.as_deref().filter(|a| !a.is_empty())
            && !matches!(access, "public" | "restricted")
        {
            return Err(PublishError::InvalidAccess {
                access: access.to_string(),
            });
        }

        if self.workspaces && self.workspace.as_deref().is_some_and(|w| !w.is_empty()) {
            return Err(PublishError::ConflictingWorkspaceSelection);
        }

        Ok(warnings)
    }
}
