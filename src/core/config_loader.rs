//! Configuration loader for npm-publish-plugin
//!
//! Every parameter resolves through an ordered chain of sources.
//!
//! Priority (high to low):
//! 1. CLI flag
//! 2. Environment variables, in the order listed for the parameter
//! 3. Parameter and secret files mounted by the CI system
//! 4. Default value

use super::config::{Config, DEFAULT_REGISTRY};
use crate::core::error::PublishError;
use crate::core::traits::FileSystem;
use secrecy::SecretString;
use std::collections::HashMap;
use std::path::Path;
use tracing::{Level, trace, warn};

/// A place a parameter value can come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Env(&'static str),
    File(&'static str),
}

/// A named parameter and its ordered sources
#[derive(Debug, Clone, Copy)]
pub struct Parameter {
    pub key: &'static str,
    pub sources: &'static [ValueSource],
}

macro_rules! parameter {
    ($key:literal, [$($env:literal),* $(,)?] $(, extra = [$($extra:literal),*])?) => {
        Parameter {
            key: $key,
            sources: &[
                $(ValueSource::Env($env),)*
                ValueSource::File(concat!("/vela/parameters/npm/", $key)),
                ValueSource::File(concat!("/vela/secrets/npm/", $key)),
                $($(ValueSource::File($extra),)*)?
            ],
        }
    };
}

pub const TOKEN: Parameter = parameter!("token", ["PARAMETER_TOKEN", "PLUGIN_TOKEN", "NPM_TOKEN"]);
pub const USERNAME: Parameter = parameter!(
    "username",
    ["PARAMETER_USERNAME", "PLUGIN_USERNAME", "NPM_USERNAME"],
    extra = ["/vela/secrets/managed-auth/username"]
);
pub const PASSWORD: Parameter = parameter!(
    "password",
    ["PARAMETER_PASSWORD", "PLUGIN_PASSWORD", "NPM_PASSWORD"],
    extra = ["/vela/secrets/managed-auth/password"]
);
pub const REGISTRY: Parameter = parameter!(
    "registry",
    ["PARAMETER_REGISTRY", "PLUGIN_REGISTRY", "NPM_REGISTRY"]
);
pub const EMAIL: Parameter = parameter!("email", ["PARAMETER_EMAIL", "PLUGIN_EMAIL", "NPM_EMAIL"]);
pub const STRICT_SSL: Parameter = parameter!(
    "strict_ssl",
    ["PARAMETER_STRICT_SSL", "PLUGIN_STRICT_SSL", "STRICT_SSL"]
);
pub const ALWAYS_AUTH: Parameter = parameter!(
    "always_auth",
    ["PARAMETER_ALWAYS_AUTH", "PLUGIN_ALWAYS_AUTH", "ALWAYS_AUTH"]
);
pub const SKIP_PING: Parameter = parameter!(
    "skip_ping",
    ["PARAMETER_SKIP_PING", "PLUGIN_SKIP_PING", "SKIP_PING"]
);
pub const DRY_RUN: Parameter = parameter!(
    "dry_run",
    ["PARAMETER_DRY_RUN", "PLUGIN_DRY_RUN", "DRY_RUN"]
);
pub const TAG: Parameter = parameter!("tag", ["PARAMETER_TAG", "PLUGIN_TAG", "TAG"]);
pub const AUDIT_LEVEL: Parameter = parameter!(
    "audit_level",
    [
        "PARAMETER_AUDIT_LEVEL",
        "PARAMETER_AUDIT",
        "PLUGIN_AUDIT_LEVEL",
        "PLUGIN_AUDIT",
        "AUDIT_LEVEL",
        "AUDIT",
    ]
);
pub const ACCESS: Parameter = parameter!("access", ["PARAMETER_ACCESS", "PLUGIN_ACCESS", "ACCESS"]);
pub const WORKSPACES: Parameter = parameter!(
    "workspaces",
    ["PARAMETER_WORKSPACES", "PLUGIN_WORKSPACES", "WORKSPACES", "WS"]
);
pub const WORKSPACE: Parameter = parameter!(
    "workspace",
    ["PARAMETER_WORKSPACE", "PLUGIN_WORKSPACE", "WORKSPACE", "W"]
);
pub const LOG_LEVEL: Parameter = parameter!(
    "log_level",
    [
        "PARAMETER_LOG",
        "PARAMETER_LOG_LEVEL",
        "PLUGIN_LOG",
        "PLUGIN_LOG_LEVEL",
        "LOG_LEVEL",
        "LOG",
    ]
);
pub const CI: Parameter = parameter!("ci", ["CI"]);

/// Values given explicitly on the command line
///
/// Boolean flags are kept as strings so `--dry-run`, `--dry-run=false` and an
/// absent flag stay distinguishable.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ConfigFlags {
    /// Auth token
    #[arg(short = 't', long)]
    pub token: Option<String>,

    /// Name of user
    #[arg(short = 'u', long)]
    pub username: Option<String>,

    /// Password for user
    #[arg(short = 'p', long)]
    pub password: Option<String>,

    /// npm registry
    #[arg(short = 'r', long)]
    pub registry: Option<String>,

    /// Email for user
    #[arg(short = 'e', long)]
    pub email: Option<String>,

    /// Enables strict SSL
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub strict_ssl: Option<String>,

    /// Enables always auth
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub always_auth: Option<String>,

    /// Skips auth ping
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub skip_ping: Option<String>,

    /// Publish command will only do a dry run
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub dry_run: Option<String>,

    /// Publish package with given tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Level at which an npm audit fails (none|low|moderate|high|critical)
    #[arg(long)]
    pub audit_level: Option<String>,

    /// Publish as public or restricted (scoped packages default to restricted)
    #[arg(long)]
    pub access: Option<String>,

    /// Publish all workspaces
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub workspaces: Option<String>,

    /// Publish a specific workspace
    #[arg(long)]
    pub workspace: Option<String>,

    /// (DEPRECATED) skips version lookup for first time publishes
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub first_publish: Option<String>,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Set to CI environment
    #[arg(long)]
    pub ci: Option<String>,
}

/// A resolved value and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub value: String,
    pub origin: String,
}

/// Logging settings resolved ahead of the rest of the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub ci: bool,
}

impl LogSettings {
    /// Map the configured level and its single-letter aliases, defaulting to info
    pub fn level(&self) -> Level {
        match self.level.to_lowercase().as_str() {
            "t" | "trace" => Level::TRACE,
            "d" | "debug" => Level::DEBUG,
            "w" | "warn" => Level::WARN,
            "e" | "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

/// Configuration loader
pub struct ConfigLoader<'a> {
    env: HashMap<String, String>,
    fs: &'a dyn FileSystem,
}

impl<'a> ConfigLoader<'a> {
    /// Create a loader over an environment snapshot and a file system
    pub fn new(env: HashMap<String, String>, fs: &'a dyn FileSystem) -> Self {
        Self { env, fs }
    }

    /// Resolve a parameter, first non-empty source wins
    pub fn resolve(&self, parameter: &Parameter, flag: Option<&str>) -> Option<Resolved> {
        if let Some(value) = flag.filter(|v| !v.is_empty()) {
            return Some(Resolved {
                value: value.to_string(),
                origin: format!("flag --{}", parameter.key.replace('_', "-")),
            });
        }

        for source in parameter.sources {
            let found = match source {
                ValueSource::Env(name) => self.env.get(*name).cloned(),
                ValueSource::File(path) => self.read_file(path),
            };

            if let Some(value) = found.filter(|v| !v.is_empty()) {
                let origin = match source {
                    ValueSource::Env(name) => format!("env {name}"),
                    ValueSource::File(path) => format!("file {path}"),
                };
                trace!(key = parameter.key, origin = %origin, "parameter resolved");
                return Some(Resolved { value, origin });
            }
        }

        None
    }

    fn read_file(&self, path: &str) -> Option<String> {
        let bytes = self.fs.read(Path::new(path)).ok()?;
        let content = String::from_utf8_lossy(&bytes);
        Some(content.trim_end_matches(['\r', '\n']).to_string())
    }

    fn string(&self, parameter: &Parameter, flag: &Option<String>) -> Option<String> {
        self.resolve(parameter, flag.as_deref()).map(|r| r.value)
    }

    fn secret(&self, parameter: &Parameter, flag: &Option<String>) -> Option<SecretString> {
        self.string(parameter, flag)
            .map(|value| SecretString::new(value.into()))
    }

    fn boolean(
        &self,
        parameter: &Parameter,
        flag: &Option<String>,
    ) -> Result<Option<bool>, PublishError> {
        let Some(resolved) = self.resolve(parameter, flag.as_deref()) else {
            return Ok(None);
        };

        parse_bool(&resolved.value)
            .map(Some)
            .ok_or_else(|| PublishError::ConfigSource {
                key: parameter.key.to_string(),
                origin: resolved.origin,
                message: format!("'{}' is not a boolean", resolved.value),
            })
    }

    /// Resolve logging settings so the subscriber can be installed first
    pub fn log_settings(&self, flags: &ConfigFlags) -> LogSettings {
        LogSettings {
            level: self
                .string(&LOG_LEVEL, &flags.log_level)
                .unwrap_or_else(|| "info".to_string()),
            ci: self.resolve(&CI, flags.ci.as_deref()).is_some(),
        }
    }

    /// Resolve the full publish configuration
    pub fn load(&self, flags: &ConfigFlags) -> Result<Config, PublishError> {
        if self.boolean(&FIRST_PUBLISH, &flags.first_publish)? == Some(true) {
            warn!("first_publish is deprecated and has no effect");
        }

        Ok(Config {
            token: self.secret(&TOKEN, &flags.token),
            username: self.string(&USERNAME, &flags.username),
            password: self.secret(&PASSWORD, &flags.password),
            registry: self
                .string(&REGISTRY, &flags.registry)
                .unwrap_or_else(|| DEFAULT_REGISTRY.to_string()),
            email: self.string(&EMAIL, &flags.email),
            strict_ssl: self.boolean(&STRICT_SSL, &flags.strict_ssl)?,
            always_auth: self.boolean(&ALWAYS_AUTH, &flags.always_auth)?,
            skip_ping: self
                .boolean(&SKIP_PING, &flags.skip_ping)?
                .unwrap_or(false),
            dry_run: self.boolean(&DRY_RUN, &flags.dry_run)?.unwrap_or(false),
            tag: self.string(&TAG, &flags.tag),
            audit_level: self
                .string(&AUDIT_LEVEL, &flags.audit_level)
                .unwrap_or_else(|| "none".to_string()),
            access: self.string(&ACCESS, &flags.access),
            workspaces: self
                .boolean(&WORKSPACES, &flags.workspaces)?
                .unwrap_or(false),
            workspace: self.string(&WORKSPACE, &flags.workspace),
        })
    }
}

/// Flag-only parameter kept for backwards compatibility
const FIRST_PUBLISH: Parameter = Parameter {
    key: "first_publish",
    sources: &[],
};

/// Parse the boolean spellings accepted by CI systems
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "t" => Some(true),
        "false" | "0" | "no" | "off" | "f" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fs::MemoryFileSystem;
    use secrecy::ExposeSecret;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_flag_wins_over_env() {
        let fs = MemoryFileSystem::new();
        let loader = ConfigLoader::new(env(&[("NPM_USERNAME", "from-env")]), &fs);

        let resolved = loader.resolve(&USERNAME, Some("from-flag")).unwrap();
        assert_eq!(resolved.value, "from-flag");
        assert_eq!(resolved.origin, "flag --username");
    }

    #[test]
    fn test_env_order_is_respected() {
        let fs = MemoryFileSystem::new();
        let loader = ConfigLoader::new(
            env(&[("NPM_TOKEN", "third"), ("PLUGIN_TOKEN", "second")]),
            &fs,
        );

        let resolved = loader.resolve(&TOKEN, None).unwrap();
        assert_eq!(resolved.value, "second");
        assert_eq!(resolved.origin, "env PLUGIN_TOKEN");
    }

    #[test]
    fn test_empty_values_fall_through() {
        let fs = MemoryFileSystem::new();
        let loader = ConfigLoader::new(
            env(&[("PARAMETER_TAG", ""), ("TAG", "beta")]),
            &fs,
        );

        assert_eq!(loader.resolve(&TAG, Some("")).unwrap().value, "beta");
    }

    #[test]
    fn test_secret_file_source() {
        let fs = MemoryFileSystem::new();
        fs.insert("/vela/secrets/npm/password", "s3cret\n");
        fs.insert("/vela/secrets/managed-auth/username", "managed\n");
        let loader = ConfigLoader::new(HashMap::new(), &fs);

        let config = loader.load(&ConfigFlags::default()).unwrap();
        assert_eq!(config.password.unwrap().expose_secret(), "s3cret");
        assert_eq!(config.username.as_deref(), Some("managed"));
    }

    #[test]
    fn test_parameter_file_before_secret_file() {
        let fs = MemoryFileSystem::new();
        fs.insert("/vela/parameters/npm/registry", "http://params");
        fs.insert("/vela/secrets/npm/registry", "http://secrets");
        let loader = ConfigLoader::new(HashMap::new(), &fs);

        assert_eq!(
            loader.resolve(&REGISTRY, None).unwrap().value,
            "http://params"
        );
    }

    #[test]
    fn test_defaults() {
        let fs = MemoryFileSystem::new();
        let loader = ConfigLoader::new(HashMap::new(), &fs);

        let config = loader.load(&ConfigFlags::default()).unwrap();
        assert_eq!(config.registry, DEFAULT_REGISTRY);
        assert_eq!(config.audit_level, "none");
        assert_eq!(config.strict_ssl, None);
        assert_eq!(config.always_auth, None);
        assert!(!config.dry_run);
        assert!(config.token.is_none());
    }

    #[test]
    fn test_tri_state_booleans() {
        let fs = MemoryFileSystem::new();
        let loader = ConfigLoader::new(
            env(&[("STRICT_SSL", "false"), ("PLUGIN_ALWAYS_AUTH", "TRUE")]),
            &fs,
        );

        let config = loader.load(&ConfigFlags::default()).unwrap();
        assert_eq!(config.strict_ssl, Some(false));
        assert_eq!(config.always_auth, Some(true));
    }

    #[test]
    fn test_invalid_boolean_names_source() {
        let fs = MemoryFileSystem::new();
        let loader = ConfigLoader::new(env(&[("DRY_RUN", "maybe")]), &fs);

        match loader.load(&ConfigFlags::default()) {
            Err(PublishError::ConfigSource { key, origin, .. }) => {
                assert_eq!(key, "dry_run");
                assert_eq!(origin, "env DRY_RUN");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_workspace_short_aliases() {
        let fs = MemoryFileSystem::new();
        let loader = ConfigLoader::new(env(&[("WS", "1"), ("W", "packages/a")]), &fs);

        let config = loader.load(&ConfigFlags::default()).unwrap();
        assert!(config.workspaces);
        assert_eq!(config.workspace.as_deref(), Some("packages/a"));
    }

    #[test]
    fn test_log_settings() {
        let fs = MemoryFileSystem::new();
        let loader = ConfigLoader::new(env(&[("CI", "true"), ("LOG_LEVEL", "debug")]), &fs);

        let settings = loader.log_settings(&ConfigFlags::default());
        assert_eq!(settings.level, "debug");
        assert!(settings.ci);
    }

    #[test]
    fn test_log_level_aliases() {
        let settings = |level: &str| LogSettings {
            level: level.to_string(),
            ci: false,
        };

        assert_eq!(settings("t").level(), Level::TRACE);
        assert_eq!(settings("DEBUG").level(), Level::DEBUG);
        assert_eq!(settings("w").level(), Level::WARN);
        assert_eq!(settings("e").level(), Level::ERROR);
        assert_eq!(settings("verbose").level(), Level::INFO);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_file_sources_follow_env() {
        assert_eq!(
            &REGISTRY.sources[3..],
            &[
                ValueSource::File("/vela/parameters/npm/registry"),
                ValueSource::File("/vela/secrets/npm/registry"),
            ]
        );
        assert_eq!(
            PASSWORD.sources.last(),
            Some(&ValueSource::File("/vela/secrets/managed-auth/password"))
        );
    }
}
