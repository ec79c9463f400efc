//! Registry config (`.npmrc`) rendering and persistence
//!
//! Rendering is pure: the same [`Config`] always yields the same bytes.
//!
//! # Example
//!
//! ```
//! use npm_publish_plugin::Config;
//! use npm_publish_plugin::plugins::npmrc;
//!
//! let config = Config {
//!     username: Some("u".to_string()),
//!     password: Some(secrecy::SecretString::new("p".into())),
//!     registry: "http://r".to_string(),
//!     ..Default::default()
//! };
//!
//! let content = npmrc::render(&config);
//! assert!(content.contains("_auth=dTpw\n"));
//! ```

use crate::core::config::Config;
use crate::core::error::PublishError;
use crate::core::traits::FileSystem;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::ExposeSecret;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, info};
use url::Url;

/// File name of the npm user config
pub const NPMRC: &str = ".npmrc";

/// Directives written ahead of any credential
const DEFAULTS: [&str; 4] = [
    "json=true",
    "color=false",
    "loglevel=silent",
    "update-notifier=false",
];

/// Protocol-relative registry prefix used to scope an auth token
///
/// `https://registry.npmjs.org` becomes `//registry.npmjs.org/`.
pub fn token_scope(registry: &str) -> String {
    let mut scope = match Url::parse(registry) {
        Ok(url) if url.host_str().is_some() => {
            let mut scope = format!("//{}", url.host_str().unwrap_or_default());
            if let Some(port) = url.port() {
                let _ = write!(scope, ":{port}");
            }
            scope.push_str(url.path());
            scope
        }
        _ => {
            let rest = registry
                .split_once("://")
                .map_or(registry, |(_, rest)| rest);
            format!("//{}", rest.trim_start_matches('/'))
        }
    };

    if !scope.ends_with('/') {
        scope.push('/');
    }
    scope
}

/// Base64 of `username:password`
pub fn basic_auth(username: &str, password: &str) -> String {
    STANDARD.encode(format!("{username}:{password}"))
}

/// Render the config file content
pub fn render(config: &Config) -> String {
    let mut lines: Vec<String> = DEFAULTS.iter().map(|d| d.to_string()).collect();

    match config.token.as_ref().filter(|_| config.has_token()) {
        Some(token) => {
            let scope = token_scope(config.effective_registry());
            debug!(registry = %scope, "scoping auth token");
            lines.push(format!("{scope}:_authToken=\"{}\"", token.expose_secret()));
        }
        None => {
            let password = config
                .password
                .as_ref()
                .map(|p| p.expose_secret())
                .unwrap_or_default();
            let username = config.username.as_deref().unwrap_or_default();
            lines.push(format!("_auth={}", basic_auth(username, password)));
        }
    }

    if let Some(registry) = config.registry() {
        lines.push(format!("registry={registry}"));
    }

    if let Some(email) = config.email.as_deref().filter(|e| !e.is_empty()) {
        lines.push(format!("email={email}"));
    }

    // https://docs.npmjs.com/cli/v8/using-npm/config#strict-ssl
    if let Some(strict_ssl) = config.strict_ssl {
        lines.push(format!("strict-ssl={strict_ssl}"));
    }

    // https://docs.npmjs.com/cli/v6/using-npm/config#always-auth
    if let Some(always_auth) = config.always_auth {
        lines.push(format!("always-auth={always_auth}"));
    }

    let mut content = lines.join("\n");
    content.push('\n');
    content
}

/// Write the rendered config to `path`, creating its parent directory
pub fn write(fs: &dyn FileSystem, path: &Path, config: &Config) -> Result<(), PublishError> {
    info!(path = %path.display(), "Creating .npmrc configuration file");

    let to_error = |source| PublishError::ConfigWriteError {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs.create_dir_all(parent).map_err(to_error)?;
    }

    fs.write(path, render(config).as_bytes()).map_err(to_error)?;
    debug!(path = %path.display(), ".npmrc successfully written");

    Ok(())
}
