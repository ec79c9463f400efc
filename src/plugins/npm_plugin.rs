//! NPM Plugin - npm CLI command vocabulary and response parsing
//!
//! Every npm invocation the publisher makes goes through [`NpmPlugin`], which
//! builds the argument lists and traces (masked) output. Deciding what a
//! failure means is left to the caller and the error classifier.

use crate::core::config::{AuditLevel, Config};
use crate::core::traits::CommandRunner;
use crate::security::{CommandError, SecretMasker};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

const NPM: &str = "npm";

/// Versions reported by `npm version --json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolVersions {
    #[serde(default)]
    pub npm: Option<String>,
    #[serde(default)]
    pub node: Option<String>,
}

/// A package reported by `npm publish`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPackage {
    pub name: String,
    pub version: String,
}

/// npm CLI wrapper
pub struct NpmPlugin {
    runner: Arc<dyn CommandRunner>,
    masker: SecretMasker,
}

impl NpmPlugin {
    pub fn new(runner: Arc<dyn CommandRunner>, masker: SecretMasker) -> Self {
        Self { runner, masker }
    }

    async fn run(&self, args: &[String]) -> Result<Vec<u8>, CommandError> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let result = self.runner.run(NPM, &args).await;

        let output = match &result {
            Ok(stdout) => stdout.as_slice(),
            Err(error) => error.output(),
        };
        trace!(
            command = %args.join(" "),
            success = result.is_ok(),
            output = %self.masker.mask(&String::from_utf8_lossy(output)),
            "npm finished"
        );

        result
    }

    /// `npm version --json`
    pub async fn version(&self) -> Result<Vec<u8>, CommandError> {
        self.run(&args(&["version", "--json"])).await
    }

    /// `npm config list`, output only traced
    pub async fn config_list(&self) -> Result<Vec<u8>, CommandError> {
        self.run(&args(&["config", "list"])).await
    }

    /// `npm whoami [--registry <url>]`
    pub async fn whoami(&self, registry: Option<&str>) -> Result<Vec<u8>, CommandError> {
        self.run(&with_registry(args(&["whoami"]), registry)).await
    }

    /// `npm ping [--registry <url>]`
    pub async fn ping(&self, registry: Option<&str>) -> Result<Vec<u8>, CommandError> {
        self.run(&with_registry(args(&["ping"]), registry)).await
    }

    /// `npm view <name> versions [--registry <url>]`
    pub async fn view_versions(
        &self,
        name: &str,
        registry: Option<&str>,
    ) -> Result<Vec<u8>, CommandError> {
        self.run(&with_registry(args(&["view", name, "versions"]), registry))
            .await
    }

    /// `npm audit --production --audit-level=<level>`
    pub async fn audit(&self, level: AuditLevel) -> Result<Vec<u8>, CommandError> {
        self.run(&audit_args(level)).await
    }

    /// `npm publish ...` with the arguments from [`publish_args`]
    pub async fn publish(&self, config: &Config) -> Result<Vec<u8>, CommandError> {
        self.run(&publish_args(config)).await
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

fn with_registry(mut args: Vec<String>, registry: Option<&str>) -> Vec<String> {
    if let Some(registry) = registry.filter(|r| !r.is_empty()) {
        args.push("--registry".to_string());
        args.push(registry.to_string());
    }
    args
}

/// Arguments of the audit command
pub fn audit_args(level: AuditLevel) -> Vec<String> {
    vec![
        "audit".to_string(),
        "--production".to_string(),
        format!("--audit-level={level}"),
    ]
}

/// Arguments of the publish command, in a fixed order
///
/// `publish --quiet`, then dry-run, tag, access, all workspaces, a single
/// workspace and finally the registry.
pub fn publish_args(config: &Config) -> Vec<String> {
    let mut args = args(&["publish", "--quiet"]);

    if config.dry_run {
        args.push("--dry-run".to_string());
    }

    if let Some(tag) = config.tag.as_deref().filter(|t| !t.is_empty()) {
        args.extend(["--tag".to_string(), tag.to_string()]);
    }

    if let Some(access) = config.access.as_deref().filter(|a| !a.is_empty()) {
        args.extend(["--access".to_string(), access.to_string()]);
    }

    if config.workspaces {
        args.push("--workspaces".to_string());
    }

    if let Some(workspace) = config.workspace.as_deref().filter(|w| !w.is_empty()) {
        args.extend(["--workspace".to_string(), workspace.to_string()]);
    }

    with_registry(args, config.registry())
}

/// Parse the `npm version --json` response
pub fn parse_tool_versions(raw: &[u8]) -> Result<ToolVersions, serde_json::Error> {
    serde_json::from_slice(raw)
}

/// Parse the `npm view <name> versions` response
///
/// A package with a single published version is reported as a bare string
/// rather than a list.
pub fn parse_versions(raw: &[u8]) -> Vec<String> {
    if let Ok(versions) = serde_json::from_slice::<Vec<String>>(raw) {
        return versions;
    }

    let text = String::from_utf8_lossy(raw).replace('"', "");
    let version = text.strip_suffix('\n').unwrap_or(&text);
    vec![version.to_string()]
}

/// Parse the `npm publish` response
///
/// In workspace mode npm reports a map of workspace name to package, otherwise
/// a single package.
pub fn parse_publish_response(
    raw: &[u8],
    workspace_mode: bool,
) -> Result<Vec<PublishedPackage>, serde_json::Error> {
    if workspace_mode {
        let map: BTreeMap<String, PublishedPackage> = serde_json::from_slice(raw)?;
        Ok(map.into_values().collect())
    } else {
        Ok(vec![serde_json::from_slice(raw)?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_config() -> Config {
        Config {
            dry_run: true,
            tag: Some("next".to_string()),
            access: Some("public".to_string()),
            workspaces: true,
            workspace: Some("packages/a".to_string()),
            registry: "http://registry.test.com".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_publish_args_minimal() {
        assert_eq!(publish_args(&Config::default()), vec!["publish", "--quiet"]);
    }

    #[test]
    fn test_publish_args_order() {
        assert_eq!(
            publish_args(&full_config()),
            vec![
                "publish",
                "--quiet",
                "--dry-run",
                "--tag",
                "next",
                "--access",
                "public",
                "--workspaces",
                "--workspace",
                "packages/a",
                "--registry",
                "http://registry.test.com",
            ]
        );
    }

    #[test]
    fn test_audit_args() {
        assert_eq!(
            audit_args(AuditLevel::Moderate),
            vec!["audit", "--production", "--audit-level=moderate"]
        );
    }

    #[test]
    fn test_with_registry() {
        assert_eq!(with_registry(args(&["ping"]), None), vec!["ping"]);
        assert_eq!(with_registry(args(&["ping"]), Some("")), vec!["ping"]);
        assert_eq!(
            with_registry(args(&["whoami"]), Some("http://r")),
            vec!["whoami", "--registry", "http://r"]
        );
    }

    #[test]
    fn test_parse_versions_list() {
        assert_eq!(
            parse_versions(br#"["0.1.0","1.0.0"]"#),
            vec!["0.1.0", "1.0.0"]
        );
    }

    #[test]
    fn test_parse_versions_bare_string() {
        assert_eq!(parse_versions(b"\"1.0.0\"\n"), vec!["1.0.0"]);
        assert_eq!(parse_versions(b"1.0.0"), vec!["1.0.0"]);
    }

    #[test]
    fn test_parse_tool_versions() {
        let versions =
            parse_tool_versions(br#"{"my-app":"1.0.0","npm":"10.2.4","node":"20.11.0","v8":"11.3"}"#)
                .unwrap();
        assert_eq!(versions.npm.as_deref(), Some("10.2.4"));
        assert_eq!(versions.node.as_deref(), Some("20.11.0"));

        assert!(parse_tool_versions(b"{ npm: '10.2.4' }").is_err());
    }

    #[test]
    fn test_parse_publish_response_single() {
        let packages =
            parse_publish_response(br#"{"name":"pkg","version":"1.0.0","size":100}"#, false)
                .unwrap();
        assert_eq!(
            packages,
            vec![PublishedPackage {
                name: "pkg".to_string(),
                version: "1.0.0".to_string()
            }]
        );
    }

    #[test]
    fn test_parse_publish_response_workspaces() {
        let raw = br#"{"a":{"name":"@s/a","version":"1.0.0"},"b":{"name":"@s/b","version":"2.0.0"}}"#;
        let packages = parse_publish_response(raw, true).unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[1].name, "@s/b");

        assert!(parse_publish_response(raw, false).is_err());
    }
}
