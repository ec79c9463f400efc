//! Package Publisher - Main orchestrator for npm publishing
//!
//! Drives a run through its phases in order:
//! - Moving pre-existing `.npmrc` files aside (restored on every exit)
//! - npm verification
//! - Registry config write
//! - Authentication (whoami, then ping unless skipped)
//! - Workspace discovery
//! - Version conflict check for every target package
//! - Audit gate
//! - Publish and result reporting
//!
//! The first fatal phase ends the run. There are no retries.

use crate::core::config::{AuditLevel, Config, ConfigWarning};
use crate::core::error::PublishError;
use crate::core::fs::{OsEnvironment, OsFileSystem};
use crate::core::state_machine::{RunPhase, RunStateMachine};
use crate::core::traits::{CommandRunner, Environment, FileSystem};
use crate::orchestration::file_guard::FileGuard;
use crate::plugins::error_classifier::{CallSite, ErrorPolicy, Outcome};
use crate::plugins::npm_plugin::{self, NpmPlugin, PublishedPackage, ToolVersions};
use crate::plugins::npmrc::{self, NPMRC};
use crate::security::{CommandError, ProcessRunner, SecretMasker};
use crate::validation::{MANIFEST, PackageJson};
use secrecy::ExposeSecret;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Where a project-local `.npmrc` is kept during the run
const PROJECT_NPMRC_ASIDE: &str = ".tmp-npmrc";

/// Where a pre-existing user `.npmrc` is kept during the run
const HOME_NPMRC_ASIDE: &str = ".npmrc.orig";

/// Publishing report returned after a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// Packages npm reported; empty when its response could not be parsed
    pub published: Vec<PublishedPackage>,
    pub dry_run: bool,
    pub tool_versions: ToolVersions,
}

/// Main publish orchestrator
pub struct PackagePublisher {
    config: Config,
    runner: Arc<dyn CommandRunner>,
    fs: Arc<dyn FileSystem>,
    env: Arc<dyn Environment>,
    policy: ErrorPolicy,
    state_machine: RunStateMachine,
}

impl PackagePublisher {
    /// Create a publisher running npm in `project_dir`
    pub fn new(config: Config, project_dir: impl AsRef<Path>) -> Result<Self, CommandError> {
        let project_dir = project_dir.as_ref();

        Ok(Self::with_collaborators(
            config,
            Arc::new(ProcessRunner::new(project_dir)?),
            Arc::new(OsFileSystem::new(project_dir)),
            Arc::new(OsEnvironment),
        ))
    }

    /// Create a publisher over explicit collaborators
    pub fn with_collaborators(
        config: Config,
        runner: Arc<dyn CommandRunner>,
        fs: Arc<dyn FileSystem>,
        env: Arc<dyn Environment>,
    ) -> Self {
        Self {
            config,
            runner,
            fs,
            env,
            policy: ErrorPolicy::default(),
            state_machine: RunStateMachine::new(),
        }
    }

    /// Replace the error tolerance policy
    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state_machine(&self) -> &RunStateMachine {
        &self.state_machine
    }

    /// Validate the configuration
    pub fn validate(&mut self) -> Result<Vec<ConfigWarning>, PublishError> {
        self.config.validate()
    }

    /// Validate, then run every phase
    pub async fn exec(&mut self) -> Result<PublishReport, PublishError> {
        if let Err(error) = self.validate() {
            self.state_machine.fail(error.to_string());
            return Err(error);
        }

        self.run().await
    }

    /// Run every phase against an already validated configuration
    pub async fn run(&mut self) -> Result<PublishReport, PublishError> {
        let fs = Arc::clone(&self.fs);
        let result = self.guarded_run(fs.as_ref()).await;

        match &result {
            Ok(_) => {
                self.state_machine.transition(RunPhase::Success);
            }
            Err(error) => self.state_machine.fail(error.to_string()),
        }
        self.state_machine.log_history();

        result
    }

    async fn guarded_run(&mut self, fs: &dyn FileSystem) -> Result<PublishReport, PublishError> {
        self.state_machine.transition(RunPhase::PreflightFileGuard);

        let home = self.env.home_dir_or_fallback();
        let npmrc_path = home.join(NPMRC);

        // a project-local .npmrc would take precedence over the generated one
        let _project_guard = FileGuard::acquire(fs, NPMRC, PROJECT_NPMRC_ASIDE)?;
        let _home_guard = FileGuard::acquire(fs, &npmrc_path, home.join(HOME_NPMRC_ASIDE))?;

        self.run_phases(&npmrc_path).await
    }

    async fn run_phases(&mut self, npmrc_path: &Path) -> Result<PublishReport, PublishError> {
        let npm = NpmPlugin::new(Arc::clone(&self.runner), self.masker());

        self.state_machine.transition(RunPhase::ToolVerification);
        let tool_versions = self.verify_npm(&npm).await?;

        self.state_machine.transition(RunPhase::ConfigWrite);
        npmrc::write(self.fs.as_ref(), npmrc_path, &self.config)?;
        if let Err(error) = npm.config_list().await {
            debug!(error = %error, "npm config list failed");
        }

        self.state_machine.transition(RunPhase::Authentication);
        self.authenticate(&npm).await?;

        self.state_machine.transition(RunPhase::WorkspaceDiscovery);
        let discovered = self.discover_workspaces();
        let targets = self.publish_targets(discovered)?;

        self.state_machine.transition(RunPhase::VersionConflictCheck);
        for dir in &targets {
            self.check_version(&npm, dir).await?;
        }

        self.state_machine.transition(RunPhase::Audit);
        self.audit(&npm).await?;

        self.state_machine.transition(RunPhase::Publish);
        let published = self.publish(&npm).await?;

        Ok(PublishReport {
            published,
            dry_run: self.config.dry_run,
            tool_versions,
        })
    }

    fn masker(&self) -> SecretMasker {
        let mut masker = SecretMasker::new();

        if let Some(token) = &self.config.token {
            masker.add(token);
        }

        if let Some(password) = &self.config.password {
            masker.add(password);
            masker.add_plain(&npmrc::basic_auth(
                self.config.username.as_deref().unwrap_or_default(),
                password.expose_secret(),
            ));
        }

        masker
    }

    async fn verify_npm(&self, npm: &NpmPlugin) -> Result<ToolVersions, PublishError> {
        let raw = npm
            .version()
            .await
            .map_err(|e| PublishError::ToolUnavailable {
                source: Box::new(e),
            })?;

        let versions =
            npm_plugin::parse_tool_versions(&raw).map_err(|e| PublishError::ToolUnavailable {
                source: Box::new(e),
            })?;

        info!(
            npm = versions.npm.as_deref().unwrap_or("unknown"),
            node = versions.node.as_deref().unwrap_or("unknown"),
            "Verifying npm command"
        );

        Ok(versions)
    }

    async fn authenticate(&self, npm: &NpmPlugin) -> Result<(), PublishError> {
        info!("Checking connection and authentication");
        let registry = self.config.registry();

        npm.whoami(registry)
            .await
            .map_err(|source| PublishError::AuthenticationFailed { source })?;

        // not every registry implements ping
        if self.config.skip_ping {
            warn!("Skipping auth ping");
        } else {
            debug!("Attempting ping");
            npm.ping(registry)
                .await
                .map_err(|source| PublishError::PingFailed { source })?;
        }

        trace!(
            username = self.config.username.as_deref().unwrap_or_default(),
            "authentication completed"
        );
        Ok(())
    }

    /// Workspaces declared by the root package.json, empty on any failure
    fn discover_workspaces(&self) -> Vec<String> {
        match PackageJson::read(self.fs.as_ref(), Path::new(".")) {
            Ok(package) => {
                trace!(workspaces = ?package.workspaces, "workspaces discovered");
                package.workspaces
            }
            Err(error) => {
                debug!(error = %error, "workspace discovery failed");
                Vec::new()
            }
        }
    }

    /// Package directories whose versions must be checked
    fn publish_targets(&self, discovered: Vec<String>) -> Result<Vec<PathBuf>, PublishError> {
        if let Some(workspace) = self.config.workspace.as_deref().filter(|w| !w.is_empty()) {
            return Ok(vec![PathBuf::from(workspace)]);
        }

        if self.config.workspaces {
            if discovered.is_empty() {
                warn!("publishing all workspaces but package.json declares none");
            }
            return Ok(discovered.into_iter().map(PathBuf::from).collect());
        }

        if !discovered.is_empty() {
            return Err(PublishError::AmbiguousWorkspaceTarget {
                workspaces: discovered,
            });
        }

        Ok(vec![PathBuf::from(".")])
    }

    async fn check_version(&self, npm: &NpmPlugin, dir: &Path) -> Result<(), PublishError> {
        let package = PackageJson::read(self.fs.as_ref(), dir)
            .and_then(|package| {
                package.validate(self.config.registry())?;
                Ok(package)
            })
            .map_err(|source| PublishError::PackageValidation {
                path: dir.join(MANIFEST),
                source,
            })?;

        info!(
            name = %package.name,
            version = %package.version,
            "Checking registry for the current version"
        );

        let result = npm
            .view_versions(&package.name, self.config.registry())
            .await;
        let outcome = self.policy.classify_result(CallSite::VersionLookup, &result);

        let stdout = match (result, outcome) {
            (Ok(stdout), _) => stdout,
            (Err(_), Outcome::Benign(_)) => {
                info!(
                    name = %package.name,
                    "Package does not already exist in the registry, publish will claim `{}`",
                    package.name
                );
                return Ok(());
            }
            (Err(_), Outcome::Warning(block)) => {
                warn!(code = %block.code, "{}", block.message());
                return Ok(());
            }
            (Err(source), Outcome::Fatal(block)) => {
                return Err(PublishError::RegistryLookupFailed {
                    name: package.name,
                    code: Some(block.code),
                    summary: block.summary,
                    source,
                });
            }
            (Err(source), _) => {
                return Err(PublishError::RegistryLookupFailed {
                    name: package.name,
                    code: None,
                    summary: "npm returned an unreadable error response".to_string(),
                    source,
                });
            }
        };

        let versions = npm_plugin::parse_versions(&stdout);
        debug!(name = %package.name, ?versions, "versions found");

        if versions.iter().any(|v| v == &package.version) {
            return Err(PublishError::VersionAlreadyPublished {
                name: package.name,
                version: package.version,
            });
        }

        trace!(version = %package.version, "version not yet published");
        Ok(())
    }

    async fn audit(&self, npm: &NpmPlugin) -> Result<(), PublishError> {
        let level = self.config.audit_level();
        if level == AuditLevel::None {
            warn!("Audit level set to NONE, skipping audit check");
            return Ok(());
        }

        info!(audit_level = %level, "Running audit check");
        let result = npm.audit(level).await;
        let outcome = self.policy.classify_result(CallSite::Audit, &result);

        match (result, outcome) {
            (Ok(_), _) => Ok(()),
            (Err(_), Outcome::Warning(block)) => {
                warn!(
                    code = %block.code,
                    "{} Try adding a .npmrc to your project directory or set `audit-level: none`.",
                    block.summary
                );
                Ok(())
            }
            (Err(_), Outcome::Benign(block)) => {
                debug!(code = %block.code, "audit failure tolerated");
                Ok(())
            }
            (Err(source), Outcome::Fatal(block)) => Err(PublishError::AuditFailed {
                level,
                reason: block.message(),
                source,
            }),
            (Err(source), _) => Err(PublishError::AuditFailed {
                level,
                reason: "npm audit reported vulnerabilities or failed".to_string(),
                source,
            }),
        }
    }

    async fn publish(&self, npm: &NpmPlugin) -> Result<Vec<PublishedPackage>, PublishError> {
        info!("Building publish command");

        if self.config.dry_run {
            info!("Doing a dry run");
        }
        if let Some(tag) = self.config.tag.as_deref().filter(|t| !t.is_empty()) {
            info!(tag, "Tagging package");
        }
        if let Some(access) = self.config.access.as_deref().filter(|a| !a.is_empty()) {
            info!(access, "Setting package access");
        }
        if self.config.workspaces {
            info!("Publishing all workspaces");
        }
        if let Some(workspace) = self.config.workspace.as_deref().filter(|w| !w.is_empty()) {
            info!(workspace, "Publishing workspace");
        }

        let stdout = npm
            .publish(&self.config)
            .await
            .map_err(|source| PublishError::PublishFailed { source })?;

        let published =
            match npm_plugin::parse_publish_response(&stdout, self.config.workspace_mode()) {
                Ok(published) => published,
                Err(error) => {
                    trace!(error = %error, "Failed to convert npm publish response");
                    Vec::new()
                }
            };

        for package in &published {
            info!(name = %package.name, version = %package.version, "published");
        }
        info!(dry_run = self.config.dry_run, "Successfully published node package!");

        Ok(published)
    }
}
