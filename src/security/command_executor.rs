//! ProcessRunner: whitelisted execution of the npm CLI
//!
//! # Security Features
//!
//! - **Whitelist-based validation**: Only pre-approved commands can execute
//! - **Injection prevention**: Arguments are passed as a slice, never interpolated into shell strings
//! - **Working directory validation**: Validates existence before execution
//!
//! No timeout is applied. The npm process governs its own latency.
//!
//! # Example
//!
//! ```rust,no_run
//! use npm_publish_plugin::{CommandRunner, ProcessRunner};
//!
//! # async fn demo() -> Result<(), npm_publish_plugin::CommandError> {
//! let runner = ProcessRunner::new(std::env::temp_dir())?;
//! let output = runner.run_string("npm", &["--version"]).await?;
//! println!("{output}");
//! # Ok(())
//! # }
//! ```

use crate::core::traits::CommandRunner;
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tokio::process::Command;
use tracing::trace;

/// Allowed commands whitelist.
const ALLOWED_COMMANDS: &[&str] = &["npm"];

/// Lines npm prints to stderr around every failure
static NPM_ERR_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)^.*npm ERR+.*\n?").ok());

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    /// Command is not in the allowed whitelist
    #[error("Command '{0}' is not in the allowed whitelist")]
    CommandNotAllowed(String),

    /// Working directory does not exist or is not accessible
    #[error("Working directory does not exist: {}", .0.display())]
    InvalidWorkingDirectory(PathBuf),

    /// The process could not be started (binary missing, permission denied)
    #[error("failed to start '{program}'")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran and exited unsuccessfully
    #[error("'{program}' exited with {}: {}", status_text(.status), String::from_utf8_lossy(.output).trim())]
    Failed {
        program: String,
        status: Option<i32>,
        /// stderr when it had content, stdout otherwise
        output: Vec<u8>,
    },
}

fn status_text(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

impl CommandError {
    /// Output captured from a failed process, empty for other failures
    pub fn output(&self) -> &[u8] {
        match self {
            Self::Failed { output, .. } => output,
            _ => &[],
        }
    }
}

/// Remove `npm ERR!` noise lines from stderr
pub fn sanitize_stderr(stderr: &[u8]) -> Vec<u8> {
    match NPM_ERR_LINE.as_ref() {
        Some(pattern) => {
            let text = String::from_utf8_lossy(stderr);
            pattern.replace_all(&text, "").into_owned().into_bytes()
        }
        None => stderr.to_vec(),
    }
}

/// Command runner backed by real processes
#[derive(Debug)]
pub struct ProcessRunner {
    /// Working directory where commands will be executed
    working_dir: PathBuf,
}

impl ProcessRunner {
    /// Create a runner, validating that the working directory exists.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::InvalidWorkingDirectory` if the directory does not exist.
    pub fn new<P: AsRef<Path>>(working_dir: P) -> Result<Self, CommandError> {
        let working_dir = working_dir.as_ref().to_path_buf();

        if !working_dir.exists() {
            return Err(CommandError::InvalidWorkingDirectory(working_dir));
        }

        Ok(Self { working_dir })
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Vec<u8>, CommandError> {
        if !ALLOWED_COMMANDS.contains(&program) {
            return Err(CommandError::CommandNotAllowed(program.to_string()));
        }

        // Windows-specific: npm is a .cmd file, not .exe
        #[cfg(target_os = "windows")]
        let command_name = format!("{program}.cmd");

        #[cfg(not(target_os = "windows"))]
        let command_name = program.to_string();

        trace!(program, ?args, "running command");

        let output = Command::new(&command_name)
            .args(args)
            .current_dir(&self.working_dir)
            .output()
            .await
            .map_err(|source| CommandError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if output.status.success() {
            return Ok(output.stdout);
        }

        let stderr = sanitize_stderr(&output.stderr);
        let output_bytes = if stderr.iter().any(|b| !b.is_ascii_whitespace()) {
            stderr
        } else {
            output.stdout
        };

        Err(CommandError::Failed {
            program: program.to_string(),
            status: output.status.code(),
            output: output_bytes,
        })
    }
}
