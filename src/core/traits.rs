//! Collaborator traits for the publisher
//!
//! The publisher never touches processes, files or the user environment
//! directly. It goes through these seams, which lets tests script npm
//! responses and keep every file in memory.

use crate::security::CommandError;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

// ============================================================================
// Command Runner
// ============================================================================

/// Runs an external tool and captures its output
///
/// A non-zero exit is reported as [`CommandError::Failed`] carrying the
/// captured output, distinct from a failure to start the process.
///
/// # Examples
///
/// ```no_run
/// # use npm_publish_plugin::core::CommandRunner;
/// # use npm_publish_plugin::CommandError;
/// # use async_trait::async_trait;
/// struct Echo;
///
/// #[async_trait]
/// impl CommandRunner for Echo {
///     async fn run(&self, _program: &str, args: &[&str]) -> Result<Vec<u8>, CommandError> {
///         Ok(args.join(" ").into_bytes())
///     }
/// }
/// ```
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, returning stdout on success
    async fn run(&self, program: &str, args: &[&str]) -> Result<Vec<u8>, CommandError>;

    /// Run and decode stdout as (lossy) UTF-8
    async fn run_string(&self, program: &str, args: &[&str]) -> Result<String, CommandError> {
        let output = self.run(program, args).await?;
        Ok(String::from_utf8_lossy(&output).into_owned())
    }
}

// ============================================================================
// File System
// ============================================================================

/// Synchronous file operations
///
/// Kept synchronous so a guard can restore files from `Drop`.
pub trait FileSystem: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Create or truncate `path` and write `contents`
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;
}

// ============================================================================
// Environment
// ============================================================================

/// Home directory used when none can be resolved
pub const FALLBACK_HOME: &str = "/root";

/// User environment lookups
pub trait Environment: Send + Sync {
    fn home_dir(&self) -> Option<PathBuf>;

    /// Home directory, falling back to [`FALLBACK_HOME`]
    fn home_dir_or_fallback(&self) -> PathBuf {
        self.home_dir()
            .unwrap_or_else(|| PathBuf::from(FALLBACK_HOME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl CommandRunner for Echo {
        async fn run(&self, program: &str, args: &[&str]) -> Result<Vec<u8>, CommandError> {
            if program != "npm" {
                return Err(CommandError::CommandNotAllowed(program.to_string()));
            }
            Ok(args.join(" ").into_bytes())
        }
    }

    struct NoHome;

    impl Environment for NoHome {
        fn home_dir(&self) -> Option<PathBuf> {
            None
        }
    }

    #[tokio::test]
    async fn test_run_string_decodes_output() {
        let output = Echo.run_string("npm", &["view", "pkg"]).await.unwrap();
        assert_eq!(output, "view pkg");
    }

    #[tokio::test]
    async fn test_run_string_propagates_errors() {
        let result = Echo.run_string("rm", &[]).await;
        assert!(matches!(result, Err(CommandError::CommandNotAllowed(_))));
    }

    #[test]
    fn test_home_dir_fallback() {
        assert_eq!(NoHome.home_dir_or_fallback(), PathBuf::from("/root"));
    }
}
