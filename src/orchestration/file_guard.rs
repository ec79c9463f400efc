//! Scope guard that moves a file aside and puts it back on drop

use crate::core::error::PublishError;
use crate::core::traits::FileSystem;
use std::path::{Path, PathBuf};
use tracing::{error, trace};

/// Moves `original` to `aside` for the guard's lifetime
///
/// The move back happens in `Drop`, so it runs on every exit path of the
/// scope holding the guard, early returns included.
pub struct FileGuard<'a> {
    fs: &'a dyn FileSystem,
    original: PathBuf,
    aside: PathBuf,
    moved: bool,
}

impl<'a> FileGuard<'a> {
    /// Move `original` aside if it exists
    pub fn acquire(
        fs: &'a dyn FileSystem,
        original: impl Into<PathBuf>,
        aside: impl Into<PathBuf>,
    ) -> Result<Self, PublishError> {
        let original = original.into();
        let aside = aside.into();
        let mut moved = false;

        if fs.exists(&original) {
            trace!(from = %original.display(), to = %aside.display(), "moving file aside");
            fs.rename(&original, &aside)
                .map_err(|source| PublishError::FileGuard {
                    path: original.clone(),
                    source,
                })?;
            moved = true;
        }

        Ok(Self {
            fs,
            original,
            aside,
            moved,
        })
    }

    /// Whether a file was moved aside
    pub fn is_active(&self) -> bool {
        self.moved
    }

    pub fn original(&self) -> &Path {
        &self.original
    }
}

impl Drop for FileGuard<'_> {
    fn drop(&mut self) {
        if !self.moved {
            return;
        }

        match self.fs.rename(&self.aside, &self.original) {
            Ok(()) => trace!(path = %self.original.display(), "file restored"),
            Err(source) => error!(
                path = %self.original.display(),
                aside = %self.aside.display(),
                error = %source,
                "failed to restore file"
            ),
        }
    }
}
