//! RAII guard for staging directories.

use crate::fs::FileSystem;
use std::path::{Path, PathBuf};

/// Removes a staging directory on drop unless committed.
///
/// Created right after the `-cache` directory is made; any early return or
/// panic during staging discards the partial directory so the next install
/// or reconciliation never sees it.
pub(crate) struct StagingGuard<'a> {
    fs: &'a dyn FileSystem,
    path: PathBuf,
    cleanup: bool,
}

impl<'a> StagingGuard<'a> {
    pub(crate) fn new(fs: &'a dyn FileSystem, path: PathBuf) -> Self {
        Self {
            fs,
            path,
            cleanup: true,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Disables cleanup; call once the staged directory has been promoted.
    pub(crate) fn commit(mut self) {
        self.cleanup = false;
    }
}

impl Drop for StagingGuard<'_> {
    fn drop(&mut self) {
        if !self.cleanup || !self.fs.exists(&self.path) {
            return;
        }
        if let Err(e) = self.fs.remove_dir_all(&self.path) {
            tracing::warn!(
                "Failed to discard staging directory {}: {}",
                self.path.display(),
                e
            );
        } else {
            tracing::debug!("Discarded staging directory: {}", self.path.display());
        }
    }
}

impl std::fmt::Debug for StagingGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingGuard")
            .field("path", &self.path)
            .field("cleanup", &self.cleanup)
            .finish_non_exhaustive()
    }
}
