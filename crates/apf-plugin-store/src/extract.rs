//! Resource extraction into a staging directory.

use crate::error::Result;
use crate::fs::FileSystem;
use std::fmt;
use std::path::Path;

/// Copies a bundle's native resources into a slot.
pub trait ResourceExtractor: Send + Sync + fmt::Debug {
    /// Extracts the resources of `bundle` into `dest`, returning how many
    /// files were written.
    ///
    /// `dest` may not exist yet. All writes go through `fs`.
    ///
    /// # Errors
    ///
    /// Returns an error if a resource cannot be written; the caller discards
    /// the staging directory.
    fn extract(&self, bundle: &Path, dest: &Path, fs: &dyn FileSystem) -> Result<usize>;
}

/// Extractor for bundles that carry no resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResources;

impl ResourceExtractor for NoResources {
    fn extract(&self, _bundle: &Path, _dest: &Path, _fs: &dyn FileSystem) -> Result<usize> {
        Ok(0)
    }
}

/// Extractor that copies a sidecar directory shipped next to the bundle.
///
/// For `weather.bundle` the sidecar is `weather.lib/`. A missing sidecar
/// means no resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarResources;

impl SidecarResources {
    /// Sidecar directory extension.
    pub const EXTENSION: &'static str = "lib";
}

impl ResourceExtractor for SidecarResources {
    fn extract(&self, bundle: &Path, dest: &Path, fs: &dyn FileSystem) -> Result<usize> {
        let sidecar = bundle.with_extension(Self::EXTENSION);
        if !fs.is_dir(&sidecar) {
            return Ok(0);
        }

        let copied = fs.copy_tree(&sidecar, dest)?;
        tracing::debug!(
            "Extracted {} resources from {}",
            copied,
            sidecar.display()
        );
        Ok(copied)
    }
}
