//! Bundle inspection: read a bundle's manifest without loading its code.

use crate::error::{LifecycleError, Result};
use crate::types::BundleManifest;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

/// Extracts manifest metadata from a bundle.
///
/// Implementations must be free of side effects: inspecting a bundle never
/// installs, stages, or registers anything.
pub trait BundleInspector: Send + Sync + fmt::Debug {
    /// Reads the manifest of the bundle at `bundle`.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::NotFound`] if the path is missing or not a regular file
    /// - [`LifecycleError::MalformedBundle`] if the manifest is unreadable or invalid
    fn inspect(&self, bundle: &Path) -> Result<BundleManifest>;
}

/// Inspector for bundles that are a JSON manifest document.
///
/// ```json
/// {
///   "package_id": "com.x.plugin",
///   "version": 2,
///   "display_name": "X",
///   "min_host_version": 1,
///   "capabilities": [
///     {"id": "greet", "locator": "greeter", "interfaces": ["ISayable"]}
///   ]
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBundleInspector;

impl JsonBundleInspector {
    /// Creates the inspector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl BundleInspector for JsonBundleInspector {
    fn inspect(&self, bundle: &Path) -> Result<BundleManifest> {
        if !bundle.is_file() {
            return Err(LifecycleError::NotFound {
                path: bundle.to_path_buf(),
            });
        }

        let content = fs::read(bundle)?;
        let manifest: BundleManifest =
            serde_json::from_slice(&content).map_err(|e| LifecycleError::MalformedBundle {
                path: bundle.to_path_buf(),
                reason: format!("Failed to parse manifest: {e}"),
            })?;

        validate_manifest(&manifest).map_err(|reason| LifecycleError::MalformedBundle {
            path: bundle.to_path_buf(),
            reason,
        })?;

        tracing::debug!(
            "Inspected bundle {} ({} v{}, {} capabilities)",
            bundle.display(),
            manifest.package_id,
            manifest.version,
            manifest.capabilities.len()
        );
        Ok(manifest)
    }
}

/// Checks invariants serde cannot express.
fn validate_manifest(manifest: &BundleManifest) -> std::result::Result<(), String> {
    if manifest.version.get() == 0 {
        return Err("version must be greater than 0".to_string());
    }

    let mut seen = HashSet::new();
    for capability in &manifest.capabilities {
        if !seen.insert(&capability.id) {
            return Err(format!("duplicate capability id '{}'", capability.id));
        }
        if capability.locator.trim().is_empty() {
            return Err(format!("capability '{}' has an empty locator", capability.id));
        }
    }

    Ok(())
}
