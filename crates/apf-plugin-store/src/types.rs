//! Types for bundle manifests, install records, and lifecycle results.

use apf_core::{CapabilityId, InterfaceId, PackageId, PluginVersion};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Install record format version.
///
/// Bump when the layout of `plugin.json` changes incompatibly.
pub const FORMAT_VERSION: &str = "1.0";

/// Install record file name inside a live slot.
pub const RECORD_FILE: &str = "plugin.json";

/// Directory inside a slot that receives extracted resources.
pub const RESOURCE_DIR: &str = "lib";

/// Directory holding the replaced live slot while an upgrade is promoted.
pub(crate) const PREVIOUS_DIR: &str = ".previous";

/// One capability a bundle declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDecl {
    /// Capability id to register under
    pub id: CapabilityId,
    /// Loader-specific handle naming the constructor inside the module
    pub locator: String,
    /// Interfaces the implementation satisfies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<InterfaceId>,
}

/// Metadata extracted from a bundle without loading it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
    /// Unique package id
    pub package_id: PackageId,
    /// Monotonic version
    pub version: PluginVersion,
    /// Human-readable version string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_name: Option<String>,
    /// Display name, defaults to the package id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Lowest host version able to run this bundle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_host_version: Option<u32>,
    /// Declared capabilities, in registration order
    #[serde(default)]
    pub capabilities: Vec<CapabilityDecl>,
}

impl BundleManifest {
    /// Returns the display name, falling back to the package id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name
            .as_deref()
            .unwrap_or_else(|| self.package_id.as_str())
    }
}

/// Persisted install record, written to `plugin.json` in the live slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecord {
    /// Record format version
    pub format_version: String,
    /// Package id
    pub package_id: PackageId,
    /// Installed version
    pub version: PluginVersion,
    /// Human-readable version string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_name: Option<String>,
    /// Display name
    pub display_name: String,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// When the bundle was staged
    pub installed_at: DateTime<Utc>,
    /// Checksum of the slot's bundle file
    pub bundle_checksum: String,
    /// Declared capabilities
    pub capabilities: Vec<CapabilityDecl>,
}

impl InstallRecord {
    /// Creates a record for `manifest`, stamped with the current time.
    #[must_use]
    pub fn new(manifest: &BundleManifest, bundle_checksum: String) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            package_id: manifest.package_id.clone(),
            version: manifest.version,
            version_name: manifest.version_name.clone(),
            display_name: manifest.display_name().to_string(),
            description: manifest.description.clone(),
            installed_at: Utc::now(),
            bundle_checksum,
            capabilities: manifest.capabilities.clone(),
        }
    }
}

/// An installed plugin.
///
/// Owns the capabilities it registered; superseded by a strictly newer
/// install of the same package, dropped on uninstall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    /// Package id
    pub package_id: PackageId,
    /// Installed version
    pub version: PluginVersion,
    /// Human-readable version string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_name: Option<String>,
    /// Display name
    pub display_name: String,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Registered capabilities, in declaration order
    pub capabilities: Vec<CapabilityDecl>,
    /// When the active version was staged
    pub installed_at: DateTime<Utc>,
    /// Checksum of the active bundle file
    pub bundle_checksum: String,
}

impl Plugin {
    /// Returns the ids of the capabilities this plugin registered.
    #[must_use]
    pub fn capability_ids(&self) -> Vec<CapabilityId> {
        self.capabilities.iter().map(|c| c.id.clone()).collect()
    }
}

impl From<InstallRecord> for Plugin {
    fn from(record: InstallRecord) -> Self {
        Self {
            package_id: record.package_id,
            version: record.version,
            version_name: record.version_name,
            display_name: record.display_name,
            description: record.description,
            capabilities: record.capabilities,
            installed_at: record.installed_at,
            bundle_checksum: record.bundle_checksum,
        }
    }
}

/// Lifecycle state of a package id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    /// Not installed
    Absent,
    /// Active and registered
    Installed,
    /// A newer version is being staged while the current one stays active
    StagingUpgrade,
    /// Uninstalled, but files remain until the next reconciliation
    PendingRemoval,
}

impl PluginState {
    /// Returns the string representation of the state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Installed => "installed",
            Self::StagingUpgrade => "staging_upgrade",
            Self::PendingRemoval => "pending_removal",
        }
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful uninstall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UninstallOutcome {
    /// Capabilities unregistered and all files deleted
    Removed,
    /// Capabilities unregistered; files left behind under a tombstone
    Deferred,
    /// Nothing was installed under that id
    NotInstalled,
}

impl fmt::Display for UninstallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Removed => "removed",
            Self::Deferred => "deferred",
            Self::NotInstalled => "not installed",
        })
    }
}

/// A plugin that reconciliation skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileFailure {
    /// Skipped package
    pub package_id: PackageId,
    /// Why it was skipped
    pub reason: String,
}

/// Summary of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Plugins activated and registered
    pub loaded: Vec<PackageId>,
    /// Interrupted upgrades whose staged directory was promoted
    pub promoted: Vec<PackageId>,
    /// Packages whose tombstone was honored
    pub purged: Vec<PackageId>,
    /// Plugins skipped because of an error
    pub failed: Vec<ReconcileFailure>,
}

impl ReconcileReport {
    /// Returns `true` if no plugin was skipped.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
