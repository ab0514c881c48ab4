//! Error types for plugin lifecycle operations.

use apf_core::{PackageId, PluginVersion};
use std::path::PathBuf;

/// Result type for plugin lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Errors that can occur during plugin lifecycle operations.
///
/// Resolution never produces these: registry lookups return `Option`. Every
/// variant leaves the registry consistent with the in-memory plugin table.
#[derive(thiserror::Error, Debug)]
pub enum LifecycleError {
    /// Bundle path does not exist or is not a regular file.
    ///
    /// # Examples
    ///
    /// ```
    /// use apf_plugin_store::{BundleInspector, JsonBundleInspector, LifecycleError};
    ///
    /// let result = JsonBundleInspector::new().inspect("/nonexistent/plugin.bundle".as_ref());
    /// assert!(matches!(result, Err(LifecycleError::NotFound { .. })));
    /// ```
    #[error("Bundle not found: {}", path.display())]
    NotFound {
        /// Path that was looked up
        path: PathBuf,
    },

    /// Bundle manifest could not be parsed or failed validation.
    #[error("Malformed bundle {}: {reason}", path.display())]
    MalformedBundle {
        /// Path of the offending bundle
        path: PathBuf,
        /// Why the manifest was rejected
        reason: String,
    },

    /// Install rejected because an equal or newer version is active.
    ///
    /// Only strictly newer versions may supersede an installed plugin.
    #[error("Version conflict for {package_id}: installed {installed}, incoming {incoming}")]
    VersionConflict {
        /// Package being installed
        package_id: PackageId,
        /// Currently active version
        installed: PluginVersion,
        /// Version carried by the rejected bundle
        incoming: PluginVersion,
    },

    /// Copying or extracting into the staging directory failed.
    ///
    /// The staging directory has been discarded and the live slot is
    /// untouched.
    #[error("Staging failed for {package_id}: {reason}")]
    StagingFailure {
        /// Package being installed
        package_id: PackageId,
        /// Which step failed and why
        reason: String,
    },

    /// Uninstall could neither delete the plugin's files nor write the
    /// tombstone that defers their deletion.
    ///
    /// The plugin's capabilities are already unregistered when this is
    /// returned.
    #[error("Cleanup incomplete for {package_id}: {reason}")]
    PartialCleanupFailure {
        /// Package being removed
        package_id: PackageId,
        /// What could not be removed
        reason: String,
    },

    /// Module failed to load or did not bind every declared capability.
    #[error("Failed to load {package_id}: {reason}")]
    LoadFailure {
        /// Package whose module failed
        package_id: PackageId,
        /// Loader diagnostic
        reason: String,
    },

    /// Bundle content does not match the checksum in its install record.
    ///
    /// # Security
    ///
    /// Blake3 detects corruption and accidental modification. It is not a
    /// signature scheme and does not authenticate the bundle's origin.
    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Path of the file with mismatched checksum
        path: String,
        /// Checksum recorded at install time
        expected: String,
        /// Checksum of the file on disk
        actual: String,
    },

    /// Install record (`plugin.json`) is unreadable or has an unsupported
    /// format version.
    #[error("Invalid install record {}: {reason}", path.display())]
    InvalidRecord {
        /// Path of the record
        path: PathBuf,
        /// Why the record was rejected
        reason: String,
    },

    /// Package id is not a safe single path component.
    #[error("Invalid package id: {id} ({reason})")]
    InvalidPackageId {
        /// The rejected id
        id: String,
        /// Why it was rejected
        reason: String,
    },

    /// Bundle requires a newer host than the one running.
    #[error("{package_id} requires host version {required}, running {host}")]
    IncompatibleHost {
        /// Package that declared the requirement
        package_id: PackageId,
        /// Minimum host version the bundle declares
        required: u32,
        /// Configured host version
        host: u32,
    },

    /// Loader configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] apf_core::Error),

    /// I/O error outside the staged install path.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LifecycleError {
    /// Returns true if this error is recoverable.
    ///
    /// Recoverable errors are caused by the request (bad bundle, stale
    /// version, bad id) rather than by the environment.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::MalformedBundle { .. }
                | Self::VersionConflict { .. }
                | Self::InvalidPackageId { .. }
                | Self::IncompatibleHost { .. }
                | Self::InvalidRecord { .. }
        )
    }

    /// Returns the package the error concerns, when known.
    #[must_use]
    pub const fn package_id(&self) -> Option<&PackageId> {
        match self {
            Self::VersionConflict { package_id, .. }
            | Self::StagingFailure { package_id, .. }
            | Self::PartialCleanupFailure { package_id, .. }
            | Self::LoadFailure { package_id, .. }
            | Self::IncompatibleHost { package_id, .. } => Some(package_id),
            _ => None,
        }
    }
}
