//! Loader configuration.
//!
//! Controls where plugin slots live on disk, how bundle files are named, and
//! which host version bundles are checked against.
//!
//! # Examples
//!
//! ```
//! use apf_core::LoaderConfig;
//!
//! // Use default configuration
//! let config = LoaderConfig::default();
//! assert_eq!(config.bundle_extension, "bundle");
//!
//! // Create custom configuration
//! let custom = LoaderConfig::builder()
//!     .plugins_dir("/var/lib/host/plugins")
//!     .host_version(3)
//!     .build();
//! assert_eq!(custom.host_version, 3);
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default file extension of a bundle copied into a live slot.
pub const DEFAULT_BUNDLE_EXTENSION: &str = "bundle";

/// Runtime configuration for the plugin loader.
///
/// Serialized as TOML so hosts can ship it alongside their own settings:
///
/// ```toml
/// plugins_dir = "/var/lib/host/plugins"
/// bundle_extension = "bundle"
/// host_version = 1
/// verify_checksums = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Root directory holding one slot per installed package.
    ///
    /// Default: `<data dir>/apf/plugins`, or `./plugins` when the platform
    /// has no data directory.
    pub plugins_dir: PathBuf,

    /// Extension of the bundle file stored in each live slot
    /// (`<package_id>.<bundle_extension>`).
    ///
    /// Default: `bundle`
    pub bundle_extension: String,

    /// Version of the host application.
    ///
    /// Bundles declaring a higher `min_host_version` fail to bind.
    /// Default: 1
    pub host_version: u32,

    /// Verify the recorded bundle checksum when reloading a slot.
    ///
    /// Default: true
    pub verify_checksums: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            plugins_dir: default_plugins_dir(),
            bundle_extension: DEFAULT_BUNDLE_EXTENSION.to_string(),
            host_version: 1,
            verify_checksums: true,
        }
    }
}

fn default_plugins_dir() -> PathBuf {
    dirs::data_dir().map_or_else(
        || PathBuf::from("./plugins"),
        |dir| dir.join("apf").join("plugins"),
    )
}

impl LoaderConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> LoaderConfigBuilder {
        LoaderConfigBuilder::new()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if:
    /// - the plugins directory path is empty
    /// - the bundle extension is empty or contains a path separator or a dot
    ///
    /// # Examples
    ///
    /// ```
    /// use apf_core::LoaderConfig;
    ///
    /// let config = LoaderConfig::default();
    /// assert!(config.validate().is_ok());
    ///
    /// let mut invalid = LoaderConfig::default();
    /// invalid.bundle_extension = String::new();
    /// assert!(invalid.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        if self.plugins_dir.as_os_str().is_empty() {
            return Err(Error::ConfigError {
                message: "Plugins directory path cannot be empty".to_string(),
            });
        }

        if self.bundle_extension.is_empty() {
            return Err(Error::ConfigError {
                message: "Bundle extension cannot be empty".to_string(),
            });
        }

        if self
            .bundle_extension
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '.')
        {
            return Err(Error::ConfigError {
                message: format!(
                    "Bundle extension '{}' must be a bare extension without separators",
                    self.bundle_extension
                ),
            });
        }

        Ok(())
    }

    /// Loads configuration from a TOML file.
    ///
    /// Missing keys fall back to their defaults. The loaded configuration is
    /// validated before it is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// fails validation.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| Error::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;

        tracing::debug!("Loaded loader config from {}", path.display());
        Ok(config)
    }

    /// Writes configuration to a TOML file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| Error::ConfigError {
            message: format!("Failed to serialize config: {e}"),
        })?;

        let io_err = |source| Error::ConfigIo {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, content).map_err(io_err)?;

        Ok(())
    }
}

/// Builder for [`LoaderConfig`].
///
/// # Examples
///
/// ```
/// use apf_core::LoaderConfig;
///
/// let config = LoaderConfig::builder()
///     .plugins_dir("./plugins")
///     .bundle_extension("apk")
///     .verify_checksums(false)
///     .build();
///
/// assert_eq!(config.bundle_extension, "apk");
/// assert!(!config.verify_checksums);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LoaderConfigBuilder {
    config: LoaderConfig,
}

impl LoaderConfigBuilder {
    /// Creates a builder seeded with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the plugins root directory.
    #[must_use]
    pub fn plugins_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.plugins_dir = dir.into();
        self
    }

    /// Sets the bundle file extension.
    #[must_use]
    pub fn bundle_extension(mut self, extension: impl Into<String>) -> Self {
        self.config.bundle_extension = extension.into();
        self
    }

    /// Sets the host version used for compatibility checks.
    #[must_use]
    pub const fn host_version(mut self, version: u32) -> Self {
        self.config.host_version = version;
        self
    }

    /// Enables or disables checksum verification on reload.
    #[must_use]
    pub const fn verify_checksums(mut self, enabled: bool) -> Self {
        self.config.verify_checksums = enabled;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> LoaderConfig {
        self.config
    }
}
