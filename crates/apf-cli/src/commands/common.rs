//! Shared setup for CLI commands: configuration, manager construction, and
//! exit code mapping.

use crate::loader::DeclaredModuleLoader;
use anyhow::{Context, Result};
use apf_core::LoaderConfig;
use apf_core::cli::ExitCode;
use apf_plugin_store::{LifecycleError, PluginManager, SidecarResources};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Resolves the loader configuration from CLI flags.
///
/// Reads `config_file` when given, otherwise starts from the defaults.
/// `plugins_dir` overrides whatever the file says.
///
/// # Examples
///
/// ```
/// use apf_cli::commands::common::load_config;
/// use std::path::PathBuf;
///
/// let config = load_config(None, Some(PathBuf::from("/tmp/plugins"))).unwrap();
/// assert_eq!(config.plugins_dir, PathBuf::from("/tmp/plugins"));
/// ```
pub fn load_config(
    config_file: Option<&Path>,
    plugins_dir: Option<PathBuf>,
) -> Result<LoaderConfig> {
    let mut config = match config_file {
        Some(path) => LoaderConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => LoaderConfig::default(),
    };

    if let Some(dir) = plugins_dir {
        config.plugins_dir = dir;
    }
    config.validate().context("invalid loader configuration")?;

    debug!("Using plugins directory {}", config.plugins_dir.display());
    Ok(config)
}

/// Builds a manager over `config` without touching existing slots.
pub fn build_manager(config: LoaderConfig) -> Result<PluginManager> {
    PluginManager::builder(config, DeclaredModuleLoader)
        .extractor(SidecarResources)
        .build()
        .context("failed to initialize plugin manager")
}

/// Builds a manager and reconciles the plugins directory, so the manager
/// reflects what earlier invocations installed.
///
/// Plugins that fail to load are logged and left out.
pub fn open_manager(config: LoaderConfig) -> Result<PluginManager> {
    let manager = build_manager(config)?;
    let report = manager
        .reconcile()
        .context("failed to reconcile plugins directory")?;

    for failure in &report.failed {
        warn!("Plugin {} not loaded: {}", failure.package_id, failure.reason);
    }
    Ok(manager)
}

/// Maps a command error to the process exit code.
///
/// The first lifecycle or core error in the cause chain decides; anything
/// else is a general error.
///
/// # Examples
///
/// ```
/// use apf_cli::commands::common::exit_code_for;
/// use apf_core::cli::ExitCode;
/// use apf_plugin_store::LifecycleError;
///
/// let err = anyhow::Error::new(LifecycleError::NotFound {
///     path: "missing.bundle".into(),
/// })
/// .context("failed to install");
/// assert_eq!(exit_code_for(&err), ExitCode::NOT_FOUND);
/// ```
#[must_use]
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    for cause in err.chain() {
        if let Some(lifecycle) = cause.downcast_ref::<LifecycleError>() {
            return match lifecycle {
                LifecycleError::NotFound { .. } => ExitCode::NOT_FOUND,
                LifecycleError::VersionConflict { .. } => ExitCode::CONFLICT,
                LifecycleError::Config(_) => ExitCode::INVALID_INPUT,
                e if e.is_recoverable() => ExitCode::INVALID_INPUT,
                _ => ExitCode::ERROR,
            };
        }
        if cause.downcast_ref::<apf_core::Error>().is_some() {
            return ExitCode::INVALID_INPUT;
        }
    }
    ExitCode::ERROR
}

#[cfg(test)]
mod tests {
    use super::*;
    use apf_core::PackageId;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None, None).unwrap();
        assert_eq!(config.bundle_extension, "bundle");
        assert!(config.verify_checksums);
    }

    #[test]
    fn test_load_config_file_with_override() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("apf.toml");
        std::fs::write(&path, "bundle_extension = \"apk\"\nplugins_dir = \"/srv/plugins\"\n")
            .unwrap();

        let config = load_config(Some(&path), Some(temp.path().join("override"))).unwrap();
        assert_eq!(config.bundle_extension, "apk");
        assert_eq!(config.plugins_dir, temp.path().join("override"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Some(Path::new("/nonexistent/apf.toml")), None).unwrap_err();
        assert_eq!(exit_code_for(&err), ExitCode::INVALID_INPUT);
    }

    #[test]
    fn test_exit_codes() {
        let conflict = anyhow::Error::new(LifecycleError::VersionConflict {
            package_id: PackageId::new("a").unwrap(),
            installed: 2.into(),
            incoming: 1.into(),
        });
        assert_eq!(exit_code_for(&conflict), ExitCode::CONFLICT);

        let malformed = anyhow::Error::new(LifecycleError::MalformedBundle {
            path: "x.bundle".into(),
            reason: "bad".to_string(),
        });
        assert_eq!(exit_code_for(&malformed), ExitCode::INVALID_INPUT);

        let staging = anyhow::Error::new(LifecycleError::StagingFailure {
            package_id: PackageId::new("a").unwrap(),
            reason: "disk full".to_string(),
        });
        assert_eq!(exit_code_for(&staging), ExitCode::ERROR);

        assert_eq!(exit_code_for(&anyhow::anyhow!("other")), ExitCode::ERROR);
    }
}
