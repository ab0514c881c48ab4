//! `apf install`: install or upgrade a plugin from a bundle file.

use super::common::open_manager;
use anyhow::{Context, Result};
use apf_core::LoaderConfig;
use apf_core::cli::{ExitCode, OutputFormat};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Result of a successful install.
#[derive(Debug, Serialize)]
pub struct InstallResult {
    /// Installed package
    pub package_id: String,
    /// Installed version
    pub version: u64,
    /// Display name
    pub display_name: String,
    /// Version this install replaced, if any
    pub replaced: Option<u64>,
    /// Registered capability ids
    pub capabilities: Vec<String>,
    /// Live slot directory
    pub path: String,
    /// Install time (RFC 3339)
    pub installed_at: String,
}

/// Installs `bundle` into the plugins directory of `config`.
pub fn install(bundle: &Path, config: LoaderConfig) -> Result<InstallResult> {
    let manager = open_manager(config)?;

    let replaced = manager
        .inspect(bundle)
        .ok()
        .and_then(|manifest| manager.get_plugin(&manifest.package_id))
        .map(|plugin| plugin.version.get());

    let plugin = manager
        .install(bundle)
        .with_context(|| format!("failed to install {}", bundle.display()))?;

    Ok(InstallResult {
        path: manager.plugin_path(&plugin.package_id).display().to_string(),
        package_id: plugin.package_id.to_string(),
        version: plugin.version.get(),
        replaced,
        capabilities: plugin
            .capabilities
            .iter()
            .map(|c| c.id.to_string())
            .collect(),
        installed_at: plugin.installed_at.to_rfc3339(),
        display_name: plugin.display_name,
    })
}

/// Runs the install command.
pub fn run(
    bundle: &Path,
    config: LoaderConfig,
    output_format: OutputFormat,
) -> Result<ExitCode> {
    info!("Installing bundle: {}", bundle.display());

    let result = install(bundle, config)?;
    println!("{}", crate::formatters::format_output(&result, output_format)?);

    info!("Installed {} v{}", result.package_id, result.version);
    if let Some(old) = result.replaced {
        info!("Replaced v{} of {}", old, result.package_id);
    }
    Ok(ExitCode::SUCCESS)
}
