//! `apf inspect`: show what a bundle declares without installing it.

use anyhow::{Context, Result};
use apf_core::LoaderConfig;
use apf_core::cli::{ExitCode, OutputFormat};
use apf_plugin_store::checksum::calculate_checksum;
use apf_plugin_store::{BundleInspector, CapabilityDecl, JsonBundleInspector};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Result of inspecting a bundle.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Bundle file
    pub bundle: String,
    /// Declared package id
    pub package_id: String,
    /// Declared version
    pub version: u64,
    /// Human-readable version string
    pub version_name: Option<String>,
    /// Display name
    pub display_name: String,
    /// Description
    pub description: Option<String>,
    /// Lowest host version the bundle accepts
    pub min_host_version: Option<u32>,
    /// Whether the configured host version satisfies `min_host_version`
    pub compatible: bool,
    /// Blake3 checksum of the bundle file
    pub checksum: String,
    /// Declared capabilities
    pub capabilities: Vec<CapabilityDecl>,
}

/// Reads the manifest of `bundle`.
///
/// Nothing under the plugins directory is touched.
pub fn inspect(bundle: &Path, config: &LoaderConfig) -> Result<InspectResult> {
    let manifest = JsonBundleInspector::new()
        .inspect(bundle)
        .with_context(|| format!("failed to inspect {}", bundle.display()))?;
    let data =
        std::fs::read(bundle).with_context(|| format!("failed to read {}", bundle.display()))?;

    Ok(InspectResult {
        bundle: bundle.display().to_string(),
        package_id: manifest.package_id.to_string(),
        version: manifest.version.get(),
        display_name: manifest.display_name().to_string(),
        compatible: manifest
            .min_host_version
            .is_none_or(|required| required <= config.host_version),
        checksum: calculate_checksum(&data),
        version_name: manifest.version_name,
        description: manifest.description,
        min_host_version: manifest.min_host_version,
        capabilities: manifest.capabilities,
    })
}

/// Runs the inspect command.
pub fn run(
    bundle: &Path,
    config: &LoaderConfig,
    output_format: OutputFormat,
) -> Result<ExitCode> {
    info!("Inspecting bundle: {}", bundle.display());

    let result = inspect(bundle, config)?;
    println!("{}", crate::formatters::format_output(&result, output_format)?);

    Ok(ExitCode::SUCCESS)
}
