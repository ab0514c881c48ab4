//! `apf list`: list installed plugins.

use super::common::build_manager;
use anyhow::{Context, Result};
use apf_core::LoaderConfig;
use apf_core::cli::{ExitCode, OutputFormat};
use apf_plugin_store::{Plugin, PluginState, ReconcileFailure};
use serde::Serialize;
use tracing::{info, warn};

/// Result of listing plugins.
#[derive(Debug, Serialize)]
pub struct ListResult {
    /// Plugins directory
    pub plugins_dir: String,
    /// Number of active plugins
    pub plugin_count: usize,
    /// Active plugins, sorted by package id
    pub plugins: Vec<PluginSummary>,
    /// Slots that could not be loaded
    pub failed: Vec<ReconcileFailure>,
}

/// Summary of one plugin.
#[derive(Debug, Serialize)]
pub struct PluginSummary {
    /// Package id
    pub package_id: String,
    /// Version
    pub version: u64,
    /// Human-readable version string
    pub version_name: Option<String>,
    /// Display name
    pub display_name: String,
    /// Description
    pub description: Option<String>,
    /// Lifecycle state
    pub state: PluginState,
    /// Registered capability ids
    pub capabilities: Vec<String>,
    /// Install time (RFC 3339)
    pub installed_at: String,
}

impl PluginSummary {
    fn new(plugin: Plugin, state: PluginState) -> Self {
        Self {
            package_id: plugin.package_id.to_string(),
            version: plugin.version.get(),
            capabilities: plugin
                .capabilities
                .iter()
                .map(|c| c.id.to_string())
                .collect(),
            installed_at: plugin.installed_at.to_rfc3339(),
            version_name: plugin.version_name,
            display_name: plugin.display_name,
            description: plugin.description,
            state,
        }
    }
}

/// Loads the plugins directory and lists what is active.
pub fn list(config: LoaderConfig) -> Result<ListResult> {
    let plugins_dir = config.plugins_dir.display().to_string();
    let manager = build_manager(config)?;
    let report = manager
        .reconcile()
        .context("failed to reconcile plugins directory")?;

    let plugins: Vec<_> = manager
        .list_plugins()
        .into_iter()
        .map(|plugin| {
            let state = manager.state(&plugin.package_id);
            PluginSummary::new(plugin, state)
        })
        .collect();

    Ok(ListResult {
        plugins_dir,
        plugin_count: plugins.len(),
        plugins,
        failed: report.failed,
    })
}

/// Runs the list command.
pub fn run(config: LoaderConfig, output_format: OutputFormat) -> Result<ExitCode> {
    info!("Listing plugins in: {}", config.plugins_dir.display());

    let result = list(config)?;
    if result.plugins.is_empty() {
        warn!("No plugins installed in {}", result.plugins_dir);
    }
    println!("{}", crate::formatters::format_output(&result, output_format)?);

    info!("Found {} plugin(s)", result.plugin_count);
    Ok(ExitCode::SUCCESS)
}
