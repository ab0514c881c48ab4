//! `apf reconcile`: complete interrupted upgrades and removals.

use super::common::build_manager;
use anyhow::{Context, Result};
use apf_core::LoaderConfig;
use apf_core::cli::{ExitCode, OutputFormat};
use apf_plugin_store::ReconcileReport;
use tracing::{info, warn};

/// Runs one reconciliation pass over the plugins directory of `config`.
pub fn reconcile(config: LoaderConfig) -> Result<ReconcileReport> {
    build_manager(config)?
        .reconcile()
        .context("failed to reconcile plugins directory")
}

/// Runs the reconcile command.
///
/// Exits with [`ExitCode::ERROR`] when any plugin was skipped, after
/// printing the full report.
pub fn run(config: LoaderConfig, output_format: OutputFormat) -> Result<ExitCode> {
    info!("Reconciling plugins in: {}", config.plugins_dir.display());

    let report = reconcile(config)?;
    println!("{}", crate::formatters::format_output(&report, output_format)?);

    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        warn!("{} plugin(s) could not be loaded", report.failed.len());
        Ok(ExitCode::ERROR)
    }
}
