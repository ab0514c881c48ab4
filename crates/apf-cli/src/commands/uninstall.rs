//! `apf uninstall`: remove an installed plugin.

use super::common::open_manager;
use anyhow::{Context, Result};
use apf_core::cli::{ExitCode, OutputFormat};
use apf_core::{LoaderConfig, PackageId};
use apf_plugin_store::UninstallOutcome;
use serde::Serialize;
use tracing::info;

/// Result of an uninstall.
#[derive(Debug, Serialize)]
pub struct UninstallResult {
    /// Package id
    pub package_id: String,
    /// What happened
    pub outcome: UninstallOutcome,
    /// `true` when files remain until the next reconcile
    pub pending: bool,
}

/// Uninstalls `package_id` without asking for confirmation.
pub fn uninstall(package_id: &str, config: LoaderConfig) -> Result<UninstallResult> {
    let id = PackageId::new(package_id)
        .with_context(|| format!("invalid package id '{package_id}'"))?;
    let manager = open_manager(config)?;

    let outcome = manager
        .uninstall(id.as_str())
        .with_context(|| format!("failed to uninstall '{id}'"))?;

    Ok(UninstallResult {
        package_id: id.into_inner(),
        pending: outcome == UninstallOutcome::Deferred,
        outcome,
    })
}

/// Runs the uninstall command, prompting unless `yes` is set.
pub fn run(
    package_id: &str,
    yes: bool,
    config: LoaderConfig,
    output_format: OutputFormat,
) -> Result<ExitCode> {
    info!("Uninstalling plugin: {}", package_id);

    if !yes {
        use dialoguer::Confirm;

        let confirmed = Confirm::new()
            .with_prompt(format!("Uninstall plugin '{package_id}'?"))
            .default(false)
            .interact()
            .context("failed to read confirmation")?;

        if !confirmed {
            info!("Uninstall cancelled by user");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let result = uninstall(package_id, config)?;
    println!("{}", crate::formatters::format_output(&result, output_format)?);

    if result.pending {
        info!(
            "Files of {} are in use; removal completes on the next reconcile",
            result.package_id
        );
    }
    Ok(ExitCode::SUCCESS)
}
