//! `apf resolve`: query the capability registry.

use super::common::open_manager;
use anyhow::{Context, Result};
use apf_core::cli::{ExitCode, OutputFormat};
use apf_core::{CapabilityId, InterfaceId, LoaderConfig};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Result of a resolution query.
#[derive(Debug, Serialize)]
pub struct ResolveResult {
    /// Requested interface
    pub interface: String,
    /// Requested capability id, if the query named one
    pub requested_id: Option<String>,
    /// The resolved implementation, if any
    pub resolved: Option<Resolved>,
}

/// The implementation a query resolved to.
#[derive(Debug, Serialize)]
pub struct Resolved {
    /// Capability id it is registered under
    pub capability_id: String,
    /// Implementation name
    pub implementation: String,
    /// Every interface it satisfies
    pub interfaces: Vec<String>,
    /// Registering package
    pub owner: Option<String>,
}

/// Loads the installed plugins and resolves `interface`, optionally pinned
/// to capability `id`.
pub fn resolve(
    interface: &str,
    id: Option<&str>,
    config: LoaderConfig,
) -> Result<ResolveResult> {
    let iface = InterfaceId::new(interface);
    let capability = id
        .map(|id| CapabilityId::new(id).with_context(|| format!("invalid capability id '{id}'")))
        .transpose()?;

    let manager = open_manager(config)?;
    let registry = manager.registry();

    let implementation = match &capability {
        Some(id) => registry.resolve(&iface, id),
        None => registry.resolve_by_capability(&iface),
    };

    let resolved = implementation.and_then(|imp| {
        registry
            .entries()
            .into_iter()
            .find(|entry| Arc::ptr_eq(&entry.implementation, &imp))
            .map(|entry| Resolved {
                capability_id: entry.capability_id.to_string(),
                implementation: imp.name().to_string(),
                interfaces: imp.interfaces().map(ToString::to_string).collect(),
                owner: entry.owner.map(String::from),
            })
    });

    Ok(ResolveResult {
        interface: iface.to_string(),
        requested_id: capability.map(String::from),
        resolved,
    })
}

/// Runs the resolve command.
///
/// Exits with [`ExitCode::NOT_FOUND`] when nothing satisfies the query.
pub fn run(
    interface: &str,
    id: Option<&str>,
    config: LoaderConfig,
    output_format: OutputFormat,
) -> Result<ExitCode> {
    info!("Resolving interface {}", interface);

    let result = resolve(interface, id, config)?;
    println!("{}", crate::formatters::format_output(&result, output_format)?);

    if result.resolved.is_some() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::NOT_FOUND)
    }
}
