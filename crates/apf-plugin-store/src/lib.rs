//! Plugin lifecycle management for the APF plugin loader.
//!
//! Installs, upgrades, and uninstalls plugin bundles on disk, keeps the
//! capability registry in step with the active set, and recovers interrupted
//! transitions at startup.
//!
//! # Architecture
//!
//! Each package owns a slot under the plugins root:
//! ```text
//! ./plugins/
//! ├── com.x.plugin/
//! │   ├── com.x.plugin.bundle   # copied bundle
//! │   ├── plugin.json           # install record + checksum
//! │   └── lib/                  # extracted resources
//! ├── com.x.plugin-cache/       # staged upgrade in progress
//! └── com.y.plugin-remove       # tombstone: finish removal on next start
//! ```
//!
//! External collaborators are traits with default adapters:
//!
//! - [`BundleInspector`]: reads a manifest ([`JsonBundleInspector`])
//! - [`ModuleLoader`]: binds capabilities to constructors ([`FactoryModuleLoader`])
//! - [`ResourceExtractor`]: unpacks native resources ([`NoResources`], [`SidecarResources`])
//! - [`FileSystem`]: slot mutations ([`OsFileSystem`])
//!
//! # Features
//!
//! - **Staged installs**: artifacts land in `P-cache/` and are renamed into
//!   place only once complete and bound
//! - **Strict upgrades**: only a strictly newer version supersedes the active one
//! - **Deferred removal**: locked files leave a tombstone instead of failing
//! - **Reconciliation**: interrupted upgrades and removals complete on startup
//! - **Integrity**: Blake3 bundle checksums are verified on reconcile
//!
//! # Examples
//!
//! ```no_run
//! use apf_core::{InterfaceId, LoaderConfig};
//! use apf_plugin_store::{FactoryModuleLoader, PluginManager};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! struct Weather;
//!
//! let loader = FactoryModuleLoader::new()
//!     .with_factory("weather", [InterfaceId::new("IForecast")], || Weather);
//! let manager = PluginManager::builder(LoaderConfig::default(), loader).build()?;
//!
//! let report = manager.reconcile()?;
//! println!("{} plugins loaded", report.loaded.len());
//!
//! manager.install("./downloads/weather.bundle")?;
//! let forecast = manager
//!     .registry()
//!     .resolve_by_capability(&InterfaceId::new("IForecast"));
//! assert!(forecast.is_some());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod checksum;
pub mod error;
pub mod extract;
pub mod fs;
pub mod inspector;
pub mod layout;
pub mod loader;
pub mod manager;
mod staging;
pub mod types;

pub use error::{LifecycleError, Result};
pub use extract::{NoResources, ResourceExtractor, SidecarResources};
pub use fs::{FileSystem, OsFileSystem};
pub use inspector::{BundleInspector, JsonBundleInspector};
pub use layout::{SlotEntries, SlotLayout};
pub use loader::{BoundModule, FactoryModuleLoader, ModuleLoader};
pub use manager::{PluginManager, PluginManagerBuilder};
pub use types::{
    BundleManifest, CapabilityDecl, FORMAT_VERSION, InstallRecord, Plugin, PluginState,
    RECORD_FILE, RESOURCE_DIR, ReconcileFailure, ReconcileReport, UninstallOutcome,
};
