//! Plugin lifecycle manager.
//!
//! Provides [`PluginManager`], which installs, upgrades, and uninstalls
//! plugins on disk and keeps the capability [`Registry`] in step with the
//! active set.

mod reconcile;

use crate::checksum::calculate_checksum;
use crate::error::{LifecycleError, Result};
use crate::extract::{NoResources, ResourceExtractor};
use crate::fs::{FileSystem, OsFileSystem};
use crate::inspector::{BundleInspector, JsonBundleInspector};
use crate::layout::SlotLayout;
use crate::loader::{BoundModule, ModuleLoader};
use crate::staging::StagingGuard;
use crate::types::{
    BundleManifest, FORMAT_VERSION, InstallRecord, PREVIOUS_DIR, Plugin, PluginState,
    RECORD_FILE, RESOURCE_DIR, UninstallOutcome,
};
use apf_core::{LoaderConfig, PackageId};
use apf_registry::Registry;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

/// In-memory view of installed plugins.
///
/// `transient` overrides the state derived from `active` while an upgrade is
/// staging or after a removal was deferred.
#[derive(Debug, Default)]
struct PluginTable {
    active: HashMap<PackageId, Plugin>,
    transient: HashMap<PackageId, PluginState>,
}

impl PluginTable {
    fn state(&self, id: &PackageId) -> PluginState {
        self.transient.get(id).copied().unwrap_or_else(|| {
            if self.active.contains_key(id) {
                PluginState::Installed
            } else {
                PluginState::Absent
            }
        })
    }
}

/// Builder for [`PluginManager`].
///
/// Only the module loader is mandatory; the other collaborators default to
/// [`JsonBundleInspector`], [`NoResources`], [`OsFileSystem`], and a fresh
/// [`Registry`].
#[derive(Debug)]
pub struct PluginManagerBuilder {
    config: LoaderConfig,
    loader: Box<dyn ModuleLoader>,
    inspector: Box<dyn BundleInspector>,
    extractor: Box<dyn ResourceExtractor>,
    fs: Box<dyn FileSystem>,
    registry: Option<Arc<Registry>>,
}

impl PluginManagerBuilder {
    /// Sets the bundle inspector.
    #[must_use]
    pub fn inspector(mut self, inspector: impl BundleInspector + 'static) -> Self {
        self.inspector = Box::new(inspector);
        self
    }

    /// Sets the resource extractor.
    #[must_use]
    pub fn extractor(mut self, extractor: impl ResourceExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    /// Sets the filesystem used for all slot operations.
    #[must_use]
    pub fn file_system(mut self, fs: impl FileSystem + 'static) -> Self {
        self.fs = Box::new(fs);
        self
    }

    /// Shares an existing registry instead of creating one.
    #[must_use]
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Validates the configuration and creates the plugins root.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Config`] if the configuration is invalid, or
    /// an I/O error if the plugins root cannot be created.
    pub fn build(self) -> Result<PluginManager> {
        self.config.validate()?;
        self.fs.create_dir_all(&self.config.plugins_dir)?;

        let layout = SlotLayout::new(
            self.config.plugins_dir.clone(),
            self.config.bundle_extension.clone(),
        );
        tracing::debug!("Plugin manager rooted at {}", layout.root().display());

        Ok(PluginManager {
            config: self.config,
            layout,
            registry: self.registry.unwrap_or_default(),
            inspector: self.inspector,
            loader: self.loader,
            extractor: self.extractor,
            fs: self.fs,
            writer: Mutex::new(()),
            table: RwLock::new(PluginTable::default()),
        })
    }
}

/// Plugin lifecycle manager.
///
/// Drives the per-package state machine
/// `Absent → Installed (→ StagingUpgrade → Installed) → PendingRemoval → Absent`
/// over the on-disk slot layout, and registers or retires capabilities in the
/// shared [`Registry`] as plugins are activated or removed.
///
/// # Crash safety
///
/// Install artifacts are staged in `P-cache/` and only renamed into the live
/// slot once complete and bound, so a crash mid-install leaves the previous
/// version intact. An uninstall whose files cannot be deleted leaves a
/// `P-remove` tombstone. [`reconcile`](Self::reconcile) finishes both on the
/// next start.
///
/// # Thread Safety
///
/// `PluginManager` is `Send + Sync`. Install, uninstall, and reconcile
/// serialize on one writer lock for their whole duration. Queries
/// ([`get_plugin`](Self::get_plugin), [`list_plugins`](Self::list_plugins),
/// [`state`](Self::state)) only take a read lock on the plugin table and run
/// concurrently with each other. Registry updates for one plugin happen in a
/// single batch, so resolvers never observe a half-installed plugin.
///
/// # Examples
///
/// ```
/// use apf_core::{CapabilityId, InterfaceId, LoaderConfig};
/// use apf_plugin_store::{FactoryModuleLoader, PluginManager};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let temp = tempfile::tempdir()?;
/// struct Greeter;
///
/// let config = LoaderConfig::builder()
///     .plugins_dir(temp.path().join("plugins"))
///     .build();
/// let loader = FactoryModuleLoader::new()
///     .with_factory("greeter", [InterfaceId::new("ISayable")], || Greeter);
/// let manager = PluginManager::builder(config, loader).build()?;
/// manager.reconcile()?;
///
/// let bundle = temp.path().join("x.bundle");
/// std::fs::write(&bundle, r#"{"package_id": "com.x.plugin", "version": 1,
///     "capabilities": [{"id": "greet", "locator": "greeter"}]}"#)?;
///
/// let plugin = manager.install(&bundle)?;
/// assert_eq!(plugin.version.get(), 1);
///
/// let greet = CapabilityId::new("greet")?;
/// assert!(manager.registry().resolve_by_id(&greet).is_some());
///
/// manager.uninstall("com.x.plugin")?;
/// assert!(manager.registry().resolve_by_id(&greet).is_none());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PluginManager {
    config: LoaderConfig,
    layout: SlotLayout,
    registry: Arc<Registry>,
    inspector: Box<dyn BundleInspector>,
    loader: Box<dyn ModuleLoader>,
    extractor: Box<dyn ResourceExtractor>,
    fs: Box<dyn FileSystem>,
    writer: Mutex<()>,
    table: RwLock<PluginTable>,
}

impl PluginManager {
    /// Starts building a manager for `config` that binds modules with
    /// `loader`.
    #[must_use]
    pub fn builder(
        config: LoaderConfig,
        loader: impl ModuleLoader + 'static,
    ) -> PluginManagerBuilder {
        PluginManagerBuilder {
            config,
            loader: Box::new(loader),
            inspector: Box::new(JsonBundleInspector::new()),
            extractor: Box::new(NoResources),
            fs: Box::new(OsFileSystem),
            registry: None,
        }
    }

    /// Returns the shared capability registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Returns the live slot directory for `id`.
    ///
    /// Does not check whether the directory exists.
    #[must_use]
    pub fn plugin_path(&self, id: &PackageId) -> PathBuf {
        self.layout.live_dir(id)
    }

    /// Inspects a bundle without installing it.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotFound`] or
    /// [`LifecycleError::MalformedBundle`] from the inspector.
    pub fn inspect(&self, bundle: impl AsRef<Path>) -> Result<BundleManifest> {
        self.inspector.inspect(bundle.as_ref())
    }

    /// Installs or upgrades the plugin in `bundle`.
    ///
    /// Steps: inspect, reject unless strictly newer than the active version,
    /// stage into `P-cache/`, bind the staged module, promote the staging
    /// directory to the live slot, then swap the plugin's capabilities in the
    /// registry in one step.
    ///
    /// On error the previously active version stays registered and keeps its
    /// files. The one exception is a promotion whose rename fails and whose
    /// old live directory cannot be moved back: the staged upgrade is then
    /// kept in `P-cache/` and the next reconciliation promotes it.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::NotFound`] / [`LifecycleError::MalformedBundle`] if inspection fails
    /// - [`LifecycleError::VersionConflict`] if an equal or newer version is active
    /// - [`LifecycleError::StagingFailure`] if staging or promotion fails
    /// - [`LifecycleError::IncompatibleHost`] / [`LifecycleError::LoadFailure`] if binding fails
    pub fn install(&self, bundle: impl AsRef<Path>) -> Result<Plugin> {
        let bundle = bundle.as_ref();
        let _writer = self.lock_writer();

        let manifest = self.inspector.inspect(bundle)?;
        let id = manifest.package_id.clone();
        let previous = self.read_table().active.get(&id).cloned();

        if let Some(active) = &previous
            && active.version >= manifest.version
        {
            tracing::info!(
                "Rejected {} v{}: v{} is already installed",
                id,
                manifest.version,
                active.version
            );
            return Err(LifecycleError::VersionConflict {
                package_id: id,
                installed: active.version,
                incoming: manifest.version,
            });
        }

        tracing::info!(
            "Installing {} v{} from {}",
            id,
            manifest.version,
            bundle.display()
        );

        if previous.is_some() {
            self.write_table()
                .transient
                .insert(id.clone(), PluginState::StagingUpgrade);
        }

        match self.stage_and_promote(bundle, &manifest) {
            Ok((record, module)) => {
                let plugin = self.activate(Plugin::from(record), module, previous.as_ref());
                tracing::info!(
                    "Installed {} v{} ({} capabilities)",
                    plugin.package_id,
                    plugin.version,
                    plugin.capabilities.len()
                );
                Ok(plugin)
            }
            Err(e) => {
                if previous.is_some() {
                    self.write_table().transient.remove(&id);
                }
                tracing::warn!("Install of {} failed: {}", id, e);
                Err(e)
            }
        }
    }

    /// Uninstalls `package_id`.
    ///
    /// Capabilities are unregistered before any file is touched, so they stop
    /// resolving even if deletion fails. Files that cannot be deleted are left
    /// under a `P-remove` tombstone for the next reconciliation.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::InvalidPackageId`] if `package_id` is not a valid id
    /// - [`LifecycleError::PartialCleanupFailure`] if files survive and the
    ///   tombstone cannot be written either
    pub fn uninstall(&self, package_id: &str) -> Result<UninstallOutcome> {
        let id = parse_package_id(package_id)?;
        let _writer = self.lock_writer();

        let removed = {
            let mut table = self.write_table();
            table.transient.remove(&id);
            let removed = table.active.remove(&id);
            if let Some(plugin) = &removed {
                let retired = self.registry.retire(&id, &plugin.capability_ids());
                tracing::debug!("Retired {} capabilities of {}", retired, id);
            }
            removed
        };

        let live = self.layout.live_dir(&id);
        let staging = self.layout.cache_dir(&id);
        let tombstone = self.layout.tombstone(&id);
        let had_tombstone = self.fs.exists(&tombstone);

        if removed.is_none()
            && !had_tombstone
            && !self.fs.exists(&live)
            && !self.fs.exists(&staging)
        {
            tracing::debug!("Uninstall of {}: nothing installed", id);
            return Ok(UninstallOutcome::NotInstalled);
        }

        for dir in [&staging, &live] {
            if self.fs.exists(dir)
                && let Err(e) = self.fs.remove_dir_all(dir)
            {
                tracing::warn!("Could not delete {}: {}", dir.display(), e);
            }
        }

        if self.fs.exists(&live) || self.fs.exists(&staging) {
            self.write_table()
                .transient
                .insert(id.clone(), PluginState::PendingRemoval);

            if !had_tombstone {
                self.fs.write(&tombstone, b"").map_err(|e| {
                    LifecycleError::PartialCleanupFailure {
                        package_id: id.clone(),
                        reason: format!("files remain and tombstone could not be written: {e}"),
                    }
                })?;
            }
            tracing::info!("Uninstalled {}; file removal deferred", id);
            return Ok(UninstallOutcome::Deferred);
        }

        if had_tombstone && let Err(e) = self.fs.remove_file(&tombstone) {
            tracing::warn!("Could not delete tombstone {}: {}", tombstone.display(), e);
        }
        tracing::info!("Uninstalled {}", id);
        Ok(UninstallOutcome::Removed)
    }

    /// Returns the active plugin for `id`.
    #[must_use]
    pub fn get_plugin(&self, id: &PackageId) -> Option<Plugin> {
        self.read_table().active.get(id).cloned()
    }

    /// Returns all active plugins, sorted by package id.
    #[must_use]
    pub fn list_plugins(&self) -> Vec<Plugin> {
        let mut plugins: Vec<_> = self.read_table().active.values().cloned().collect();
        plugins.sort_by(|a, b| a.package_id.cmp(&b.package_id));
        plugins
    }

    /// Returns the lifecycle state of `id`.
    #[must_use]
    pub fn state(&self, id: &PackageId) -> PluginState {
        self.read_table().state(id)
    }

    /// Stages `bundle` into `P-cache/`, binds it, and promotes it to the live
    /// slot. The staging directory is discarded on any error before promotion.
    fn stage_and_promote(
        &self,
        bundle: &Path,
        manifest: &BundleManifest,
    ) -> Result<(InstallRecord, BoundModule)> {
        let id = &manifest.package_id;
        let staging = self.layout.cache_dir(id);

        if self.fs.exists(&staging) {
            tracing::debug!("Removing stale staging directory: {}", staging.display());
            self.fs
                .remove_dir_all(&staging)
                .map_err(|e| staging_failure(id, "clear stale staging directory", &e))?;
        }
        self.fs
            .create_dir_all(&staging)
            .map_err(|e| staging_failure(id, "create staging directory", &e))?;
        let guard = StagingGuard::new(self.fs.as_ref(), staging);

        let staged_bundle = guard.path().join(self.layout.bundle_file_name(id));
        let bytes = self
            .fs
            .copy_file(bundle, &staged_bundle)
            .map_err(|e| staging_failure(id, "copy bundle", &e))?;

        let resources = self
            .extractor
            .extract(bundle, &guard.path().join(RESOURCE_DIR), self.fs.as_ref())
            .map_err(|e| staging_failure(id, "extract resources", &e))?;

        let data = self
            .fs
            .read(&staged_bundle)
            .map_err(|e| staging_failure(id, "read staged bundle", &e))?;
        let record = InstallRecord::new(manifest, calculate_checksum(&data));
        let json = serde_json::to_vec_pretty(&record)?;
        // the record is written last: a staging directory without one is incomplete
        self.fs
            .write(&guard.path().join(RECORD_FILE), &json)
            .map_err(|e| staging_failure(id, "write install record", &e))?;
        tracing::debug!(
            "Staged {} ({} bytes, {} resources)",
            id,
            bytes,
            resources
        );

        let module = self.bind(&staged_bundle, manifest)?;

        self.promote(id, guard)?;

        let tombstone = self.layout.tombstone(id);
        if self.fs.exists(&tombstone) {
            // if this fails the new files stay marked for removal and the
            // next reconciliation purges them
            self.fs
                .remove_file(&tombstone)
                .map_err(|e| staging_failure(id, "clear pending removal", &e))?;
            tracing::debug!("Cleared tombstone for {}", id);
        }

        Ok((record, module))
    }

    /// Swaps the staged directory into the live slot of `id`.
    ///
    /// The previous live directory is moved inside the staging directory
    /// first, so the rename carries it along and a failed rename can put it
    /// back. If it cannot be put back, the staging directory is kept: it is
    /// complete, and the next reconciliation promotes it.
    fn promote(&self, id: &PackageId, guard: StagingGuard<'_>) -> Result<()> {
        let live = self.layout.live_dir(id);
        let backup = guard.path().join(PREVIOUS_DIR);
        let had_live = self.fs.exists(&live);

        if had_live {
            self.fs
                .rename(&live, &backup)
                .map_err(|e| staging_failure(id, "move previous live directory aside", &e))?;
        }

        if let Err(e) = self.fs.rename(guard.path(), &live) {
            if had_live && let Err(restore) = self.fs.rename(&backup, &live) {
                tracing::error!(
                    "Could not restore previous version of {}: {}; staged upgrade kept in {}",
                    id,
                    restore,
                    guard.path().display()
                );
                guard.commit();
            }
            return Err(staging_failure(id, "promote staging directory", &e));
        }
        guard.commit();

        let carried = live.join(PREVIOUS_DIR);
        if had_live && let Err(e) = self.fs.remove_dir_all(&carried) {
            tracing::warn!("Could not delete {}: {}", carried.display(), e);
        }

        tracing::debug!("Promoted {} into {}", id, live.display());
        Ok(())
    }

    /// Loads the module in `bundle`, checking host compatibility first and
    /// that every declared capability was bound.
    fn bind(&self, bundle: &Path, manifest: &BundleManifest) -> Result<BoundModule> {
        if let Some(required) = manifest.min_host_version
            && required > self.config.host_version
        {
            return Err(LifecycleError::IncompatibleHost {
                package_id: manifest.package_id.clone(),
                required,
                host: self.config.host_version,
            });
        }

        let module = self.loader.load(bundle, manifest)?;

        if let Some(missing) = manifest
            .capabilities
            .iter()
            .find(|capability| !module.contains(&capability.id))
        {
            return Err(LifecycleError::LoadFailure {
                package_id: manifest.package_id.clone(),
                reason: format!("module did not bind capability '{}'", missing.id),
            });
        }

        Ok(module)
    }

    /// Records `plugin` as active and swaps its capabilities into the
    /// registry, retiring those of `previous`.
    fn activate(&self, plugin: Plugin, module: BoundModule, previous: Option<&Plugin>) -> Plugin {
        let retired = previous.map(Plugin::capability_ids).unwrap_or_default();

        let mut table = self.write_table();
        self.registry
            .swap(&plugin.package_id, &retired, module.into_entries());
        table.transient.remove(&plugin.package_id);
        table
            .active
            .insert(plugin.package_id.clone(), plugin.clone());
        plugin
    }

    /// Reads an install record, `None` if the slot has none.
    fn read_record(&self, path: &Path) -> Result<Option<InstallRecord>> {
        if !self.fs.exists(path) {
            return Ok(None);
        }

        let content = self.fs.read(path)?;
        let record: InstallRecord =
            serde_json::from_slice(&content).map_err(|e| LifecycleError::InvalidRecord {
                path: path.to_path_buf(),
                reason: format!("Failed to parse JSON: {e}"),
            })?;

        if record.format_version != FORMAT_VERSION {
            return Err(LifecycleError::InvalidRecord {
                path: path.to_path_buf(),
                reason: format!(
                    "Unsupported format version: {} (expected {})",
                    record.format_version, FORMAT_VERSION
                ),
            });
        }

        Ok(Some(record))
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Plugin manager writer lock was poisoned; continuing");
            PoisonError::into_inner(poisoned)
        })
    }

    fn read_table(&self) -> RwLockReadGuard<'_, PluginTable> {
        self.table.read().unwrap_or_else(|poisoned| {
            tracing::warn!("Plugin table lock was poisoned; continuing");
            PoisonError::into_inner(poisoned)
        })
    }

    fn write_table(&self) -> RwLockWriteGuard<'_, PluginTable> {
        self.table.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Plugin table lock was poisoned; continuing");
            PoisonError::into_inner(poisoned)
        })
    }
}

fn staging_failure(id: &PackageId, step: &str, error: &dyn fmt::Display) -> LifecycleError {
    LifecycleError::StagingFailure {
        package_id: id.clone(),
        reason: format!("{step}: {error}"),
    }
}

/// Validates a package id supplied by a caller.
fn parse_package_id(id: &str) -> Result<PackageId> {
    PackageId::new(id).map_err(|e| LifecycleError::InvalidPackageId {
        id: id.to_string(),
        reason: e.to_string(),
    })
}
