//! Startup reconciliation of on-disk plugin slots.

use super::{PluginManager, staging_failure};
use crate::checksum::{calculate_checksum, verify_checksum};
use crate::error::{LifecycleError, Result};
use crate::layout::SlotEntries;
use crate::types::{
    InstallRecord, PREVIOUS_DIR, Plugin, PluginState, RECORD_FILE, ReconcileFailure,
    ReconcileReport,
};
use apf_core::PackageId;

impl PluginManager {
    /// Replays interrupted transitions and activates every installed plugin.
    ///
    /// Run once before serving requests. Slot entries are grouped by package
    /// id and handled in sorted order, with precedence
    /// tombstone > staged > live:
    ///
    /// - `P-remove`: delete `P/` and `P-cache/`, then the tombstone; nothing
    ///   is registered.
    /// - `P-cache/`: an upgrade was interrupted after staging; replace `P/`
    ///   with it and activate.
    /// - `P/` only: activate.
    ///
    /// A plugin that fails to load is logged, reported, and skipped; it never
    /// stops the remaining plugins from loading.
    ///
    /// # Errors
    ///
    /// Returns an I/O error only if the plugins root cannot be listed.
    pub fn reconcile(&self) -> Result<ReconcileReport> {
        let _writer = self.lock_writer();

        let slots = self.layout.scan(self.fs.as_ref())?;
        tracing::info!(
            "Reconciling {} plugin slots in {}",
            slots.len(),
            self.layout.root().display()
        );

        let mut report = ReconcileReport::default();
        for (id, entries) in slots {
            if entries.tombstone {
                self.purge(&id, &mut report);
                continue;
            }

            if entries.cache {
                match self.recover_staged(&id, entries) {
                    Ok(true) => report.promoted.push(id.clone()),
                    Ok(false) => {}
                    Err(e) => {
                        skip(&mut report, id, &e);
                        continue;
                    }
                }
            }

            match self.load_live(&id) {
                Ok(plugin) => {
                    tracing::info!("Loaded {} v{}", plugin.package_id, plugin.version);
                    report.loaded.push(id);
                }
                Err(e) => skip(&mut report, id, &e),
            }
        }

        tracing::info!(
            "Reconciled plugins: {} loaded, {} promoted, {} purged, {} failed",
            report.loaded.len(),
            report.promoted.len(),
            report.purged.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Honors a tombstone: removes every file of `id`.
    fn purge(&self, id: &PackageId, report: &mut ReconcileReport) {
        {
            let mut table = self.write_table();
            if let Some(plugin) = table.active.remove(id) {
                self.registry.retire(id, &plugin.capability_ids());
            }
        }

        let mut remaining = Vec::new();
        for dir in [self.layout.live_dir(id), self.layout.cache_dir(id)] {
            if self.fs.exists(&dir)
                && let Err(e) = self.fs.remove_dir_all(&dir)
            {
                tracing::warn!("Could not delete {}: {}", dir.display(), e);
                remaining.push(dir);
            }
        }

        if !remaining.is_empty() {
            self.write_table()
                .transient
                .insert(id.clone(), PluginState::PendingRemoval);
            report.failed.push(ReconcileFailure {
                package_id: id.clone(),
                reason: format!(
                    "removal still pending, {} directories could not be deleted",
                    remaining.len()
                ),
            });
            return;
        }

        let tombstone = self.layout.tombstone(id);
        if let Err(e) = self.fs.remove_file(&tombstone) {
            tracing::warn!("Could not delete tombstone {}: {}", tombstone.display(), e);
        }
        self.write_table().transient.remove(id);
        tracing::info!("Purged {}", id);
        report.purged.push(id.clone());
    }

    /// Completes an interrupted upgrade by promoting `P-cache/`.
    ///
    /// A staged directory without an install record was interrupted before
    /// staging finished. If a live slot exists it is kept and the partial
    /// staging discarded. Returns whether a promotion happened.
    fn recover_staged(&self, id: &PackageId, entries: SlotEntries) -> Result<bool> {
        let live = self.layout.live_dir(id);
        let staging = self.layout.cache_dir(id);

        if entries.live && !self.fs.exists(&staging.join(RECORD_FILE)) {
            tracing::warn!(
                "Discarding incomplete staging directory {}",
                staging.display()
            );
            if let Err(e) = self.fs.remove_dir_all(&staging) {
                tracing::warn!("Could not delete {}: {}", staging.display(), e);
            }
            return Ok(false);
        }

        if entries.live {
            self.fs
                .remove_dir_all(&live)
                .map_err(|e| staging_failure(id, "remove stale live directory", &e))?;
        }
        self.fs
            .rename(&staging, &live)
            .map_err(|e| staging_failure(id, "promote staging directory", &e))?;

        tracing::info!("Promoted staged upgrade of {}", id);
        Ok(true)
    }

    /// Activates the plugin in the live slot of `id`.
    ///
    /// A previous version left inside the slot by an interrupted promotion
    /// is deleted first.
    fn load_live(&self, id: &PackageId) -> Result<Plugin> {
        let live = self.layout.live_dir(id);
        let previous = live.join(PREVIOUS_DIR);
        if self.fs.exists(&previous) {
            tracing::debug!("Deleting replaced version {}", previous.display());
            if let Err(e) = self.fs.remove_dir_all(&previous) {
                tracing::warn!("Could not delete {}: {}", previous.display(), e);
            }
        }

        let bundle = live.join(self.layout.bundle_file_name(id));
        if !self.fs.exists(&bundle) {
            return Err(LifecycleError::NotFound { path: bundle });
        }

        let manifest = self.inspector.inspect(&bundle)?;
        if manifest.package_id != *id {
            return Err(LifecycleError::MalformedBundle {
                path: bundle,
                reason: format!(
                    "bundle declares package '{}' but occupies slot '{}'",
                    manifest.package_id, id
                ),
            });
        }

        let data = self.fs.read(&bundle)?;
        let checksum = calculate_checksum(&data);
        let record_path = live.join(RECORD_FILE);

        let installed_at = match self.read_record(&record_path)? {
            Some(record) => {
                if self.config.verify_checksums {
                    verify_checksum(
                        &data,
                        &record.bundle_checksum,
                        &bundle.display().to_string(),
                    )?;
                }
                record.installed_at
            }
            None => {
                let record = InstallRecord::new(&manifest, checksum.clone());
                match serde_json::to_vec_pretty(&record) {
                    Ok(json) => {
                        if let Err(e) = self.fs.write(&record_path, &json) {
                            tracing::warn!(
                                "Could not write install record {}: {}",
                                record_path.display(),
                                e
                            );
                        }
                    }
                    Err(e) => tracing::warn!("Could not serialize install record: {}", e),
                }
                record.installed_at
            }
        };

        let module = self.bind(&bundle, &manifest)?;

        let record = InstallRecord {
            installed_at,
            ..InstallRecord::new(&manifest, checksum)
        };
        let previous = self.read_table().active.get(id).cloned();
        Ok(self.activate(Plugin::from(record), module, previous.as_ref()))
    }
}

fn skip(report: &mut ReconcileReport, id: PackageId, error: &LifecycleError) {
    tracing::warn!("Skipping plugin {}: {}", id, error);
    report.failed.push(ReconcileFailure {
        package_id: id,
        reason: error.to_string(),
    });
}
