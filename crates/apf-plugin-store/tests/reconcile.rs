//! Integration tests for startup reconciliation.
//!
//! Each test prepares a plugins root (usually through a first manager), then
//! starts a fresh manager on it the way a restarted host would.

mod common;

use apf_core::{CapabilityId, PackageId};
use apf_plugin_store::{
    FileSystem, OsFileSystem, PluginManager, PluginState, RECORD_FILE, UninstallOutcome,
};
use common::{FaultyFs, config, loader, manager, write_bundle};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const PACKAGE: &str = "com.x.plugin";

fn pkg(id: &str) -> PackageId {
    PackageId::new(id).unwrap()
}

fn cap(id: &str) -> CapabilityId {
    CapabilityId::new(id).unwrap()
}

fn install(root: &Path, dir: &Path, package: &str, version: u64, caps: &[(&str, &str)]) {
    let bundle = write_bundle(dir, &format!("{package}-v{version}.bundle"), package, version, caps);
    manager(root, FaultyFs::new()).install(&bundle).unwrap();
}

#[test]
fn test_reconcile_loads_live_plugins() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("plugins");
    install(&root, temp.path(), "alpha", 1, &[("a", "greeter")]);
    install(&root, temp.path(), "beta", 3, &[("b", "shouter")]);

    let restarted = manager(&root, FaultyFs::new());
    let report = restarted.reconcile().unwrap();

    assert_eq!(report.loaded, vec![pkg("alpha"), pkg("beta")]);
    assert!(report.is_clean());
    assert_eq!(restarted.get_plugin(&pkg("beta")).unwrap().version.get(), 3);
    assert!(restarted.registry().resolve_by_id(&cap("a")).is_some());
    assert!(restarted.registry().resolve_by_id(&cap("b")).is_some());
}

#[test]
fn test_reconcile_preserves_install_time() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("plugins");
    let bundle = write_bundle(temp.path(), "x.bundle", PACKAGE, 1, &[("greet", "greeter")]);
    let installed = manager(&root, FaultyFs::new()).install(&bundle).unwrap();

    let restarted = manager(&root, FaultyFs::new());
    restarted.reconcile().unwrap();

    assert_eq!(
        restarted.get_plugin(&pkg(PACKAGE)).unwrap().installed_at,
        installed.installed_at
    );
}

#[test]
fn test_tombstone_only_purges_everything() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("plugins");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join(format!("{PACKAGE}-remove")), b"").unwrap();

    let manager = manager(&root, FaultyFs::new());
    let report = manager.reconcile().unwrap();

    assert_eq!(report.purged, vec![pkg(PACKAGE)]);
    assert!(manager.get_plugin(&pkg(PACKAGE)).is_none());
    assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
}

#[test]
fn test_tombstone_with_staged_and_live_purges_all() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("plugins");
    install(&root, temp.path(), PACKAGE, 1, &[("greet", "greeter")]);
    install(&root, temp.path(), "beta", 1, &[("b", "shouter")]);
    OsFileSystem
        .copy_tree(&root.join(PACKAGE), &root.join(format!("{PACKAGE}-cache")))
        .unwrap();
    fs::write(root.join(format!("{PACKAGE}-remove")), b"").unwrap();

    let manager = manager(&root, FaultyFs::new());
    let report = manager.reconcile().unwrap();

    assert_eq!(report.purged, vec![pkg(PACKAGE)]);
    assert_eq!(report.loaded, vec![pkg("beta")]);
    assert!(report.promoted.is_empty());
    assert!(report.is_clean());
    assert!(manager.get_plugin(&pkg(PACKAGE)).is_none());
    assert_eq!(manager.state(&pkg(PACKAGE)), PluginState::Absent);
    assert!(manager.registry().resolve_by_id(&cap("greet")).is_none());
    assert!(manager.registry().resolve_by_id(&cap("b")).is_some());

    let remaining: Vec<_> = fs::read_dir(&root)
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(remaining, vec!["beta"]);
}

#[test]
fn test_tombstone_with_staged_only_purges_staged() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("plugins");
    install(&root, temp.path(), PACKAGE, 2, &[("greet", "greeter")]);
    fs::rename(root.join(PACKAGE), root.join(format!("{PACKAGE}-cache"))).unwrap();
    fs::write(root.join(format!("{PACKAGE}-remove")), b"").unwrap();

    let manager = manager(&root, FaultyFs::new());
    let report = manager.reconcile().unwrap();

    assert_eq!(report.purged, vec![pkg(PACKAGE)]);
    assert!(report.promoted.is_empty());
    assert!(report.loaded.is_empty());
    assert!(manager.registry().resolve_by_id(&cap("greet")).is_none());
    assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
}

#[test]
fn test_deferred_uninstall_completes_on_restart() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("plugins");
    let locked = FaultyFs::new();
    let first = manager(&root, locked.clone());
    let bundle = write_bundle(temp.path(), "x.bundle", PACKAGE, 1, &[("greet", "greeter")]);
    first.install(&bundle).unwrap();
    locked.lock(root.join(PACKAGE));
    assert_eq!(first.uninstall(PACKAGE).unwrap(), UninstallOutcome::Deferred);

    let restarted = manager(&root, FaultyFs::new());
    let report = restarted.reconcile().unwrap();

    assert_eq!(report.purged, vec![pkg(PACKAGE)]);
    assert!(report.loaded.is_empty());
    assert!(restarted.registry().resolve_by_id(&cap("greet")).is_none());
    assert!(!root.join(PACKAGE).exists());
    assert!(!root.join(format!("{PACKAGE}-remove")).exists());
}

#[test]
fn test_tombstone_with_locked_files_stays_pending() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("plugins");
    install(&root, temp.path(), PACKAGE, 1, &[("greet", "greeter")]);
    fs::write(root.join(format!("{PACKAGE}-remove")), b"").unwrap();

    let locked = FaultyFs::new();
    locked.lock(root.join(PACKAGE));
    let manager = manager(&root, locked);
    let report = manager.reconcile().unwrap();

    assert!(report.purged.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(manager.state(&pkg(PACKAGE)), PluginState::PendingRemoval);
    assert!(manager.registry().resolve_by_id(&cap("greet")).is_none());
    assert!(root.join(format!("{PACKAGE}-remove")).exists());
}

#[test]
fn test_staged_only_is_promoted() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("plugins");
    install(&root, temp.path(), PACKAGE, 2, &[("greet", "greeter")]);
    // crash after staging, before the old live directory was replaced
    fs::rename(root.join(PACKAGE), root.join(format!("{PACKAGE}-cache"))).unwrap();

    let manager = manager(&root, FaultyFs::new());
    let report = manager.reconcile().unwrap();

    assert_eq!(report.promoted, vec![pkg(PACKAGE)]);
    assert_eq!(report.loaded, vec![pkg(PACKAGE)]);
    assert_eq!(manager.get_plugin(&pkg(PACKAGE)).unwrap().version.get(), 2);
    assert!(root.join(PACKAGE).is_dir());
    assert!(!root.join(format!("{PACKAGE}-cache")).exists());
}

#[test]
fn test_interrupted_upgrade_replaces_stale_live() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("plugins");
    let saved_v1 = temp.path().join("saved-v1");

    install(&root, temp.path(), PACKAGE, 1, &[("legacy", "legacy")]);
    OsFileSystem.copy_tree(&root.join(PACKAGE), &saved_v1).unwrap();
    install(&root, temp.path(), PACKAGE, 2, &[("greet", "greeter")]);
    // v2 staged, v1 still live
    fs::rename(root.join(PACKAGE), root.join(format!("{PACKAGE}-cache"))).unwrap();
    fs::rename(&saved_v1, root.join(PACKAGE)).unwrap();

    let manager = manager(&root, FaultyFs::new());
    let report = manager.reconcile().unwrap();

    assert_eq!(report.promoted, vec![pkg(PACKAGE)]);
    assert_eq!(manager.get_plugin(&pkg(PACKAGE)).unwrap().version.get(), 2);
    assert!(manager.registry().resolve_by_id(&cap("greet")).is_some());
    assert!(manager.registry().resolve_by_id(&cap("legacy")).is_none());
}

#[test]
fn test_replaced_version_left_in_live_slot_is_deleted() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("plugins");
    let saved_v1 = temp.path().join("saved-v1");

    install(&root, temp.path(), PACKAGE, 1, &[("legacy", "legacy")]);
    OsFileSystem.copy_tree(&root.join(PACKAGE), &saved_v1).unwrap();
    install(&root, temp.path(), PACKAGE, 2, &[("greet", "greeter")]);
    // crash after promotion, before the replaced version was deleted
    fs::rename(&saved_v1, root.join(PACKAGE).join(".previous")).unwrap();

    let manager = manager(&root, FaultyFs::new());
    let report = manager.reconcile().unwrap();

    assert_eq!(report.loaded, vec![pkg(PACKAGE)]);
    assert_eq!(manager.get_plugin(&pkg(PACKAGE)).unwrap().version.get(), 2);
    assert!(!root.join(PACKAGE).join(".previous").exists());
    assert!(manager.registry().resolve_by_id(&cap("legacy")).is_none());
}

#[test]
fn test_incomplete_staging_is_discarded() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("plugins");
    install(&root, temp.path(), PACKAGE, 1, &[("greet", "greeter")]);
    let staging = root.join(format!("{PACKAGE}-cache"));
    fs::create_dir(&staging).unwrap();
    fs::write(staging.join(format!("{PACKAGE}.bundle")), b"{\"package_id\": ").unwrap();

    let manager = manager(&root, FaultyFs::new());
    let report = manager.reconcile().unwrap();

    assert!(report.promoted.is_empty());
    assert_eq!(report.loaded, vec![pkg(PACKAGE)]);
    assert_eq!(manager.get_plugin(&pkg(PACKAGE)).unwrap().version.get(), 1);
    assert!(!staging.exists());
}

#[test]
fn test_checksum_mismatch_skips_only_that_plugin() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("plugins");
    install(&root, temp.path(), "alpha", 1, &[("a", "greeter")]);
    install(&root, temp.path(), "beta", 1, &[("b", "shouter")]);

    // still a valid manifest, but not the bytes that were installed
    write_bundle(&root.join("alpha"), "alpha.bundle", "alpha", 7, &[("a", "greeter")]);

    let manager = manager(&root, FaultyFs::new());
    let report = manager.reconcile().unwrap();

    assert_eq!(report.loaded, vec![pkg("beta")]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].package_id, pkg("alpha"));
    assert!(report.failed[0].reason.contains("Checksum mismatch"));
    assert!(manager.registry().resolve_by_id(&cap("a")).is_none());
    assert!(manager.registry().resolve_by_id(&cap("b")).is_some());
}

#[test]
fn test_checksum_verification_can_be_disabled() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("plugins");
    install(&root, temp.path(), "alpha", 1, &[("a", "greeter")]);
    write_bundle(&root.join("alpha"), "alpha.bundle", "alpha", 7, &[("a", "greeter")]);

    let mut config = config(&root);
    config.verify_checksums = false;
    let manager = PluginManager::builder(config, loader()).build().unwrap();
    let report = manager.reconcile().unwrap();

    assert_eq!(report.loaded, vec![pkg("alpha")]);
    assert_eq!(manager.get_plugin(&pkg("alpha")).unwrap().version.get(), 7);
}

#[test]
fn test_load_failure_does_not_stop_reconciliation() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("plugins");
    install(&root, temp.path(), "alpha", 1, &[("a", "greeter")]);
    install(&root, temp.path(), "beta", 1, &[("b", "shouter")]);
    install(&root, temp.path(), "gamma", 1, &[("c", "legacy")]);

    // a host build that no longer links the "shouter" constructor
    let limited = apf_plugin_store::FactoryModuleLoader::new()
        .with_factory("greeter", [], || ())
        .with_factory("legacy", [], || ());
    let manager = PluginManager::builder(config(&root), limited)
        .build()
        .unwrap();
    let report = manager.reconcile().unwrap();

    assert_eq!(report.loaded, vec![pkg("alpha"), pkg("gamma")]);
    assert_eq!(report.failed[0].package_id, pkg("beta"));
    assert_eq!(manager.state(&pkg("beta")), PluginState::Absent);
}

#[test]
fn test_missing_record_is_regenerated() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("plugins");
    let live = root.join(PACKAGE);
    fs::create_dir_all(&live).unwrap();
    write_bundle(&live, &format!("{PACKAGE}.bundle"), PACKAGE, 4, &[("greet", "greeter")]);
    fs::write(root.join("README.txt"), b"stray files are ignored").unwrap();

    let manager = manager(&root, FaultyFs::new());
    let report = manager.reconcile().unwrap();

    assert_eq!(report.loaded, vec![pkg(PACKAGE)]);
    assert!(live.join(RECORD_FILE).is_file());
    assert_eq!(manager.get_plugin(&pkg(PACKAGE)).unwrap().version.get(), 4);
}

#[test]
fn test_bundle_in_wrong_slot_is_rejected() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("plugins");
    let live = root.join("alpha");
    fs::create_dir_all(&live).unwrap();
    write_bundle(&live, "alpha.bundle", "beta", 1, &[("b", "shouter")]);

    let manager = manager(&root, FaultyFs::new());
    let report = manager.reconcile().unwrap();

    assert!(report.loaded.is_empty());
    assert!(report.failed[0].reason.contains("occupies slot 'alpha'"));
    assert!(manager.registry().is_empty());
}
