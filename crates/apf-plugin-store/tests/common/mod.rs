//! Shared fixtures for lifecycle integration tests.

#![allow(dead_code)]

use apf_core::{InterfaceId, LoaderConfig};
use apf_plugin_store::{FactoryModuleLoader, FileSystem, OsFileSystem, PluginManager};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub trait Sayable {
    fn say(&self) -> String;
}

pub type SayableBox = Box<dyn Sayable + Send>;

struct Greeter;

impl Sayable for Greeter {
    fn say(&self) -> String {
        "hello".to_string()
    }
}

struct Shouter;

impl Sayable for Shouter {
    fn say(&self) -> String {
        "HELLO".to_string()
    }
}

pub fn sayable() -> InterfaceId {
    InterfaceId::of::<dyn Sayable>()
}

/// Loader knowing the locators used by the test bundles.
pub fn loader() -> FactoryModuleLoader {
    let mut loader = FactoryModuleLoader::new()
        .with_factory("greeter", [sayable()], || Box::new(Greeter) as SayableBox)
        .with_factory("shouter", [sayable()], || Box::new(Shouter) as SayableBox)
        .with_factory("legacy", [], || ());
    for version in 1..=5 {
        loader = loader.with_factory(format!("v{version}"), [], move || version);
    }
    loader
}

pub fn config(root: &Path) -> LoaderConfig {
    LoaderConfig::builder().plugins_dir(root).build()
}

pub fn manager(root: &Path, fs: FaultyFs) -> PluginManager {
    PluginManager::builder(config(root), loader())
        .file_system(fs)
        .build()
        .unwrap()
}

/// Writes a JSON bundle declaring `capabilities` as `(id, locator)` pairs.
pub fn write_bundle(
    dir: &Path,
    file: &str,
    package: &str,
    version: u64,
    capabilities: &[(&str, &str)],
) -> PathBuf {
    let capabilities: Vec<_> = capabilities
        .iter()
        .map(|(id, locator)| serde_json::json!({"id": id, "locator": locator}))
        .collect();
    let path = dir.join(file);
    fs::write(
        &path,
        serde_json::json!({
            "package_id": package,
            "version": version,
            "display_name": format!("{package} test plugin"),
            "description": format!("Capabilities of {package}"),
            "capabilities": capabilities,
        })
        .to_string(),
    )
    .unwrap();
    path
}

/// [`FileSystem`] that can simulate locked paths and failing copies or renames.
///
/// Clones share state, so a test can keep a handle while the manager owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct FaultyFs {
    inner: OsFileSystem,
    locked: Arc<Mutex<HashSet<PathBuf>>>,
    fail_copies: Arc<AtomicBool>,
    fail_renames: Arc<Mutex<HashMap<PathBuf, usize>>>,
}

impl FaultyFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every mutation touching `path` fail, as if a file were in use.
    pub fn lock(&self, path: impl Into<PathBuf>) {
        self.locked.lock().unwrap().insert(path.into());
    }

    pub fn unlock_all(&self) {
        self.locked.lock().unwrap().clear();
    }

    pub fn fail_copies(&self, fail: bool) {
        self.fail_copies.store(fail, Ordering::SeqCst);
    }

    /// Makes the next `times` renames onto `to` fail.
    pub fn fail_renames_to(&self, to: impl Into<PathBuf>, times: usize) {
        self.fail_renames.lock().unwrap().insert(to.into(), times);
    }

    fn check_rename(&self, to: &Path) -> io::Result<()> {
        let mut failing = self.fail_renames.lock().unwrap();
        match failing.get_mut(to) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(io::Error::other("rename failed"))
            }
            _ => Ok(()),
        }
    }

    fn check(&self, path: &Path) -> io::Result<()> {
        let locked = self.locked.lock().unwrap();
        if locked
            .iter()
            .any(|l| l.starts_with(path) || path.starts_with(l))
        {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is in use", path.display()),
            ));
        }
        Ok(())
    }
}

impl FileSystem for FaultyFs {
    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        self.inner.read_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.inner.create_dir_all(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        self.check(path)?;
        self.inner.remove_dir_all(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.check(path)?;
        self.inner.remove_file(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.check(from)?;
        self.check(to)?;
        self.check_rename(to)?;
        self.inner.rename(from, to)
    }

    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
        if self.fail_copies.load(Ordering::SeqCst) {
            return Err(io::Error::other("disk full"));
        }
        self.inner.copy_file(from, to)
    }

    fn copy_tree(&self, from: &Path, to: &Path) -> io::Result<usize> {
        if self.fail_copies.load(Ordering::SeqCst) {
            return Err(io::Error::other("disk full"));
        }
        self.inner.copy_tree(from, to)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.inner.read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.check(path)?;
        self.inner.write(path, contents)
    }
}
