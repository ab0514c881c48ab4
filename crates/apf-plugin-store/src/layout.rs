//! On-disk slot layout.
//!
//! For package `P` under the plugins root:
//!
//! ```text
//! plugins/
//! ├── P/                 # live slot
//! │   ├── P.bundle       # copied bundle
//! │   ├── plugin.json    # install record
//! │   └── lib/           # extracted resources
//! ├── P-cache/           # staged upgrade (same contents as a live slot)
//! └── P-remove           # zero-byte tombstone
//! ```

use crate::fs::FileSystem;
use apf_core::{CACHE_SUFFIX, PackageId, REMOVE_SUFFIX};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

/// Which slot entries exist for one package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotEntries {
    /// `P/` exists
    pub live: bool,
    /// `P-cache/` exists
    pub cache: bool,
    /// `P-remove` exists
    pub tombstone: bool,
}

/// Path arithmetic for plugin slots under one root.
#[derive(Debug, Clone)]
pub struct SlotLayout {
    root: PathBuf,
    bundle_extension: String,
}

impl SlotLayout {
    /// Creates a layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, bundle_extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            bundle_extension: bundle_extension.into(),
        }
    }

    /// Returns the plugins root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the live slot directory for `id`.
    #[must_use]
    pub fn live_dir(&self, id: &PackageId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Returns the staging directory for `id`.
    #[must_use]
    pub fn cache_dir(&self, id: &PackageId) -> PathBuf {
        self.root.join(format!("{id}{CACHE_SUFFIX}"))
    }

    /// Returns the tombstone marker path for `id`.
    #[must_use]
    pub fn tombstone(&self, id: &PackageId) -> PathBuf {
        self.root.join(format!("{id}{REMOVE_SUFFIX}"))
    }

    /// Returns the bundle file name inside a slot, `<id>.<ext>`.
    #[must_use]
    pub fn bundle_file_name(&self, id: &PackageId) -> String {
        format!("{id}.{}", self.bundle_extension)
    }

    /// Scans the root and groups slot entries by package id.
    ///
    /// Entries whose name is not a valid package id once the suffix is
    /// stripped, and stray files that are not tombstones, are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be listed.
    pub fn scan(&self, fs: &dyn FileSystem) -> io::Result<BTreeMap<PackageId, SlotEntries>> {
        let mut slots: BTreeMap<PackageId, SlotEntries> = BTreeMap::new();

        for path in fs.read_dir(&self.root)? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                tracing::warn!("Skipping non UTF-8 entry: {}", path.display());
                continue;
            };
            let is_dir = fs.is_dir(&path);

            let (stem, kind) = if let Some(stem) = name.strip_suffix(REMOVE_SUFFIX) {
                (stem, Kind::Tombstone)
            } else if let Some(stem) = name.strip_suffix(CACHE_SUFFIX)
                && is_dir
            {
                (stem, Kind::Cache)
            } else if is_dir {
                (name, Kind::Live)
            } else {
                tracing::debug!("Ignoring stray file in plugins root: {}", name);
                continue;
            };

            let Ok(id) = PackageId::new(stem) else {
                tracing::warn!("Ignoring slot entry with invalid package id: {}", name);
                continue;
            };

            let entries = slots.entry(id).or_default();
            match kind {
                Kind::Live => entries.live = true,
                Kind::Cache => entries.cache = true,
                Kind::Tombstone => entries.tombstone = true,
            }
        }

        Ok(slots)
    }
}

enum Kind {
    Live,
    Cache,
    Tombstone,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::OsFileSystem;
    use std::fs;
    use tempfile::TempDir;

    fn pkg(id: &str) -> PackageId {
        PackageId::new(id).unwrap()
    }

    #[test]
    fn test_slot_paths() {
        let layout = SlotLayout::new("/data/plugins", "bundle");
        let id = pkg("com.x.plugin");

        assert_eq!(layout.live_dir(&id), Path::new("/data/plugins/com.x.plugin"));
        assert_eq!(
            layout.cache_dir(&id),
            Path::new("/data/plugins/com.x.plugin-cache")
        );
        assert_eq!(
            layout.tombstone(&id),
            Path::new("/data/plugins/com.x.plugin-remove")
        );
        assert_eq!(layout.bundle_file_name(&id), "com.x.plugin.bundle");
    }

    #[test]
    fn test_scan_groups_by_package() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir(root.join("alpha")).unwrap();
        fs::create_dir(root.join("alpha-cache")).unwrap();
        fs::write(root.join("beta-remove"), b"").unwrap();
        fs::create_dir(root.join("gamma-cache")).unwrap();
        fs::write(root.join("notes.txt"), b"stray").unwrap();

        let layout = SlotLayout::new(root, "bundle");
        let slots = layout.scan(&OsFileSystem).unwrap();

        let ids: Vec<_> = slots.keys().map(PackageId::as_str).collect();
        assert_eq!(ids, vec!["alpha", "beta", "gamma"]);
        assert_eq!(
            slots[&pkg("alpha")],
            SlotEntries {
                live: true,
                cache: true,
                tombstone: false
            }
        );
        assert!(slots[&pkg("beta")].tombstone);
        assert!(!slots[&pkg("beta")].live);
        assert!(slots[&pkg("gamma")].cache);
    }

    #[test]
    fn test_scan_treats_cache_named_file_as_stray() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("alpha-cache"), b"not a dir").unwrap();

        let layout = SlotLayout::new(temp.path(), "bundle");
        assert!(layout.scan(&OsFileSystem).unwrap().is_empty());
    }
}
