//! Module loading: bind a bundle's declared capabilities to constructors.

use crate::error::{LifecycleError, Result};
use crate::types::BundleManifest;
use apf_core::{CapabilityId, InterfaceId};
use apf_registry::{Implementation, Instance};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Capabilities a loaded module exposes, ready to register.
#[derive(Debug, Default)]
pub struct BoundModule {
    entries: Vec<(CapabilityId, Arc<Implementation>)>,
}

impl BoundModule {
    /// Creates an empty module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a bound capability.
    pub fn bind(&mut self, id: CapabilityId, implementation: Implementation) {
        self.entries.push((id, Arc::new(implementation)));
    }

    /// Returns `true` if `id` is bound.
    #[must_use]
    pub fn contains(&self, id: &CapabilityId) -> bool {
        self.entries.iter().any(|(bound, _)| bound == id)
    }

    /// Returns the number of bound capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes the module, yielding its registry entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<(CapabilityId, Arc<Implementation>)> {
        self.entries
    }
}

/// Turns a bundle into callable constructors.
pub trait ModuleLoader: Send + Sync + fmt::Debug {
    /// Loads the module in `bundle` and binds the capabilities `manifest`
    /// declares.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::LoadFailure`] if the module cannot be loaded
    /// or a declared capability cannot be bound.
    fn load(&self, bundle: &Path, manifest: &BundleManifest) -> Result<BoundModule>;
}

type Factory = Arc<dyn Fn() -> Instance + Send + Sync>;

struct FactoryEntry {
    interfaces: Vec<InterfaceId>,
    factory: Factory,
}

/// Loader backed by a table of constructors the host links in.
///
/// Each capability's locator names an entry in the table. The interfaces of
/// the bound implementation are the entry's own interfaces plus any the
/// manifest declares.
///
/// # Examples
///
/// ```
/// use apf_core::InterfaceId;
/// use apf_plugin_store::FactoryModuleLoader;
///
/// struct Greeter;
///
/// let loader = FactoryModuleLoader::new()
///     .with_factory("greeter", [InterfaceId::new("ISayable")], || Greeter);
/// assert!(loader.has_locator("greeter"));
/// ```
#[derive(Default)]
pub struct FactoryModuleLoader {
    factories: HashMap<String, FactoryEntry>,
}

impl fmt::Debug for FactoryModuleLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut locators: Vec<_> = self.factories.keys().collect();
        locators.sort();
        f.debug_struct("FactoryModuleLoader")
            .field("locators", &locators)
            .finish()
    }
}

impl FactoryModuleLoader {
    /// Creates an empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a constructor under `locator`, replacing any previous one.
    #[must_use]
    pub fn with_factory<T, F>(
        mut self,
        locator: impl Into<String>,
        interfaces: impl IntoIterator<Item = InterfaceId>,
        constructor: F,
    ) -> Self
    where
        T: std::any::Any + Send,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.factories.insert(
            locator.into(),
            FactoryEntry {
                interfaces: interfaces.into_iter().collect(),
                factory: Arc::new(move || Box::new(constructor()) as Instance),
            },
        );
        self
    }

    /// Returns `true` if a constructor is registered under `locator`.
    #[must_use]
    pub fn has_locator(&self, locator: &str) -> bool {
        self.factories.contains_key(locator)
    }
}

impl ModuleLoader for FactoryModuleLoader {
    fn load(&self, bundle: &Path, manifest: &BundleManifest) -> Result<BoundModule> {
        let mut module = BoundModule::new();

        for capability in &manifest.capabilities {
            let entry = self.factories.get(&capability.locator).ok_or_else(|| {
                LifecycleError::LoadFailure {
                    package_id: manifest.package_id.clone(),
                    reason: format!(
                        "no constructor for locator '{}' (capability '{}')",
                        capability.locator, capability.id
                    ),
                }
            })?;

            let factory = Arc::clone(&entry.factory);
            let interfaces = entry
                .interfaces
                .iter()
                .chain(&capability.interfaces)
                .cloned();
            module.bind(
                capability.id.clone(),
                Implementation::from_boxed(capability.locator.clone(), interfaces, move || {
                    factory()
                }),
            );
        }

        tracing::debug!(
            "Bound {} capabilities from {}",
            module.len(),
            bundle.display()
        );
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CapabilityDecl;
    use apf_core::{PackageId, PluginVersion};

    struct Greeter;

    fn manifest(locators: &[(&str, &str)]) -> BundleManifest {
        BundleManifest {
            package_id: PackageId::new("com.x.plugin").unwrap(),
            version: PluginVersion::new(1),
            version_name: None,
            display_name: None,
            description: None,
            min_host_version: None,
            capabilities: locators
                .iter()
                .map(|(id, locator)| CapabilityDecl {
                    id: CapabilityId::new(*id).unwrap(),
                    locator: (*locator).to_string(),
                    interfaces: vec![InterfaceId::new("IDeclared")],
                })
                .collect(),
        }
    }

    #[test]
    fn test_load_binds_declared_capabilities() {
        let loader = FactoryModuleLoader::new().with_factory(
            "greeter",
            [InterfaceId::new("ISayable")],
            || Greeter,
        );

        let module = loader
            .load(Path::new("x.bundle"), &manifest(&[("greet", "greeter")]))
            .unwrap();
        assert!(module.contains(&CapabilityId::new("greet").unwrap()));

        let entries = module.into_entries();
        let imp = &entries[0].1;
        assert!(imp.satisfies(&InterfaceId::new("ISayable")));
        assert!(imp.satisfies(&InterfaceId::new("IDeclared")));
        assert!(imp.instantiate_as::<Greeter>().is_some());
    }

    #[test]
    fn test_load_unknown_locator_fails() {
        let loader = FactoryModuleLoader::new();
        let result = loader.load(Path::new("x.bundle"), &manifest(&[("greet", "missing")]));

        match result {
            Err(LifecycleError::LoadFailure { reason, .. }) => {
                assert!(reason.contains("missing"));
            }
            other => panic!("Expected LoadFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_each_load_yields_fresh_implementations() {
        let loader = FactoryModuleLoader::new().with_factory("greeter", [], || Greeter);
        let m = manifest(&[("greet", "greeter")]);

        let first = loader.load(Path::new("x"), &m).unwrap().into_entries();
        let second = loader.load(Path::new("x"), &m).unwrap().into_entries();
        assert!(!Arc::ptr_eq(&first[0].1, &second[0].1));
    }
}
