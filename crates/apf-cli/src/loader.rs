//! Module loader used by the `apf` binary.
//!
//! The binary links no plugin code, so it cannot construct real
//! implementations. [`DeclaredModuleLoader`] binds each declared capability
//! to an implementation whose instances are the declaration itself. That is
//! enough to drive the lifecycle and answer resolution queries from the
//! command line.

use apf_plugin_store::{BoundModule, BundleManifest, ModuleLoader, Result};
use apf_registry::Implementation;
use std::path::Path;

/// Binds every declared capability to its own [`apf_plugin_store::CapabilityDecl`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredModuleLoader;

impl ModuleLoader for DeclaredModuleLoader {
    fn load(&self, bundle: &Path, manifest: &BundleManifest) -> Result<BoundModule> {
        let mut module = BoundModule::new();
        for capability in &manifest.capabilities {
            let declaration = capability.clone();
            module.bind(
                capability.id.clone(),
                Implementation::new(
                    capability.locator.clone(),
                    capability.interfaces.iter().cloned(),
                    move || declaration.clone(),
                ),
            );
        }

        tracing::debug!(
            "Bound {} declared capabilities from {}",
            module.len(),
            bundle.display()
        );
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apf_core::{CapabilityId, InterfaceId};
    use apf_plugin_store::CapabilityDecl;

    #[test]
    fn test_binds_declarations() {
        let manifest: BundleManifest = serde_json::from_str(
            r#"{
                "package_id": "com.x.plugin",
                "version": 1,
                "capabilities": [
                    {"id": "greet", "locator": "impl.Greeter", "interfaces": ["ISayable"]}
                ]
            }"#,
        )
        .unwrap();

        let module = DeclaredModuleLoader
            .load(Path::new("x.bundle"), &manifest)
            .unwrap();
        let entries = module.into_entries();
        assert_eq!(entries.len(), 1);

        let (id, imp) = &entries[0];
        assert_eq!(id, &CapabilityId::new("greet").unwrap());
        assert_eq!(imp.name(), "impl.Greeter");
        assert!(imp.satisfies(&InterfaceId::new("ISayable")));

        let instance = imp.instantiate_as::<CapabilityDecl>().unwrap();
        assert_eq!(instance.locator, "impl.Greeter");
    }
}
