//! Capability registry implementation.
//!
//! Provides the [`Registry`] type: a table from capability id to
//! implementation, a most-recent-first scan order, and a positive-only
//! interface resolution cache, all behind a single lock.

use crate::implementation::Implementation;
use apf_core::{CapabilityId, InterfaceId, PackageId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// One registered capability.
#[derive(Debug)]
struct Descriptor {
    implementation: Arc<Implementation>,
    rank: u64,
    owner: Option<PackageId>,
}

/// A snapshot of one registry entry.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    /// Capability id the implementation is registered under
    pub capability_id: CapabilityId,
    /// The registered implementation
    pub implementation: Arc<Implementation>,
    /// Package that registered it, `None` for host registrations
    pub owner: Option<PackageId>,
}

#[derive(Debug, Default)]
struct Inner {
    descriptors: HashMap<CapabilityId, Descriptor>,
    /// rank -> id; iterated in reverse for most-recent-first
    order: BTreeMap<u64, CapabilityId>,
    cache: HashMap<InterfaceId, Arc<Implementation>>,
    next_rank: u64,
}

impl Inner {
    fn insert(
        &mut self,
        id: CapabilityId,
        implementation: Arc<Implementation>,
        owner: Option<PackageId>,
    ) {
        self.remove(&id);

        let rank = self.next_rank;
        self.next_rank += 1;
        self.order.insert(rank, id.clone());
        self.descriptors.insert(
            id,
            Descriptor {
                implementation,
                rank,
                owner,
            },
        );
    }

    fn remove(&mut self, id: &CapabilityId) -> Option<Descriptor> {
        let descriptor = self.descriptors.remove(id)?;
        self.order.remove(&descriptor.rank);
        self.invalidate(&descriptor.implementation);
        Some(descriptor)
    }

    fn invalidate(&mut self, implementation: &Arc<Implementation>) {
        self.cache
            .retain(|_, cached| !Arc::ptr_eq(cached, implementation));
    }

    fn scan(&self, interface: &InterfaceId) -> Option<Arc<Implementation>> {
        self.order
            .values()
            .rev()
            .filter_map(|id| self.descriptors.get(id))
            .find(|d| d.implementation.satisfies(interface))
            .map(|d| Arc::clone(&d.implementation))
    }
}

/// Capability registry.
///
/// Maps capability ids to implementations and resolves interface requests to
/// the most recently registered implementation satisfying them.
///
/// # Resolution rules
///
/// - [`resolve_by_id`](Self::resolve_by_id) is an exact lookup.
/// - [`resolve_by_capability`](Self::resolve_by_capability) returns a cached
///   result if one exists, otherwise the *first* match in most-recent-first
///   registration order, which is then cached.
/// - "Not found" is never cached: a later registration becomes visible to the
///   next lookup without any explicit cache clear.
/// - Replacing or removing a registration purges every cache entry that
///   points at the old implementation.
///
/// # Thread Safety
///
/// `Registry` is `Send + Sync`. Descriptors, scan order, and cache share one
/// `RwLock`, so a reader never observes a descriptor change without the
/// matching cache invalidation. Lookups run concurrently; a cache miss takes
/// the write lock to populate the cache.
///
/// # Examples
///
/// ```
/// use apf_core::{CapabilityId, InterfaceId};
/// use apf_registry::{Implementation, Registry};
/// use std::sync::Arc;
///
/// struct ImplA;
/// struct ImplB;
///
/// let sayable = InterfaceId::new("ISayable");
/// let greet = CapabilityId::new("greet").unwrap();
/// let registry = Registry::new();
///
/// let a = Arc::new(Implementation::new("ImplA", [], || ImplA));
/// let b = Arc::new(Implementation::new("ImplB", [sayable.clone()], || ImplB));
///
/// registry.register(greet.clone(), a);
/// registry.register(greet.clone(), Arc::clone(&b));
/// assert!(Arc::ptr_eq(&registry.resolve_by_id(&greet).unwrap(), &b));
/// assert!(Arc::ptr_eq(&registry.resolve_by_capability(&sayable).unwrap(), &b));
///
/// registry.unregister(&greet);
/// assert!(registry.resolve_by_id(&greet).is_none());
/// assert!(registry.resolve_by_capability(&sayable).is_none());
/// ```
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.read();
        f.debug_struct("Registry")
            .field("registered", &inner.descriptors.len())
            .field("cached_interfaces", &inner.cache.len())
            .finish()
    }
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| {
            tracing::warn!("Registry lock was poisoned; continuing with recovered state");
            PoisonError::into_inner(poisoned)
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Registry lock was poisoned; continuing with recovered state");
            PoisonError::into_inner(poisoned)
        })
    }

    /// Registers `implementation` under `id`, replacing any previous one.
    ///
    /// The new registration moves to the front of the scan order. If `id`
    /// was already registered, cache entries pointing at the previous
    /// implementation are purged in the same critical section.
    pub fn register(&self, id: CapabilityId, implementation: Arc<Implementation>) {
        tracing::debug!("Registering capability {} ({})", id, implementation.name());
        self.write().insert(id, implementation, None);
    }

    /// Registers `implementation` under `id` on behalf of `owner`.
    ///
    /// Same semantics as [`register`](Self::register); the owner is recorded
    /// so that [`retire`](Self::retire) only removes the owner's own entries.
    pub fn register_owned(
        &self,
        owner: &PackageId,
        id: CapabilityId,
        implementation: Arc<Implementation>,
    ) {
        tracing::debug!(
            "Registering capability {} ({}) for {}",
            id,
            implementation.name(),
            owner
        );
        self.write().insert(id, implementation, Some(owner.clone()));
    }

    /// Removes the registration for `id`.
    ///
    /// Returns `true` if something was removed; unregistering an unknown id
    /// is a no-op.
    pub fn unregister(&self, id: &CapabilityId) -> bool {
        let removed = self.write().remove(id).is_some();
        if removed {
            tracing::debug!("Unregistered capability {}", id);
        }
        removed
    }

    /// Atomically retires `owner`'s registrations for `retired` and registers
    /// `entries` on its behalf.
    ///
    /// Ids in `retired` that are currently registered by a different owner
    /// (or by the host) are left alone. Entries are registered in order, so
    /// the last entry ends up first in the scan order. Readers observe either
    /// the complete old set or the complete new set.
    ///
    /// Returns the number of registrations retired.
    pub fn swap(
        &self,
        owner: &PackageId,
        retired: &[CapabilityId],
        entries: Vec<(CapabilityId, Arc<Implementation>)>,
    ) -> usize {
        let mut inner = self.write();

        let mut count = 0;
        for id in retired {
            let owned = inner
                .descriptors
                .get(id)
                .is_some_and(|d| d.owner.as_ref() == Some(owner));
            if owned {
                inner.remove(id);
                count += 1;
            }
        }

        let added = entries.len();
        for (id, implementation) in entries {
            inner.insert(id, implementation, Some(owner.clone()));
        }

        tracing::debug!(
            "Swapped capabilities for {}: {} retired, {} registered",
            owner,
            count,
            added
        );
        count
    }

    /// Removes `owner`'s registrations for `ids`.
    ///
    /// Returns the number of registrations removed.
    pub fn retire(&self, owner: &PackageId, ids: &[CapabilityId]) -> usize {
        self.swap(owner, ids, Vec::new())
    }

    /// Looks up the implementation registered under `id`.
    #[must_use]
    pub fn resolve_by_id(&self, id: &CapabilityId) -> Option<Arc<Implementation>> {
        self.read()
            .descriptors
            .get(id)
            .map(|d| Arc::clone(&d.implementation))
    }

    /// Resolves an implementation satisfying `interface`.
    ///
    /// Returns the cached result if present. Otherwise scans registrations
    /// most-recent-first, caches the first match, and returns it. A miss is
    /// not cached.
    #[must_use]
    pub fn resolve_by_capability(&self, interface: &InterfaceId) -> Option<Arc<Implementation>> {
        if let Some(hit) = self.read().cache.get(interface) {
            return Some(Arc::clone(hit));
        }

        let mut inner = self.write();
        // another writer may have populated the entry while we waited
        if let Some(hit) = inner.cache.get(interface) {
            return Some(Arc::clone(hit));
        }

        let found = inner.scan(interface)?;
        inner.cache.insert(interface.clone(), Arc::clone(&found));
        tracing::trace!("Cached {} -> {}", interface, found.name());
        Some(found)
    }

    /// Resolves `id` only if its implementation satisfies `interface`.
    #[must_use]
    pub fn resolve(&self, interface: &InterfaceId, id: &CapabilityId) -> Option<Arc<Implementation>> {
        self.resolve_by_id(id)
            .filter(|implementation| implementation.satisfies(interface))
    }

    /// Returns all registered implementations, in no particular order.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<Implementation>> {
        self.read()
            .descriptors
            .values()
            .map(|d| Arc::clone(&d.implementation))
            .collect()
    }

    /// Returns a snapshot of all entries, most recently registered first.
    #[must_use]
    pub fn entries(&self) -> Vec<RegistryEntry> {
        let inner = self.read();
        inner
            .order
            .values()
            .rev()
            .filter_map(|id| {
                inner.descriptors.get(id).map(|d| RegistryEntry {
                    capability_id: id.clone(),
                    implementation: Arc::clone(&d.implementation),
                    owner: d.owner.clone(),
                })
            })
            .collect()
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &CapabilityId) -> bool {
        self.read().descriptors.contains_key(id)
    }

    /// Returns the number of registered capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().descriptors.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().descriptors.is_empty()
    }

    /// Returns the interfaces that currently have a cached resolution.
    #[must_use]
    pub fn cached_interfaces(&self) -> Vec<InterfaceId> {
        let mut cached: Vec<_> = self.read().cache.keys().cloned().collect();
        cached.sort();
        cached
    }
}
