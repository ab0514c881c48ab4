//! Implementation descriptors: explicit factory entries.
//!
//! An [`Implementation`] pairs a constructor with the set of interfaces the
//! constructed objects satisfy. Compatibility checks are a set lookup, so no
//! runtime type introspection is needed to answer "does X satisfy Y".

use apf_core::InterfaceId;
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// An object produced by an [`Implementation`] constructor.
pub type Instance = Box<dyn Any + Send>;

type Constructor = Arc<dyn Fn() -> Instance + Send + Sync>;

/// A registered implementation: a named constructor plus the interfaces it
/// satisfies.
///
/// Implementations are shared as `Arc<Implementation>`; the registry uses
/// pointer identity to decide which cache entries a replacement invalidates.
///
/// # Examples
///
/// ```
/// use apf_core::InterfaceId;
/// use apf_registry::Implementation;
///
/// struct Greeter;
///
/// impl Greeter {
///     fn say(&self) -> &'static str {
///         "hello"
///     }
/// }
///
/// let sayable = InterfaceId::new("ISayable");
/// let imp = Implementation::new("Greeter", [sayable.clone()], || Greeter);
///
/// assert!(imp.satisfies(&sayable));
/// let greeter = imp.instantiate_as::<Greeter>().unwrap();
/// assert_eq!(greeter.say(), "hello");
/// ```
pub struct Implementation {
    name: String,
    interfaces: BTreeSet<InterfaceId>,
    constructor: Constructor,
}

impl Implementation {
    /// Creates an implementation from a constructor.
    ///
    /// `interfaces` lists every interface the constructed value satisfies.
    pub fn new<T, F>(
        name: impl Into<String>,
        interfaces: impl IntoIterator<Item = InterfaceId>,
        constructor: F,
    ) -> Self
    where
        T: Any + Send,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            interfaces: interfaces.into_iter().collect(),
            constructor: Arc::new(move || Box::new(constructor()) as Instance),
        }
    }

    /// Creates an implementation from a constructor that already boxes its
    /// output, e.g. one handed over by a module loader.
    pub fn from_boxed<F>(
        name: impl Into<String>,
        interfaces: impl IntoIterator<Item = InterfaceId>,
        constructor: F,
    ) -> Self
    where
        F: Fn() -> Instance + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            interfaces: interfaces.into_iter().collect(),
            constructor: Arc::new(constructor),
        }
    }

    /// Returns the implementation's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the interfaces this implementation satisfies, sorted.
    pub fn interfaces(&self) -> impl Iterator<Item = &InterfaceId> {
        self.interfaces.iter()
    }

    /// Returns `true` if this implementation satisfies `interface`.
    #[must_use]
    pub fn satisfies(&self, interface: &InterfaceId) -> bool {
        self.interfaces.contains(interface)
    }

    /// Constructs a new instance.
    #[must_use]
    pub fn instantiate(&self) -> Instance {
        (self.constructor)()
    }

    /// Constructs a new instance and downcasts it to `T`.
    ///
    /// Returns `None` when the constructor produces a different type.
    #[must_use]
    pub fn instantiate_as<T: Any>(&self) -> Option<Box<T>> {
        self.instantiate().downcast::<T>().ok()
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Implementation")
            .field("name", &self.name)
            .field("interfaces", &self.interfaces)
            .finish_non_exhaustive()
    }
}
