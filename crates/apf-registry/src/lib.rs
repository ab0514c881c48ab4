//! Capability registry for the APF plugin loader.
//!
//! Maps capability ids to implementation descriptors and resolves interface
//! requests to concrete implementations, caching positive resolutions.
//!
//! # Architecture
//!
//! - [`Implementation`]: explicit factory entry (constructor + satisfied interfaces)
//! - [`Registry`]: id table, most-recent-first scan order, interface cache
//!
//! The registry is an ordinary value. Hosts create one, wrap it in an `Arc`,
//! and hand it to whatever needs it (typically the plugin manager and the
//! code resolving interfaces).
//!
//! # Examples
//!
//! ```
//! use apf_core::{CapabilityId, InterfaceId};
//! use apf_registry::{Implementation, Registry};
//! use std::sync::Arc;
//!
//! trait Sayable {
//!     fn say(&self) -> String;
//! }
//!
//! struct Hello;
//!
//! impl Sayable for Hello {
//!     fn say(&self) -> String {
//!         "hello".to_string()
//!     }
//! }
//!
//! let registry = Arc::new(Registry::new());
//! let sayable = InterfaceId::of::<dyn Sayable>();
//!
//! registry.register(
//!     CapabilityId::new("hello").unwrap(),
//!     Arc::new(Implementation::new("Hello", [sayable.clone()], || {
//!         Box::new(Hello) as Box<dyn Sayable + Send>
//!     })),
//! );
//!
//! let imp = registry.resolve_by_capability(&sayable).unwrap();
//! let object = imp.instantiate_as::<Box<dyn Sayable + Send>>().unwrap();
//! assert_eq!(object.say(), "hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod implementation;
pub mod registry;

pub use implementation::{Implementation, Instance};
pub use registry::{Registry, RegistryEntry};
