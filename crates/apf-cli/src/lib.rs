//! APF CLI library.
//!
//! Command handlers, output formatters, and the manifest-only module loader
//! behind the `apf` binary, exposed as a library so they can be tested.

#![allow(clippy::missing_errors_doc)]

pub mod commands;
pub mod formatters;
pub mod loader;

pub use loader::DeclaredModuleLoader;
