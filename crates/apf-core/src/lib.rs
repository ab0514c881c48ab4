//! Core types, configuration, and errors for the APF plugin loader.
//!
//! This crate provides the foundational types shared by the registry, the
//! plugin lifecycle manager, and the command-line tool.
//!
//! # Architecture
//!
//! The core consists of:
//! - Strong domain types (`PackageId`, `CapabilityId`, `InterfaceId`, `PluginVersion`)
//! - Error hierarchy with contextual information
//! - Loader configuration with TOML persistence
//! - CLI primitives (`OutputFormat`, `ExitCode`)

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod config;
mod error;
mod types;

pub mod cli;

pub use config::{DEFAULT_BUNDLE_EXTENSION, LoaderConfig, LoaderConfigBuilder};
pub use error::{Error, Result};
pub use types::{CACHE_SUFFIX, CapabilityId, InterfaceId, PackageId, PluginVersion, REMOVE_SUFFIX};
