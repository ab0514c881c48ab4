//! Command implementations for the `apf` CLI.
//!
//! Each module builds a serializable result, prints it in the requested
//! format, and returns the process exit code.

pub mod common;
pub mod completions;
pub mod inspect;
pub mod install;
pub mod list;
pub mod reconcile;
pub mod resolve;
pub mod uninstall;
