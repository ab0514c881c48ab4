//! Strong domain types for the APF plugin loader.
//!
//! Newtypes keep package ids, capability ids, and interface ids from being
//! mixed up with each other or with arbitrary strings.
//!
//! # Examples
//!
//! ```
//! use apf_core::{CapabilityId, InterfaceId, PackageId, PluginVersion};
//!
//! let package = PackageId::new("com.x.plugin").unwrap();
//! let capability = CapabilityId::new("greet").unwrap();
//! let interface = InterfaceId::new("ISayable");
//! let version = PluginVersion::new(2);
//!
//! assert_eq!(package.as_str(), "com.x.plugin");
//! assert!(version > PluginVersion::new(1));
//! # let _ = (capability, interface);
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix of the staging directory for an in-progress install.
pub const CACHE_SUFFIX: &str = "-cache";

/// Suffix of the tombstone marker for a deferred removal.
pub const REMOVE_SUFFIX: &str = "-remove";

/// Package identifier of a plugin (newtype over String).
///
/// A package id names the plugin's slot directory on disk, so it must be a
/// safe single path component. Ids ending in the reserved slot suffixes
/// (`-cache`, `-remove`) are rejected because they would collide with the
/// staging and tombstone entries of another package.
///
/// # Examples
///
/// ```
/// use apf_core::PackageId;
///
/// assert!(PackageId::new("com.example.weather").is_ok());
/// assert!(PackageId::new("").is_err());
/// assert!(PackageId::new("../escape").is_err());
/// assert!(PackageId::new("sub/dir").is_err());
/// assert!(PackageId::new("demo-cache").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageId(String);

impl PackageId {
    /// Creates a validated package id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationError`] if the id is empty, is `.` or `..`,
    /// contains path separators or control characters, or ends with a
    /// reserved slot suffix.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        validate_package_id(&id)?;
        Ok(Self(id))
    }

    /// Returns the package id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `PackageId` and returns the inner `String`.
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

fn validate_package_id(id: &str) -> Result<()> {
    let reason = if id.is_empty() {
        Some("package id cannot be empty")
    } else if id == "." || id == ".." {
        Some("package id cannot be '.' or '..'")
    } else if id.contains('/') || id.contains('\\') {
        Some("package id cannot contain path separators")
    } else if id.chars().any(char::is_control) {
        Some("package id cannot contain control characters")
    } else if id.ends_with(CACHE_SUFFIX) || id.ends_with(REMOVE_SUFFIX) {
        Some("package id cannot end with a reserved slot suffix")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::ValidationError {
            field: "package_id".to_string(),
            reason: format!("{reason}: '{id}'"),
        }),
        None => Ok(()),
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PackageId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<PackageId> for String {
    fn from(id: PackageId) -> Self {
        id.0
    }
}

impl AsRef<str> for PackageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Capability identifier (newtype over String).
///
/// Uniquely keys one registered implementation, regardless of which
/// interfaces that implementation satisfies.
///
/// # Examples
///
/// ```
/// use apf_core::CapabilityId;
///
/// let id = CapabilityId::new("greet").unwrap();
/// assert_eq!(id.to_string(), "greet");
/// assert!(CapabilityId::new("  ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CapabilityId(String);

impl CapabilityId {
    /// Creates a capability id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationError`] if the id is empty or whitespace only.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::ValidationError {
                field: "capability_id".to_string(),
                reason: "capability id cannot be empty".to_string(),
            });
        }
        Ok(Self(id))
    }

    /// Returns the capability id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CapabilityId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for CapabilityId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<CapabilityId> for String {
    fn from(id: CapabilityId) -> Self {
        id.0
    }
}

/// Interface identifier (newtype over String).
///
/// Names an abstract contract an implementation may satisfy. Interfaces are
/// plain names so that bundles can declare them in their manifests; host code
/// that prefers Rust types can derive the name with [`InterfaceId::of`].
///
/// # Examples
///
/// ```
/// use apf_core::InterfaceId;
///
/// trait Sayable {}
///
/// let named = InterfaceId::new("ISayable");
/// let typed = InterfaceId::of::<dyn Sayable>();
/// assert_eq!(named.as_str(), "ISayable");
/// assert!(typed.as_str().contains("Sayable"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InterfaceId(String);

impl InterfaceId {
    /// Creates an interface id from a name.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derives an interface id from a Rust type name.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(std::any::type_name::<T>().to_string())
    }

    /// Returns the interface id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InterfaceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for InterfaceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Monotonic plugin version number.
///
/// Only a strictly greater version may supersede an installed plugin.
///
/// # Examples
///
/// ```
/// use apf_core::PluginVersion;
///
/// let v1 = PluginVersion::new(1);
/// let v2 = PluginVersion::new(2);
/// assert!(v2 > v1);
/// assert_eq!(v2.get(), 2);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PluginVersion(u64);

impl PluginVersion {
    /// Creates a plugin version.
    #[inline]
    #[must_use]
    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    /// Returns the raw version number.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PluginVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PluginVersion {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_id_valid() {
        assert!(PackageId::new("valid-name").is_ok());
        assert!(PackageId::new("com.x.plugin").is_ok());
        assert!(PackageId::new("my_plugin2").is_ok());
        // suffix only matters at the end
        assert!(PackageId::new("cache-manager").is_ok());
    }

    #[test]
    fn test_package_id_invalid() {
        assert!(PackageId::new("").is_err());
        assert!(PackageId::new(".").is_err());
        assert!(PackageId::new("..").is_err());
        assert!(PackageId::new("path/traversal").is_err());
        assert!(PackageId::new("path\\traversal").is_err());
        assert!(PackageId::new("bell\u{7}").is_err());
        assert!(PackageId::new("demo-cache").is_err());
        assert!(PackageId::new("demo-remove").is_err());
    }

    #[test]
    fn test_package_id_serde_validates() {
        let ok: PackageId = serde_json::from_str("\"com.x.plugin\"").unwrap();
        assert_eq!(ok.as_str(), "com.x.plugin");

        let bad = serde_json::from_str::<PackageId>("\"../x\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_capability_id_rejects_blank() {
        assert!(CapabilityId::new("greet").is_ok());
        assert!(CapabilityId::new("").is_err());
        assert!(CapabilityId::new("   ").is_err());
    }

    #[test]
    fn test_interface_id_of_is_stable() {
        trait Sayable {}
        assert_eq!(InterfaceId::of::<dyn Sayable>(), InterfaceId::of::<dyn Sayable>());
        assert_ne!(InterfaceId::of::<dyn Sayable>(), InterfaceId::of::<String>());
    }

    #[test]
    fn test_plugin_version_ordering() {
        assert!(PluginVersion::new(3) > PluginVersion::new(2));
        assert_eq!(PluginVersion::default().get(), 0);
        assert_eq!(serde_json::to_string(&PluginVersion::new(7)).unwrap(), "7");
    }
}
