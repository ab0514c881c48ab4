//! Error types for the APF core crate.
//!
//! Covers failures that happen before any plugin is touched: malformed
//! identifiers, invalid configuration, and bad command-line arguments.
//!
//! # Examples
//!
//! ```
//! use apf_core::{Error, PackageId};
//!
//! let err = PackageId::new("../escape").unwrap_err();
//! assert!(err.is_validation_error());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for APF core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    ///
    /// Raised when configuration is invalid, missing required fields,
    /// or contains contradictory settings.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration problem
        message: String,
    },

    /// Configuration file could not be read or written.
    #[error("Failed to access config file {path}: {source}")]
    ConfigIo {
        /// Path of the configuration file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for [`crate::LoaderConfig`].
    #[error("Failed to parse config file {path}: {message}")]
    ConfigParse {
        /// Path of the configuration file
        path: PathBuf,
        /// Parser diagnostic
        message: String,
    },

    /// Invalid argument error.
    ///
    /// Raised when CLI arguments or function parameters are invalid.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Validation error for domain types.
    ///
    /// Raised when creating a `PackageId`, `CapabilityId`, or other
    /// identifier whose format requirements are not met.
    #[error("Validation error in {field}: {reason}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Detailed reason for the validation failure
        reason: String,
    },
}

impl Error {
    /// Returns `true` if this is a configuration error.
    ///
    /// # Examples
    ///
    /// ```
    /// use apf_core::Error;
    ///
    /// let err = Error::ConfigError {
    ///     message: "empty plugins dir".to_string(),
    /// };
    /// assert!(err.is_config_error());
    /// ```
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigError { .. } | Self::ConfigIo { .. } | Self::ConfigParse { .. }
        )
    }

    /// Returns `true` if this is a domain validation error.
    #[must_use]
    pub const fn is_validation_error(&self) -> bool {
        matches!(self, Self::ValidationError { .. })
    }

    /// Returns `true` if this is an invalid argument error.
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = Error::ConfigError {
            message: "bundle extension cannot be empty".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Configuration error: bundle extension cannot be empty"
        );
        assert!(err.is_config_error());
        assert!(!err.is_validation_error());
    }

    #[test]
    fn test_config_parse_is_config_error() {
        let err = Error::ConfigParse {
            path: PathBuf::from("apf.toml"),
            message: "expected `=`".to_string(),
        };
        assert!(err.is_config_error());
        assert!(err.to_string().contains("apf.toml"));
    }

    #[test]
    fn test_validation_error_display() {
        let err = Error::ValidationError {
            field: "package_id".to_string(),
            reason: "cannot be empty".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("package_id"));
        assert!(display.contains("cannot be empty"));
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_invalid_argument() {
        let err = Error::InvalidArgument("bad format".to_string());
        assert!(err.is_invalid_argument());
        assert!(!err.is_config_error());
    }

    #[test]
    fn test_config_io_has_source() {
        use std::error::Error as _;

        let err = Error::ConfigIo {
            path: PathBuf::from("missing.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert!(err.source().is_some());
    }
}
