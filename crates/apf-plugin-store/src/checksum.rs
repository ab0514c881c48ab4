//! Blake3 checksum utilities for bundle integrity verification.
//!
//! Checksums are stored in install records as `"blake3:<hex>"`, leaving room
//! for a different algorithm later.

use crate::error::{LifecycleError, Result};

const PREFIX: &str = "blake3:";

/// Compares two strings in constant time.
///
/// Always walks the longer of the two inputs so the running time does not
/// depend on where the first difference is.
///
/// # Examples
///
/// ```
/// # use apf_plugin_store::checksum::constant_time_compare;
/// assert!(constant_time_compare("blake3:abc123", "blake3:abc123"));
/// assert!(!constant_time_compare("blake3:abc123", "blake3:def456"));
/// assert!(!constant_time_compare("blake3:abc", "blake3:abcdef"));
/// ```
#[must_use]
#[allow(clippy::similar_names)]
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    let len_match = a.len() == b.len();
    let bytes_a = a.as_bytes();
    let bytes_b = b.as_bytes();

    let mut diff = 0u8;
    for i in 0..a.len().max(b.len()) {
        let byte_a = bytes_a.get(i).copied().unwrap_or(0);
        let byte_b = bytes_b.get(i).copied().unwrap_or(0);
        diff |= byte_a ^ byte_b;
    }

    len_match && diff == 0
}

/// Calculates the Blake3 checksum of `data` as `"blake3:<hex>"`.
///
/// # Examples
///
/// ```
/// use apf_plugin_store::checksum::calculate_checksum;
///
/// let checksum = calculate_checksum(b"bundle bytes");
/// assert!(checksum.starts_with("blake3:"));
/// assert_eq!(checksum.len(), 71);
/// ```
#[must_use]
pub fn calculate_checksum(data: &[u8]) -> String {
    format!("{PREFIX}{}", blake3::hash(data).to_hex())
}

/// Verifies that `data` matches `expected`.
///
/// `path` is only used for the error message.
///
/// # Errors
///
/// Returns [`LifecycleError::ChecksumMismatch`] if the checksums differ.
pub fn verify_checksum(data: &[u8], expected: &str, path: &str) -> Result<()> {
    let actual = calculate_checksum(data);

    if !constant_time_compare(&actual, expected) {
        return Err(LifecycleError::ChecksumMismatch {
            path: path.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

/// Checks that `checksum` is `"blake3:"` followed by 64 lowercase hex digits.
#[must_use]
pub fn is_valid_checksum_format(checksum: &str) -> bool {
    checksum.strip_prefix(PREFIX).is_some_and(|hex| {
        hex.len() == 64
            && hex
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    })
}
