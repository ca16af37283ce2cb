//! Content digests for deduplication, auditing, and storage naming

use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest
pub const HASH_HEX_LENGTH: usize = 64;

/// Computes the lowercase hex SHA-256 digest of `content`
///
/// Identical bytes always produce the identical digest, across calls and
/// across processes.
///
/// # Examples
///
/// ```rust
/// use acton_upload::upload::content_hash;
///
/// assert_eq!(
///     content_hash(b"hello"),
///     "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
/// );
/// ```
#[must_use]
pub fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}
