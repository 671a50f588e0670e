//! Shared SHA-256 hex digest utility.
//!
//! Used for API key storage and anonymous caller fingerprints.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Stable fingerprint of an anonymous caller.
///
/// Bounds anonymous abuse only; it is not a durable identity.
pub fn caller_fingerprint(address: &str, client_signature: &str) -> String {
    sha256_hex(format!("{address}|{client_signature}").as_bytes())
}
