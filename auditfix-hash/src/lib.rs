//! Hashing primitives shared by the snapshot store and the issue model.

use sha2::{Digest, Sha256};

/// Number of hex characters kept for an issue fingerprint.
pub const FINGERPRINT_LEN: usize = 16;

/// Lowercase hex sha256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Stable identity for a finding.
///
/// Fields are separated with a unit separator so that `("a", "bc")` and `("ab", "c")`
/// hash differently. A missing line hashes as the empty string.
pub fn fingerprint(tool: &str, file: &str, line: Option<u32>, message: &str) -> String {
    let line = line.map(|l| l.to_string()).unwrap_or_default();
    let mut hasher = Sha256::new();
    for (i, part) in [tool, file, line.as_str(), message].iter().enumerate() {
        if i > 0 {
            hasher.update([0x1f]);
        }
        hasher.update(part.as_bytes());
    }
    let mut hex = hex::encode(hasher.finalize());
    hex.truncate(FINGERPRINT_LEN);
    hex
}
