//! Certificate chain fingerprints
//!
//! Chains are compared by a SHA-256 over their normalized PEM text, so line
//! ending and indentation differences introduced by the appliance do not
//! register as a change.

use sha2::{Digest, Sha256};

/// Normalize PEM text: LF line endings, trimmed lines, no blank lines
pub fn normalize_pem(pem: &str) -> String {
    pem.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Hex SHA-256 of the normalized chain
pub fn chain_fingerprint(pem: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_pem(pem).as_bytes());
    hex::encode(hasher.finalize())
}
