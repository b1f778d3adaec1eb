//! Deterministic identity hash for deduplication

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};

/// Identity fields, in hashing order
pub const IDENTITY_FIELDS: [&str; 4] = ["name", "email", "phone", "dob"];

/// Joiner between identity values
pub const KEY_SEPARATOR: &str = "||";

/// Key shared by every record without any identity value
pub static SENTINEL_KEY: Lazy<String> = Lazy::new(|| sha256_hex("no_key"));

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Compute the canonical key of a normalized field set.
///
/// Uses `name, email, phone, dob` in that order, skipping absent or empty
/// values. Records with none of them get [`SENTINEL_KEY`].
pub fn canonical_key(fields: &IndexMap<String, String>) -> String {
    let parts: Vec<&str> = IDENTITY_FIELDS
        .iter()
        .filter_map(|f| fields.get(*f).map(String::as_str))
        .filter(|v| !v.is_empty())
        .collect();

    if parts.is_empty() {
        SENTINEL_KEY.clone()
    } else {
        sha256_hex(&parts.join(KEY_SEPARATOR))
    }
}
