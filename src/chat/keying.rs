//! Input normalization and topic-key hashing.
//!
//! Topics are keyed by a SHA-256 digest of the normalized input, so two
//! submissions that differ only in case or whitespace land in the same topic
//! while long inputs sharing a prefix stay apart.

use sha2::{Digest, Sha256};

/// Normalize input for keying (trim, lowercase, collapse whitespace).
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut prev_space = false;

    for ch in text.trim().chars() {
        if ch.is_whitespace() {
            if !prev_space {
                normalized.push(' ');
                prev_space = true;
            }
        } else {
            normalized.extend(ch.to_lowercase());
            prev_space = false;
        }
    }

    normalized
}

/// Lowercase hex SHA-256 of already-normalized text.
#[must_use]
pub fn compute_hash(normalized: &str) -> String {
    let digest = Sha256::digest(normalized.as_bytes());
    format!("{digest:x}")
}

/// Topic key for raw user input.
#[must_use]
pub fn topic_key(text: &str) -> String {
    compute_hash(&normalize_text(text))
}
