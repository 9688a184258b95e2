//! Canonical content hashing.
//!
//! Text is case-folded and every whitespace run collapsed to one space before
//! SHA-256, so documents that differ only in layout or capitalization share a
//! fingerprint. The functions are pure and stateless; callers decide whether
//! they hash a full body or a snippet.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of normalized text
pub type Fingerprint = String;

/// Length of a hex fingerprint
pub const FINGERPRINT_HEX_LEN: usize = 64;

/// Lowercase and collapse whitespace runs (trimming both ends)
pub fn normalize(text: &str) -> String
{
    let mut out = String::with_capacity(text.len());

    for word in text.split_whitespace()
    {
        if !out.is_empty()
        {
            out.push(' ');
        }
        // Word-level lowering keeps final-sigma handling
        out.push_str(&word.to_lowercase());
    }

    out
}

/// Canonical fingerprint of `text`
pub fn fingerprint(text: &str) -> Fingerprint
{
    raw_digest(normalize(text).as_bytes())
}

/// SHA-256 of the bytes as given, no normalization
pub fn raw_digest(bytes: &[u8]) -> String
{
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// True when `s` is a 64-digit hex string, in either case
pub fn is_fingerprint(s: &str) -> bool
{
    s.len() == FINGERPRINT_HEX_LEN
        && s.bytes()
            .all(|b| b.is_ascii_hexdigit())
}
