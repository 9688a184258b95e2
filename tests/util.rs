//! Shared test utilities for integration tests
//!
//! Builds collector payloads on disk so library and CLI tests run
//! against the same records.

#![allow(dead_code)]

use assert_fs::prelude::*;
use serde_json::{Value, json};

pub const VENDOR_TEXT: &str =
    "contact me at vendor@example.com and send BTC to 1BoatSLRHtKNngkdXEeobR76b53LETtpyT";

/// A payload covering duplicate text, shared artifacts, a mirrored title,
/// a keyword-only topic, a textless record and one non-record entry.
pub fn scenario_payload() -> Value
{
    json!({
        "xtc": [
            {
                "url": "http://a.onion",
                "title": "Market Listing",
                "collected_at": "2025-01-02 10:00:00",
                "raw_text": "Buy XTC here",
                "keywords": ["xtc"]
            },
            {
                "url": "http://b.onion",
                "title": "Market Listing",
                "collected_at": "2025-01-01T09:00:00Z",
                "raw_text": "buy xtc HERE  "
            }
        ],
        "vendors": [
            {
                "url": "http://c.onion",
                "title": "Market Listing",
                "collected_at": "not a timestamp",
                "status_code": "200",
                "raw_text": VENDOR_TEXT,
                // Older collectors wrote artifacts under "metadata"
                "metadata": {
                    "pgp_keys": [],
                    "btc_wallets": ["1BoatSLRHtKNngkdXEeobR76b53LETtpyT"],
                    "emails": ["vendor@example.com"]
                }
            },
            {
                "url": "http://a.onion",
                "title": "Market Listing",
                "raw_text": "Relisted, same shop",
                "extracted_artifacts": {
                    "emails": ["vendor@example.com"]
                }
            },
            {
                "url": "http://d.onion",
                "title": "fentanyl fentanyl fentanyl",
                "keywords": ["escrow"],
                "raw_text": "listing body"
            },
            {
                "url": "http://e.onion",
                "title": "Teaser",
                "snippet": "only the teaser survived"
            },
            42
        ]
    })
}

/// Write `payload` into a fresh temp dir as `scraped.json`
pub fn write_payload(payload: &Value) -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    tmp.child("scraped.json")
        .write_str(&serde_json::to_string_pretty(payload).expect("json"))
        .expect("write payload");
    tmp
}

/// The single file a dated output directory should hold
pub fn only_file(dir: &std::path::Path) -> std::path::PathBuf
{
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .expect("output dir")
        .map(|e| e.expect("entry").path())
        .collect();
    assert_eq!(files.len(), 1, "expected one file in {}", dir.display());
    files.remove(0)
}
