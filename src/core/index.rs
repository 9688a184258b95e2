//! Fingerprint index: records grouped by recomputed content fingerprint.
//!
//! The bucket key is always recomputed with the canonical hasher; an upstream
//! `text_hash` is kept on the record for reference but never trusted. Labels
//! (search terms) are not part of the key, so the same content collected for
//! two terms lands in one bucket.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::core::classify::Classification;
use crate::core::hasher::{self, Fingerprint};
use crate::core::record::{ExtractedArtifacts, Payload, SourceRecord};

/// What a record's fingerprint was computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintSource
{
    /// Full document text
    RawText,
    /// Collector snippet; degraded
    Snippet,
    /// Nothing usable; degraded, every such record shares one bucket
    Empty,
}

impl FingerprintSource
{
    pub fn is_degraded(self) -> bool
    {
        !matches!(self, FingerprintSource::RawText)
    }
}

/// A record as held inside a bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedRecord
{
    /// Collection label the record arrived under
    pub term: String,

    /// Recomputed bucket key
    pub fingerprint: Fingerprint,

    pub fingerprint_source: FingerprintSource,

    /// Coarse secondary fingerprint of the snippet, when there is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet_fingerprint: Option<Fingerprint>,

    #[serde(flatten)]
    pub record: SourceRecord,
}

/// Compute a record's fingerprint, preferring full text over the snippet
pub fn fingerprint_record(rec: &SourceRecord) -> (Fingerprint, FingerprintSource)
{
    let usable = |s: &Option<String>| {
        s.as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(str::to_owned)
    };

    if let Some(text) = usable(&rec.raw_text)
    {
        return (hasher::fingerprint(&text), FingerprintSource::RawText);
    }
    if let Some(snip) = usable(&rec.snippet)
    {
        return (hasher::fingerprint(&snip), FingerprintSource::Snippet);
    }
    (hasher::fingerprint(""), FingerprintSource::Empty)
}

/// All records sharing one fingerprint, in insertion order
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket
{
    pub fingerprint: Fingerprint,
    pub records: Vec<IndexedRecord>,
}

impl Bucket
{
    /// Earliest and latest parseable `collected_at`; None when no member has one
    pub fn seen_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)>
    {
        let mut stamps = self
            .records
            .iter()
            .filter_map(|r| {
                r.record
                    .collected_at_utc()
            });

        let first = stamps.next()?;
        Some(stamps.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))))
    }

    pub fn degraded(&self) -> bool
    {
        self.records
            .iter()
            .any(|r| {
                r.fingerprint_source
                    .is_degraded()
            })
    }
}

/// Counters gathered while indexing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats
{
    pub records: usize,
    pub buckets: usize,
    pub degraded_records: usize,
    /// Upstream `text_hash` values that disagreed with the recomputed key
    pub stale_upstream_hashes: usize,
    /// Upstream `text_hash` values that are not SHA-256 hex at all
    pub malformed_upstream_hashes: usize,
}

/// Indexing behavior knobs
#[derive(Debug, Clone, Copy)]
pub struct IndexOptions
{
    /// Keep `raw_text` on stored records after hashing
    pub retain_raw_text: bool,
}

impl Default for IndexOptions
{
    fn default() -> Self
    {
        Self { retain_raw_text: true }
    }
}

/// Fingerprint → bucket, first-seen order
#[derive(Debug, Clone, Default)]
pub struct FingerprintIndex
{
    buckets: IndexMap<Fingerprint, Bucket>,
    stats: IndexStats,
}

impl FingerprintIndex
{
    /// Group every record of `payload` by recomputed fingerprint
    #[instrument(skip_all, fields(labels = payload.len()))]
    pub fn build(
        payload: Payload,
        opts: IndexOptions,
    ) -> Self
    {
        let mut buckets: IndexMap<Fingerprint, Bucket> = IndexMap::new();
        let mut stats = IndexStats::default();

        for (term, records) in payload
        {
            for mut record in records
            {
                let (key, source) = fingerprint_record(&record);

                if source.is_degraded()
                {
                    stats.degraded_records += 1;
                    warn!(url = record.url.as_deref().unwrap_or("-"), ?source, "degraded fingerprint");
                }

                if let Some(upstream) = record
                    .text_hash
                    .as_deref()
                {
                    if !hasher::is_fingerprint(upstream)
                    {
                        stats.malformed_upstream_hashes += 1;
                        debug!(upstream, "upstream text_hash is not a fingerprint");
                    }
                    else if !upstream.eq_ignore_ascii_case(&key)
                    {
                        stats.stale_upstream_hashes += 1;
                        debug!(upstream, recomputed = %key, "upstream text_hash disagrees");
                    }
                }

                let snippet_fingerprint = record
                    .snippet
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .map(hasher::fingerprint);

                if !opts.retain_raw_text
                {
                    record.raw_text = None;
                }

                stats.records += 1;
                buckets
                    .entry(key.clone())
                    .or_insert_with(|| Bucket { fingerprint: key.clone(), records: Vec::new() })
                    .records
                    .push(IndexedRecord {
                        term: term.clone(),
                        fingerprint: key,
                        fingerprint_source: source,
                        snippet_fingerprint,
                        record,
                    });
            }
        }

        stats.buckets = buckets.len();
        info!(records = stats.records, buckets = stats.buckets, "fingerprint index built");

        Self { buckets, stats }
    }

    pub fn stats(&self) -> IndexStats
    {
        self.stats
    }

    pub fn len(&self) -> usize
    {
        self.buckets
            .len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.buckets
            .is_empty()
    }

    pub fn get(
        &self,
        fingerprint: &str,
    ) -> Option<&Bucket>
    {
        self.buckets
            .get(fingerprint)
    }

    pub fn buckets(&self) -> impl Iterator<Item = &Bucket>
    {
        self.buckets
            .values()
    }

    pub fn into_buckets(self) -> impl Iterator<Item = Bucket>
    {
        self.buckets
            .into_values()
    }
}

/// A bucket after classification, with its artifact union and time span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintEntry
{
    pub text_hash: Fingerprint,

    pub records: Vec<IndexedRecord>,

    pub classification: Classification,

    /// Deduplicated union over members
    #[serde(flatten)]
    pub artifacts: ExtractedArtifacts,

    pub first_seen: Option<DateTime<Utc>>,

    pub last_seen: Option<DateTime<Utc>>,

    /// Any member fingerprinted from less than its full text
    #[serde(default)]
    pub degraded: bool,
}

impl FingerprintEntry
{
    /// Take over a bucket and attach its classification
    pub fn from_bucket(
        bucket: Bucket,
        classification: Classification,
    ) -> Self
    {
        let mut artifacts = ExtractedArtifacts::default();
        for r in &bucket.records
        {
            artifacts.absorb(&r.record.extracted_artifacts);
        }

        let (first_seen, last_seen) = bucket
            .seen_range()
            .unzip();
        let degraded = bucket.degraded();

        Self {
            text_hash: bucket.fingerprint,
            records: bucket.records,
            classification,
            artifacts,
            first_seen,
            last_seen,
            degraded,
        }
    }

    /// Distinct non-blank URLs among members
    pub fn urls(&self) -> BTreeSet<&str>
    {
        self.records
            .iter()
            .filter_map(|r| {
                r.record
                    .clean_url()
            })
            .collect()
    }
}

/// Fingerprint → entry, as written to disk
pub type EnrichedIndex = IndexMap<Fingerprint, FingerprintEntry>;
