//! Source record model shared by every pipeline stage.
//!
//! Records arrive from the collector as loosely-typed JSON. Every field is
//! optional. A field that does not fit its type is not dropped: it is kept
//! verbatim in `unparsed` together with keys this crate does not know, and
//! written back out under its original name, so one bad scrape never sinks
//! a run and nothing the collector sent is lost.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Collection label (search term) → records collected under it
pub type Payload = IndexMap<String, Vec<SourceRecord>>;

/// Platform name → handles in first-seen order
pub type SocialHandles = BTreeMap<String, Vec<String>>;

/// Identity artifacts found in one document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedArtifacts
{
    /// Armored PGP public key blocks
    pub pgp_keys: BTreeSet<String>,

    /// Legacy-prefix base58-looking strings (unverified)
    pub btc_wallets: BTreeSet<String>,

    /// local@domain.tld shaped strings
    pub emails: BTreeSet<String>,
}

impl ExtractedArtifacts
{
    pub fn is_empty(&self) -> bool
    {
        self.pgp_keys
            .is_empty()
            && self
                .btc_wallets
                .is_empty()
            && self
                .emails
                .is_empty()
    }

    /// Set-union `other` into `self`
    pub fn absorb(
        &mut self,
        other: &ExtractedArtifacts,
    )
    {
        self.pgp_keys
            .extend(other.pgp_keys.iter().cloned());
        self.btc_wallets
            .extend(other.btc_wallets.iter().cloned());
        self.emails
            .extend(other.emails.iter().cloned());
    }
}

/// TextBlob-style sentiment pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sentiment
{
    /// [-1, 1]
    pub polarity: f64,
    /// [0, 1]
    pub subjectivity: f64,
}

/// One fetched document's analysis result
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceRecord
{
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Collection time exactly as the collector wrote it, see [`SourceRecord::collected_at_utc`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collected_at: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_time_s: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size_kb: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    /// Leading slice of the text kept by the collector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,

    /// Upstream digest of the full markup, passed through untouched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_hash: Option<String>,

    /// Upstream content digest; never used as a bucket key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_hash: Option<String>,

    #[serde(skip_serializing_if = "ExtractedArtifacts::is_empty")]
    pub extracted_artifacts: ExtractedArtifacts,

    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub outbound_references: BTreeSet<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub social_handles: SocialHandles,

    /// Unknown keys and values that did not fit their field, as received
    #[serde(flatten)]
    pub unparsed: Map<String, Value>,
}

impl<'de> Deserialize<'de> for SourceRecord
{
    fn deserialize<D>(de: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let fields = Map::<String, Value>::deserialize(de)?;
        Ok(Self::from_fields(fields))
    }
}

impl SourceRecord
{
    /// Take every known field that fits its type; the rest stays in `unparsed`
    pub fn from_fields(mut fields: Map<String, Value>) -> Self
    {
        let extracted_artifacts = take_or_legacy(&mut fields, "extracted_artifacts", "metadata").unwrap_or_default();
        let outbound_references =
            take_or_legacy(&mut fields, "outbound_references", "onion_links_outbound").unwrap_or_default();

        Self {
            url: take(&mut fields, "url"),
            title: take(&mut fields, "title"),
            collected_at: take(&mut fields, "collected_at"),
            status_code: take(&mut fields, "status_code"),
            load_time_s: take(&mut fields, "load_time_s"),
            page_size_kb: take(&mut fields, "page_size_kb"),
            word_count: take(&mut fields, "word_count"),
            language: take(&mut fields, "language"),
            sentiment: take(&mut fields, "sentiment"),
            keywords: take(&mut fields, "keywords").unwrap_or_default(),
            snippet: take(&mut fields, "snippet"),
            raw_text: take(&mut fields, "raw_text"),
            html_hash: take(&mut fields, "html_hash"),
            text_hash: take(&mut fields, "text_hash"),
            extracted_artifacts,
            outbound_references,
            social_handles: take(&mut fields, "social_handles").unwrap_or_default(),
            unparsed: fields,
        }
    }

    /// `collected_at` as UTC, when it is a recognizable timestamp
    pub fn collected_at_utc(&self) -> Option<DateTime<Utc>>
    {
        self.collected_at
            .as_deref()
            .and_then(parse_timestamp)
    }

    /// Non-blank, trimmed URL
    pub fn clean_url(&self) -> Option<&str>
    {
        non_blank(
            self.url
                .as_deref(),
        )
    }

    /// Non-blank, trimmed title
    pub fn clean_title(&self) -> Option<&str>
    {
        non_blank(
            self.title
                .as_deref(),
        )
    }
}

fn non_blank(s: Option<&str>) -> Option<&str>
{
    s.map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Parse the collector's JSON, dropping entries that are not records.
///
/// Label order follows the document. Returns the payload and the number of
/// dropped entries.
pub fn parse_payload(text: &str) -> anyhow::Result<(Payload, usize)>
{
    let raw: IndexMap<String, Vec<Value>> = serde_json::from_str(text)
        .map_err(|e| anyhow::anyhow!("payload must map labels to record arrays: {e}"))?;

    let mut dropped = 0usize;
    let mut payload = Payload::with_capacity(raw.len());

    for (label, items) in raw
    {
        let mut records = Vec::with_capacity(items.len());
        for (i, item) in items
            .into_iter()
            .enumerate()
        {
            match item
            {
                Value::Object(fields) => records.push(SourceRecord::from_fields(fields)),
                _ =>
                {
                    warn!(label = %label, position = i, "skipping non-object record");
                    dropped += 1;
                }
            }
        }
        payload.insert(label, records);
    }

    Ok((payload, dropped))
}

/// Remove `key` and decode it. A value of the wrong shape goes back into
/// `fields` untouched; null counts as absent.
fn take<T: DeserializeOwned>(
    fields: &mut Map<String, Value>,
    key: &str,
) -> Option<T>
{
    let value = fields.remove(key)?;
    if value.is_null()
    {
        return None;
    }

    match T::deserialize(&value)
    {
        Ok(v) => Some(v),
        Err(e) =>
        {
            debug!(field = key, error = %e, "keeping field verbatim");
            fields.insert(key.to_string(), value);
            None
        }
    }
}

/// Older collectors wrote `legacy` instead of `key`; read it only when `key` is absent
fn take_or_legacy<T: DeserializeOwned>(
    fields: &mut Map<String, Value>,
    key: &str,
    legacy: &str,
) -> Option<T>
{
    if fields.contains_key(key)
    {
        take(fields, key)
    }
    else
    {
        take(fields, legacy)
    }
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse RFC 3339, or a naive ISO-8601 stamp (`T` or space separated) taken as UTC
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>>
{
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s)
    {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}
