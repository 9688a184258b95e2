//! Actor maps: artifact value → URLs that mention it, one map per kind.
//!
//! Built as a reduce over per-entry contributions. Each contribution is an
//! immutable `ActorMaps` for one entry; merging is set union, so the result
//! does not depend on evaluation order and re-running over the same index
//! gives identical maps.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, instrument};

use crate::core::index::{EnrichedIndex, FingerprintEntry};

/// Artifact value → sorted, deduplicated URLs
pub type ActorMap = BTreeMap<String, BTreeSet<String>>;

/// Kinds of identity artifacts tracked across sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind
{
    PgpKey,
    BtcWallet,
    Email,
}

impl ArtifactKind
{
    pub const ALL: [ArtifactKind; 3] = [ArtifactKind::PgpKey, ArtifactKind::BtcWallet, ArtifactKind::Email];

    /// Stem of the output file for this kind's map
    pub fn file_stem(self) -> &'static str
    {
        match self
        {
            ArtifactKind::PgpKey => "pgp_map",
            ArtifactKind::BtcWallet => "btc_map",
            ArtifactKind::Email => "email_map",
        }
    }
}

impl std::fmt::Display for ArtifactKind
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result
    {
        match self
        {
            ArtifactKind::PgpKey => write!(f, "pgp_key"),
            ArtifactKind::BtcWallet => write!(f, "btc_wallet"),
            ArtifactKind::Email => write!(f, "email"),
        }
    }
}

/// The three kind-specific maps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActorMaps
{
    pub pgp_keys: ActorMap,
    pub btc_wallets: ActorMap,
    pub emails: ActorMap,
}

impl ActorMaps
{
    /// Fold every entry into fresh maps
    #[instrument(skip_all, fields(entries = index.len()))]
    pub fn aggregate(index: &EnrichedIndex) -> Self
    {
        let entries: Vec<&FingerprintEntry> = index
            .values()
            .collect();

        let maps = entries
            .par_iter()
            .map(|e| Self::from_entry(e))
            .reduce(Self::default, Self::merge);

        info!(
            pgp_keys = maps.pgp_keys.len(),
            btc_wallets = maps.btc_wallets.len(),
            emails = maps.emails.len(),
            "actor maps aggregated"
        );
        maps
    }

    /// Contribution of one entry: each member's artifacts point at its URL
    pub fn from_entry(entry: &FingerprintEntry) -> Self
    {
        let mut maps = Self::default();

        for member in &entry.records
        {
            // No URL, nothing to point at
            let Some(url) = member
                .record
                .clean_url()
            else
            {
                continue;
            };

            let found = &member
                .record
                .extracted_artifacts;
            insert_all(&mut maps.pgp_keys, &found.pgp_keys, url);
            insert_all(&mut maps.btc_wallets, &found.btc_wallets, url);
            insert_all(&mut maps.emails, &found.emails, url);
        }

        maps
    }

    /// Set-union `other` into `self`
    pub fn merge(
        mut self,
        other: Self,
    ) -> Self
    {
        union_into(&mut self.pgp_keys, other.pgp_keys);
        union_into(&mut self.btc_wallets, other.btc_wallets);
        union_into(&mut self.emails, other.emails);
        self
    }

    pub fn get(
        &self,
        kind: ArtifactKind,
    ) -> &ActorMap
    {
        match kind
        {
            ArtifactKind::PgpKey => &self.pgp_keys,
            ArtifactKind::BtcWallet => &self.btc_wallets,
            ArtifactKind::Email => &self.emails,
        }
    }

    /// URLs mentioning `value` under `kind`
    pub fn sources(
        &self,
        kind: ArtifactKind,
        value: &str,
    ) -> Option<&BTreeSet<String>>
    {
        self.get(kind)
            .get(value)
    }

    /// Artifact values mentioned at two or more distinct URLs
    pub fn shared(
        &self,
        kind: ArtifactKind,
    ) -> impl Iterator<Item = (&String, &BTreeSet<String>)>
    {
        self.get(kind)
            .iter()
            .filter(|(_, urls)| urls.len() > 1)
    }
}

fn insert_all(
    map: &mut ActorMap,
    values: &BTreeSet<String>,
    url: &str,
)
{
    for v in values
    {
        map.entry(v.clone())
            .or_default()
            .insert(url.to_string());
    }
}

fn union_into(
    into: &mut ActorMap,
    from: ActorMap,
)
{
    for (k, urls) in from
    {
        into.entry(k)
            .or_default()
            .extend(urls);
    }
}
