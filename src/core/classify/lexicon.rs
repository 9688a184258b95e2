//! Keyword-lexicon topic scorer.
//!
//! A label's score is its trigger-substring hit count divided by the hits of
//! all labels, so a non-empty result always sums to 1. Labels with no hits are
//! left out entirely.

use super::{LabelScore, StrategyKind, TopicStrategy};

/// Label → trigger substrings, matched against lowercased text
pub const LEXICON: &[(&str, &[&str])] = &[
    ("drugs", &["drug", "fentanyl", "heroin", "cocaine", "meth", "weed", "opiate"]),
    ("weapons", &["weapon", "gun", "firearm", "explosive", "silencer"]),
    ("fraud", &["fraud", "scam", "phishing", "carding", "ccv"]),
    ("hacking", &["exploit", "vulnerability", "rce", "sql injection", "xss", "dox"]),
    ("leak", &["leak", "leaked", "dumps", "credentials", "database"]),
    ("malware", &["malware", "trojan", "ransomware", "botnet"]),
    ("stolen data", &["stolen", "dump", "credit card", "ssn", "credentials"]),
    ("marketplace", &["vendor", "market", "purchase", "escrow", "vendor fee"]),
];

/// Deterministic fallback scorer over [`LEXICON`]
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordLexicon;

impl KeywordLexicon
{
    /// Raw (label, hits) pairs in table order, zero-hit labels dropped
    pub fn hits(text: &str) -> Vec<(&'static str, usize)>
    {
        let lower = text.to_lowercase();

        LEXICON
            .iter()
            .filter_map(|(label, triggers)| {
                let n: usize = triggers
                    .iter()
                    .map(|t| {
                        lower
                            .matches(t)
                            .count()
                    })
                    .sum();
                (n > 0).then_some((*label, n))
            })
            .collect()
    }
}

impl TopicStrategy for KeywordLexicon
{
    fn kind(&self) -> StrategyKind
    {
        StrategyKind::Keyword
    }

    fn score(
        &self,
        text: &str,
    ) -> Vec<LabelScore>
    {
        let mut hits = Self::hits(text);
        let total: usize = hits
            .iter()
            .map(|(_, n)| n)
            .sum();
        if total == 0
        {
            return Vec::new();
        }

        // Stable: equal counts stay in table order
        hits.sort_by(|a, b| b.1.cmp(&a.1));

        hits.into_iter()
            .map(|(label, n)| LabelScore::new(label, n as f64 / total as f64))
            .collect()
    }
}
