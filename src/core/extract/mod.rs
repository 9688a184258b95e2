//! Artifact extraction: identity tokens and cross-references in fetched pages.
//!
//! Everything here is syntactic and best-effort. Wallet-looking strings are
//! not checksum-verified and key blocks are not parsed; downstream consumers
//! treat every hit as an unverified candidate. A document with no matches
//! produces empty sets, never an error.

pub mod document;

pub use document::{DocumentText, keyword_summary, snippet};

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use indexmap::IndexSet;
use owo_colors::OwoColorize;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::cli::{AppContext, ExtractArgs};
use crate::core::hasher;
use crate::core::record::{ExtractedArtifacts, SocialHandles};
use crate::infra::io::read_file_smart;

const PGP_BLOCK: &str =
    r"(?s)-----BEGIN PGP PUBLIC KEY BLOCK-----.*?-----END PGP PUBLIC KEY BLOCK-----";
const LEGACY_WALLET: &str = r"\b[13][a-km-zA-HJ-NP-Z1-9]{25,34}\b";
const EMAIL: &str = r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b";
const ONION_HOST: &str = r"\b[a-z2-7]{16}\.onion\b|\b[a-z2-7]{56}\.onion\b";

// Mentions must not sit inside an email or a path
const MENTION: &str = r"(?:^|[^A-Za-z0-9_.@/+-])@([A-Za-z0-9_]{4,})";
const TELEGRAM_LINK: &str = r"(?i)\bt\.me/[A-Za-z0-9_]+";
const X_LINK: &str = r"(?i)\b(?:twitter|x)\.com/[A-Za-z0-9_]+";
const DISCORD_INVITE: &str =
    r"(?i)\b(?:discord\.gg/[A-Za-z0-9]+|discord(?:app)?\.com/invite/[A-Za-z0-9]+)";

pub const TELEGRAM: &str = "telegram";
pub const X: &str = "x";
pub const DISCORD: &str = "discord";

/// Everything pulled out of one document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Extraction
{
    pub artifacts: ExtractedArtifacts,
    pub outbound_references: BTreeSet<String>,
    pub social_handles: SocialHandles,
}

/// Compiled pattern set, built once and shared across documents
#[derive(Debug, Clone)]
pub struct ArtifactExtractor
{
    pgp: Regex,
    wallet: Regex,
    email: Regex,
    onion: Regex,
    mention: Regex,
    telegram: Regex,
    x: Regex,
    discord: Regex,
    anchors: Selector,
}

impl ArtifactExtractor
{
    pub fn new() -> Result<Self>
    {
        Ok(Self {
            pgp: Regex::new(PGP_BLOCK)?,
            wallet: Regex::new(LEGACY_WALLET)?,
            email: Regex::new(EMAIL)?,
            onion: Regex::new(ONION_HOST)?,
            mention: Regex::new(MENTION)?,
            telegram: Regex::new(TELEGRAM_LINK)?,
            x: Regex::new(X_LINK)?,
            discord: Regex::new(DISCORD_INVITE)?,
            anchors: Selector::parse("a[href]")
                .map_err(|e| anyhow::anyhow!("anchor selector: {e}"))?,
        })
    }

    /// Run every extractor. `markup` feeds links and handles, `text` feeds
    /// identity artifacts.
    pub fn extract(
        &self,
        markup: &str,
        text: &str,
    ) -> Extraction
    {
        Extraction {
            artifacts: self.artifacts(text),
            outbound_references: self.outbound_references(markup),
            social_handles: self.social_handles(markup),
        }
    }

    /// Key blocks, wallet-like strings and emails found in plain text
    pub fn artifacts(
        &self,
        text: &str,
    ) -> ExtractedArtifacts
    {
        let collect = |re: &Regex| -> BTreeSet<String> {
            re.find_iter(text)
                .map(|m| {
                    m.as_str()
                        .to_string()
                })
                .collect()
        };

        ExtractedArtifacts {
            pgp_keys: collect(&self.pgp),
            btc_wallets: collect(&self.wallet),
            emails: collect(&self.email),
        }
    }

    /// Anchor targets mentioning `.onion` plus bare onion hosts in the markup
    pub fn outbound_references(
        &self,
        markup: &str,
    ) -> BTreeSet<String>
    {
        let mut refs = BTreeSet::new();

        let doc = Html::parse_document(markup);
        for a in doc.select(&self.anchors)
        {
            if let Some(href) = a
                .value()
                .attr("href")
            {
                let href = href.trim();
                if href.contains(".onion")
                {
                    refs.insert(href.to_string());
                }
            }
        }

        for m in self
            .onion
            .find_iter(markup)
        {
            refs.insert(
                m.as_str()
                    .to_string(),
            );
        }

        refs
    }

    /// Per-platform handle candidates, first-seen order, no repeats
    pub fn social_handles(
        &self,
        markup: &str,
    ) -> SocialHandles
    {
        let mentions: Vec<String> = self
            .mention
            .captures_iter(markup)
            .filter_map(|c| c.get(1))
            .map(|m| format!("@{}", m.as_str()))
            .collect();

        let links = |re: &Regex| -> Vec<String> {
            re.find_iter(markup)
                .map(|m| {
                    m.as_str()
                        .to_string()
                })
                .collect()
        };

        // @mentions are ambiguous between telegram and x, so both get them
        let telegram = ordered_unique(
            links(&self.telegram)
                .into_iter()
                .chain(mentions.iter().cloned()),
        );
        let x = ordered_unique(
            links(&self.x)
                .into_iter()
                .chain(mentions.iter().cloned()),
        );
        let discord = ordered_unique(links(&self.discord));

        let mut handles = SocialHandles::new();
        handles.insert(TELEGRAM.to_string(), telegram);
        handles.insert(X.to_string(), x);
        handles.insert(DISCORD.to_string(), discord);
        handles
    }
}

fn ordered_unique(items: impl IntoIterator<Item = String>) -> Vec<String>
{
    items
        .into_iter()
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

/// Output of the `extract` command
#[derive(Debug, Serialize)]
struct ExtractReport
{
    file: PathBuf,
    title: String,
    word_count: usize,
    keywords: Vec<String>,
    snippet: String,
    html_hash: String,
    text_hash: String,
    #[serde(flatten)]
    extraction: Extraction,
}

/// `extract` command: analyse one local HTML file
#[instrument(skip(args, ctx), fields(file = %args.input.display()))]
pub fn run(
    args: ExtractArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let content = read_file_smart(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let markup: &str = content.as_ref();

    let doc = DocumentText::from_html(markup);
    let extractor = ArtifactExtractor::new()?;
    let extraction = extractor.extract(markup, &doc.text);

    debug!(
        pgp = extraction.artifacts.pgp_keys.len(),
        wallets = extraction.artifacts.btc_wallets.len(),
        emails = extraction.artifacts.emails.len(),
        outbound = extraction.outbound_references.len(),
        "extraction finished"
    );

    let report = ExtractReport {
        file: args
            .input
            .clone(),
        title: doc
            .title
            .clone(),
        word_count: doc.word_count(),
        keywords: keyword_summary(&doc.text, args.keywords),
        snippet: snippet(&doc.text).to_string(),
        html_hash: hasher::raw_digest(markup.as_bytes()),
        text_hash: hasher::fingerprint(&doc.text),
        extraction,
    };

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize extraction")?;

    match &args.output
    {
        Some(path) if !ctx.dry_run =>
        {
            crate::infra::io::write_json(path, &report)?;
            if !ctx.quiet
            {
                println!("{} Wrote extraction to {}", "✓".green(), path.display());
            }
        }
        Some(path) =>
        {
            if !ctx.quiet
            {
                println!(
                    "{}",
                    format!("DRY RUN: Would write {} bytes to {}", json.len(), path.display())
                        .yellow()
                );
            }
        }
        None => println!("{json}"),
    }

    Ok(())
}
