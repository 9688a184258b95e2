//! Title clustering: exact titles served from more than one URL.
//!
//! Titles are trimmed but keep their case, and matching is exact string
//! equality. Clusters span every bucket of the index since a mirror rarely
//! serves byte-identical content. A title seen at a single URL, however many
//! times, is not evidence of mirroring and is dropped.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use itertools::Itertools;
use owo_colors::OwoColorize;
use serde::Deserialize;
use tabled::{Table, Tabled};
use tracing::{debug, info, instrument};

use crate::cli::{AppContext, ClustersArgs};
use crate::core::index::EnrichedIndex;
use crate::core::record::SourceRecord;
use crate::infra::io::read_file_smart;

/// Title → distinct URLs, multi-URL titles only
pub type TitleClusters = BTreeMap<String, BTreeSet<String>>;

/// Group records by trimmed title and keep titles seen at > 1 URL.
///
/// Records lacking a title or URL are skipped.
pub fn cluster_records<'a>(records: impl IntoIterator<Item = &'a SourceRecord>) -> TitleClusters
{
    let mut by_title: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut skipped = 0usize;

    for rec in records
    {
        let (Some(title), Some(url)) = (rec.clean_title(), rec.clean_url())
        else
        {
            skipped += 1;
            continue;
        };

        by_title
            .entry(title.to_string())
            .or_default()
            .insert(url.to_string());
    }

    if skipped > 0
    {
        debug!(skipped, "records without title or url left out of clustering");
    }

    by_title.retain(|_, urls| urls.len() > 1);
    by_title
}

/// Cluster over every member of every entry
#[instrument(skip_all, fields(entries = index.len()))]
pub fn cluster_index(index: &EnrichedIndex) -> TitleClusters
{
    let clusters = cluster_records(
        index
            .values()
            .flat_map(|e| e.records.iter())
            .map(|r| &r.record),
    );
    info!(clusters = clusters.len(), "title clusters built");
    clusters
}

/// Just the parts of a written fingerprint entry clustering needs
#[derive(Debug, Deserialize)]
struct StoredEntry
{
    #[serde(default)]
    records: Vec<SourceRecord>,
}

/// Cluster titles from a previously written fingerprint file
pub fn cluster_file(path: &Path) -> Result<TitleClusters>
{
    let content =
        read_file_smart(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let stored: IndexMap<String, StoredEntry> = serde_json::from_str(content.as_ref())
        .with_context(|| format!("{} is not a fingerprint index", path.display()))?;

    Ok(cluster_records(
        stored
            .values()
            .flat_map(|e| e.records.iter()),
    ))
}

/// `clusters` command
pub fn run(
    args: ClustersArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let clusters = cluster_file(&args.input)?;

    if let Some(out) = &args.output
    {
        if ctx.dry_run
        {
            if !ctx.quiet
            {
                println!(
                    "{}",
                    format!("DRY RUN: Would write {} clusters to {}", clusters.len(), out.display())
                        .yellow()
                );
            }
        }
        else
        {
            crate::infra::io::write_json(out, &clusters)?;
            if !ctx.quiet
            {
                println!("{} Grouped titles saved to {}", "✓".green(), out.display());
            }
        }
    }

    if args.json
    {
        println!("{}", serde_json::to_string_pretty(&clusters)?);
        return Ok(());
    }

    if ctx.quiet
    {
        return Ok(());
    }

    if clusters.is_empty()
    {
        println!("{}", "No titles with multiple links found.".yellow());
        return Ok(());
    }

    #[derive(Tabled)]
    struct Row
    {
        title: String,
        urls: usize,
        sample: String,
    }

    let rows: Vec<Row> = clusters
        .iter()
        .sorted_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(b.0)))
        .map(|(title, urls)| Row {
            title: title.clone(),
            urls: urls.len(),
            sample: urls
                .iter()
                .take(2)
                .join(", "),
        })
        .collect();

    println!("{}", Table::new(rows));
    Ok(())
}
