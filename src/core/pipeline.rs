//! One pipeline run: index, classify, aggregate, cluster.
//!
//! Classification is the only stage that may block on the network, so it runs
//! on a bounded worker pool built for the run. Every worker checks the run's
//! cancellation flag before taking the next entry. A cancelled run returns
//! `PipelineError::Cancelled` and nothing from it is written.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::cli::{AppContext, RunArgs};
use crate::core::actors::{ActorMaps, ArtifactKind};
use crate::core::classify::{StrategyKind, TopicClassifier, representative_text};
use crate::core::clusters::{TitleClusters, cluster_index};
use crate::core::index::{EnrichedIndex, FingerprintEntry, FingerprintIndex, IndexOptions};
use crate::core::record::Payload;
use crate::infra::config::load_config;
use crate::infra::io::load_payload;
use crate::infra::output::{OutputLayout, write_outputs};

/// Pipeline failures
#[derive(Debug, thiserror::Error)]
pub enum PipelineError
{
    #[error("Pipeline run cancelled")]
    Cancelled,

    #[error("Invalid input {}: {reason}", path.display())]
    Input
    {
        path: PathBuf,
        reason: String,
    },

    #[error("Failed to write {}", path.display())]
    Output
    {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Run-scoped cancellation, shared by clone
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn cancel(&self)
    {
        self.0
            .store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool
    {
        self.0
            .load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<(), PipelineError>
    {
        if self.is_cancelled()
        {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }
}

/// Knobs for one run
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions
{
    /// Classification workers; 0 lets rayon pick
    pub workers: usize,
    /// Keywords taken into the representative text
    pub keywords_cap: usize,
    pub index: IndexOptions,
}

impl Default for PipelineOptions
{
    fn default() -> Self
    {
        Self { workers: 0, keywords_cap: 12, index: IndexOptions::default() }
    }
}

/// Counters describing a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport
{
    pub records: usize,
    pub dropped_records: usize,
    pub entries: usize,
    pub degraded_records: usize,
    pub stale_upstream_hashes: usize,
    pub malformed_upstream_hashes: usize,
    pub model_available: bool,
    pub classified_by_model: usize,
    pub classified_by_keyword: usize,
    pub unclassified: usize,
    pub pgp_keys: usize,
    pub btc_wallets: usize,
    pub emails: usize,
    pub shared_artifacts: usize,
    pub title_clusters: usize,
}

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput
{
    pub index: EnrichedIndex,
    pub actors: ActorMaps,
    pub clusters: TitleClusters,
    pub report: RunReport,
}

/// A configured run over one payload
pub struct Pipeline<'a>
{
    classifier: &'a TopicClassifier,
    opts: PipelineOptions,
    cancel: CancelFlag,
    progress: ProgressBar,
}

impl<'a> Pipeline<'a>
{
    pub fn new(
        classifier: &'a TopicClassifier,
        opts: PipelineOptions,
    ) -> Self
    {
        Self {
            classifier,
            opts,
            cancel: CancelFlag::new(),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_cancel(
        mut self,
        cancel: CancelFlag,
    ) -> Self
    {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(
        mut self,
        progress: ProgressBar,
    ) -> Self
    {
        self.progress = progress;
        self
    }

    /// Run every stage over `payload`
    #[instrument(skip_all, fields(workers = self.opts.workers))]
    pub fn run(
        &self,
        payload: Payload,
    ) -> Result<PipelineOutput, PipelineError>
    {
        self.cancel
            .check()?;

        let index = FingerprintIndex::build(payload, self.opts.index);
        let stats = index.stats();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.opts.workers)
            .build()?;

        let buckets: Vec<_> = index
            .into_buckets()
            .collect();
        self.progress
            .set_length(buckets.len() as u64);
        self.progress
            .set_message("classifying");

        // Indexed collect keeps first-seen order
        let entries: Vec<FingerprintEntry> = pool.install(|| {
            buckets
                .into_par_iter()
                .map(|bucket| {
                    self.cancel
                        .check()?;

                    let text = bucket
                        .records
                        .first()
                        .map(|r| representative_text(&r.record, self.opts.keywords_cap))
                        .unwrap_or_default();
                    let classification = self
                        .classifier
                        .classify(&text);
                    debug!(fingerprint = %bucket.fingerprint, strategy = %classification.strategy, "classified");

                    self.progress
                        .inc(1);
                    Ok(FingerprintEntry::from_bucket(bucket, classification))
                })
                .collect::<Result<_, PipelineError>>()
        })?;
        self.progress
            .finish_and_clear();

        self.cancel
            .check()?;

        let index: EnrichedIndex = entries
            .into_iter()
            .map(|e| (e.text_hash.clone(), e))
            .collect();

        let actors = pool.install(|| ActorMaps::aggregate(&index));
        let clusters = cluster_index(&index);

        self.cancel
            .check()?;

        let mut report = RunReport {
            records: stats.records,
            entries: index.len(),
            degraded_records: stats.degraded_records,
            stale_upstream_hashes: stats.stale_upstream_hashes,
            malformed_upstream_hashes: stats.malformed_upstream_hashes,
            model_available: self
                .classifier
                .model_available(),
            pgp_keys: actors
                .pgp_keys
                .len(),
            btc_wallets: actors
                .btc_wallets
                .len(),
            emails: actors
                .emails
                .len(),
            shared_artifacts: ArtifactKind::ALL
                .iter()
                .map(|k| {
                    actors
                        .shared(*k)
                        .count()
                })
                .sum(),
            title_clusters: clusters.len(),
            ..Default::default()
        };
        for entry in index.values()
        {
            match entry
                .classification
                .strategy
            {
                StrategyKind::Model => report.classified_by_model += 1,
                StrategyKind::Keyword => report.classified_by_keyword += 1,
                StrategyKind::None => report.unclassified += 1,
            }
        }

        info!(
            entries = report.entries,
            model = report.classified_by_model,
            keyword = report.classified_by_keyword,
            none = report.unclassified,
            "pipeline run finished"
        );

        Ok(PipelineOutput { index, actors, clusters, report })
    }
}

/// `run` command
pub fn run(
    args: RunArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let mut cfg = load_config().unwrap_or_default();
    if let Some(endpoint) = args.endpoint
    {
        cfg.classifier
            .endpoint = Some(endpoint);
    }
    if let Some(workers) = args.workers
    {
        cfg.pipeline
            .workers = workers;
    }

    let root = match args.output_dir
    {
        Some(dir) => dir,
        None => cfg
            .pipeline
            .resolved_output_dir(),
    };
    let layout = OutputLayout::today(root);

    let (payload, dropped) = load_payload(&args.input)?;
    let record_count: usize = payload
        .values()
        .map(Vec::len)
        .sum();

    if ctx.dry_run
    {
        if !ctx.quiet
        {
            println!(
                "{}",
                format!(
                    "DRY RUN: Would process {} records under {} labels into {}",
                    record_count,
                    payload.len(),
                    layout
                        .root()
                        .display()
                )
                .yellow()
            );
        }
        return Ok(());
    }

    let classifier = TopicClassifier::resolve(&cfg.classifier, !args.no_model);

    let progress = if ctx.quiet || args.json
    {
        ProgressBar::hidden()
    }
    else
    {
        let pb = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style.progress_chars("#>-"));
        pb
    };

    let opts = PipelineOptions {
        workers: cfg
            .pipeline
            .workers,
        keywords_cap: cfg
            .pipeline
            .keywords_cap,
        index: IndexOptions {
            retain_raw_text: cfg
                .pipeline
                .retain_raw_text,
        },
    };

    let mut output = Pipeline::new(&classifier, opts)
        .with_progress(progress)
        .run(payload)?;
    output
        .report
        .dropped_records = dropped;

    let written = write_outputs(&layout, &output)?;

    if args.json
    {
        #[derive(Serialize)]
        struct Summary<'a>
        {
            report: &'a RunReport,
            outputs: &'a crate::infra::output::WrittenOutputs,
        }
        println!(
            "{}",
            serde_json::to_string_pretty(&Summary { report: &output.report, outputs: &written })?
        );
        return Ok(());
    }

    if ctx.quiet
    {
        return Ok(());
    }

    let r = &output.report;
    println!(
        "{} {} records → {} fingerprints ({} degraded, {} dropped)",
        "✓".green(),
        r.records,
        r.entries,
        r.degraded_records,
        r.dropped_records
    );
    println!(
        "  topics: {} model, {} keyword, {} none{}",
        r.classified_by_model,
        r.classified_by_keyword,
        r.unclassified,
        if r.model_available { "" } else { " (model unavailable)" }
    );
    println!(
        "  actors: {} pgp, {} btc, {} email ({} shared across sources)",
        r.pgp_keys, r.btc_wallets, r.emails, r.shared_artifacts
    );
    println!("  title clusters: {}", r.title_clusters);
    println!("  fingerprints saved to {}", written.fingerprints.display());
    if let Some(path) = &written.grouped_titles
    {
        println!("  grouped titles saved to {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::core::classify::{LabelScore, TopicStrategy};
    use crate::core::record::SourceRecord;
    use std::sync::atomic::AtomicUsize;

    fn record(
        url: &str,
        title: &str,
        text: &str,
    ) -> SourceRecord
    {
        SourceRecord {
            url: Some(url.into()),
            title: Some(title.into()),
            raw_text: Some(text.into()),
            ..Default::default()
        }
    }

    fn payload(records: Vec<SourceRecord>) -> Payload
    {
        let mut p = Payload::new();
        p.insert("drugs forum".into(), records);
        p
    }

    /// Answers "drugs" for everything and cancels the run after `after` calls
    struct CancellingModel
    {
        calls: AtomicUsize,
        after: usize,
        cancel: CancelFlag,
    }

    impl TopicStrategy for CancellingModel
    {
        fn kind(&self) -> StrategyKind
        {
            StrategyKind::Model
        }

        fn score(
            &self,
            _text: &str,
        ) -> Vec<LabelScore>
        {
            if self
                .calls
                .fetch_add(1, Ordering::SeqCst)
                + 1
                >= self.after
            {
                self.cancel
                    .cancel();
            }
            vec![LabelScore::new("drugs", 0.9)]
        }
    }

    #[test]
    fn duplicate_texts_share_one_entry()
    {
        let classifier = TopicClassifier::keyword_only();
        let out = Pipeline::new(&classifier, PipelineOptions::default())
            .run(payload(vec![
                record("http://a.onion", "Shop", "Buy XTC here"),
                record("http://b.onion", "Shop", "buy   xtc HERE"),
            ]))
            .unwrap();

        assert_eq!(out.report.records, 2);
        assert_eq!(out.report.entries, 1);
        let entry = out
            .index
            .values()
            .next()
            .unwrap();
        assert_eq!(
            entry
                .urls()
                .into_iter()
                .collect::<Vec<_>>(),
            ["http://a.onion", "http://b.onion"]
        );
        assert_eq!(out.clusters["Shop"].len(), 2);
    }

    #[test]
    fn keyword_fallback_when_model_is_absent()
    {
        let classifier = TopicClassifier::keyword_only();
        let mut rec = record("http://a.onion", "fentanyl fentanyl fentanyl escrow", "listing");
        rec.keywords = vec![];

        let out = Pipeline::new(&classifier, PipelineOptions::default())
            .run(payload(vec![rec]))
            .unwrap();

        let entry = out
            .index
            .values()
            .next()
            .unwrap();
        assert_eq!(entry.classification.strategy, StrategyKind::Keyword);
        assert_eq!(entry.classification.labels[0].label, "drugs");
        assert_eq!(out.report.classified_by_keyword, 1);
        assert!(!out.report.model_available);
    }

    #[test]
    fn entries_keep_first_seen_order()
    {
        let classifier = TopicClassifier::keyword_only();
        let records: Vec<_> = (0..40)
            .map(|i| record(&format!("http://{i}.onion"), "t", &format!("body {i}")))
            .collect();
        let expected: Vec<String> = records
            .iter()
            .map(|r| crate::core::hasher::fingerprint(r.raw_text.as_deref().unwrap()))
            .collect();

        let out = Pipeline::new(&classifier, PipelineOptions { workers: 4, ..Default::default() })
            .run(payload(records))
            .unwrap();

        let keys: Vec<String> = out
            .index
            .keys()
            .cloned()
            .collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn cancelled_before_start()
    {
        let classifier = TopicClassifier::keyword_only();
        let cancel = CancelFlag::new();
        cancel.cancel();

        let err = Pipeline::new(&classifier, PipelineOptions::default())
            .with_cancel(cancel)
            .run(payload(vec![record("http://a.onion", "t", "x")]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }

    #[test]
    fn cancelled_mid_classification()
    {
        let cancel = CancelFlag::new();
        let classifier = TopicClassifier::new(Some(Box::new(CancellingModel {
            calls: AtomicUsize::new(0),
            after: 3,
            cancel: cancel.clone(),
        })));
        let records: Vec<_> = (0..200)
            .map(|i| record(&format!("http://{i}.onion"), "t", &format!("body {i}")))
            .collect();

        let err = Pipeline::new(&classifier, PipelineOptions { workers: 2, ..Default::default() })
            .with_cancel(cancel)
            .run(payload(records))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }

    #[test]
    fn raw_text_can_be_dropped_after_hashing()
    {
        let classifier = TopicClassifier::keyword_only();
        let opts = PipelineOptions {
            index: IndexOptions { retain_raw_text: false },
            ..Default::default()
        };

        let out = Pipeline::new(&classifier, opts)
            .run(payload(vec![record("http://a.onion", "t", "secret body")]))
            .unwrap();

        let entry = out
            .index
            .values()
            .next()
            .unwrap();
        assert!(entry.records[0].record.raw_text.is_none());
        assert_eq!(entry.text_hash, crate::core::hasher::fingerprint("secret body"));
    }
}
