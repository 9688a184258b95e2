//! Topic classification with a run-scoped strategy selection.
//!
//! The model-backed strategy is probed once when the classifier is built and
//! the answer is kept for the whole run. Per document the model goes first;
//! an empty answer is retried with the keyword lexicon, and a document that
//! neither strategy labels is recorded with an empty label list.

pub mod lexicon;
pub mod model;

pub use lexicon::KeywordLexicon;
pub use model::{ModelError, ZeroShotModel};

use anyhow::Result;
use itertools::Itertools;
use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};
use tabled::{Table, Tabled};
use tracing::{info, instrument};

use crate::cli::{AppContext, ClassifyArgs};
use crate::core::record::SourceRecord;
use crate::infra::config::{ClassifierConfig, load_config};

/// Minimum model confidence kept in a classification
pub const ACCEPTANCE_THRESHOLD: f64 = 0.30;

/// One ranked topic label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore
{
    pub label: String,
    /// Confidence in [0, 1]
    pub score: f64,
}

impl LabelScore
{
    pub fn new(
        label: impl Into<String>,
        score: f64,
    ) -> Self
    {
        Self { label: label.into(), score }
    }
}

/// Which strategy produced a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind
{
    Model,
    Keyword,
    /// Neither strategy produced a label
    None,
}

impl std::fmt::Display for StrategyKind
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result
    {
        match self
        {
            StrategyKind::Model => write!(f, "model"),
            StrategyKind::Keyword => write!(f, "keyword"),
            StrategyKind::None => write!(f, "none"),
        }
    }
}

/// Ranked labels plus their provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification
{
    pub strategy: StrategyKind,
    pub labels: Vec<LabelScore>,
}

impl Classification
{
    pub fn empty() -> Self
    {
        Self { strategy: StrategyKind::None, labels: Vec::new() }
    }

    pub fn is_empty(&self) -> bool
    {
        self.labels
            .is_empty()
    }
}

/// A way of scoring text against topic labels.
///
/// `score` must not fail: implementations absorb their own errors and answer
/// with an empty list.
pub trait TopicStrategy: Send + Sync
{
    fn kind(&self) -> StrategyKind;

    /// Availability check, run once when a classifier adopts the strategy
    fn probe(&self) -> bool
    {
        true
    }

    /// Ranked labels for `text`, possibly empty
    fn score(
        &self,
        text: &str,
    ) -> Vec<LabelScore>;
}

/// Strategy selection resolved for one run
pub struct TopicClassifier
{
    primary: Option<Box<dyn TopicStrategy>>,
    fallback: KeywordLexicon,
}

impl TopicClassifier
{
    /// Probe `candidate` once and keep it only if it answers
    pub fn new(candidate: Option<Box<dyn TopicStrategy>>) -> Self
    {
        let primary = candidate.filter(|c| c.probe());
        Self { primary, fallback: KeywordLexicon }
    }

    pub fn keyword_only() -> Self
    {
        Self::new(None)
    }

    /// Resolve from config: a configured endpoint becomes the candidate model
    #[instrument(skip(cfg))]
    pub fn resolve(
        cfg: &ClassifierConfig,
        allow_model: bool,
    ) -> Self
    {
        if !allow_model
        {
            info!("model strategy disabled, keyword classifier only");
            return Self::keyword_only();
        }

        let candidate = match ZeroShotModel::from_config(cfg)
        {
            Ok(m) => Some(Box::new(m) as Box<dyn TopicStrategy>),
            Err(ModelError::Unconfigured) =>
            {
                info!("no classifier endpoint configured, keyword classifier only");
                None
            }
            Err(e) =>
            {
                tracing::warn!(error = %e, "could not build model client, keyword classifier only");
                None
            }
        };

        let classifier = Self::new(candidate);
        info!(model = classifier.model_available(), "classifier resolved");
        classifier
    }

    pub fn model_available(&self) -> bool
    {
        self.primary
            .is_some()
    }

    /// Classify one representative text
    pub fn classify(
        &self,
        text: &str,
    ) -> Classification
    {
        if let Some(model) = &self.primary
        {
            let labels = model.score(text);
            if !labels.is_empty()
            {
                return Classification { strategy: model.kind(), labels };
            }
        }

        let labels = self
            .fallback
            .score(text);
        if labels.is_empty()
        {
            return Classification::empty();
        }

        Classification { strategy: self.fallback.kind(), labels }
    }
}

/// Bounded text standing in for a document: title then keywords
pub fn representative_text(
    record: &SourceRecord,
    keywords_cap: usize,
) -> String
{
    let title = record
        .title
        .as_deref()
        .unwrap_or_default();
    let keywords = record
        .keywords
        .iter()
        .take(keywords_cap)
        .join(" ");

    format!("{title} {keywords}")
}

/// `classify` command: score a single text with the run's selection policy
pub fn run(
    args: ClassifyArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let mut cfg = load_config()
        .unwrap_or_default()
        .classifier;
    if let Some(endpoint) = args.endpoint
    {
        cfg.endpoint = Some(endpoint);
    }

    let classifier = TopicClassifier::resolve(&cfg, !args.no_model);
    let result = classifier.classify(&args.text);

    if args.json
    {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if ctx.quiet
    {
        return Ok(());
    }

    if result.is_empty()
    {
        println!("{}", "No topic labels matched".yellow());
        return Ok(());
    }

    #[derive(Tabled)]
    struct Row
    {
        label: String,
        score: String,
    }

    let rows: Vec<Row> = result
        .labels
        .iter()
        .map(|l| Row { label: l.label.clone(), score: format!("{:.3}", l.score) })
        .collect();

    println!("strategy: {}", result.strategy.cyan());
    println!("{}", Table::new(rows));
    Ok(())
}
