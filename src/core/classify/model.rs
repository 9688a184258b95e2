//! Model-backed topic scorer over a zero-shot inference endpoint.
//!
//! Speaks the common zero-shot JSON shape: the request carries the text plus
//! the candidate labels with `multi_label` set, the response either
//! `{labels, scores}` or a list of `{label, score}` objects. Failures never
//! leave this module as errors once the strategy is in use; they are logged
//! and scored as "no labels" so the caller falls back.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ACCEPTANCE_THRESHOLD, LabelScore, StrategyKind, TopicStrategy};
use crate::infra::config::ClassifierConfig;

/// Text sent when checking that the endpoint answers
const PROBE_TEXT: &str = "availability probe";

#[derive(Debug, thiserror::Error)]
pub enum ModelError
{
    #[error("no classifier endpoint configured")]
    Unconfigured,

    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("endpoint returned HTTP {status}: {body}")]
    Status
    {
        status: u16,
        body: String,
    },

    #[error("unexpected response: {0}")]
    Decode(String),
}

#[derive(Debug, Serialize)]
struct ZeroShotRequest<'a>
{
    inputs: &'a str,
    parameters: ZeroShotParameters<'a>,
}

#[derive(Debug, Serialize)]
struct ZeroShotParameters<'a>
{
    candidate_labels: &'a [String],
    multi_label: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ZeroShotResponse
{
    Parallel
    {
        labels: Vec<String>,
        scores: Vec<f64>,
    },
    Pairs(Vec<LabelScore>),
}

/// HTTP zero-shot classifier
#[derive(Debug, Clone)]
pub struct ZeroShotModel
{
    client: Client,
    endpoint: String,
    token: Option<String>,
    labels: Vec<String>,
}

impl ZeroShotModel
{
    /// Build a client from config. Does not touch the network.
    pub fn from_config(cfg: &ClassifierConfig) -> Result<Self, ModelError>
    {
        let endpoint = cfg
            .endpoint
            .clone()
            .filter(|e| !e.trim().is_empty())
            .ok_or(ModelError::Unconfigured)?;

        let token = cfg
            .api_token_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|t| !t.is_empty());

        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;

        Ok(Self { client, endpoint, token, labels: cfg.labels.clone() })
    }

    /// One scoring round trip, errors surfaced
    pub fn try_score(
        &self,
        text: &str,
    ) -> Result<Vec<LabelScore>, ModelError>
    {
        let body = ZeroShotRequest {
            inputs: text,
            parameters: ZeroShotParameters { candidate_labels: &self.labels, multi_label: true },
        };

        let mut req = self
            .client
            .post(&self.endpoint)
            .json(&body);
        if let Some(token) = &self.token
        {
            req = req.bearer_auth(token);
        }

        let resp = req.send()?;
        let status = resp.status();
        if !status.is_success()
        {
            let body = resp
                .text()
                .unwrap_or_default();
            return Err(ModelError::Status { status: status.as_u16(), body });
        }

        let raw = resp.text()?;
        parse_response(&raw)
    }
}

impl TopicStrategy for ZeroShotModel
{
    fn kind(&self) -> StrategyKind
    {
        StrategyKind::Model
    }

    fn probe(&self) -> bool
    {
        match self.try_score(PROBE_TEXT)
        {
            Ok(_) => true,
            Err(e) =>
            {
                warn!(endpoint = %self.endpoint, error = %e, "zero-shot model unavailable, using keyword classifier");
                false
            }
        }
    }

    fn score(
        &self,
        text: &str,
    ) -> Vec<LabelScore>
    {
        match self.try_score(text)
        {
            Ok(scores) => scores,
            Err(e) =>
            {
                debug!(error = %e, "model scoring failed for document");
                Vec::new()
            }
        }
    }
}

/// Decode a response body and keep labels at or above the threshold,
/// highest score first.
pub fn parse_response(raw: &str) -> Result<Vec<LabelScore>, ModelError>
{
    let decoded: ZeroShotResponse =
        serde_json::from_str(raw).map_err(|e| ModelError::Decode(e.to_string()))?;

    let pairs = match decoded
    {
        ZeroShotResponse::Parallel { labels, scores } =>
        {
            if labels.len() != scores.len()
            {
                return Err(ModelError::Decode(format!(
                    "{} labels but {} scores",
                    labels.len(),
                    scores.len()
                )));
            }
            labels
                .into_iter()
                .zip(scores)
                .map(|(label, score)| LabelScore { label, score })
                .collect()
        }
        ZeroShotResponse::Pairs(pairs) => pairs,
    };

    let mut kept: Vec<LabelScore> = pairs
        .into_iter()
        .filter(|p| p.score.is_finite())
        .map(|p| LabelScore::new(p.label, p.score.clamp(0.0, 1.0)))
        .filter(|p| p.score >= ACCEPTANCE_THRESHOLD)
        .collect();
    kept.sort_by(|a, b| b.score.total_cmp(&a.score));

    Ok(kept)
}
