//! Cross-encoder reranker via OpenAI-compatible `/v1/rerank` endpoint.
//!
//! Sends a single batch request with all query-document pairs. Typical
//! latency: 50-100ms for a few dozen candidates.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::RerankerConfig;

/// Scores (query, document) pairs independently.
pub trait Reranker: Send + Sync {
    /// One score per document, in input order. Higher is more relevant.
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>>;
}

/// Build the reranker client, or `None` when no endpoint is configured.
pub fn build_reranker(config: &RerankerConfig) -> Result<Option<Arc<dyn Reranker>>> {
    if config.base_url.is_none() {
        return Ok(None);
    }
    Ok(Some(Arc::new(CrossEncoderClient::new(config.clone())?)))
}

/// HTTP client for a cross-encoder sidecar (e.g. llama-server with a reranker model).
pub struct CrossEncoderClient {
    client: reqwest::blocking::Client,
    config: RerankerConfig,
}

impl CrossEncoderClient {
    pub fn new(config: RerankerConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(config.timeout_secs.min(30)))
            .build()
            .context("Failed to build reranker HTTP client")?;
        Ok(Self { client, config })
    }
}

impl Reranker for CrossEncoderClient {
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let base_url = self
            .config
            .base_url
            .as_deref()
            .context("Reranker base_url not configured")?;

        let model = self.config.model.as_deref().unwrap_or("default");

        let url = format!("{}/v1/rerank", base_url.trim_end_matches('/'));

        let req_body = RerankRequest {
            model: model.to_string(),
            query: query.to_string(),
            documents: documents.to_vec(),
            top_n: documents.len(),
        };

        let resp = self
            .client
            .post(&url)
            .json(&req_body)
            .send()
            .context("Failed to reach reranker endpoint")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            anyhow::bail!("Reranker returned {status}: {body}");
        }

        let body: RerankResponse = resp
            .json()
            .context("Failed to parse reranker response")?;

        scores_in_input_order(body.results, documents.len())
    }
}

/// Place sigmoid-normalised scores back at their document positions.
fn scores_in_input_order(results: Vec<RerankResultRaw>, expected: usize) -> Result<Vec<f32>> {
    let mut scores: Vec<Option<f32>> = vec![None; expected];
    for r in results {
        let slot = scores
            .get_mut(r.index)
            .with_context(|| format!("Reranker returned out-of-range index {}", r.index))?;
        *slot = Some(sigmoid(r.relevance_score));
    }

    let returned = scores.iter().filter(|s| s.is_some()).count();
    if returned != expected {
        anyhow::bail!("Reranker scored {returned} of {expected} documents");
    }
    Ok(scores.into_iter().flatten().collect())
}

/// Sigmoid normalization: maps raw logits to 0-1 range.
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

// ─── Request/Response types ────────────────────────────

#[derive(Serialize)]
struct RerankRequest {
    model: String,
    query: String,
    documents: Vec<String>,
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResultRaw>,
}

#[derive(Deserialize)]
struct RerankResultRaw {
    index: usize,
    relevance_score: f32,
}
