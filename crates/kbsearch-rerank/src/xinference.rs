use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::Duration;
use tracing::debug;

use kbsearch_core::config::HttpConfig;
use kbsearch_core::http::{client, model_is_served, status_error, transport_error};
use kbsearch_core::{Error, ProviderInfo, RerankedResult, Reranker, Result, SearchCandidate, Stage};

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: Vec<&'a str>,
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankScore>,
}

#[derive(Debug, Deserialize)]
struct RerankScore {
    index: usize,
    relevance_score: f32,
}

/// Cross-encoder reranking via Xinference's `/v1/rerank`.
pub struct XinferenceReranker {
    client: reqwest::Client,
    base_url: String,
    model: String,
    health_timeout: Duration,
}

impl XinferenceReranker {
    pub fn new(base_url: &str, model: &str, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: client(http.request_timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            health_timeout: http.health_timeout,
        })
    }
}

fn malformed(msg: impl Into<String>) -> Error {
    Error::RerankerUnavailable(msg.into())
}

/// Pair each score with its candidate. Every candidate must be scored exactly
/// once; the output is sorted by descending relevance and ties keep the
/// incoming order.
pub fn apply_scores(body: &str, candidates: &[SearchCandidate]) -> Result<Vec<RerankedResult>> {
    let response: RerankResponse =
        serde_json::from_str(body).map_err(|e| malformed(format!("unexpected rerank response: {e}")))?;
    if response.results.len() != candidates.len() {
        return Err(malformed(format!(
            "rerank returned {} scores for {} documents",
            response.results.len(),
            candidates.len()
        )));
    }
    let mut scores: Vec<Option<f32>> = vec![None; candidates.len()];
    for r in &response.results {
        let slot = scores.get_mut(r.index).ok_or_else(|| malformed(format!("rerank index {} out of range", r.index)))?;
        if slot.replace(r.relevance_score).is_some() {
            return Err(malformed(format!("rerank index {} scored twice", r.index)));
        }
    }
    let mut out: Vec<RerankedResult> = candidates
        .iter()
        .zip(scores)
        .map(|(c, s)| RerankedResult { candidate: c.clone(), relevance_score: s.unwrap_or(f32::NEG_INFINITY) })
        .collect();
    out.sort_by(|a, b| b.relevance_score.partial_cmp(&a.relevance_score).unwrap_or(Ordering::Equal));
    Ok(out)
}

#[async_trait]
impl Reranker for XinferenceReranker {
    async fn rerank(&self, query: &str, candidates: &[SearchCandidate]) -> Result<Vec<RerankedResult>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/v1/rerank", self.base_url);
        let request = RerankRequest {
            model: &self.model,
            query,
            documents: candidates.iter().map(|c| c.content.as_str()).collect(),
            top_n: candidates.len(),
        };
        debug!(model = %self.model, documents = candidates.len(), "xinference rerank");
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(Stage::Rerank, &e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| transport_error(Stage::Rerank, &e))?;
        if !status.is_success() {
            return Err(status_error(Stage::Rerank, status, &body));
        }
        apply_scores(&body, candidates)
    }

    /// Healthy when the server lists the rerank model as launched.
    async fn health_check(&self) -> bool {
        model_is_served(&self.client, &self.base_url, &self.model, self.health_timeout).await
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo::new("Xinference").with("host", &self.base_url).with("rerank_model", &self.model)
    }
}
