use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::types::{EmbeddingVector, RerankedResult, SearchCandidate, SearchResult};

/// Human-readable description of a configured backend, printed by `kbsearch info`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProviderInfo {
    pub provider: String,
    pub details: BTreeMap<String, String>,
}

impl ProviderInfo {
    pub fn new(provider: impl Into<String>) -> Self {
        Self { provider: provider.into(), details: BTreeMap::new() }
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.details.insert(key.to_string(), value.to_string());
        self
    }
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text. Connection and timeout failures are
    /// `ProviderUnavailable`, malformed payloads `ProviderError`.
    async fn embed(&self, text: &str) -> Result<EmbeddingVector>;
    fn dimension(&self) -> usize;
    /// Best effort; implementations bound this by a short timeout.
    async fn health_check(&self) -> bool;
    fn info(&self) -> ProviderInfo;
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Top-`limit` candidates, descending similarity. Returns fewer when the
    /// collection holds less data.
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchCandidate>>;
    /// `Ok(false)` for a reachable store without the collection.
    async fn exists(&self) -> Result<bool>;
    fn info(&self) -> ProviderInfo;
}

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Same membership as `candidates`, descending relevance.
    async fn rerank(&self, query: &str, candidates: &[SearchCandidate]) -> Result<Vec<RerankedResult>>;
    async fn health_check(&self) -> bool;
    fn info(&self) -> ProviderInfo;
}

/// Open-web search collaborator. It owns its failure policy, so it never errors.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Vec<SearchResult>;
}
