use async_trait::async_trait;
use std::time::Duration;

use kbsearch_core::config::{mask_secret, HttpConfig};
use kbsearch_core::http::client;
use kbsearch_core::{EmbeddingProvider, EmbeddingVector, ProviderInfo, Result};

use crate::wire::{post_embedding, EmbeddingRequest};

/// Embeddings from any OpenAI-compatible endpoint (DashScope by default).
///
/// The requested `dimensions` is sent with every call so models that support
/// truncated output match the collection schema.
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dims: usize,
    health_timeout: Duration,
}

impl OpenAiCompatibleProvider {
    pub fn new(base_url: &str, api_key: &str, model: &str, dims: usize, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: client(http.request_timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            dims,
            health_timeout: http.health_timeout,
        })
    }

    fn request<'a>(&'a self, text: &'a str) -> EmbeddingRequest<'a> {
        EmbeddingRequest { model: &self.model, input: [text], dimensions: Some(self.dims), encoding_format: Some("float") }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatibleProvider {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        let url = format!("{}/embeddings", self.base_url);
        post_embedding(&self.client, &url, Some(&self.api_key), &self.request(text), self.dims).await
    }

    fn dimension(&self) -> usize {
        self.dims
    }

    /// Embeds a throwaway string; there is no cheaper probe on these APIs.
    async fn health_check(&self) -> bool {
        matches!(tokio::time::timeout(self.health_timeout, self.embed("test")).await, Ok(Ok(_)))
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo::new("OpenAI Compatible")
            .with("base_url", &self.base_url)
            .with("model", &self.model)
            .with("dimensions", self.dims)
            .with("api_key", mask_secret(&self.api_key))
    }
}
