use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use kbsearch_core::config::HttpConfig;
use kbsearch_core::http::{client, model_is_served};
use kbsearch_core::{EmbeddingProvider, EmbeddingVector, ProviderInfo, Result};

use crate::wire::{post_embedding, EmbeddingRequest};

/// Embeddings from a locally hosted Xinference server.
pub struct XinferenceProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dims: usize,
    health_timeout: Duration,
}

impl XinferenceProvider {
    pub fn new(base_url: &str, model: &str, dims: usize, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: client(http.request_timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dims,
            health_timeout: http.health_timeout,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for XinferenceProvider {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        let url = format!("{}/v1/embeddings", self.base_url);
        debug!(model = %self.model, chars = text.len(), "xinference embed");
        let request = EmbeddingRequest { model: &self.model, input: [text], dimensions: None, encoding_format: None };
        post_embedding(&self.client, &url, None, &request, self.dims).await
    }

    fn dimension(&self) -> usize {
        self.dims
    }

    /// Healthy when the server lists the embedding model as launched. The
    /// rerank model is probed by the reranker, so a missing reranker never
    /// marks embeddings as down.
    async fn health_check(&self) -> bool {
        model_is_served(&self.client, &self.base_url, &self.model, self.health_timeout).await
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo::new("Xinference")
            .with("host", &self.base_url)
            .with("embedding_model", &self.model)
            .with("dimensions", self.dims)
    }
}
