//! Embedding providers.
//!
//! Every backend implements [`kbsearch_core::EmbeddingProvider`]; callers pick
//! one once at startup through [`build_provider`] and never see the concrete
//! type.

use std::sync::Arc;
use tracing::info;

use kbsearch_core::config::{EmbeddingConfig, HttpConfig};
use kbsearch_core::{EmbeddingProvider, Result};

pub mod hash;
pub mod openai;
mod wire;
pub mod xinference;

pub use hash::HashEmbedder;
pub use openai::OpenAiCompatibleProvider;
pub use xinference::XinferenceProvider;

pub fn build_provider(config: &EmbeddingConfig, http: &HttpConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config {
        EmbeddingConfig::Xinference { base_url, model, dimension } => {
            Arc::new(XinferenceProvider::new(base_url, model, *dimension, http)?)
        }
        EmbeddingConfig::OpenAiCompatible { base_url, api_key, model, dimension } => {
            Arc::new(OpenAiCompatibleProvider::new(base_url, api_key, model, *dimension, http)?)
        }
        EmbeddingConfig::Hash { dimension } => Arc::new(HashEmbedder::new(*dimension)),
    };
    let info = provider.info();
    info!(provider = %info.provider, dimensions = provider.dimension(), "embedding provider selected");
    Ok(provider)
}
