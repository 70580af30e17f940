//! Second-stage relevance scoring.

use std::sync::Arc;
use tracing::info;

use kbsearch_core::config::{HttpConfig, RerankConfig};
use kbsearch_core::{Reranker, Result};

pub mod xinference;

pub use xinference::XinferenceReranker;

/// `None` when reranking is disabled by configuration.
pub fn build_reranker(config: Option<&RerankConfig>, http: &HttpConfig) -> Result<Option<Arc<dyn Reranker>>> {
    let Some(config) = config else {
        info!("reranking disabled");
        return Ok(None);
    };
    let reranker = XinferenceReranker::new(&config.base_url, &config.model, http)?;
    info!(model = %config.model, "reranker selected");
    Ok(Some(Arc::new(reranker)))
}
