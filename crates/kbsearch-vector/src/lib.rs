//! Vector stores: an embedded LanceDB table and a Milvus collection over REST.

use std::cmp::Ordering;
use std::sync::Arc;
use tracing::info;

use kbsearch_core::config::{HttpConfig, StoreBackend, StoreConfig};
use kbsearch_core::{Result, SearchCandidate, VectorStore};

pub mod lance;
pub mod milvus;
pub mod record;
pub mod schema;

pub use lance::LanceStore;
pub use milvus::MilvusStore;
pub use record::{KnowledgeRecord, RecordOptions};

/// Descending similarity. Stable, so equal scores keep the store's order.
pub fn sort_by_similarity(candidates: &mut [SearchCandidate]) {
    candidates.sort_by(|a, b| b.similarity_score.partial_cmp(&a.similarity_score).unwrap_or(Ordering::Equal));
}

pub fn build_store(config: &StoreConfig, http: &HttpConfig) -> Result<Arc<dyn VectorStore>> {
    let options = RecordOptions { snippet_chars: config.snippet_chars, default_source: config.default_source.clone() };
    let store: Arc<dyn VectorStore> = match &config.backend {
        StoreBackend::Milvus { uri, token, metric, vector_field } => Arc::new(MilvusStore::new(
            uri,
            token.as_deref(),
            &config.collection,
            *metric,
            vector_field,
            options,
            http,
        )?),
        StoreBackend::Lance { uri } => Arc::new(LanceStore::new(uri, &config.collection, options)),
    };
    let info = store.info();
    info!(store = %info.provider, collection = %config.collection, "vector store selected");
    Ok(store)
}
