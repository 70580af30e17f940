pub mod config;
pub mod error;
pub mod http;
pub mod retry;
pub mod traits;
pub mod types;

pub use error::{Error, Result, Stage};
pub use retry::RetryPolicy;
pub use traits::{EmbeddingProvider, ProviderInfo, Reranker, VectorStore, WebSearch};
pub use types::{
    DataSource, DegradationCause, EmbeddingVector, Provenance, Query, RerankedResult, SearchCandidate,
    SearchResponse, SearchResult,
};
