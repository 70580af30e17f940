#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kbsearch_core::config::RouterConfig;
use kbsearch_core::{
    EmbeddingProvider, EmbeddingVector, Error, ProviderInfo, Provenance, RerankedResult, Reranker, Result,
    RetryPolicy, SearchCandidate, SearchResult, VectorStore, WebSearch,
};
use kbsearch_router::{Backends, DataSourceRouter};

#[derive(Default)]
pub struct Calls(AtomicUsize);

impl Calls {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum EmbedMode {
    Up,
    Down,
    /// Reachable, but answers with a payload that is not an embedding.
    Malformed,
}

pub struct MockEmbedder {
    pub dim: usize,
    pub mode: EmbedMode,
    pub calls: Calls,
}

impl MockEmbedder {
    pub fn up(dim: usize) -> Arc<Self> {
        Arc::new(Self { dim, mode: EmbedMode::Up, calls: Calls::default() })
    }

    pub fn down() -> Arc<Self> {
        Arc::new(Self { dim: 8, mode: EmbedMode::Down, calls: Calls::default() })
    }

    pub fn malformed() -> Arc<Self> {
        Arc::new(Self { dim: 8, mode: EmbedMode::Malformed, calls: Calls::default() })
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, _text: &str) -> Result<EmbeddingVector> {
        self.calls.hit();
        match self.mode {
            EmbedMode::Up => Ok(vec![0.5; self.dim]),
            EmbedMode::Down => Err(Error::ProviderUnavailable("connection refused".into())),
            EmbedMode::Malformed => Err(Error::ProviderError("embedding response contained no data".into())),
        }
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    async fn health_check(&self) -> bool {
        self.mode != EmbedMode::Down
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo::new("Mock")
    }
}

pub enum StoreMode {
    Up,
    Down,
    Missing,
}

pub struct MockStore {
    pub dim: usize,
    pub docs: usize,
    pub mode: StoreMode,
    pub calls: Calls,
    pub last_limit: AtomicUsize,
}

impl MockStore {
    pub fn with_docs(dim: usize, docs: usize) -> Arc<Self> {
        Arc::new(Self { dim, docs, mode: StoreMode::Up, calls: Calls::default(), last_limit: AtomicUsize::new(0) })
    }

    pub fn in_mode(mode: StoreMode) -> Arc<Self> {
        Arc::new(Self { dim: 8, docs: 20, mode, calls: Calls::default(), last_limit: AtomicUsize::new(0) })
    }

    pub fn last_limit(&self) -> usize {
        self.last_limit.load(Ordering::SeqCst)
    }
}

pub fn candidate(i: usize, similarity: f32) -> SearchCandidate {
    SearchCandidate {
        id: format!("iec-{i}"),
        title: format!("IEC 61850 part {i}"),
        content: format!("IEC 61850 protocol section {i}"),
        source: "IEC knowledge base".into(),
        page_number: Some(i as u32 + 1),
        file_path: Some(format!("/library/iec61850-{i}.pdf")),
        similarity_score: similarity,
    }
}

#[async_trait]
impl VectorStore for MockStore {
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchCandidate>> {
        self.calls.hit();
        self.last_limit.store(limit, Ordering::SeqCst);
        match self.mode {
            StoreMode::Down => return Err(Error::StoreUnavailable("connection refused".into())),
            StoreMode::Missing => return Err(Error::StoreUnavailable("collection does not exist".into())),
            StoreMode::Up => {}
        }
        if vector.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: vector.len() });
        }
        Ok((0..self.docs.min(limit)).map(|i| candidate(i, 0.95 - i as f32 * 0.03)).collect())
    }

    async fn exists(&self) -> Result<bool> {
        match self.mode {
            StoreMode::Up => Ok(true),
            StoreMode::Missing => Ok(false),
            StoreMode::Down => Err(Error::StoreUnavailable("connection refused".into())),
        }
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo::new("Mock")
    }
}

/// Scores candidates by reversing the store order, so reranked output is
/// distinguishable from similarity order.
pub struct MockReranker {
    pub up: bool,
    pub calls: Calls,
    pub last_pool: AtomicUsize,
}

impl MockReranker {
    pub fn up() -> Arc<Self> {
        Arc::new(Self { up: true, calls: Calls::default(), last_pool: AtomicUsize::new(0) })
    }

    pub fn down() -> Arc<Self> {
        Arc::new(Self { up: false, calls: Calls::default(), last_pool: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl Reranker for MockReranker {
    async fn rerank(&self, _query: &str, candidates: &[SearchCandidate]) -> Result<Vec<RerankedResult>> {
        self.calls.hit();
        self.last_pool.store(candidates.len(), Ordering::SeqCst);
        if !self.up {
            return Err(Error::RerankerUnavailable("connection refused".into()));
        }
        let mut out: Vec<RerankedResult> = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| RerankedResult { candidate: c.clone(), relevance_score: i as f32 / 10.0 })
            .collect();
        out.reverse();
        Ok(out)
    }

    async fn health_check(&self) -> bool {
        self.up
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo::new("Mock")
    }
}

#[derive(Default)]
pub struct MockWeb {
    pub calls: Calls,
}

#[async_trait]
impl WebSearch for MockWeb {
    async fn search(&self, query: &str, k: usize) -> Vec<SearchResult> {
        self.calls.hit();
        (0..k + 2)
            .map(|i| SearchResult {
                id: format!("web-{i}"),
                title: format!("{query} {i}"),
                content: "web".into(),
                source: "DuckDuckGo".into(),
                url: Some(format!("https://example.org/{i}")),
                page_number: None,
                similarity_score: None,
                relevance_score: None,
                provenance: Provenance::Real,
            })
            .collect()
    }
}

pub fn quick_retry() -> RetryPolicy {
    RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(500))
}

/// Router with background probing disabled.
pub fn router(
    embedder: Arc<MockEmbedder>,
    store: Arc<MockStore>,
    reranker: Option<Arc<MockReranker>>,
    web: Arc<MockWeb>,
) -> DataSourceRouter {
    router_with(embedder, store, reranker, web, RouterConfig { health_refresh: None, ..RouterConfig::default() })
}

pub fn router_with(
    embedder: Arc<MockEmbedder>,
    store: Arc<MockStore>,
    reranker: Option<Arc<MockReranker>>,
    web: Arc<MockWeb>,
    config: RouterConfig,
) -> DataSourceRouter {
    let backends = Backends {
        embedder,
        store,
        reranker: reranker.map(|r| r as Arc<dyn Reranker>),
        web,
    };
    DataSourceRouter::new(backends, config, quick_retry(), Duration::from_millis(200))
}
