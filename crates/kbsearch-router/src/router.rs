use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use kbsearch_core::config::{AppConfig, RouterConfig};
use kbsearch_core::{
    DataSource, DegradationCause, EmbeddingProvider, Query, RerankedResult, Reranker, Result, RetryPolicy,
    SearchCandidate, SearchResponse, SearchResult, Stage, VectorStore, WebSearch,
};
use kbsearch_embed::build_provider;
use kbsearch_rerank::build_reranker;
use kbsearch_vector::{build_store, sort_by_similarity};

use crate::fallback::FallbackSynthesizer;
use crate::health::{DegradationState, HealthMonitor};
use crate::web::DuckDuckGoSearch;

/// The collaborators a router drives. Built once at startup.
#[derive(Clone)]
pub struct Backends {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub store: Arc<dyn VectorStore>,
    pub reranker: Option<Arc<dyn Reranker>>,
    pub web: Arc<dyn WebSearch>,
}

/// Routes a query to the web or to the knowledge base and always answers.
///
/// The knowledge-base path is embed, search (over-fetching when a reranker
/// is configured), rerank, truncate. Any failure on that path is logged and
/// answered with fallback stubs; a reranker failure only skips reranking.
pub struct DataSourceRouter {
    backends: Backends,
    config: RouterConfig,
    retry: RetryPolicy,
    fallback: FallbackSynthesizer,
    health: Arc<HealthMonitor>,
}

impl DataSourceRouter {
    pub fn new(backends: Backends, config: RouterConfig, retry: RetryPolicy, probe_timeout: Duration) -> Self {
        let health = Arc::new(HealthMonitor::new(
            Arc::clone(&backends.embedder),
            Arc::clone(&backends.store),
            backends.reranker.clone(),
            config.health_refresh,
            probe_timeout,
        ));
        let fallback = FallbackSynthesizer::new(config.fallback_cap);
        Self { backends, config, retry, fallback, health }
    }

    /// Build every backend from configuration. Fails only on invalid
    /// configuration; unreachable services are discovered per request.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let backends = Backends {
            embedder: build_provider(&config.embedding, &config.http)?,
            store: build_store(&config.store, &config.http)?,
            reranker: build_reranker(config.rerank.as_ref(), &config.http)?,
            web: Arc::new(DuckDuckGoSearch::new(&config.http)?),
        };
        info!(
            top_k = config.router.default_top_k,
            rerank = backends.reranker.is_some(),
            "router ready"
        );
        Ok(Self::new(backends, config.router.clone(), config.retry, config.http.health_timeout))
    }

    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    pub fn default_top_k(&self) -> usize {
        self.config.default_top_k
    }

    pub async fn search(&self, query: &Query) -> SearchResponse {
        self.search_by_data_source(query.text(), query.data_source(), query.top_k()).await
    }

    pub async fn search_by_data_source(&self, query: &str, data_source: DataSource, top_k: usize) -> SearchResponse {
        if top_k == 0 {
            return SearchResponse::empty(data_source);
        }
        match data_source {
            DataSource::Internet => {
                let mut results = self.backends.web.search(query, top_k).await;
                results.truncate(top_k);
                SearchResponse { data_source, results, degraded: None }
            }
            DataSource::KnowledgeBase => self.search_knowledge_base(query, top_k).await,
        }
    }

    /// Number of candidates to ask the store for.
    pub fn candidate_limit(&self, top_k: usize) -> usize {
        if self.backends.reranker.is_none() {
            return top_k;
        }
        let overfetch = top_k.saturating_mul(self.config.overfetch_factor).min(self.config.overfetch_cap);
        top_k.max(overfetch)
    }

    async fn search_knowledge_base(&self, query: &str, top_k: usize) -> SearchResponse {
        if let DegradationState::Degraded(cause) = self.health.state().await {
            warn!(cause = cause.as_str(), "backend known to be down, serving fallback");
            return self.degrade(query, top_k, cause);
        }
        match self.retrieve(query, top_k).await {
            Ok(results) if !results.is_empty() => {
                SearchResponse { data_source: DataSource::KnowledgeBase, results, degraded: None }
            }
            Ok(_) => {
                warn!("collection returned no candidates, serving fallback");
                self.degrade(query, top_k, DegradationCause::NoResults)
            }
            Err(err) => {
                let cause = DegradationCause::from(&err);
                warn!(stage = err.stage().as_str(), error = %err, cause = cause.as_str(), "retrieval failed, serving fallback");
                self.health.record_failure(cause).await;
                self.degrade(query, top_k, cause)
            }
        }
    }

    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let embedder = &self.backends.embedder;
        let vector = self.retry.run(Stage::Embed, move |_| embedder.embed(query)).await?;

        let limit = self.candidate_limit(top_k);
        let store = &self.backends.store;
        let query_vector = vector.as_slice();
        let candidates = self.retry.run(Stage::Search, move |_| store.search(query_vector, limit)).await?;
        debug!(requested = limit, returned = candidates.len(), "candidates retrieved");
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut ranked = self.rerank(query, candidates).await;
        ranked.truncate(top_k);
        Ok(ranked.into_iter().map(SearchResult::from).collect())
    }

    async fn rerank(&self, query: &str, mut candidates: Vec<SearchCandidate>) -> Vec<RerankedResult> {
        if let Some(reranker) = &self.backends.reranker {
            let pool = candidates.as_slice();
            match self.retry.run(Stage::Rerank, move |_| reranker.rerank(query, pool)).await {
                Ok(ranked) => return ranked,
                Err(err) => warn!(stage = "rerank", error = %err, "reranker failed, keeping similarity order"),
            }
        }
        sort_by_similarity(&mut candidates);
        candidates.into_iter().map(RerankedResult::from_similarity).collect()
    }

    fn degrade(&self, query: &str, top_k: usize, cause: DegradationCause) -> SearchResponse {
        let mut response = self.fallback.synthesize(query, top_k);
        response.degraded = Some(cause);
        response
    }
}
