//! Backend health snapshot shared by the requests of one router.
//!
//! Requests never wait on a probe. They read the latest snapshot; when it is
//! missing or older than the refresh interval they treat the backends as
//! nominal and kick off one background probe. Failures seen on the request
//! path are written into the snapshot so later requests degrade immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use kbsearch_core::{DegradationCause, EmbeddingProvider, Reranker, VectorStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradationState {
    Nominal,
    Degraded(DegradationCause),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreHealth {
    Ready,
    CollectionMissing,
    Unreachable,
}

#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub embedding: bool,
    pub store: StoreHealth,
    /// `None` when reranking is disabled.
    pub reranker: Option<bool>,
    pub taken_at: Instant,
}

impl HealthSnapshot {
    fn nominal() -> Self {
        Self { embedding: true, store: StoreHealth::Ready, reranker: None, taken_at: Instant::now() }
    }

    /// The reranker is optional, so its health never degrades a response.
    pub fn state(&self) -> DegradationState {
        if !self.embedding {
            DegradationState::Degraded(DegradationCause::EmbeddingUnavailable)
        } else {
            match self.store {
                StoreHealth::Ready => DegradationState::Nominal,
                StoreHealth::CollectionMissing => DegradationState::Degraded(DegradationCause::CollectionMissing),
                StoreHealth::Unreachable => DegradationState::Degraded(DegradationCause::StoreUnavailable),
            }
        }
    }
}

pub struct HealthMonitor {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    reranker: Option<Arc<dyn Reranker>>,
    refresh: Option<Duration>,
    probe_timeout: Duration,
    snapshot: RwLock<Option<HealthSnapshot>>,
    probing: AtomicBool,
}

impl HealthMonitor {
    /// `refresh = None` disables background probing and failure recording;
    /// every request then goes to the backends.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        reranker: Option<Arc<dyn Reranker>>,
        refresh: Option<Duration>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            store,
            reranker,
            refresh,
            probe_timeout,
            snapshot: RwLock::new(None),
            probing: AtomicBool::new(false),
        }
    }

    pub async fn latest(&self) -> Option<HealthSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Degradation state for one request.
    pub async fn state(self: &Arc<Self>) -> DegradationState {
        let Some(refresh) = self.refresh else {
            return DegradationState::Nominal;
        };
        let current = self.snapshot.read().await.as_ref().map(|s| (s.state(), s.taken_at.elapsed() < refresh));
        match current {
            Some((state, true)) => state,
            _ => {
                self.spawn_probe();
                DegradationState::Nominal
            }
        }
    }

    fn spawn_probe(self: &Arc<Self>) {
        if self.probing.swap(true, Ordering::AcqRel) {
            return;
        }
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            monitor.probe().await;
            monitor.probing.store(false, Ordering::Release);
        });
    }

    /// Probe every backend concurrently and store the result.
    pub async fn probe(&self) -> HealthSnapshot {
        let embedding = tokio::time::timeout(self.probe_timeout, self.embedder.health_check());
        let store = tokio::time::timeout(self.probe_timeout, self.store.exists());
        let reranker = async {
            match &self.reranker {
                Some(r) => Some(tokio::time::timeout(self.probe_timeout, r.health_check()).await.unwrap_or(false)),
                None => None,
            }
        };
        let (embedding, store, reranker) = tokio::join!(embedding, store, reranker);

        let snapshot = HealthSnapshot {
            embedding: embedding.unwrap_or(false),
            store: match store {
                Ok(Ok(true)) => StoreHealth::Ready,
                Ok(Ok(false)) => StoreHealth::CollectionMissing,
                _ => StoreHealth::Unreachable,
            },
            reranker,
            taken_at: Instant::now(),
        };
        info!(
            embedding = snapshot.embedding,
            store = ?snapshot.store,
            reranker = ?snapshot.reranker,
            "health probe"
        );
        *self.snapshot.write().await = Some(snapshot.clone());
        snapshot
    }

    /// Mark the backend behind `cause` as down until the next probe.
    /// Causes that do not point at an outage are ignored.
    pub async fn record_failure(&self, cause: DegradationCause) {
        if self.refresh.is_none() {
            return;
        }
        let mut guard = self.snapshot.write().await;
        let snapshot = guard.get_or_insert_with(HealthSnapshot::nominal);
        match cause {
            DegradationCause::EmbeddingUnavailable => snapshot.embedding = false,
            DegradationCause::StoreUnavailable => snapshot.store = StoreHealth::Unreachable,
            DegradationCause::CollectionMissing => snapshot.store = StoreHealth::CollectionMissing,
            DegradationCause::InvalidEmbedding
            | DegradationCause::DimensionMismatch
            | DegradationCause::NoResults
            | DegradationCause::RerankerUnavailable
            | DegradationCause::InvalidConfiguration => return,
        }
        snapshot.taken_at = Instant::now();
        debug!(cause = cause.as_str(), "failure recorded in health snapshot");
    }
}
