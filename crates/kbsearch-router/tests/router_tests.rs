mod common;

use std::sync::Arc;

use common::*;
use kbsearch_core::{DataSource, DegradationCause, Provenance, Query};
use kbsearch_router::FALLBACK_MARKER;

const QUERY: &str = "IEC 61850 protocol";

#[tokio::test]
async fn healthy_pipeline_returns_reranked_real_results() {
    let (embedder, store, reranker, web) = (MockEmbedder::up(8), MockStore::with_docs(8, 50), MockReranker::up(), Arc::new(MockWeb::default()));
    let r = router(embedder.clone(), store.clone(), Some(reranker.clone()), web.clone());

    let resp = r.search_by_data_source(QUERY, DataSource::KnowledgeBase, 5).await;
    assert_eq!(resp.len(), 5);
    assert!(resp.degraded.is_none());
    assert!(resp.results.iter().all(|x| x.provenance == Provenance::Real));
    let scores: Vec<f32> = resp.results.iter().filter_map(|x| x.relevance_score).collect();
    assert_eq!(scores.len(), 5);
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    // overfetch: min(5 * 2, 20) candidates go to the reranker
    assert_eq!(store.last_limit(), 10);
    assert_eq!(reranker.last_pool.load(std::sync::atomic::Ordering::SeqCst), 10);
    assert_eq!(resp.results[0].id, "iec-9");
    assert_eq!(web.calls.count(), 0);
}

#[tokio::test]
async fn embedding_outage_goes_straight_to_fallback() {
    let (embedder, store, reranker, web) = (MockEmbedder::down(), MockStore::with_docs(8, 50), MockReranker::up(), Arc::new(MockWeb::default()));
    let r = router(embedder.clone(), store.clone(), Some(reranker.clone()), web.clone());

    let resp = r.search_by_data_source(QUERY, DataSource::KnowledgeBase, 5).await;
    assert_eq!(resp.len(), 5);
    assert!(resp.is_fallback());
    assert_eq!(resp.degraded, Some(DegradationCause::EmbeddingUnavailable));
    assert_eq!(embedder.calls.count(), 2);
    assert_eq!(store.calls.count(), 0);
    assert_eq!(reranker.calls.count(), 0);
}

#[tokio::test]
async fn reranker_outage_keeps_similarity_order() {
    let (embedder, store, reranker, web) = (MockEmbedder::up(8), MockStore::with_docs(8, 50), MockReranker::down(), Arc::new(MockWeb::default()));
    let r = router(embedder, store, Some(reranker.clone()), web);

    let resp = r.search_by_data_source(QUERY, DataSource::KnowledgeBase, 5).await;
    assert_eq!(resp.len(), 5);
    assert!(resp.degraded.is_none());
    assert!(resp.results.iter().all(|x| !x.is_fallback()));
    let sims: Vec<f32> = resp.results.iter().filter_map(|x| x.similarity_score).collect();
    assert!(sims.windows(2).all(|w| w[0] >= w[1]));
    assert!(resp.results.iter().all(|x| x.relevance_score == x.similarity_score));
    assert_eq!(resp.results[0].id, "iec-0");
    assert_eq!(reranker.calls.count(), 2);
}

#[tokio::test]
async fn store_outage_yields_flagged_stubs() {
    let (embedder, store, web) = (MockEmbedder::up(8), MockStore::in_mode(StoreMode::Down), Arc::new(MockWeb::default()));
    let r = router(embedder, store.clone(), Some(MockReranker::up()), web);

    let resp = r.search_by_data_source(QUERY, DataSource::KnowledgeBase, 5).await;
    assert!(!resp.is_empty() && resp.len() <= 5);
    assert!(resp.results.iter().all(|x| x.is_fallback() && x.content.starts_with(FALLBACK_MARKER)));
    assert_eq!(resp.degraded, Some(DegradationCause::StoreUnavailable));
    assert_eq!(store.calls.count(), 2);
}

#[tokio::test]
async fn dimension_mismatch_falls_back() {
    let r = router(MockEmbedder::up(768), MockStore::with_docs(1024, 50), None, Arc::new(MockWeb::default()));
    let resp = r.search_by_data_source(QUERY, DataSource::KnowledgeBase, 5).await;
    assert!(resp.is_fallback());
    assert_eq!(resp.degraded, Some(DegradationCause::DimensionMismatch));
}

#[tokio::test]
async fn empty_collection_falls_back() {
    let r = router(MockEmbedder::up(8), MockStore::with_docs(8, 0), Some(MockReranker::up()), Arc::new(MockWeb::default()));
    let resp = r.search_by_data_source(QUERY, DataSource::KnowledgeBase, 3).await;
    assert_eq!(resp.len(), 3);
    assert_eq!(resp.degraded, Some(DegradationCause::NoResults));
}

#[tokio::test]
async fn without_reranker_limit_is_top_k() {
    let store = MockStore::with_docs(8, 50);
    let r = router(MockEmbedder::up(8), store.clone(), None, Arc::new(MockWeb::default()));
    let resp = r.search_by_data_source(QUERY, DataSource::KnowledgeBase, 4).await;
    assert_eq!(resp.len(), 4);
    assert_eq!(store.last_limit(), 4);
    assert_eq!(r.candidate_limit(4), 4);
}

#[tokio::test]
async fn overfetch_is_capped() {
    let r = router(MockEmbedder::up(8), MockStore::with_docs(8, 50), Some(MockReranker::up()), Arc::new(MockWeb::default()));
    assert_eq!(r.candidate_limit(3), 6);
    assert_eq!(r.candidate_limit(15), 20);
    assert_eq!(r.candidate_limit(30), 30);
}

#[tokio::test]
async fn under_filled_store_returns_what_it_has() {
    let r = router(MockEmbedder::up(8), MockStore::with_docs(8, 2), Some(MockReranker::up()), Arc::new(MockWeb::default()));
    let resp = r.search_by_data_source(QUERY, DataSource::KnowledgeBase, 5).await;
    assert_eq!(resp.len(), 2);
    assert!(resp.degraded.is_none());
}

#[tokio::test]
async fn internet_uses_web_search_only() {
    let (embedder, store, web) = (MockEmbedder::up(8), MockStore::with_docs(8, 50), Arc::new(MockWeb::default()));
    let r = router(embedder.clone(), store.clone(), None, web.clone());

    let resp = r.search(&Query::new(QUERY, DataSource::Internet, 3)).await;
    assert_eq!(resp.len(), 3);
    assert_eq!(resp.data_source, DataSource::Internet);
    assert_eq!(web.calls.count(), 1);
    assert_eq!(embedder.calls.count(), 0);
    assert_eq!(store.calls.count(), 0);
}

#[tokio::test]
async fn zero_top_k_is_empty_for_both_sources() {
    let (embedder, web) = (MockEmbedder::up(8), Arc::new(MockWeb::default()));
    let r = router(embedder.clone(), MockStore::with_docs(8, 50), None, web.clone());
    assert!(r.search_by_data_source(QUERY, DataSource::KnowledgeBase, 0).await.is_empty());
    assert!(r.search_by_data_source(QUERY, DataSource::Internet, 0).await.is_empty());
    assert_eq!(embedder.calls.count(), 0);
    assert_eq!(web.calls.count(), 0);
}

#[tokio::test]
async fn responses_never_exceed_top_k() {
    let r = router(MockEmbedder::up(8), MockStore::with_docs(8, 50), Some(MockReranker::up()), Arc::new(MockWeb::default()));
    let down = router(MockEmbedder::down(), MockStore::with_docs(8, 50), None, Arc::new(MockWeb::default()));
    for k in [1, 2, 7, 12, 25] {
        for source in [DataSource::KnowledgeBase, DataSource::Internet] {
            let resp = r.search_by_data_source(QUERY, source, k).await;
            assert!(!resp.is_empty() && resp.len() <= k, "k={k} source={source}");
            let resp = down.search_by_data_source(QUERY, source, k).await;
            assert!(!resp.is_empty() && resp.len() <= k, "k={k} source={source}");
        }
    }
}
