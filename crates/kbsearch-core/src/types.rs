//! Domain types shared by the embedding, vector, rerank and router crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub type EmbeddingVector = Vec<f32>;

/// Where a query is answered from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Internet,
    KnowledgeBase,
}

impl DataSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DataSource::Internet => "internet",
            DataSource::KnowledgeBase => "knowledge_base",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "internet" | "web" => Ok(DataSource::Internet),
            "knowledge_base" | "knowledge-base" | "kb" => Ok(DataSource::KnowledgeBase),
            other => Err(Error::Configuration(format!("unknown data source '{other}'"))),
        }
    }
}

/// A single search request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
    data_source: DataSource,
    top_k: usize,
}

impl Query {
    pub fn new(text: impl Into<String>, data_source: DataSource, top_k: usize) -> Self {
        Self { text: text.into(), data_source, top_k }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn data_source(&self) -> DataSource {
        self.data_source
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }
}

/// A chunk returned by first-stage similarity search.
///
/// `similarity_score` is store-specific but higher is always better.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchCandidate {
    pub id: String,
    pub title: String,
    pub content: String,
    pub source: String,
    pub page_number: Option<u32>,
    pub file_path: Option<String>,
    pub similarity_score: f32,
}

/// A candidate after the second stage. `relevance_score` is not comparable
/// with `similarity_score`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RerankedResult {
    pub candidate: SearchCandidate,
    pub relevance_score: f32,
}

impl RerankedResult {
    /// Pass-through used when the second stage is disabled or unavailable.
    pub fn from_similarity(candidate: SearchCandidate) -> Self {
        let relevance_score = candidate.similarity_score;
        Self { candidate, relevance_score }
    }
}

/// Whether a result came from a real backend or was synthesized.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Real,
    Fallback,
}

/// Why a response was degraded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DegradationCause {
    EmbeddingUnavailable,
    InvalidEmbedding,
    StoreUnavailable,
    CollectionMissing,
    DimensionMismatch,
    NoResults,
    RerankerUnavailable,
    InvalidConfiguration,
}

impl DegradationCause {
    pub fn as_str(self) -> &'static str {
        match self {
            DegradationCause::EmbeddingUnavailable => "embedding_unavailable",
            DegradationCause::InvalidEmbedding => "invalid_embedding",
            DegradationCause::StoreUnavailable => "store_unavailable",
            DegradationCause::CollectionMissing => "collection_missing",
            DegradationCause::DimensionMismatch => "dimension_mismatch",
            DegradationCause::NoResults => "no_results",
            DegradationCause::RerankerUnavailable => "reranker_unavailable",
            DegradationCause::InvalidConfiguration => "invalid_configuration",
        }
    }
}

impl From<&Error> for DegradationCause {
    fn from(err: &Error) -> Self {
        match err {
            Error::ProviderUnavailable(_) => DegradationCause::EmbeddingUnavailable,
            Error::ProviderError(_) => DegradationCause::InvalidEmbedding,
            Error::DimensionMismatch { .. } => DegradationCause::DimensionMismatch,
            Error::StoreUnavailable(_) => DegradationCause::StoreUnavailable,
            Error::RerankerUnavailable(_) => DegradationCause::RerankerUnavailable,
            Error::Configuration(_) => DegradationCause::InvalidConfiguration,
        }
    }
}

/// One entry of a [`SearchResponse`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub content: String,
    pub source: String,
    pub url: Option<String>,
    pub page_number: Option<u32>,
    pub similarity_score: Option<f32>,
    pub relevance_score: Option<f32>,
    pub provenance: Provenance,
}

impl SearchResult {
    pub fn is_fallback(&self) -> bool {
        self.provenance == Provenance::Fallback
    }
}

impl From<RerankedResult> for SearchResult {
    fn from(r: RerankedResult) -> Self {
        let c = r.candidate;
        Self {
            id: c.id,
            title: c.title,
            content: c.content,
            source: c.source,
            url: c.file_path,
            page_number: c.page_number,
            similarity_score: Some(c.similarity_score),
            relevance_score: Some(r.relevance_score),
            provenance: Provenance::Real,
        }
    }
}

/// Ordered results for one query, never longer than the requested `top_k`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub data_source: DataSource,
    pub results: Vec<SearchResult>,
    pub degraded: Option<DegradationCause>,
}

impl SearchResponse {
    pub fn empty(data_source: DataSource) -> Self {
        Self { data_source, results: Vec::new(), degraded: None }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn is_fallback(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(SearchResult::is_fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_error_kind_has_its_own_cause() {
        let cases = [
            (Error::ProviderUnavailable("down".into()), DegradationCause::EmbeddingUnavailable),
            (Error::ProviderError("no data".into()), DegradationCause::InvalidEmbedding),
            (Error::DimensionMismatch { expected: 1024, actual: 768 }, DegradationCause::DimensionMismatch),
            (Error::StoreUnavailable("down".into()), DegradationCause::StoreUnavailable),
            (Error::RerankerUnavailable("down".into()), DegradationCause::RerankerUnavailable),
            (Error::Configuration("bad url".into()), DegradationCause::InvalidConfiguration),
        ];
        for (err, cause) in &cases {
            assert_eq!(DegradationCause::from(err), *cause, "{err}");
        }
        assert_eq!(DegradationCause::RerankerUnavailable.as_str(), "reranker_unavailable");
        assert_eq!(
            serde_json::to_string(&DegradationCause::InvalidConfiguration).expect("serialize"),
            r#""invalid_configuration""#
        );
    }

    #[test]
    fn data_source_parses_known_names() {
        assert_eq!("internet".parse::<DataSource>().ok(), Some(DataSource::Internet));
        assert_eq!("knowledge_base".parse::<DataSource>().ok(), Some(DataSource::KnowledgeBase));
        assert_eq!(" KB ".parse::<DataSource>().ok(), Some(DataSource::KnowledgeBase));
        assert!("intranet".parse::<DataSource>().is_err());
    }

    #[test]
    fn passthrough_rerank_copies_similarity() {
        let c = SearchCandidate {
            id: "1".into(),
            title: "t".into(),
            content: "c".into(),
            source: "s".into(),
            page_number: Some(3),
            file_path: Some("/papers/a.pdf".into()),
            similarity_score: 0.42,
        };
        let r = RerankedResult::from_similarity(c);
        assert!((r.relevance_score - 0.42).abs() < f32::EPSILON);
        let out = SearchResult::from(r);
        assert_eq!(out.provenance, Provenance::Real);
        assert_eq!(out.url.as_deref(), Some("/papers/a.pdf"));
        assert_eq!(out.page_number, Some(3));
    }
}
