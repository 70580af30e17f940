//! Milvus collection over the v2 REST API.
//!
//! Every response is wrapped in `{"code": 0, "data": ...}`; a non-zero code is
//! reported as the store being unavailable. The collection dimension is read
//! once from `collections/describe` and cached for the life of the store.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use kbsearch_core::config::{mask_secret, HttpConfig, MilvusMetric};
use kbsearch_core::http::{client, status_error, transport_error};
use kbsearch_core::{Error, ProviderInfo, Result, SearchCandidate, Stage, VectorStore};

use crate::record::RecordOptions;
use crate::schema::OUTPUT_FIELDS;
use crate::sort_by_similarity;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct HasCollection {
    has: bool,
}

#[derive(Debug, Deserialize)]
struct Description {
    #[serde(default)]
    fields: Vec<FieldDescription>,
}

#[derive(Debug, Deserialize)]
struct FieldDescription {
    name: String,
    #[serde(default)]
    params: Vec<FieldParam>,
}

#[derive(Debug, Deserialize)]
struct FieldParam {
    key: String,
    value: Value,
}

pub struct MilvusStore {
    client: reqwest::Client,
    uri: String,
    token: Option<String>,
    collection: String,
    metric: MilvusMetric,
    vector_field: String,
    options: RecordOptions,
    dim: OnceCell<usize>,
}

impl MilvusStore {
    pub fn new(
        uri: &str,
        token: Option<&str>,
        collection: &str,
        metric: MilvusMetric,
        vector_field: &str,
        options: RecordOptions,
        http: &HttpConfig,
    ) -> Result<Self> {
        Ok(Self {
            client: client(http.request_timeout)?,
            uri: uri.trim_end_matches('/').to_string(),
            token: token.map(str::to_string),
            collection: collection.to_string(),
            metric,
            vector_field: vector_field.to_string(),
            options,
            dim: OnceCell::new(),
        })
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let url = format!("{}/v2/vectordb/{path}", self.uri);
        let mut request = self.client.post(&url).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|e| transport_error(Stage::Search, &e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| transport_error(Stage::Search, &e))?;
        if !status.is_success() {
            return Err(status_error(Stage::Search, status, &text));
        }
        let envelope: Envelope<T> = serde_json::from_str(&text)
            .map_err(|e| Error::StoreUnavailable(format!("unexpected Milvus response from {path}: {e}")))?;
        if envelope.code != 0 {
            return Err(Error::StoreUnavailable(format!(
                "Milvus {path} failed with code {}: {}",
                envelope.code,
                envelope.message.unwrap_or_default()
            )));
        }
        envelope.data.ok_or_else(|| Error::StoreUnavailable(format!("Milvus {path} returned no data")))
    }

    /// Collection dimension from the vector field's `dim` parameter.
    pub async fn dimension(&self) -> Result<usize> {
        self.dim
            .get_or_try_init(|| async {
                let desc: Description =
                    self.post("collections/describe", &json!({ "collectionName": self.collection })).await?;
                vector_field_dim(&desc, &self.vector_field).ok_or_else(|| {
                    Error::StoreUnavailable(format!(
                        "collection '{}' has no vector field '{}' with a dim parameter",
                        self.collection, self.vector_field
                    ))
                })
            })
            .await
            .copied()
    }

    fn search_body(&self, vector: &[f32], limit: usize) -> Value {
        json!({
            "collectionName": self.collection,
            "data": [vector],
            "annsField": self.vector_field,
            "limit": limit,
            "outputFields": OUTPUT_FIELDS,
            "searchParams": { "metricType": self.metric.as_str(), "params": { "nprobe": 10 } },
        })
    }
}

fn vector_field_dim(desc: &Description, field: &str) -> Option<usize> {
    let param = desc.fields.iter().find(|f| f.name == field)?.params.iter().find(|p| p.key == "dim")?;
    match &param.value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        _ => None,
    }
}

/// L2 is a distance (lower is closer); IP and COSINE are already similarities.
fn similarity(metric: MilvusMetric, distance: f32) -> f32 {
    match metric {
        MilvusMetric::L2 => 1.0 / (1.0 + distance.max(0.0)),
        MilvusMetric::Ip | MilvusMetric::Cosine => distance,
    }
}

/// `None` for a hit without a numeric `distance`; such a hit cannot be ranked.
fn hit_to_candidate(hit: &Map<String, Value>, metric: MilvusMetric, options: &RecordOptions) -> Option<SearchCandidate> {
    let distance = hit.get("distance").and_then(Value::as_f64)? as f32;
    let text = |key: &str| hit.get(key).and_then(Value::as_str);
    let id = match hit.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    Some(SearchCandidate {
        id,
        title: options.title(text("title")),
        content: options.snippet(text("content").unwrap_or_default()),
        source: options.source(text("source")),
        page_number: hit.get("page_number").and_then(Value::as_u64).and_then(|p| u32::try_from(p).ok()),
        file_path: text("file_path").filter(|p| !p.is_empty()).map(str::to_string),
        similarity_score: similarity(metric, distance),
    })
}

#[async_trait]
impl VectorStore for MilvusStore {
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchCandidate>> {
        let expected = self.dimension().await?;
        if vector.len() != expected {
            return Err(Error::DimensionMismatch { expected, actual: vector.len() });
        }
        if limit == 0 {
            return Ok(Vec::new());
        }
        let hits: Vec<Map<String, Value>> = self.post("entities/search", &self.search_body(vector, limit)).await?;
        let mut candidates: Vec<SearchCandidate> =
            hits.iter().filter_map(|h| hit_to_candidate(h, self.metric, &self.options)).collect();
        if candidates.len() < hits.len() {
            warn!(dropped = hits.len() - candidates.len(), "milvus hits without a distance");
        }
        sort_by_similarity(&mut candidates);
        candidates.truncate(limit);
        debug!(collection = %self.collection, hits = candidates.len(), "milvus search");
        Ok(candidates)
    }

    async fn exists(&self) -> Result<bool> {
        let has: HasCollection = self.post("collections/has", &json!({ "collectionName": self.collection })).await?;
        Ok(has.has)
    }

    fn info(&self) -> ProviderInfo {
        let mut info = ProviderInfo::new("Milvus")
            .with("uri", &self.uri)
            .with("collection", &self.collection)
            .with("metric", self.metric.as_str())
            .with("vector_field", &self.vector_field);
        if let Some(token) = &self.token {
            info = info.with("token", mask_secret(token));
        }
        info
    }
}
