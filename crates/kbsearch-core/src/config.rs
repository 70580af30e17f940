//! Configuration loading for the search service.
//!
//! Uses Figment to merge built-in defaults, `config.toml`,
//! `config.<env>.toml` and the flat environment keys in [`ENV_KEYS`].
//! Validation happens once, in [`Settings::resolve`]; an invalid
//! configuration refuses to start rather than failing per request.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Environment keys read verbatim (no prefix).
pub const ENV_KEYS: &[&str] = &[
    "EMBEDDING_PROVIDER",
    "XINFERENCE_HOST",
    "XINFERENCE_PORT",
    "XINFERENCE_EMBEDDING_MODEL",
    "XINFERENCE_EMBEDDING_DIMENSIONS",
    "XINFERENCE_RERANK_MODEL",
    "OPENAI_COMPATIBLE_API_KEY",
    "DASHSCOPE_API_KEY",
    "OPENAI_COMPATIBLE_BASE_URL",
    "OPENAI_COMPATIBLE_EMBEDDING_MODEL",
    "OPENAI_COMPATIBLE_EMBEDDING_DIMENSIONS",
    "HASH_EMBEDDING_DIMENSIONS",
    "VECTOR_STORE",
    "MILVUS_URI",
    "MILVUS_TOKEN",
    "MILVUS_COLLECTION",
    "MILVUS_METRIC",
    "MILVUS_VECTOR_FIELD",
    "LANCE_URI",
    "TOP_K_DEFAULT",
    "OVERFETCH_FACTOR",
    "OVERFETCH_CAP",
    "SNIPPET_CHARS",
    "FALLBACK_CAP",
    "DEFAULT_SOURCE",
    "REQUEST_TIMEOUT_MS",
    "HEALTH_TIMEOUT_MS",
    "RETRY_MAX_ATTEMPTS",
    "RETRY_BACKOFF_MS",
    "HEALTH_REFRESH_SECS",
];

/// Raw, flat key/value settings as merged by figment. Turn into an
/// [`AppConfig`] with [`Settings::resolve`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub embedding_provider: String,
    pub xinference_host: String,
    pub xinference_port: u16,
    pub xinference_embedding_model: String,
    pub xinference_embedding_dimensions: usize,
    pub xinference_rerank_model: String,
    pub openai_compatible_api_key: Option<String>,
    pub dashscope_api_key: Option<String>,
    pub openai_compatible_base_url: String,
    pub openai_compatible_embedding_model: String,
    pub openai_compatible_embedding_dimensions: usize,
    pub hash_embedding_dimensions: usize,
    pub vector_store: String,
    pub milvus_uri: String,
    pub milvus_token: String,
    pub milvus_collection: String,
    pub milvus_metric: String,
    pub milvus_vector_field: String,
    pub lance_uri: String,
    pub top_k_default: usize,
    pub overfetch_factor: usize,
    pub overfetch_cap: usize,
    pub snippet_chars: usize,
    pub fallback_cap: usize,
    pub default_source: String,
    pub request_timeout_ms: u64,
    pub health_timeout_ms: u64,
    pub retry_max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub health_refresh_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            embedding_provider: "xinference".to_string(),
            xinference_host: "localhost".to_string(),
            xinference_port: 9997,
            xinference_embedding_model: "bge-base-en-v1.5".to_string(),
            xinference_embedding_dimensions: 768,
            xinference_rerank_model: "bge-reranker-base".to_string(),
            openai_compatible_api_key: None,
            dashscope_api_key: None,
            openai_compatible_base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string(),
            openai_compatible_embedding_model: "text-embedding-v4".to_string(),
            openai_compatible_embedding_dimensions: 1024,
            hash_embedding_dimensions: 1024,
            vector_store: "milvus".to_string(),
            milvus_uri: "http://localhost:19530".to_string(),
            milvus_token: String::new(),
            milvus_collection: "iec_knowledge_base".to_string(),
            milvus_metric: "L2".to_string(),
            milvus_vector_field: "embedding".to_string(),
            lance_uri: "data/lancedb".to_string(),
            top_k_default: 5,
            overfetch_factor: 2,
            overfetch_cap: 20,
            snippet_chars: 300,
            fallback_cap: 10,
            default_source: "IEC knowledge base".to_string(),
            request_timeout_ms: 10_000,
            health_timeout_ms: 2_000,
            retry_max_attempts: 2,
            retry_backoff_ms: 200,
            health_refresh_secs: 30,
        }
    }
}

impl Settings {
    /// Defaults, then `config.toml`, then `config.<env>.toml` (env from
    /// `RUST_ENV`, default `dev`), then the raw environment keys.
    pub fn figment() -> Figment {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment.merge(Env::raw().only(ENV_KEYS))
    }

    pub fn load() -> Result<Self> {
        Self::figment()
            .extract()
            .map_err(|e| Error::Configuration(format!("failed to load settings: {e}")))
    }

    /// Validate and convert into typed configuration. Every error here is a
    /// startup-time `Configuration` error.
    pub fn resolve(&self) -> Result<AppConfig> {
        let embedding = self.resolve_embedding()?;
        let store = self.resolve_store()?;

        let rerank_model = self.xinference_rerank_model.trim();
        let rerank = if rerank_model.is_empty() || rerank_model.eq_ignore_ascii_case("none") {
            None
        } else {
            Some(RerankConfig { base_url: self.xinference_base_url(), model: rerank_model.to_string() })
        };

        if self.overfetch_factor == 0 {
            return Err(Error::Configuration("OVERFETCH_FACTOR must be at least 1".into()));
        }
        if self.top_k_default == 0 {
            return Err(Error::Configuration("TOP_K_DEFAULT must be at least 1".into()));
        }
        if self.request_timeout_ms == 0 || self.health_timeout_ms == 0 {
            return Err(Error::Configuration("timeouts must be non-zero".into()));
        }

        let router = RouterConfig {
            default_top_k: self.top_k_default,
            overfetch_factor: self.overfetch_factor,
            overfetch_cap: self.overfetch_cap,
            fallback_cap: self.fallback_cap,
            health_refresh: (self.health_refresh_secs > 0).then(|| Duration::from_secs(self.health_refresh_secs)),
        };
        let http = HttpConfig {
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            health_timeout: Duration::from_millis(self.health_timeout_ms),
        };
        let retry = RetryPolicy::default()
            .with_max_attempts(self.retry_max_attempts)
            .with_backoff(Duration::from_millis(self.retry_backoff_ms))
            .with_attempt_timeout(http.request_timeout);

        Ok(AppConfig { embedding, store, rerank, router, http, retry })
    }

    fn xinference_base_url(&self) -> String {
        format!("http://{}:{}", self.xinference_host, self.xinference_port)
    }

    fn resolve_embedding(&self) -> Result<EmbeddingConfig> {
        let config = match self.embedding_provider.trim().to_ascii_lowercase().as_str() {
            "xinference" => EmbeddingConfig::Xinference {
                base_url: self.xinference_base_url(),
                model: non_empty("XINFERENCE_EMBEDDING_MODEL", &self.xinference_embedding_model)?,
                dimension: self.xinference_embedding_dimensions,
            },
            "openai_compatible" | "openai-compatible" | "openai" => {
                let api_key = self
                    .openai_compatible_api_key
                    .as_deref()
                    .or(self.dashscope_api_key.as_deref())
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .ok_or_else(|| {
                        Error::Configuration(
                            "EMBEDDING_PROVIDER=openai_compatible requires OPENAI_COMPATIBLE_API_KEY or DASHSCOPE_API_KEY"
                                .into(),
                        )
                    })?;
                EmbeddingConfig::OpenAiCompatible {
                    base_url: non_empty("OPENAI_COMPATIBLE_BASE_URL", &self.openai_compatible_base_url)?
                        .trim_end_matches('/')
                        .to_string(),
                    api_key: api_key.to_string(),
                    model: non_empty("OPENAI_COMPATIBLE_EMBEDDING_MODEL", &self.openai_compatible_embedding_model)?,
                    dimension: self.openai_compatible_embedding_dimensions,
                }
            }
            "hash" | "fake" => EmbeddingConfig::Hash { dimension: self.hash_embedding_dimensions },
            other => return Err(Error::Configuration(format!("unknown EMBEDDING_PROVIDER '{other}'"))),
        };
        if config.dimension() == 0 {
            return Err(Error::Configuration("embedding dimension must be greater than zero".into()));
        }
        Ok(config)
    }

    fn resolve_store(&self) -> Result<StoreConfig> {
        let backend = match self.vector_store.trim().to_ascii_lowercase().as_str() {
            "milvus" => StoreBackend::Milvus {
                uri: non_empty("MILVUS_URI", &self.milvus_uri)?.trim_end_matches('/').to_string(),
                token: Some(self.milvus_token.trim().to_string()).filter(|t| !t.is_empty()),
                metric: self.milvus_metric.parse()?,
                vector_field: non_empty("MILVUS_VECTOR_FIELD", &self.milvus_vector_field)?,
            },
            "lance" | "lancedb" => StoreBackend::Lance { uri: expand_path(non_empty("LANCE_URI", &self.lance_uri)?) },
            other => return Err(Error::Configuration(format!("unknown VECTOR_STORE '{other}'"))),
        };
        Ok(StoreConfig {
            backend,
            collection: non_empty("MILVUS_COLLECTION", &self.milvus_collection)?,
            snippet_chars: self.snippet_chars,
            default_source: self.default_source.clone(),
        })
    }
}

fn non_empty(key: &str, value: &str) -> Result<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(Error::Configuration(format!("{key} must not be empty")));
    }
    Ok(v.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingConfig {
    Xinference { base_url: String, model: String, dimension: usize },
    OpenAiCompatible { base_url: String, api_key: String, model: String, dimension: usize },
    Hash { dimension: usize },
}

impl EmbeddingConfig {
    pub fn dimension(&self) -> usize {
        match self {
            EmbeddingConfig::Xinference { dimension, .. }
            | EmbeddingConfig::OpenAiCompatible { dimension, .. }
            | EmbeddingConfig::Hash { dimension } => *dimension,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilvusMetric {
    L2,
    Ip,
    Cosine,
}

impl MilvusMetric {
    pub fn as_str(self) -> &'static str {
        match self {
            MilvusMetric::L2 => "L2",
            MilvusMetric::Ip => "IP",
            MilvusMetric::Cosine => "COSINE",
        }
    }
}

impl std::str::FromStr for MilvusMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L2" => Ok(MilvusMetric::L2),
            "IP" => Ok(MilvusMetric::Ip),
            "COSINE" => Ok(MilvusMetric::Cosine),
            other => Err(Error::Configuration(format!("unknown MILVUS_METRIC '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Milvus { uri: String, token: Option<String>, metric: MilvusMetric, vector_field: String },
    Lance { uri: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub collection: String,
    pub snippet_chars: usize,
    pub default_source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RerankConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    pub default_top_k: usize,
    pub overfetch_factor: usize,
    pub overfetch_cap: usize,
    pub fallback_cap: usize,
    /// `None` disables background health probing.
    pub health_refresh: Option<Duration>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            overfetch_factor: 2,
            overfetch_cap: 20,
            fallback_cap: 10,
            health_refresh: Some(Duration::from_secs(30)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    pub request_timeout: Duration,
    pub health_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { request_timeout: Duration::from_secs(10), health_timeout: Duration::from_secs(2) }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub embedding: EmbeddingConfig,
    pub store: StoreConfig,
    pub rerank: Option<RerankConfig>,
    pub router: RouterConfig,
    pub http: HttpConfig,
    pub retry: RetryPolicy,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Settings::load()?.resolve()
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Mask a secret for display: keeps the first 8 and last 4 characters of
/// long values, `***` otherwise.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() > 12 {
        let head: String = chars[..8].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "***".to_string()
    }
}
