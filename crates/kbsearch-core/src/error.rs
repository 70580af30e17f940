use thiserror::Error;

/// Pipeline stage an error originated from. Used for log fields and to
/// classify timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Embed,
    Search,
    Rerank,
    Config,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Embed => "embed",
            Stage::Search => "search",
            Stage::Rerank => "rerank",
            Stage::Config => "config",
        }
    }

    /// The error a timed-out call in this stage is reported as.
    pub fn unavailable(self, msg: impl Into<String>) -> Error {
        let msg = msg.into();
        match self {
            Stage::Embed => Error::ProviderUnavailable(msg),
            Stage::Search => Error::StoreUnavailable(msg),
            Stage::Rerank => Error::RerankerUnavailable(msg),
            Stage::Config => Error::Configuration(msg),
        }
    }

    /// The error an unparseable response in this stage is reported as. Only
    /// the embedding stage distinguishes malformed payloads from outages.
    pub fn malformed(self, msg: impl Into<String>) -> Error {
        match self {
            Stage::Embed => Error::ProviderError(msg.into()),
            other => other.unavailable(msg),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Embedding provider returned an invalid response: {0}")]
    ProviderError(String),

    #[error("Dimension mismatch: collection expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Reranker unavailable: {0}")]
    RerankerUnavailable(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl Error {
    /// Connectivity failures are worth a second attempt; malformed responses,
    /// schema mismatches and configuration problems are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::ProviderUnavailable(_) | Error::StoreUnavailable(_) | Error::RerankerUnavailable(_)
        )
    }

    pub fn stage(&self) -> Stage {
        match self {
            Error::ProviderUnavailable(_) | Error::ProviderError(_) => Stage::Embed,
            Error::DimensionMismatch { .. } | Error::StoreUnavailable(_) => Stage::Search,
            Error::RerankerUnavailable(_) => Stage::Rerank,
            Error::Configuration(_) => Stage::Config,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
