//! Query routing: open web or knowledge base, with deterministic fallback
//! whenever the knowledge-base pipeline cannot answer.

pub mod fallback;
pub mod health;
pub mod router;
pub mod web;

pub use fallback::{FallbackSynthesizer, FALLBACK_MARKER};
pub use health::{DegradationState, HealthMonitor, HealthSnapshot, StoreHealth};
pub use router::{Backends, DataSourceRouter};
pub use web::DuckDuckGoSearch;
