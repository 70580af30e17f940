use async_trait::async_trait;
use std::hash::Hasher;
use twox_hash::XxHash64;

use kbsearch_core::{EmbeddingProvider, EmbeddingVector, ProviderInfo, Result};

/// Offline feature-hashing embedder. Deterministic and L2-normalized; used
/// for development and tests where no model server is running.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn embed_text(&self, text: &str) -> EmbeddingVector {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.to_lowercase().as_bytes());
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let val = ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += val + (i % 3) as f32 * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        Ok(self.embed_text(text))
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo::new("Hash").with("dimensions", self.dim)
    }
}
