//! Deterministic feature-hashing embedder.
//!
//! Each lowercase alphanumeric token is hashed into one of `dimension`
//! buckets with a pseudo-random sign. Texts that share words end up close
//! under cosine similarity, which is enough to rank policy passages when no
//! model server is available.

use std::hash::Hasher;

use async_trait::async_trait;
use twox_hash::XxHash64;

use crate::error::Result;
use crate::provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};
use crate::similarity::normalize;
use crate::{DEFAULT_DIMENSION, Embedding};

const MODEL_NAME: &str = "xxhash-bag-of-words";

/// Embedding provider that needs no network or model files.
#[derive(Debug, Clone)]
pub struct HashingProvider {
    dimension: usize,
}

impl HashingProvider {
    /// Create a provider producing vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Embed `text` synchronously.
    pub fn embed_text(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dimension];

        for token in tokens(text) {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.as_bytes());
            let h = hasher.finish();

            let bucket = (h % self.dimension as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        normalize(&mut vector);
        vector
    }
}

impl Default for HashingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    fn name(&self) -> &str {
        "hashing"
    }

    fn default_model(&self) -> &str {
        MODEL_NAME
    }

    fn default_dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        Ok(EmbeddingResponse::new(
            self.embed_text(&request.text),
            MODEL_NAME,
        ))
    }

    fn is_available(&self) -> bool {
        true
    }
}
