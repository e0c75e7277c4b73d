use anyhow::Result;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use catalog_core::identity::EmbeddingIdentity;
use catalog_core::traits::Embedder;

pub const HASH_BACKEND: &str = "hash";

/// Deterministic bag-of-tokens embedder for tests and model-free runs.
/// Shared tokens between texts yield positive cosine similarity.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn identity(&self) -> EmbeddingIdentity {
        EmbeddingIdentity::new(HASH_BACKEND, format!("xxhash64-{}", self.dim))
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let tokens = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);
        for token in tokens {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let val = 0.5 + ((h >> 32) as u32 as f32) / (u32::MAX as f32);
            v[idx] += val;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        usize::MAX
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
