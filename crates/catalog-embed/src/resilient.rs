use anyhow::Result;
use std::sync::Arc;
use tracing::warn;

use catalog_core::traits::Embedder;

/// Retries items one at a time when a batch fails. Items that still fail
/// come back as zero vectors so batch positions stay aligned.
pub struct ResilientEmbedder {
    inner: Arc<dyn Embedder>,
}

impl ResilientEmbedder {
    pub fn new(inner: Arc<dyn Embedder>) -> Self {
        Self { inner }
    }
}

impl Embedder for ResilientEmbedder {
    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn max_len(&self) -> usize {
        self.inner.max_len()
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self.inner.embed_batch(texts) {
            Ok(vectors) if vectors.len() == texts.len() => return Ok(vectors),
            Ok(vectors) => {
                warn!(expected = texts.len(), got = vectors.len(), "embedding batch size mismatch, retrying per item");
            }
            Err(e) => warn!(error = %e, size = texts.len(), "embedding batch failed, retrying per item"),
        }
        let dim = self.inner.dim();
        let vectors = texts
            .iter()
            .enumerate()
            .map(|(i, text)| match self.inner.embed_batch(std::slice::from_ref(text)) {
                Ok(mut one) if one.len() == 1 => one.remove(0),
                Ok(_) => {
                    warn!(index = i, "embedder returned no vector, using zero vector");
                    vec![0.0; dim]
                }
                Err(e) => {
                    warn!(index = i, error = %e, "embedding failed, using zero vector");
                    vec![0.0; dim]
                }
            })
            .collect();
        Ok(vectors)
    }
}
