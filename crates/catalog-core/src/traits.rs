use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::identity::EmbeddingIdentity;
use crate::types::{Bm25Weights, ChunkRecord, Hit, VectorHit};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Full-text index over chunk heading and body columns.
pub trait LexicalIndex: Send + Sync {
    /// Ranked hits with scores normalised into `(0, 1]`. `source_doc_id_prefix`
    /// restricts matches before the limit is applied.
    fn search_with_scores(
        &self,
        query: &str,
        limit: usize,
        source_doc_id_prefix: Option<&str>,
        weights: Option<&Bm25Weights>,
    ) -> anyhow::Result<Vec<Hit>>;

    fn dataset_exists(&self, dataset_name: &str) -> anyhow::Result<bool>;
}

/// Resolve chunk records by `node_id`. Missing ids are absent from the map.
pub trait ChunkTextLookup: Send + Sync {
    fn lookup_chunks(&self, node_ids: &[String]) -> anyhow::Result<HashMap<String, ChunkRecord>>;
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// A store bound to one embedding space reports it here and skips discovery.
    fn native_identity(&self) -> Option<EmbeddingIdentity> {
        None
    }

    /// Distinct embedding identities present, optionally scoped to a dataset.
    async fn identities(&self, dataset_name: Option<&str>) -> anyhow::Result<Vec<EmbeddingIdentity>>;

    async fn similarity(
        &self,
        query_vec: &[f32],
        identity: Option<&EmbeddingIdentity>,
        top_k: usize,
        dataset_name: Option<&str>,
    ) -> anyhow::Result<Vec<VectorHit>>;
}

/// Maps a stored embedding identity to the model that produced it.
pub trait EmbedderResolver: Send + Sync {
    fn resolve(&self, identity: &EmbeddingIdentity) -> Option<Arc<dyn Embedder>>;
}

/// Relevance judge used by the reranker. Returns one score per candidate,
/// in input order.
#[async_trait]
pub trait RerankProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    async fn score(&self, query: &str, candidates: &[Hit]) -> crate::Result<Vec<f32>>;
}

/// Source of full document text for snippet line numbers.
pub trait DocumentSource: Send + Sync {
    fn document_text(&self, dataset_name: &str, path: &str) -> Option<String>;
}
