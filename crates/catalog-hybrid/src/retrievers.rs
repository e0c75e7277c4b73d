//! Lexical and vector retrievers producing ranked `Hit` lists.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use catalog_core::config::SearchSettings;
use catalog_core::identity::EMBEDDING_PROFILE_KEY;
use catalog_core::intent::classify_intent;
use catalog_core::traits::{ChunkTextLookup, Embedder, EmbedderResolver, LexicalIndex, VectorStore};
use catalog_core::types::{dataset_prefix, Hit, VectorHit};

pub const FTS_LABEL: &str = "fts";
pub const VECTOR_LABEL: &str = "vector";

/// BM25 over heading/body columns, with heading weight routed by query intent.
pub struct FtsRetriever {
    index: Arc<dyn LexicalIndex>,
    settings: SearchSettings,
}

impl FtsRetriever {
    pub fn new(index: Arc<dyn LexicalIndex>, settings: SearchSettings) -> Self {
        Self { index, settings }
    }

    pub fn retrieve(&self, query: &str, limit: usize, dataset_name: Option<&str>) -> Result<Vec<Hit>> {
        let intent = classify_intent(query);
        let weights = self.settings.bm25_weights(intent);
        let prefix = dataset_name.map(dataset_prefix);
        debug!(%intent, %weights, limit, "fts query");
        let hits = self
            .index
            .search_with_scores(query, limit, prefix.as_deref(), Some(&weights))?;
        Ok(hits.into_iter().map(|h| h.labeled(FTS_LABEL)).collect())
    }
}

/// Similarity search across every embedding identity present in the store.
pub struct VectorRetriever {
    store: Arc<dyn VectorStore>,
    embedders: Arc<dyn EmbedderResolver>,
    texts: Arc<dyn ChunkTextLookup>,
}

impl VectorRetriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedders: Arc<dyn EmbedderResolver>,
        texts: Arc<dyn ChunkTextLookup>,
    ) -> Self {
        Self { store, embedders, texts }
    }

    pub async fn retrieve(&self, query: &str, top_k: usize, dataset_name: Option<&str>) -> Result<Vec<Hit>> {
        let buckets = match self.store.native_identity() {
            Some(identity) => {
                let embedder = self
                    .embedders
                    .resolve(&identity)
                    .with_context(|| format!("no embedder registered for native identity {identity}"))?;
                let query_vec = embed_query(embedder, query).await?;
                let hits = self.store.similarity(&query_vec, None, top_k, dataset_name).await?;
                vec![(identity.profile(), hits)]
            }
            None => self.discover_and_search(query, top_k, dataset_name).await?,
        };

        let merged = merge_buckets(buckets, top_k);
        self.attach_text(merged)
    }

    async fn discover_and_search(
        &self,
        query: &str,
        top_k: usize,
        dataset_name: Option<&str>,
    ) -> Result<Vec<(String, Vec<VectorHit>)>> {
        let identities = self.store.identities(dataset_name).await?;
        let mut buckets = Vec::with_capacity(identities.len());
        for identity in identities {
            let Some(embedder) = self.embedders.resolve(&identity) else {
                warn!(profile = %identity.profile(), "no embedder for stored identity; skipping");
                continue;
            };
            let query_vec = embed_query(embedder, query).await?;
            let hits = self
                .store
                .similarity(&query_vec, Some(&identity), top_k, dataset_name)
                .await?;
            debug!(profile = %identity.profile(), hits = hits.len(), "vector bucket");
            buckets.push((identity.profile(), hits));
        }
        Ok(buckets)
    }

    fn attach_text(&self, merged: Vec<(String, VectorHit)>) -> Result<Vec<Hit>> {
        let ids: Vec<String> = merged.iter().map(|(_, h)| h.node_id.clone()).collect();
        let records = self.texts.lookup_chunks(&ids)?;
        let mut hits = Vec::with_capacity(merged.len());
        for (profile, vhit) in merged {
            let Some(record) = records.get(&vhit.node_id) else {
                warn!(node_id = %vhit.node_id, "vector hit has no chunk text; skipping");
                continue;
            };
            let mut hit = Hit::new(&vhit.node_id, &record.source_doc_id, &record.text, vhit.score);
            hit.metadata = vhit.metadata;
            hit.metadata.entry(EMBEDDING_PROFILE_KEY.to_string()).or_insert_with(|| profile.into());
            for (key, value) in record.position_metadata() {
                hit.metadata.entry(key).or_insert(value);
            }
            hits.push(hit.labeled(VECTOR_LABEL));
        }
        Ok(hits)
    }
}

/// Model inference is synchronous, so it runs on the blocking pool.
async fn embed_query(embedder: Arc<dyn Embedder>, query: &str) -> Result<Vec<f32>> {
    let batch = vec![query.to_string()];
    tokio::task::spawn_blocking(move || embedder.embed_batch(&batch))
        .await
        .context("query embedding task panicked")??
        .into_iter()
        .next()
        .context("embedder returned no vector for the query")
}

/// Interleave per-identity buckets by rank: every bucket's #1, then every #2,
/// and so on, buckets ordered by profile name. Raw cosine scores from different
/// embedding spaces are never compared.
pub fn merge_buckets(buckets: Vec<(String, Vec<VectorHit>)>, top_k: usize) -> Vec<(String, VectorHit)> {
    let sorted: BTreeMap<String, Vec<VectorHit>> = buckets.into_iter().collect();
    let mut iters: Vec<(String, std::vec::IntoIter<VectorHit>)> =
        sorted.into_iter().map(|(profile, hits)| (profile, hits.into_iter())).collect();

    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    loop {
        let mut progressed = false;
        for (profile, iter) in &mut iters {
            if let Some(hit) = iter.next() {
                progressed = true;
                if seen.insert(hit.node_id.clone()) {
                    merged.push((profile.clone(), hit));
                }
            }
        }
        if !progressed || merged.len() >= top_k {
            break;
        }
    }
    merged.truncate(top_k);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::types::Meta;
    use pretty_assertions::assert_eq;

    fn vh(id: &str, score: f32) -> VectorHit {
        VectorHit { node_id: id.into(), score, metadata: Meta::new() }
    }

    #[test]
    fn buckets_merge_round_robin_by_profile_name() {
        let buckets = vec![
            ("hash:b".to_string(), vec![vh("b1", 0.1), vh("b2", 0.05)]),
            ("candle:a".to_string(), vec![vh("a1", 0.9), vh("a2", 0.8), vh("a3", 0.7)]),
        ];
        let ids: Vec<_> = merge_buckets(buckets, 10).into_iter().map(|(_, h)| h.node_id).collect();
        assert_eq!(ids, vec!["a1", "b1", "a2", "b2", "a3"]);
    }

    #[test]
    fn merge_skips_duplicates_and_truncates() {
        let buckets = vec![
            ("p1".to_string(), vec![vh("x", 0.9), vh("y", 0.8)]),
            ("p2".to_string(), vec![vh("x", 0.5), vh("z", 0.4)]),
        ];
        let merged = merge_buckets(buckets, 2);
        let ids: Vec<_> = merged.iter().map(|(p, h)| (p.as_str(), h.node_id.as_str())).collect();
        assert_eq!(ids, vec![("p1", "x"), ("p1", "y")]);
    }
}
