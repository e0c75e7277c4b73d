//! The search entry point: validation, retrieval per mode, fusion, optional
//! reranking and conversion to `SearchResults`.

use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use catalog_core::config::SearchSettings;
use catalog_core::snippet::{build_snippet, extract_snippet};
use catalog_core::traits::{ChunkTextLookup, DocumentSource, EmbedderResolver, LexicalIndex, VectorStore};
use catalog_core::types::{
    Hit, SearchCriteria, SearchMode, SearchResult, SearchResults, Snippet, CHUNK_POS_KEY, CHUNK_SEQ_KEY,
};
use catalog_core::Result;
use catalog_rerank::Reranker;

use crate::fusion::{fuse, RankedList, RrfConfig};
use crate::retrievers::{FtsRetriever, VectorRetriever, FTS_LABEL, VECTOR_LABEL};

/// Hybrid search over an injected lexical index, vector store and reranker.
///
/// Only invalid criteria produce an error. Retriever failures, timeouts and
/// unknown datasets all degrade to fewer (or zero) results with a warning.
pub struct SearchService {
    settings: SearchSettings,
    lexical: Arc<dyn LexicalIndex>,
    fts: Arc<FtsRetriever>,
    vector: Option<VectorRetriever>,
    reranker: Option<Reranker>,
    documents: Option<Arc<dyn DocumentSource>>,
}

impl SearchService {
    pub fn new(settings: SearchSettings, lexical: Arc<dyn LexicalIndex>) -> Self {
        let fts = Arc::new(FtsRetriever::new(lexical.clone(), settings.clone()));
        Self { settings, lexical, fts, vector: None, reranker: None, documents: None }
    }

    #[must_use]
    pub fn with_vector(
        mut self,
        store: Arc<dyn VectorStore>,
        embedders: Arc<dyn EmbedderResolver>,
        texts: Arc<dyn ChunkTextLookup>,
    ) -> Self {
        self.vector = Some(VectorRetriever::new(store, embedders, texts));
        self
    }

    #[must_use]
    pub fn with_reranker(mut self, reranker: Reranker) -> Self {
        self.reranker = Some(reranker);
        self
    }

    #[must_use]
    pub fn with_documents(mut self, documents: Arc<dyn DocumentSource>) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    pub async fn search(&self, criteria: &SearchCriteria) -> Result<SearchResults> {
        criteria.validate()?;
        let started = Instant::now();
        let mut results = SearchResults::empty(criteria.query.clone(), criteria.mode);

        if let Some(dataset) = criteria.dataset_name.as_deref() {
            match self.lexical.dataset_exists(dataset) {
                Ok(true) => {}
                Ok(false) => {
                    warn!(dataset, "dataset not found");
                    results.timing_ms = elapsed_ms(started);
                    return Ok(results);
                }
                Err(e) => warn!(dataset, error = %e, "dataset lookup failed, searching anyway"),
            }
        }

        let limit = criteria.retrieval_limit();
        let timeout = Duration::from_millis(self.settings.search_timeout_ms);
        let candidates = match tokio::time::timeout(timeout, self.retrieve(criteria, limit)).await {
            Ok(hits) => hits,
            Err(_) => {
                let timeout_ms = self.settings.search_timeout_ms;
                warn!(timeout_ms, query = %criteria.query, "search timed out");
                Vec::new()
            }
        };
        results.total_candidates = candidates.len();

        let ranked = self.finalize(criteria, candidates).await;
        results.results = ranked.into_iter().map(|hit| self.to_result(hit)).collect();
        results.timing_ms = elapsed_ms(started);
        info!(
            mode = %criteria.mode,
            rerank = criteria.rerank,
            candidates = results.total_candidates,
            returned = results.results.len(),
            timing_ms = results.timing_ms,
            "search complete"
        );
        Ok(results)
    }

    async fn retrieve(&self, criteria: &SearchCriteria, limit: usize) -> Vec<Hit> {
        let dataset = criteria.dataset_name.as_deref();
        match criteria.mode {
            SearchMode::Fts => self.fts_hits(&criteria.query, limit, dataset).await,
            SearchMode::Vector => self.vector_hits(&criteria.query, limit, dataset).await,
            SearchMode::Hybrid => self.hybrid_hits(criteria, limit).await,
        }
    }

    async fn hybrid_hits(&self, criteria: &SearchCriteria, limit: usize) -> Vec<Hit> {
        let dataset = criteria.dataset_name.as_deref();
        let fts_k = self.settings.fts_top_k.max(limit);
        let vector_k = self.settings.vector_top_k.max(limit);

        let mut queries = vec![(criteria.query.as_str(), self.settings.rrf_original_weight)];
        queries.extend(
            criteria
                .expansions
                .iter()
                .filter(|q| !q.trim().is_empty())
                .map(|q| (q.as_str(), self.settings.rrf_expansion_weight)),
        );

        let per_query = join_all(queries.iter().map(|&(query, weight)| async move {
            let (fts, vector) =
                tokio::join!(self.fts_hits(query, fts_k, dataset), self.vector_hits(query, vector_k, dataset));
            [RankedList::new(FTS_LABEL, weight, fts), RankedList::new(VECTOR_LABEL, weight, vector)]
        }))
        .await;
        let lists: Vec<RankedList> = per_query.into_iter().flatten().collect();

        // Only `limit` fused candidates go on to reranking or the final cut.
        let config = RrfConfig::from_settings(&self.settings).with_top_k(limit);
        let fused = fuse(&lists, &config);
        debug!(lists = lists.len(), fused = fused.len(), "hybrid fusion");
        fused
    }

    async fn fts_hits(&self, query: &str, limit: usize, dataset: Option<&str>) -> Vec<Hit> {
        let fts = Arc::clone(&self.fts);
        let (query, dataset) = (query.to_string(), dataset.map(str::to_string));
        let searched = tokio::task::spawn_blocking(move || fts.retrieve(&query, limit, dataset.as_deref())).await;
        match searched {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                warn!(retriever = FTS_LABEL, error = %e, "retriever failed, contributing no hits");
                Vec::new()
            }
            Err(e) => {
                warn!(retriever = FTS_LABEL, error = %e, "retriever task panicked, contributing no hits");
                Vec::new()
            }
        }
    }

    async fn vector_hits(&self, query: &str, limit: usize, dataset: Option<&str>) -> Vec<Hit> {
        let Some(vector) = &self.vector else {
            debug!("no vector store configured");
            return Vec::new();
        };
        vector.retrieve(query, limit, dataset).await.unwrap_or_else(|e| {
            warn!(retriever = VECTOR_LABEL, error = %e, "retriever failed, contributing no hits");
            Vec::new()
        })
    }

    async fn finalize(&self, criteria: &SearchCriteria, mut candidates: Vec<Hit>) -> Vec<Hit> {
        if criteria.rerank {
            if let Some(reranker) = &self.reranker {
                return reranker.rerank(&criteria.query, candidates, criteria.limit).await;
            }
            warn!("rerank requested but no reranker is configured");
        }
        candidates.truncate(criteria.limit);
        candidates
    }

    fn to_result(&self, hit: Hit) -> SearchResult {
        let (dataset_name, path) = hit.dataset_and_path();
        let (dataset_name, path) = (dataset_name.to_string(), path.to_string());
        let snippet = (!hit.text.is_empty()).then(|| self.snippet_for(&hit, &dataset_name, &path));
        let chunk_seq = hit.meta_i64(CHUNK_SEQ_KEY);
        let chunk_pos = hit.meta_i64(CHUNK_POS_KEY);

        let mut metadata = hit.metadata;
        metadata.insert("node_id".into(), hit.node_id.into());
        metadata.insert("source_doc_id".into(), hit.source_doc_id.into());
        SearchResult {
            path,
            dataset_name,
            score: hit.score,
            snippet,
            chunk_seq,
            chunk_pos,
            metadata,
            scores: hit.scores,
        }
    }

    fn snippet_for(&self, hit: &Hit, dataset_name: &str, path: &str) -> Snippet {
        let max_lines = self.settings.snippet_max_lines;
        let offset = hit.meta_i64(CHUNK_POS_KEY).and_then(|pos| usize::try_from(pos).ok());
        if let (Some(documents), Some(offset)) = (&self.documents, offset) {
            if let Some(document) = documents.document_text(dataset_name, path) {
                return extract_snippet(&hit.text, offset, &document, path, max_lines);
            }
        }
        build_snippet(&hit.text, path, max_lines)
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
