use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use catalog_core::config::SearchSettings;
use catalog_core::error::{Error, Result};
use catalog_core::identity::{EmbeddingIdentity, EMBEDDING_PROFILE_KEY};
use catalog_core::traits::{DocumentSource, Embedder, LexicalIndex, RerankProvider, VectorStore};
use catalog_core::types::{Bm25Weights, ChunkRecord, Hit, Meta, SearchCriteria, SearchMode, VectorHit};
use catalog_embed::{EmbedderRegistry, HashEmbedder};
use catalog_hybrid::SearchService;
use catalog_rerank::Reranker;
use catalog_text::ChunkIndex;
use pretty_assertions::assert_eq;

const DIM: usize = 256;

fn chunk(node_id: &str, source_doc_id: &str, text: &str, pos: i64) -> ChunkRecord {
    ChunkRecord {
        node_id: node_id.to_string(),
        source_doc_id: source_doc_id.to_string(),
        text: text.to_string(),
        chunk_seq: Some(0),
        chunk_pos: Some(pos),
        content_hash: Some(format!("hash-{node_id}")),
    }
}

fn corpus() -> Vec<ChunkRecord> {
    vec![
        chunk("n1", "notes:rust/ownership.md", "# Ownership\nRust ownership rules and borrowing.", 11),
        chunk("n2", "notes:rust/async.md", "# Async\nRust async with the Tokio runtime.", 0),
        chunk("n3", "notes:garden.md", "# Garden\nTomatoes need sun and water.", 0),
        chunk("n4", "work:plan.md", "# Plan\nQuarterly roadmap and borrowing costs.", 0),
    ]
}

/// Brute-force cosine store over pre-normalised vectors.
#[derive(Default)]
struct MemoryVectorStore {
    rows: Vec<(EmbeddingIdentity, String, String, Vec<f32>)>,
    delay: Option<Duration>,
    broken: bool,
}

impl MemoryVectorStore {
    fn add(&mut self, identity: &EmbeddingIdentity, embedder: &dyn Embedder, chunks: &[ChunkRecord]) {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).unwrap();
        for (c, v) in chunks.iter().zip(vectors) {
            self.rows.push((identity.clone(), c.node_id.clone(), c.dataset_name().to_string(), v));
        }
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn identities(&self, dataset_name: Option<&str>) -> anyhow::Result<Vec<EmbeddingIdentity>> {
        if self.broken {
            anyhow::bail!("store offline");
        }
        let mut ids: Vec<_> = self
            .rows
            .iter()
            .filter(|(_, _, ds, _)| dataset_name.map_or(true, |d| d == ds.as_str()))
            .map(|(id, ..)| id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn similarity(
        &self,
        query_vec: &[f32],
        identity: Option<&EmbeddingIdentity>,
        top_k: usize,
        dataset_name: Option<&str>,
    ) -> anyhow::Result<Vec<VectorHit>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut hits: Vec<VectorHit> = self
            .rows
            .iter()
            .filter(|(id, _, ds, _)| identity.map_or(true, |i| i == id) && dataset_name.map_or(true, |d| d == ds.as_str()))
            .map(|(id, node_id, _, v)| {
                let score: f32 = v.iter().zip(query_vec).map(|(a, b)| a * b).sum();
                let mut metadata = Meta::new();
                metadata.insert(EMBEDDING_PROFILE_KEY.into(), id.profile().into());
                VectorHit { node_id: node_id.clone(), score, metadata }
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.node_id.cmp(&b.node_id)));
        hits.truncate(top_k);
        Ok(hits)
    }
}

struct Fixture {
    index: Arc<ChunkIndex>,
    embedder: Arc<HashEmbedder>,
}

impl Fixture {
    fn new() -> Self {
        let index = ChunkIndex::in_memory().unwrap();
        index.index_chunks(&corpus()).unwrap();
        Self { index: Arc::new(index), embedder: Arc::new(HashEmbedder::new(DIM)) }
    }

    fn store(&self) -> MemoryVectorStore {
        let mut store = MemoryVectorStore::default();
        store.add(&self.embedder.identity(), self.embedder.as_ref(), &corpus());
        store
    }

    fn registry(&self) -> Arc<EmbedderRegistry> {
        Arc::new(EmbedderRegistry::new().with(self.embedder.identity(), self.embedder.clone()))
    }

    fn service_with(&self, settings: SearchSettings, store: MemoryVectorStore) -> SearchService {
        SearchService::new(settings, self.index.clone()).with_vector(Arc::new(store), self.registry(), self.index.clone())
    }

    fn service(&self) -> SearchService {
        self.service_with(SearchSettings::default(), self.store())
    }
}

fn ids(results: &catalog_core::SearchResults) -> Vec<String> {
    results
        .results
        .iter()
        .map(|r| r.metadata["node_id"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn fts_results_carry_path_dataset_and_snippet() {
    let fx = Fixture::new();
    let criteria = SearchCriteria::new("ownership").with_mode(SearchMode::Fts);
    let results = fx.service().search(&criteria).await.unwrap();

    assert_eq!(results.mode, SearchMode::Fts);
    assert_eq!(ids(&results), vec!["n1"]);
    let top = &results.results[0];
    assert_eq!(top.dataset_name, "notes");
    assert_eq!(top.path, "rust/ownership.md");
    assert_eq!(top.chunk_pos, Some(11));
    assert!(top.scores.contains_key("fts"));
    let snippet = top.snippet.as_ref().unwrap();
    assert_eq!(snippet.header, "@@ -1,1 +1,1 @@ rust/ownership.md");
    assert_eq!(snippet.text, "Rust ownership rules and borrowing.");
}

#[tokio::test]
async fn hybrid_ranks_agreement_first_and_records_component_scores() {
    let fx = Fixture::new();
    let results = fx.service().search(&SearchCriteria::new("ownership borrowing")).await.unwrap();

    assert_eq!(results.mode, SearchMode::Hybrid);
    let top = &results.results[0];
    assert_eq!(top.path, "rust/ownership.md");
    for label in ["fts", "vector", "rrf"] {
        assert!(top.scores.contains_key(label), "missing {label}");
    }
    assert_eq!(top.scores["rrf"], top.score);
    assert!(results.results.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(results.total_candidates >= results.results.len());
}

#[tokio::test]
async fn hybrid_is_deterministic() {
    let fx = Fixture::new();
    let service = fx.service();
    let criteria = SearchCriteria::new("rust borrowing");
    let first = service.search(&criteria).await.unwrap();
    for _ in 0..3 {
        let again = service.search(&criteria).await.unwrap();
        assert_eq!(ids(&again), ids(&first));
    }
}

#[tokio::test]
async fn dataset_filter_and_unknown_dataset() {
    let fx = Fixture::new();
    let service = fx.service();

    let scoped = SearchCriteria::new("borrowing").with_dataset(Some("work".into()));
    let results = service.search(&scoped).await.unwrap();
    assert!(!results.results.is_empty());
    assert!(results.results.iter().all(|r| r.dataset_name == "work"));

    let missing = SearchCriteria::new("borrowing").with_dataset(Some("nope".into()));
    let results = service.search(&missing).await.unwrap();
    assert!(results.results.is_empty());
    assert_eq!(results.total_candidates, 0);
}

#[tokio::test]
async fn invalid_criteria_is_rejected() {
    let fx = Fixture::new();
    let err = fx.service().search(&SearchCriteria::new("  ")).await.unwrap_err();
    assert!(matches!(err, Error::InvalidCriteria(_)));
    let err = fx.service().search(&SearchCriteria::new("q").with_limit(0)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidCriteria(_)));
}

#[tokio::test]
async fn limit_truncates_without_rerank() {
    let fx = Fixture::new();
    let criteria = SearchCriteria::new("rust").with_mode(SearchMode::Hybrid).with_limit(1);
    let results = fx.service().search(&criteria).await.unwrap();
    assert_eq!(results.results.len(), 1);
}

#[tokio::test]
async fn vector_mode_skips_identities_without_embedder() {
    let fx = Fixture::new();
    let mut store = fx.store();
    let stranger = EmbeddingIdentity::new("candle", "other-model");
    store.add(&stranger, &HashEmbedder::new(DIM), &corpus()[2..3]);

    let criteria = SearchCriteria::new("tomatoes sun").with_mode(SearchMode::Vector);
    let results = fx.service_with(SearchSettings::default(), store).search(&criteria).await.unwrap();
    assert!(!results.results.is_empty());
    let profile = fx.embedder.identity().profile();
    assert!(results
        .results
        .iter()
        .all(|r| r.metadata[EMBEDDING_PROFILE_KEY].as_str() == Some(profile.as_str())));
    assert_eq!(results.results[0].path, "garden.md");
    assert!(results.results[0].snippet.as_ref().unwrap().text.contains("Tomatoes"));
}

#[tokio::test]
async fn failing_vector_store_leaves_lexical_results() {
    let fx = Fixture::new();
    let store = MemoryVectorStore { broken: true, ..fx.store() };
    let results = fx
        .service_with(SearchSettings::default(), store)
        .search(&SearchCriteria::new("ownership"))
        .await
        .unwrap();
    assert_eq!(ids(&results), vec!["n1"]);
    assert!(!results.results[0].scores.contains_key("vector"));
}

#[tokio::test]
async fn search_timeout_yields_empty_results() {
    let fx = Fixture::new();
    let settings = SearchSettings { search_timeout_ms: 50, ..SearchSettings::default() };
    let store = MemoryVectorStore { delay: Some(Duration::from_secs(5)), ..fx.store() };
    let criteria = SearchCriteria::new("ownership").with_mode(SearchMode::Vector);
    let results = fx.service_with(settings, store).search(&criteria).await.unwrap();
    assert!(results.results.is_empty());
    assert_eq!(results.total_candidates, 0);
}

/// Lexical index whose searches block the calling thread.
struct BlockingIndex {
    inner: Arc<ChunkIndex>,
    pause: Duration,
}

impl LexicalIndex for BlockingIndex {
    fn search_with_scores(
        &self,
        query: &str,
        limit: usize,
        source_doc_id_prefix: Option<&str>,
        weights: Option<&Bm25Weights>,
    ) -> anyhow::Result<Vec<Hit>> {
        std::thread::sleep(self.pause);
        self.inner.search_with_scores(query, limit, source_doc_id_prefix, weights)
    }

    fn dataset_exists(&self, dataset_name: &str) -> anyhow::Result<bool> {
        self.inner.dataset_exists(dataset_name)
    }
}

#[tokio::test]
async fn search_timeout_covers_blocking_lexical_search() {
    let fx = Fixture::new();
    let settings = SearchSettings { search_timeout_ms: 50, ..SearchSettings::default() };
    let lexical = Arc::new(BlockingIndex { inner: fx.index.clone(), pause: Duration::from_millis(800) });
    let service = SearchService::new(settings, lexical);

    let started = std::time::Instant::now();
    let criteria = SearchCriteria::new("ownership").with_mode(SearchMode::Fts);
    let results = service.search(&criteria).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(600), "took {:?}", started.elapsed());
    assert!(results.results.is_empty());
}

#[tokio::test]
async fn expansions_add_candidates() {
    let fx = Fixture::new();
    let service = fx.service();
    let plain = SearchCriteria::new("ownership").with_mode(SearchMode::Hybrid).with_limit(20);
    let expanded = plain.clone().with_expansions(vec!["tomatoes".into()]);

    let base = service.search(&plain).await.unwrap();
    let more = service.search(&expanded).await.unwrap();
    assert_eq!(base.results[0].path, "rust/ownership.md");
    assert_eq!(more.results[0].path, "rust/ownership.md");
    let garden_rank = |r: &catalog_core::SearchResults| r.results.iter().position(|x| x.path == "garden.md");
    match (garden_rank(&base), garden_rank(&more)) {
        (Some(before), Some(after)) => assert!(after <= before),
        (None, after) => assert!(after.is_some()),
        (Some(_), None) => panic!("expansion dropped a candidate"),
    }
}

/// Scores 1.0 for candidates mentioning `needle`, 0.0 otherwise.
struct Needle {
    needle: &'static str,
    fail: bool,
    calls: AtomicUsize,
    largest_batch: AtomicUsize,
}

impl Needle {
    fn new(needle: &'static str, fail: bool) -> Arc<Self> {
        Arc::new(Self { needle, fail, calls: AtomicUsize::new(0), largest_batch: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl RerankProvider for Needle {
    fn name(&self) -> &str {
        "needle"
    }
    fn model(&self) -> &str {
        "needle-1"
    }
    async fn score(&self, _query: &str, candidates: &[Hit]) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.largest_batch.fetch_max(candidates.len(), Ordering::SeqCst);
        if self.fail {
            return Err(Error::provider("needle", "down"));
        }
        Ok(candidates.iter().map(|h| if h.text.contains(self.needle) { 1.0 } else { 0.0 }).collect())
    }
}

fn reranked(fx: &Fixture, provider: Arc<Needle>) -> SearchService {
    fx.service().with_reranker(Reranker::new(provider, Duration::from_secs(5)))
}

#[tokio::test]
async fn rerank_reorders_and_limits() {
    let fx = Fixture::new();
    let provider = Needle::new("Tokio", false);
    let criteria = SearchCriteria::new("rust").with_mode(SearchMode::Fts).with_limit(1).with_rerank(10);
    let results = reranked(&fx, provider.clone()).search(&criteria).await.unwrap();

    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert_eq!(results.total_candidates, 2);
    assert_eq!(ids(&results), vec!["n2"]);
    assert_eq!(results.results[0].scores["rerank"], 1.0);
}

#[tokio::test]
async fn hybrid_rerank_judges_only_rerank_candidates() {
    let fx = Fixture::new();
    let provider = Needle::new("Tokio", false);
    let criteria = SearchCriteria::new("rust borrowing").with_limit(1).with_rerank(2);
    let results = reranked(&fx, provider.clone()).search(&criteria).await.unwrap();

    assert_eq!(results.total_candidates, 2);
    assert_eq!(provider.largest_batch.load(Ordering::SeqCst), 2);
    assert_eq!(results.results.len(), 1);
}

#[tokio::test]
async fn hybrid_without_rerank_fuses_only_limit() {
    let fx = Fixture::new();
    let criteria = SearchCriteria::new("rust borrowing").with_limit(2);
    let results = fx.service().search(&criteria).await.unwrap();
    assert_eq!(results.total_candidates, 2);
}

#[tokio::test]
async fn rerank_failure_keeps_retrieval_order() {
    let fx = Fixture::new();
    let provider = Needle::new("Tokio", true);
    let criteria = SearchCriteria::new("rust borrowing").with_limit(2).with_rerank(10);
    let plain = fx.service().search(&criteria).await.unwrap();
    let results = reranked(&fx, provider).search(&criteria).await.unwrap();

    assert_eq!(ids(&results), ids(&plain));
    assert!(results.results.len() <= 2);
}

struct Docs(BTreeMap<(String, String), String>);

impl DocumentSource for Docs {
    fn document_text(&self, dataset_name: &str, path: &str) -> Option<String> {
        self.0.get(&(dataset_name.to_string(), path.to_string())).cloned()
    }
}

#[tokio::test]
async fn snippets_use_document_line_numbers_when_available() {
    let fx = Fixture::new();
    let docs = Docs(BTreeMap::from([(
        ("notes".to_string(), "rust/ownership.md".to_string()),
        "intro\nmore\n# Ownership\nRust ownership rules and borrowing.\n".to_string(),
    )]));
    let service = fx.service().with_documents(Arc::new(docs));
    let criteria = SearchCriteria::new("ownership").with_mode(SearchMode::Fts);
    let results = service.search(&criteria).await.unwrap();

    let snippet = results.results[0].snippet.as_ref().unwrap();
    assert_eq!(snippet.start_line, 3);
    assert_eq!(snippet.header, "@@ -3,1 +3,1 @@ rust/ownership.md");
}
