//! Domain types shared by the retrievers, fusion, reranking and the service.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub type NodeId = String;
pub type Meta = BTreeMap<String, serde_json::Value>;
pub type ComponentScores = BTreeMap<String, f32>;

pub const MAX_LIMIT: usize = 100;
pub const DEFAULT_LIMIT: usize = 10;
pub const DEFAULT_RERANK_CANDIDATES: usize = 20;

pub const CHUNK_SEQ_KEY: &str = "chunk_seq";
pub const CHUNK_POS_KEY: &str = "chunk_pos";
pub const CONTENT_HASH_KEY: &str = "content_hash";

/// Which retrieval path a search runs.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Fts,
    Vector,
    #[default]
    Hybrid,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fts => "fts",
            Self::Vector => "vector",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fts" => Ok(Self::Fts),
            "vector" => Ok(Self::Vector),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(Error::InvalidCriteria(format!(
                "mode must be one of fts, vector, hybrid (got '{other}')"
            ))),
        }
    }
}

/// Input contract for one search call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchCriteria {
    pub query: String,
    #[serde(default)]
    pub mode: SearchMode,
    #[serde(default)]
    pub dataset_name: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub rerank: bool,
    #[serde(default = "default_rerank_candidates")]
    pub rerank_candidates: usize,
    /// Alternative phrasings from an upstream expander; fused at the expansion weight.
    #[serde(default)]
    pub expansions: Vec<String>,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_rerank_candidates() -> usize {
    DEFAULT_RERANK_CANDIDATES
}

impl SearchCriteria {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            mode: SearchMode::default(),
            dataset_name: None,
            limit: DEFAULT_LIMIT,
            rerank: false,
            rerank_candidates: DEFAULT_RERANK_CANDIDATES,
            expansions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_dataset(mut self, dataset_name: Option<String>) -> Self {
        self.dataset_name = dataset_name;
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_rerank(mut self, rerank_candidates: usize) -> Self {
        self.rerank = true;
        self.rerank_candidates = rerank_candidates;
        self
    }

    #[must_use]
    pub fn with_expansions(mut self, expansions: Vec<String>) -> Self {
        self.expansions = expansions;
        self
    }

    /// Reject criteria before any retrieval work happens.
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(Error::InvalidCriteria("query must not be empty".into()));
        }
        if !(1..=MAX_LIMIT).contains(&self.limit) {
            return Err(Error::InvalidCriteria(format!(
                "limit must be between 1 and {MAX_LIMIT} (got {})",
                self.limit
            )));
        }
        if !(1..=MAX_LIMIT).contains(&self.rerank_candidates) {
            return Err(Error::InvalidCriteria(format!(
                "rerank_candidates must be between 1 and {MAX_LIMIT} (got {})",
                self.rerank_candidates
            )));
        }
        if let Some(name) = &self.dataset_name {
            if name.is_empty() || name.contains(':') {
                return Err(Error::InvalidCriteria(format!("invalid dataset name '{name}'")));
            }
        }
        Ok(())
    }

    /// Number of candidates to retrieve before reranking or final limiting.
    pub fn retrieval_limit(&self) -> usize {
        if self.rerank { self.rerank_candidates } else { self.limit }
    }
}

/// Display excerpt with line provenance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snippet {
    pub text: String,
    pub start_line: usize,
    pub end_line: usize,
    pub header: String,
}

/// One ranked hit returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub path: String,
    pub dataset_name: String,
    pub score: f32,
    pub snippet: Option<Snippet>,
    pub chunk_seq: Option<i64>,
    pub chunk_pos: Option<i64>,
    pub metadata: Meta,
    pub scores: ComponentScores,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResults {
    pub results: Vec<SearchResult>,
    pub query: String,
    pub mode: SearchMode,
    pub total_candidates: usize,
    pub timing_ms: f64,
}

impl SearchResults {
    pub fn empty(query: impl Into<String>, mode: SearchMode) -> Self {
        Self { results: Vec::new(), query: query.into(), mode, total_candidates: 0, timing_ms: 0.0 }
    }
}

/// A ranked chunk as it flows through retrieval, fusion and reranking.
///
/// `node_id` is the join key across the text index, the vector store and
/// fusion. `score` is stage-specific but higher is always better; earlier
/// stage scores are kept in `scores`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hit {
    pub node_id: NodeId,
    pub source_doc_id: String,
    pub text: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Meta,
    #[serde(default)]
    pub scores: ComponentScores,
}

impl Hit {
    pub fn new(
        node_id: impl Into<String>,
        source_doc_id: impl Into<String>,
        text: impl Into<String>,
        score: f32,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            source_doc_id: source_doc_id.into(),
            text: text.into(),
            score,
            metadata: Meta::new(),
            scores: ComponentScores::new(),
        }
    }

    /// Record the current score under a stage label (`fts`, `vector`, ...).
    #[must_use]
    pub fn labeled(mut self, label: &str) -> Self {
        self.scores.insert(label.to_string(), self.score);
        self
    }

    pub fn meta_i64(&self, key: &str) -> Option<i64> {
        self.metadata.get(key).and_then(serde_json::Value::as_i64)
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(serde_json::Value::as_str)
    }

    /// `(dataset_name, path)` parsed from `source_doc_id`.
    pub fn dataset_and_path(&self) -> (&str, &str) {
        split_source_doc_id(&self.source_doc_id).unwrap_or(("", self.source_doc_id.as_str()))
    }
}

/// A similarity hit from the vector store, before text lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub node_id: NodeId,
    pub score: f32,
    pub metadata: Meta,
}

/// A chunk as emitted by the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkRecord {
    pub node_id: NodeId,
    pub source_doc_id: String,
    pub text: String,
    #[serde(default)]
    pub chunk_seq: Option<i64>,
    #[serde(default)]
    pub chunk_pos: Option<i64>,
    #[serde(default)]
    pub content_hash: Option<String>,
}

impl ChunkRecord {
    pub fn dataset_name(&self) -> &str {
        split_source_doc_id(&self.source_doc_id).map_or("", |(dataset, _)| dataset)
    }

    /// Position fields as hit metadata.
    pub fn position_metadata(&self) -> Meta {
        let mut meta = Meta::new();
        if let Some(seq) = self.chunk_seq {
            meta.insert(CHUNK_SEQ_KEY.into(), seq.into());
        }
        if let Some(pos) = self.chunk_pos {
            meta.insert(CHUNK_POS_KEY.into(), pos.into());
        }
        if let Some(hash) = &self.content_hash {
            meta.insert(CONTENT_HASH_KEY.into(), hash.clone().into());
        }
        meta
    }
}

/// Split `"{dataset}:{path}"` on the first colon.
pub fn split_source_doc_id(source_doc_id: &str) -> Option<(&str, &str)> {
    source_doc_id.split_once(':')
}

pub fn dataset_prefix(dataset_name: &str) -> String {
    format!("{dataset_name}:")
}

/// Per-column lexical weights in index column order:
/// `node_id, heading_text, body_text, source_doc_id`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Weights {
    pub node_id: f32,
    pub heading: f32,
    pub body: f32,
    pub source_doc_id: f32,
}

impl Bm25Weights {
    pub fn with_heading(heading: f32) -> Self {
        Self { heading, ..Self::default() }
    }
}

impl Default for Bm25Weights {
    fn default() -> Self {
        Self { node_id: 0.0, heading: 0.25, body: 1.0, source_doc_id: 0.0 }
    }
}

impl fmt::Display for Bm25Weights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}, {}", self.node_id, self.heading, self.body, self.source_doc_id)
    }
}

impl FromStr for Bm25Weights {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<f32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::InvalidConfig(format!("bm25 weights '{s}': {e}")))?;
        match parts.as_slice() {
            [node_id, heading, body, source_doc_id] if parts.iter().all(|w| *w >= 0.0) => {
                Ok(Self { node_id: *node_id, heading: *heading, body: *body, source_doc_id: *source_doc_id })
            }
            _ => Err(Error::InvalidConfig(format!(
                "bm25 weights must be four non-negative numbers (got '{s}')"
            ))),
        }
    }
}
