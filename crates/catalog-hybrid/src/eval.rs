//! Golden-query evaluation: hit@k per retriever and difficulty, checked
//! against minimum thresholds.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use tracing::debug;

use catalog_core::types::{SearchCriteria, SearchMode};

use crate::service::SearchService;

pub const K_VALUES: [usize; 4] = [1, 3, 5, 10];
pub const COUNT_KEY: &str = "count";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Fusion,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
            Self::Fusion => "fusion",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrieverType {
    Bm25,
    Vector,
    Hybrid,
}

impl RetrieverType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bm25 => "bm25",
            Self::Vector => "vector",
            Self::Hybrid => "hybrid",
        }
    }

    pub fn mode(self) -> SearchMode {
        match self {
            Self::Bm25 => SearchMode::Fts,
            Self::Vector => SearchMode::Vector,
            Self::Hybrid => SearchMode::Hybrid,
        }
    }
}

impl fmt::Display for RetrieverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A query with the document paths it is expected to retrieve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenQuery {
    pub query: String,
    pub expected_docs: Vec<String>,
    pub difficulty: Difficulty,
    pub retriever_types: Vec<RetrieverType>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GoldenFile {
    List(Vec<GoldenQuery>),
    Wrapped { queries: Vec<GoldenQuery> },
}

/// Outcome of one golden query against one retriever.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalResult {
    pub query: String,
    pub difficulty: Difficulty,
    pub retriever_type: RetrieverType,
    pub hits: BTreeMap<usize, bool>,
    pub retrieved_docs: Vec<String>,
    pub scores: Vec<f32>,
}

impl EvalResult {
    pub fn hit_at(&self, k: usize) -> bool {
        self.hits.get(&k).copied().unwrap_or(false)
    }
}

/// retriever → difficulty → metric (`hit_at_k`, `count`) → value.
pub type EvalReport = BTreeMap<String, BTreeMap<String, BTreeMap<String, f64>>>;
pub type Thresholds = BTreeMap<&'static str, BTreeMap<&'static str, BTreeMap<&'static str, f64>>>;

pub fn metric_name(k: usize) -> String {
    format!("hit_at_{k}")
}

/// Minimum hit@k rates per retriever and difficulty.
pub fn eval_thresholds() -> Thresholds {
    const TABLE: [(&str, [(&str, [f64; 4]); 4]); 3] = [
        (
            "bm25",
            [
                ("easy", [0.70, 0.80, 0.85, 0.90]),
                ("medium", [0.50, 0.65, 0.75, 0.85]),
                ("hard", [0.30, 0.45, 0.55, 0.70]),
                ("fusion", [0.40, 0.55, 0.65, 0.75]),
            ],
        ),
        (
            "vector",
            [
                ("easy", [0.50, 0.60, 0.70, 0.80]),
                ("medium", [0.40, 0.55, 0.65, 0.75]),
                ("hard", [0.25, 0.40, 0.50, 0.65]),
                ("fusion", [0.35, 0.50, 0.60, 0.70]),
            ],
        ),
        (
            "hybrid",
            [
                ("easy", [0.75, 0.85, 0.90, 0.95]),
                ("medium", [0.55, 0.70, 0.80, 0.90]),
                ("hard", [0.35, 0.50, 0.60, 0.75]),
                ("fusion", [0.45, 0.60, 0.70, 0.80]),
            ],
        ),
    ];
    const METRICS: [&str; 4] = ["hit_at_1", "hit_at_3", "hit_at_5", "hit_at_10"];

    TABLE
        .iter()
        .map(|(retriever, rows)| {
            let by_difficulty: BTreeMap<&'static str, BTreeMap<&'static str, f64>> = rows
                .iter()
                .map(|(difficulty, values)| {
                    let metrics = METRICS.iter().copied().zip(values.iter().copied()).collect();
                    (*difficulty, metrics)
                })
                .collect();
            (*retriever, by_difficulty)
        })
        .collect()
}

/// Load golden queries from a JSON array or an object with a `queries` array.
pub fn load_golden_queries(path: &Path) -> Result<Vec<GoldenQuery>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading golden queries from {}", path.display()))?;
    let parsed: GoldenFile = serde_json::from_str(&raw)
        .with_context(|| format!("parsing golden queries in {}", path.display()))?;
    let queries = match parsed {
        GoldenFile::List(q) | GoldenFile::Wrapped { queries: q } => q,
    };
    for (i, q) in queries.iter().enumerate() {
        if q.query.trim().is_empty() {
            bail!("item {i} has an empty query");
        }
    }
    debug!(count = queries.len(), path = %path.display(), "loaded golden queries");
    Ok(queries)
}

/// Whether any expected document path appears in each top-k prefix.
pub fn hits_at_k(retrieved: &[String], expected: &[String], k_values: &[usize]) -> BTreeMap<usize, bool> {
    let expected: HashSet<&str> = expected.iter().map(String::as_str).collect();
    k_values
        .iter()
        .map(|&k| (k, retrieved.iter().take(k).any(|doc| expected.contains(doc.as_str()))))
        .collect()
}

pub async fn evaluate_single(
    service: &SearchService,
    golden: &GoldenQuery,
    retriever_type: RetrieverType,
    k_values: &[usize],
) -> catalog_core::Result<EvalResult> {
    let max_k = k_values.iter().copied().max().unwrap_or(10);
    let criteria = SearchCriteria::new(golden.query.clone())
        .with_mode(retriever_type.mode())
        .with_limit(max_k);
    let results = service.search(&criteria).await?;

    let retrieved_docs: Vec<String> = results.results.iter().map(|r| r.path.clone()).collect();
    let scores = results.results.iter().map(|r| r.score).collect();
    let hits = hits_at_k(&retrieved_docs, &golden.expected_docs, k_values);
    let hit_at_3 = hits.get(&3).copied().unwrap_or(false);
    debug!(retriever = %retriever_type, query = %golden.query, hit_at_3, "evaluated");

    Ok(EvalResult {
        query: golden.query.clone(),
        difficulty: golden.difficulty,
        retriever_type,
        hits,
        retrieved_docs,
        scores,
    })
}

/// Run every golden query against each of its retriever types and aggregate.
pub async fn evaluate_golden_queries(
    service: &SearchService,
    queries: &[GoldenQuery],
    k_values: &[usize],
) -> catalog_core::Result<EvalReport> {
    let mut results = Vec::new();
    for golden in queries {
        for &retriever_type in &golden.retriever_types {
            results.push(evaluate_single(service, golden, retriever_type, k_values).await?);
        }
    }
    Ok(aggregate(&results, k_values))
}

/// Fraction of queries hitting at each k, grouped by retriever and difficulty.
pub fn aggregate(results: &[EvalResult], k_values: &[usize]) -> EvalReport {
    let mut groups: BTreeMap<(RetrieverType, Difficulty), Vec<&EvalResult>> = BTreeMap::new();
    for result in results {
        groups.entry((result.retriever_type, result.difficulty)).or_default().push(result);
    }

    let mut report = EvalReport::new();
    for ((retriever, difficulty), group) in groups {
        let count = group.len() as f64;
        let mut metrics = BTreeMap::new();
        metrics.insert(COUNT_KEY.to_string(), count);
        for &k in k_values {
            let hit_count = group.iter().filter(|r| r.hit_at(k)).count() as f64;
            metrics.insert(metric_name(k), hit_count / count);
        }
        report
            .entry(retriever.as_str().to_string())
            .or_default()
            .insert(difficulty.as_str().to_string(), metrics);
    }
    report
}

/// One failure string per metric below its threshold. Groups without a
/// threshold entry are ignored.
pub fn check_thresholds(report: &EvalReport, thresholds: &Thresholds) -> Vec<String> {
    let mut failures = Vec::new();
    for (retriever, difficulties) in report {
        let Some(by_difficulty) = thresholds.get(retriever.as_str()) else { continue };
        for (difficulty, metrics) in difficulties {
            let Some(minimums) = by_difficulty.get(difficulty.as_str()) else { continue };
            for (metric, threshold) in minimums {
                let actual = metrics.get(*metric).copied().unwrap_or(0.0);
                if actual < *threshold {
                    failures.push(format!(
                        "{retriever}/{difficulty}/{metric}: {} < {}",
                        percent(actual),
                        percent(*threshold)
                    ));
                }
            }
        }
    }
    failures
}

/// `0.8` → `"80.0%"`.
pub fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}
