//! Weighted reciprocal rank fusion over ranked hit lists.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use catalog_core::config::SearchSettings;
use catalog_core::types::Hit;

pub const RRF_SCORE_KEY: &str = "rrf";

/// One retriever's output for one query, with its fusion weight.
#[derive(Debug, Clone)]
pub struct RankedList {
    pub label: String,
    pub weight: f32,
    pub hits: Vec<Hit>,
}

impl RankedList {
    pub fn new(label: impl Into<String>, weight: f32, hits: Vec<Hit>) -> Self {
        Self { label: label.into(), weight, hits }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RrfConfig {
    pub k: f32,
    pub rank1_bonus: f32,
    pub rank23_bonus: f32,
    pub top_k: usize,
    pub dedupe: bool,
}

impl Default for RrfConfig {
    fn default() -> Self {
        Self::from_settings(&SearchSettings::default())
    }
}

impl RrfConfig {
    pub fn from_settings(settings: &SearchSettings) -> Self {
        Self {
            k: settings.rrf_k,
            rank1_bonus: settings.rrf_rank1_bonus,
            rank23_bonus: settings.rrf_rank23_bonus,
            top_k: settings.fusion_top_k,
            dedupe: settings.fusion_dedupe,
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Contribution of a hit at 1-based `rank` in a list of weight `weight`.
    pub fn contribution(&self, weight: f32, rank: usize) -> f32 {
        let bonus = match rank {
            1 => self.rank1_bonus,
            2 | 3 => self.rank23_bonus,
            _ => 0.0,
        };
        weight / (self.k + rank as f32) + bonus
    }
}

/// Fuse ranked lists by `node_id`.
///
/// The first list a node appears in supplies its text and metadata. Each
/// list's own score is kept under its label in `scores`; the fused score
/// becomes `score` and is also recorded under `rrf`. Ties are broken by
/// `node_id` ascending so the output is fully deterministic.
pub fn fuse(lists: &[RankedList], config: &RrfConfig) -> Vec<Hit> {
    let mut fused: HashMap<&str, (Hit, f32)> = HashMap::new();

    for list in lists {
        for (idx, hit) in list.hits.iter().enumerate() {
            let contribution = config.contribution(list.weight, idx + 1);
            let entry = fused
                .entry(hit.node_id.as_str())
                .or_insert_with(|| {
                    let mut first = hit.clone();
                    first.scores.clear();
                    (first, 0.0)
                });
            entry.1 += contribution;
            let label_score = entry.0.scores.entry(list.label.clone()).or_insert(hit.score);
            *label_score = label_score.max(hit.score);
            for (key, value) in &hit.metadata {
                entry.0.metadata.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
    }

    let mut hits: Vec<Hit> = fused
        .into_values()
        .map(|(mut hit, score)| {
            hit.score = score;
            hit.scores.insert(RRF_SCORE_KEY.to_string(), score);
            hit
        })
        .collect();
    sort_by_score(&mut hits);

    if config.dedupe {
        hits = dedupe_by_document(hits);
    }
    hits.truncate(config.top_k);
    hits
}

/// Keep the best-scoring chunk per `source_doc_id`. Input must already be sorted.
pub fn dedupe_by_document(hits: Vec<Hit>) -> Vec<Hit> {
    let mut seen = HashSet::new();
    let mut kept: Vec<Hit> = hits
        .into_iter()
        .filter(|hit| seen.insert(hit.source_doc_id.clone()))
        .collect();
    sort_by_score(&mut kept);
    kept
}

pub fn sort_by_score(hits: &mut [Hit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn hits(ids: &[(&str, &str)]) -> Vec<Hit> {
        ids.iter()
            .enumerate()
            .map(|(i, (node, doc))| Hit::new(*node, *doc, format!("text {node}"), 1.0 - i as f32 * 0.1))
            .collect()
    }

    fn score_of(fused: &[Hit], node: &str) -> f32 {
        fused.iter().find(|h| h.node_id == node).map_or(0.0, |h| h.score)
    }

    #[test]
    fn contribution_applies_rank_bonuses() {
        let cfg = RrfConfig::default();
        assert!((cfg.contribution(1.0, 1) - (1.0 / 61.0 + 0.05)).abs() < 1e-6);
        assert!((cfg.contribution(1.0, 3) - (1.0 / 63.0 + 0.02)).abs() < 1e-6);
        assert!((cfg.contribution(1.0, 4) - 1.0 / 64.0).abs() < 1e-6);
    }

    #[test]
    fn original_weight_outranks_expansion() {
        let cfg = RrfConfig { rank1_bonus: 0.0, rank23_bonus: 0.0, ..RrfConfig::default() };
        let lists = vec![
            RankedList::new("fts", 2.0, hits(&[("a", "d:a.md")])),
            RankedList::new("fts", 1.0, hits(&[("b", "d:b.md")])),
        ];
        let fused = fuse(&lists, &cfg);
        assert_eq!(fused[0].node_id, "a");
        assert!((fused[0].score - 2.0 / 61.0).abs() < 1e-6);
        assert!((fused[1].score - 1.0 / 61.0).abs() < 1e-6);
    }

    #[test]
    fn adding_a_list_with_node_first_increases_its_score() {
        let cfg = RrfConfig::default();
        let base = vec![RankedList::new("fts", 2.0, hits(&[("a", "d:a"), ("x", "d:x")]))];
        let before = score_of(&fuse(&base, &cfg), "x");
        let mut more = base.clone();
        more.push(RankedList::new("vector", 2.0, hits(&[("x", "d:x")])));
        let after = score_of(&fuse(&more, &cfg), "x");
        assert!(after > before);
    }

    #[test]
    fn keeps_first_seen_text_and_per_label_scores() {
        let mut vector = hits(&[("a", "d:a")]);
        vector[0].text = "raw text".into();
        vector[0].score = 0.42;
        let lists = vec![
            RankedList::new("fts", 2.0, hits(&[("a", "d:a")])),
            RankedList::new("vector", 2.0, vector),
        ];
        let fused = fuse(&lists, &RrfConfig::default());
        assert_eq!(fused[0].text, "text a");
        assert_eq!(fused[0].scores.get("fts"), Some(&1.0));
        assert_eq!(fused[0].scores.get("vector"), Some(&0.42));
        assert_eq!(fused[0].scores.get(RRF_SCORE_KEY), Some(&fused[0].score));
    }

    #[test]
    fn ties_break_by_node_id() {
        let cfg = RrfConfig::default();
        let lists = vec![
            RankedList::new("fts", 1.0, hits(&[("b", "d:b")])),
            RankedList::new("vector", 1.0, hits(&[("a", "d:a")])),
        ];
        let ids: Vec<_> = fuse(&lists, &cfg).into_iter().map(|h| h.node_id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn dedupe_keeps_best_chunk_and_is_idempotent() {
        let cfg = RrfConfig { dedupe: true, ..RrfConfig::default() };
        let lists = vec![RankedList::new(
            "fts",
            2.0,
            hits(&[("a1", "d:a.md"), ("a2", "d:a.md"), ("b1", "d:b.md")]),
        )];
        let once = fuse(&lists, &cfg);
        let ids: Vec<_> = once.iter().map(|h| h.node_id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "b1"]);
        assert_eq!(dedupe_by_document(once.clone()), once);
    }

    #[test]
    fn fusion_is_deterministic_and_truncates() {
        let cfg = RrfConfig::default().with_top_k(3);
        let lists = vec![
            RankedList::new("fts", 2.0, hits(&[("a", "d:a"), ("b", "d:b"), ("c", "d:c"), ("d", "d:d")])),
            RankedList::new("vector", 2.0, hits(&[("d", "d:d"), ("c", "d:c"), ("e", "d:e")])),
        ];
        let first = fuse(&lists, &cfg);
        assert_eq!(first.len(), 3);
        for _ in 0..5 {
            assert_eq!(fuse(&lists, &cfg), first);
        }
    }
}
