use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use catalog_core::config::{LlmSettings, SearchSettings};
use catalog_core::traits::RerankProvider;
use catalog_core::types::Hit;

use crate::cache::CachedProvider;
use crate::providers::build_provider;

pub const RERANK_SCORE_KEY: &str = "rerank";
pub const BLEND_WEIGHT_KEY: &str = "blend_weight";

/// Share of the retrieval score kept at 0-based `rank` when blending.
pub fn position_weight(rank: usize) -> f32 {
    if rank < 3 {
        0.75
    } else if rank < 10 {
        0.60
    } else {
        0.40
    }
}

/// `final = w * retrieval + (1 - w) * rerank` using each hit's pre-rerank
/// position. Hits without a rerank score keep their retrieval score.
pub fn blend_scores(hits: &mut [Hit]) {
    for (rank, hit) in hits.iter_mut().enumerate() {
        if let Some(&rerank) = hit.scores.get(RERANK_SCORE_KEY) {
            let w = position_weight(rank);
            hit.score = w * hit.score + (1.0 - w) * rerank;
            hit.scores.insert(BLEND_WEIGHT_KEY.to_string(), w);
        }
    }
}

/// LLM-as-judge reranking. Never fails: on provider error or timeout the
/// input order is returned, truncated to `top_n`.
pub struct Reranker {
    provider: Arc<dyn RerankProvider>,
    timeout: Duration,
    blend: bool,
}

impl Reranker {
    pub fn new(provider: Arc<dyn RerankProvider>, timeout: Duration) -> Self {
        Self { provider, timeout, blend: false }
    }

    /// Provider chain from config: configured provider with the other as
    /// fallback, wrapped in the score cache when enabled.
    pub fn from_settings(search: &SearchSettings, llm: &LlmSettings) -> anyhow::Result<Self> {
        let mut provider = build_provider(&search.rerank_provider, llm)?;
        if search.rerank_cache_enabled {
            provider = Arc::new(CachedProvider::with_ttl_hours(provider, search.cache_ttl_hours));
        }
        let timeout = Duration::from_millis(search.rerank_timeout_ms);
        Ok(Self::new(provider, timeout).with_blend(search.rerank_blend))
    }

    #[must_use]
    pub fn with_blend(mut self, blend: bool) -> Self {
        self.blend = blend;
        self
    }

    pub async fn rerank(&self, query: &str, mut candidates: Vec<Hit>, top_n: usize) -> Vec<Hit> {
        if candidates.is_empty() || top_n == 0 {
            return Vec::new();
        }
        let scores = match tokio::time::timeout(self.timeout, self.provider.score(query, &candidates)).await {
            Ok(Ok(scores)) if scores.len() == candidates.len() => scores,
            Ok(Ok(scores)) => {
                warn!(
                    expected = candidates.len(),
                    got = scores.len(),
                    "rerank score count mismatch, keeping retrieval order"
                );
                return pass_through(candidates, top_n);
            }
            Ok(Err(e)) => {
                warn!(provider = self.provider.name(), error = %e, "reranking failed, keeping retrieval order");
                return pass_through(candidates, top_n);
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "reranking timed out, keeping retrieval order");
                return pass_through(candidates, top_n);
            }
        };

        for (hit, score) in candidates.iter_mut().zip(scores) {
            hit.scores.insert(RERANK_SCORE_KEY.to_string(), score);
            if !self.blend {
                hit.score = score;
            }
        }
        if self.blend {
            blend_scores(&mut candidates);
        }
        // Stable: equal scores keep retrieval order.
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        candidates.truncate(top_n);
        debug!(returned = candidates.len(), blend = self.blend, "reranked");
        candidates
    }
}

fn pass_through(mut candidates: Vec<Hit>, top_n: usize) -> Vec<Hit> {
    candidates.truncate(top_n);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_weights_step_down() {
        assert_eq!(position_weight(0), 0.75);
        assert_eq!(position_weight(2), 0.75);
        assert_eq!(position_weight(3), 0.60);
        assert_eq!(position_weight(9), 0.60);
        assert_eq!(position_weight(10), 0.40);
    }

    #[test]
    fn blend_mixes_by_original_rank() {
        let mut hits: Vec<Hit> = (0..4).map(|i| Hit::new(format!("n{i}"), "ds:a.md", "", 1.0)).collect();
        for h in &mut hits {
            h.scores.insert(RERANK_SCORE_KEY.into(), 0.0);
        }
        blend_scores(&mut hits);
        assert!((hits[0].score - 0.75).abs() < 1e-6);
        assert!((hits[3].score - 0.60).abs() < 1e-6);
        assert_eq!(hits[3].scores[BLEND_WEIGHT_KEY], 0.60);
    }
}
