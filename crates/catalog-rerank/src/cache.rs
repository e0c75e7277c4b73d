use async_trait::async_trait;
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

use catalog_core::error::Result;
use catalog_core::traits::RerankProvider;
use catalog_core::types::{Hit, CONTENT_HASH_KEY};

pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

fn sha256_hex(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Cache key for one (query, candidate, model) judgment. The candidate is
/// identified by its `content_hash`, or a hash of its text when absent.
pub fn rerank_cache_key(query: &str, hit: &Hit, model: &str) -> String {
    let content = match hit.meta_str(CONTENT_HASH_KEY) {
        Some(hash) => hash.to_string(),
        None => sha256_hex(&[&hit.text]),
    };
    sha256_hex(&["rerank", query, &content, model])
}

/// Memoises provider scores in an in-memory LRU with a TTL. Only misses are
/// sent to the inner provider.
pub struct CachedProvider {
    inner: Arc<dyn RerankProvider>,
    cache: Mutex<LruCache<String, (f32, Instant)>>,
    ttl: Duration,
}

impl CachedProvider {
    pub fn new(inner: Arc<dyn RerankProvider>, ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { inner, cache: Mutex::new(LruCache::new(capacity)), ttl }
    }

    pub fn with_ttl_hours(inner: Arc<dyn RerankProvider>, hours: u64) -> Self {
        Self::new(inner, Duration::from_secs(hours * 3600), DEFAULT_CACHE_CAPACITY)
    }

    fn lookup(&self, key: &str) -> Option<f32> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        match cache.get(key) {
            Some((score, stored)) if stored.elapsed() < self.ttl => Some(*score),
            Some(_) => {
                cache.pop(key);
                None
            }
            None => None,
        }
    }

    fn store(&self, key: String, score: f32) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.put(key, (score, Instant::now()));
    }
}

#[async_trait]
impl RerankProvider for CachedProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn score(&self, query: &str, candidates: &[Hit]) -> Result<Vec<f32>> {
        let model = self.inner.model().to_string();
        let keys: Vec<String> = candidates.iter().map(|h| rerank_cache_key(query, h, &model)).collect();
        let mut scores: Vec<Option<f32>> = keys.iter().map(|k| self.lookup(k)).collect();

        let missing: Vec<usize> = (0..candidates.len()).filter(|&i| scores[i].is_none()).collect();
        if !missing.is_empty() {
            let batch: Vec<Hit> = missing.iter().map(|&i| candidates[i].clone()).collect();
            let fresh = self.inner.score(query, &batch).await?;
            for (&i, score) in missing.iter().zip(fresh) {
                self.store(keys[i].clone(), score);
                scores[i] = Some(score);
            }
        }
        debug!(hits = candidates.len() - missing.len(), misses = missing.len(), "rerank cache");
        Ok(scores.into_iter().map(|s| s.unwrap_or(0.0)).collect())
    }
}
