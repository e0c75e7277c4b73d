//! Lightweight configuration loader, typed settings sections and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys split on `__`, e.g. `APP_SEARCH__RRF_K=40`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::identity::EmbeddingIdentity;
use crate::intent::QueryIntent;
use crate::types::Bm25Weights;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Self::defaults().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    /// Build from an explicit figment layered over the built-in defaults.
    pub fn from_figment(overrides: Figment) -> anyhow::Result<Self> {
        let config = Self { figment: Self::defaults().merge(overrides) };
        config.validate()?;
        Ok(config)
    }

    fn defaults() -> Figment {
        Figment::new()
            .merge(Serialized::default("search", SearchSettings::default()))
            .merge(Serialized::default("llm", LlmSettings::default()))
            .merge(Serialized::default("data", DataSettings::default()))
            .merge(Serialized::default("embedding", EmbeddingSettings::default()))
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn search(&self) -> anyhow::Result<SearchSettings> {
        self.get("search")
    }

    pub fn llm(&self) -> anyhow::Result<LlmSettings> {
        self.get("llm")
    }

    pub fn data(&self) -> anyhow::Result<DataSettings> {
        self.get("data")
    }

    pub fn embedding(&self) -> anyhow::Result<EmbeddingSettings> {
        self.get("embedding")
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.search()?.validate()?;
        Ok(())
    }
}

/// Retrieval, fusion, reranking and snippet knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub rrf_k: f32,
    pub rrf_original_weight: f32,
    pub rrf_expansion_weight: f32,
    pub rrf_rank1_bonus: f32,
    pub rrf_rank23_bonus: f32,
    pub bm25_heading_weight_navigational: f32,
    pub bm25_heading_weight_informational: f32,
    pub fts_top_k: usize,
    pub vector_top_k: usize,
    pub fusion_top_k: usize,
    pub fusion_dedupe: bool,
    /// `mlx` or `openai`; the other one is the fallback.
    pub rerank_provider: String,
    pub rerank_cache_enabled: bool,
    pub rerank_blend: bool,
    pub cache_ttl_hours: u64,
    pub snippet_max_lines: usize,
    pub search_timeout_ms: u64,
    pub rerank_timeout_ms: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            rrf_k: 60.0,
            rrf_original_weight: 2.0,
            rrf_expansion_weight: 1.0,
            rrf_rank1_bonus: 0.05,
            rrf_rank23_bonus: 0.02,
            bm25_heading_weight_navigational: 0.8,
            bm25_heading_weight_informational: 0.25,
            fts_top_k: 20,
            vector_top_k: 20,
            fusion_top_k: 30,
            fusion_dedupe: false,
            rerank_provider: "mlx".to_string(),
            rerank_cache_enabled: true,
            rerank_blend: false,
            cache_ttl_hours: 168,
            snippet_max_lines: 10,
            search_timeout_ms: 30_000,
            rerank_timeout_ms: 20_000,
        }
    }
}

impl SearchSettings {
    /// Column weights for the lexical query, routed by intent.
    pub fn bm25_weights(&self, intent: QueryIntent) -> Bm25Weights {
        match intent {
            QueryIntent::Navigational => Bm25Weights::with_heading(self.bm25_heading_weight_navigational),
            QueryIntent::Informational => Bm25Weights::with_heading(self.bm25_heading_weight_informational),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.rrf_k < 1.0 {
            return Err(Error::InvalidConfig(format!("search.rrf_k must be >= 1 (got {})", self.rrf_k)));
        }
        let non_negative = [
            ("rrf_original_weight", self.rrf_original_weight),
            ("rrf_expansion_weight", self.rrf_expansion_weight),
            ("rrf_rank1_bonus", self.rrf_rank1_bonus),
            ("rrf_rank23_bonus", self.rrf_rank23_bonus),
            ("bm25_heading_weight_navigational", self.bm25_heading_weight_navigational),
            ("bm25_heading_weight_informational", self.bm25_heading_weight_informational),
        ];
        if let Some((name, value)) = non_negative.iter().find(|(_, v)| *v < 0.0) {
            return Err(Error::InvalidConfig(format!("search.{name} must be >= 0 (got {value})")));
        }
        let positive = [
            ("fts_top_k", self.fts_top_k),
            ("vector_top_k", self.vector_top_k),
            ("fusion_top_k", self.fusion_top_k),
            ("snippet_max_lines", self.snippet_max_lines),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(Error::InvalidConfig(format!("search.{name} must be >= 1")));
        }
        if !matches!(self.rerank_provider.as_str(), "mlx" | "openai") {
            return Err(Error::InvalidConfig(format!(
                "search.rerank_provider must be 'mlx' or 'openai' (got '{}')",
                self.rerank_provider
            )));
        }
        Ok(())
    }
}

/// Endpoints for the relevance judges. Both speak the OpenAI chat API; the
/// MLX one is a local `mlx_lm.server`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub mlx_base_url: String,
    pub mlx_model: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub openai_api_key_env: String,
    pub request_timeout_ms: u64,
    pub choice_batch_size: usize,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            mlx_base_url: "http://127.0.0.1:8080/v1".to_string(),
            mlx_model: "mlx-community/Llama-3.2-1B-Instruct-4bit".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            openai_api_key_env: "OPENAI_API_KEY".to_string(),
            request_timeout_ms: 15_000,
            choice_batch_size: 5,
        }
    }
}

impl LlmSettings {
    pub fn openai_api_key(&self) -> Option<String> {
        env::var(&self.openai_api_key_env).ok().filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetSettings {
    /// Directory the dataset's relative paths resolve against.
    pub root: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub tantivy_index_dir: String,
    pub lancedb_dir: String,
    pub vector_table: String,
    pub datasets: BTreeMap<String, DatasetSettings>,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            tantivy_index_dir: ".catalog/tantivy".to_string(),
            lancedb_dir: ".catalog/lancedb".to_string(),
            vector_table: "chunks".to_string(),
            datasets: BTreeMap::new(),
        }
    }
}

impl DataSettings {
    pub fn tantivy_index_path(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.tantivy_index_dir)
    }

    pub fn lancedb_path(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.lancedb_dir)
    }

    /// Expanded dataset roots keyed by dataset name.
    pub fn dataset_roots(&self, base: &Path) -> BTreeMap<String, PathBuf> {
        self.datasets
            .iter()
            .map(|(name, ds)| (name.clone(), resolve_with_base(base, &ds.root)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: String,
    pub model_name: String,
    pub dim: usize,
    pub batch_size: usize,
    /// Use the hash embedder instead of loading model weights.
    pub use_fake: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: "candle".to_string(),
            model_name: "BAAI/bge-m3".to_string(),
            dim: 1024,
            batch_size: 32,
            use_fake: false,
        }
    }
}

impl EmbeddingSettings {
    pub fn identity(&self) -> EmbeddingIdentity {
        EmbeddingIdentity::new(&self.backend, &self.model_name)
    }

    /// `APP_USE_FAKE_EMBEDDINGS=1` forces the hash embedder regardless of config.
    pub fn fake_requested(&self) -> bool {
        self.use_fake
            || env::var("APP_USE_FAKE_EMBEDDINGS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
