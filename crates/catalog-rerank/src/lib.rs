//! LLM-as-judge reranking: prompts, providers, fallback, caching and the
//! pass-through reranker used by the search service.

pub mod cache;
pub mod client;
pub mod prompts;
pub mod providers;
pub mod reranker;

pub use cache::CachedProvider;
pub use client::ChatClient;
pub use providers::{build_provider, FallbackProvider, MlxProvider, OpenAiProvider};
pub use reranker::{blend_scores, position_weight, Reranker};
