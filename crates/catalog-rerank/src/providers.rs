use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use catalog_core::config::LlmSettings;
use catalog_core::error::{Error, Result};
use catalog_core::traits::RerankProvider;
use catalog_core::types::Hit;

use crate::client::ChatClient;
use crate::prompts::{format_choice_prompt, format_rerank_prompt, parse_choice_answer, RERANK_SYSTEM};

const JUDGE_MAX_TOKENS: u32 = 5;
const CHOICE_MAX_TOKENS: u32 = 256;
const JUDGE_CONCURRENCY: usize = 4;

/// Local yes/no judge: one prompt per candidate, "yes" scores 1.0.
pub struct MlxProvider {
    client: ChatClient,
}

impl MlxProvider {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }

    pub fn from_settings(llm: &LlmSettings) -> anyhow::Result<Self> {
        let timeout = Duration::from_millis(llm.request_timeout_ms);
        let client = ChatClient::new(&llm.mlx_base_url, &llm.mlx_model, None, timeout)?;
        Ok(Self::new(client))
    }

    /// `None` when the request failed, so callers can tell it from a "no".
    async fn judge(&self, query: &str, hit: &Hit) -> Option<f32> {
        let prompt = format_rerank_prompt(query, &hit.text);
        match self.client.complete(Some(RERANK_SYSTEM), &prompt, 0.0, JUDGE_MAX_TOKENS).await {
            Ok(answer) => Some(if answer.trim().to_lowercase().starts_with("yes") { 1.0 } else { 0.0 }),
            Err(e) => {
                warn!(node_id = %hit.node_id, error = %e, "rerank judgment failed");
                None
            }
        }
    }
}

#[async_trait]
impl RerankProvider for MlxProvider {
    fn name(&self) -> &str {
        "mlx"
    }

    fn model(&self) -> &str {
        self.client.model()
    }

    async fn score(&self, query: &str, candidates: &[Hit]) -> Result<Vec<f32>> {
        let judgments: Vec<_> = candidates.iter().map(|hit| self.judge(query, hit)).collect();
        let judged: Vec<Option<f32>> = stream::iter(judgments).buffered(JUDGE_CONCURRENCY).collect().await;

        if !judged.is_empty() && judged.iter().all(Option::is_none) {
            return Err(Error::provider(self.name(), "every rerank judgment failed"));
        }
        Ok(judged.into_iter().map(|s| s.unwrap_or(0.0)).collect())
    }
}

/// Remote batch judge: documents are shown in groups and the model names
/// the relevant ones with a 1-10 relevance. Unchosen documents score 0.
pub struct OpenAiProvider {
    client: ChatClient,
    choice_batch_size: usize,
    has_key: bool,
}

impl OpenAiProvider {
    pub fn new(client: ChatClient, choice_batch_size: usize, has_key: bool) -> Self {
        Self { client, choice_batch_size: choice_batch_size.max(1), has_key }
    }

    pub fn from_settings(llm: &LlmSettings) -> anyhow::Result<Self> {
        let api_key = llm.openai_api_key();
        let has_key = api_key.is_some();
        let timeout = Duration::from_millis(llm.request_timeout_ms);
        let client = ChatClient::new(&llm.openai_base_url, &llm.openai_model, api_key, timeout)?;
        Ok(Self::new(client, llm.choice_batch_size, has_key))
    }
}

#[async_trait]
impl RerankProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        self.client.model()
    }

    async fn score(&self, query: &str, candidates: &[Hit]) -> Result<Vec<f32>> {
        if !self.has_key {
            return Err(Error::provider(self.name(), "no API key configured"));
        }
        let mut scores = vec![0.0; candidates.len()];
        for (batch_idx, batch) in candidates.chunks(self.choice_batch_size).enumerate() {
            let docs: Vec<&str> = batch.iter().map(|h| h.text.as_str()).collect();
            let prompt = format_choice_prompt(query, &docs);
            let answer = self
                .client
                .complete(None, &prompt, 0.0, CHOICE_MAX_TOKENS)
                .await
                .map_err(|e| Error::provider(self.name(), e))?;
            let offset = batch_idx * self.choice_batch_size;
            for (i, relevance) in parse_choice_answer(&answer, batch.len()) {
                scores[offset + i] = (relevance / 10.0).clamp(0.0, 1.0);
            }
        }
        debug!(candidates = candidates.len(), "openai choice rerank scored");
        Ok(scores)
    }
}

/// Tries `primary`, then `secondary` once.
pub struct FallbackProvider {
    primary: Arc<dyn RerankProvider>,
    secondary: Arc<dyn RerankProvider>,
}

impl FallbackProvider {
    pub fn new(primary: Arc<dyn RerankProvider>, secondary: Arc<dyn RerankProvider>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl RerankProvider for FallbackProvider {
    fn name(&self) -> &str {
        self.primary.name()
    }

    fn model(&self) -> &str {
        self.primary.model()
    }

    async fn score(&self, query: &str, candidates: &[Hit]) -> Result<Vec<f32>> {
        match self.primary.score(query, candidates).await {
            Ok(scores) => Ok(scores),
            Err(primary_err) => {
                warn!(
                    provider = self.primary.name(),
                    error = %primary_err,
                    fallback = self.secondary.name(),
                    "rerank provider failed, falling back"
                );
                self.secondary.score(query, candidates).await.map_err(|secondary_err| {
                    Error::provider(
                        format!("{}+{}", self.primary.name(), self.secondary.name()),
                        format!("{primary_err}; {secondary_err}"),
                    )
                })
            }
        }
    }
}

/// Configured provider first, the other one as fallback.
pub fn build_provider(rerank_provider: &str, llm: &LlmSettings) -> anyhow::Result<Arc<dyn RerankProvider>> {
    let mlx: Arc<dyn RerankProvider> = Arc::new(MlxProvider::from_settings(llm)?);
    let openai: Arc<dyn RerankProvider> = Arc::new(OpenAiProvider::from_settings(llm)?);
    let (primary, secondary) = if rerank_provider == "openai" { (openai, mlx) } else { (mlx, openai) };
    Ok(Arc::new(FallbackProvider::new(primary, secondary)))
}
