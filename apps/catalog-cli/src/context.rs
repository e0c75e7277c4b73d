//! Builds the shared services once from config and hands them to commands.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use catalog_core::config::{Config, DataSettings, EmbeddingSettings};
use catalog_embed::{get_default_embedder, EmbedderRegistry, HashEmbedder};
use catalog_hybrid::{FsDocumentSource, SearchService};
use catalog_rerank::Reranker;
use catalog_text::ChunkIndex;
use catalog_vector::LanceVectorStore;

pub fn load_config() -> Result<Config> {
    Config::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })
}

/// Embedders for every identity this process can serve queries for: the
/// configured one plus the hash embedder used by model-free indexing runs.
fn embedder_registry(settings: &EmbeddingSettings) -> EmbedderRegistry {
    let hash = HashEmbedder::new(settings.dim);
    let mut registry = EmbedderRegistry::new().with(hash.identity(), Arc::new(hash));
    match get_default_embedder(settings) {
        Ok((identity, embedder)) => registry.register(identity, embedder),
        Err(e) => warn!(error = %e, identity = %settings.identity(), "embedding model unavailable"),
    }
    registry
}

async fn vector_store(data: &DataSettings, base: &Path) -> Result<Option<LanceVectorStore>> {
    let path = data.lancedb_path(base);
    if !path.exists() {
        warn!(path = %path.display(), "no vector store yet; vector retrieval disabled");
        return Ok(None);
    }
    let uri = path.to_string_lossy();
    Ok(Some(LanceVectorStore::open(&uri, &data.vector_table).await?))
}

pub async fn build_search_service(config: &Config, base: &Path) -> Result<SearchService> {
    let search = config.search()?;
    let data = config.data()?;
    let embedding = config.embedding()?;

    let index_path = data.tantivy_index_path(base);
    let index = Arc::new(ChunkIndex::open_or_create(&index_path)?);
    info!(path = %index_path.display(), chunks = index.num_chunks(), "opened text index");

    let mut service = SearchService::new(search.clone(), index.clone());
    if let Some(store) = vector_store(&data, base).await? {
        service = service.with_vector(Arc::new(store), Arc::new(embedder_registry(&embedding)), index);
    }
    match Reranker::from_settings(&search, &config.llm()?) {
        Ok(reranker) => service = service.with_reranker(reranker),
        Err(e) => warn!(error = %e, "reranker unavailable"),
    }
    let roots = data.dataset_roots(base);
    if !roots.is_empty() {
        service = service.with_documents(Arc::new(FsDocumentSource::new(roots)));
    }
    Ok(service)
}
