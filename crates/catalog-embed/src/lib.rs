use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::info;

use catalog_core::config::EmbeddingSettings;
use catalog_core::identity::EmbeddingIdentity;
use catalog_core::traits::Embedder;

pub mod device;
pub mod hash;
pub mod model;
pub mod pool;
pub mod registry;
pub mod resilient;
pub mod tokenize;

pub use hash::HashEmbedder;
pub use model::{resolve_model_dir, EmbeddingModel, BGE_M3_DIM};
pub use pool::masked_mean_l2;
pub use registry::EmbedderRegistry;
pub use resilient::ResilientEmbedder;

pub const CANDLE_BACKEND: &str = "candle";
pub const CANDLE_MODEL_NAME: &str = "BAAI/bge-m3";

/// Build the configured embedder and the identity its vectors are tagged with.
/// `APP_USE_FAKE_EMBEDDINGS=1` (or `embedding.use_fake`) selects the hash embedder.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<(EmbeddingIdentity, Arc<dyn Embedder>)> {
    if settings.fake_requested() {
        let fake = HashEmbedder::new(settings.dim);
        info!(identity = %fake.identity(), "using hash embedder");
        return Ok((fake.identity(), Arc::new(fake)));
    }
    let identity = model_identity(settings)?;
    let model = EmbeddingModel::load(&resolve_model_dir()?)?;
    let resilient = ResilientEmbedder::new(Arc::new(model));
    Ok((identity, Arc::new(resilient)))
}

/// Identity of the candle model, checked against the configured
/// `embedding.*` keys so stored vectors are never tagged with another space.
pub fn model_identity(settings: &EmbeddingSettings) -> Result<EmbeddingIdentity> {
    let identity = EmbeddingIdentity::new(CANDLE_BACKEND, CANDLE_MODEL_NAME);
    if settings.identity() != identity {
        bail!("embedding model {} is not supported; only {identity} can be loaded", settings.identity());
    }
    if settings.dim != BGE_M3_DIM {
        bail!("embedding.dim is {} but {identity} produces {BGE_M3_DIM}-dimensional vectors", settings.dim);
    }
    Ok(identity)
}
