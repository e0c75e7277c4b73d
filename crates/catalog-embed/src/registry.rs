use std::collections::HashMap;
use std::sync::Arc;

use catalog_core::identity::EmbeddingIdentity;
use catalog_core::traits::{Embedder, EmbedderResolver};

/// Embedders keyed by the identity of the vectors they produced.
#[derive(Default, Clone)]
pub struct EmbedderRegistry {
    embedders: HashMap<EmbeddingIdentity, Arc<dyn Embedder>>,
}

impl EmbedderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, identity: EmbeddingIdentity, embedder: Arc<dyn Embedder>) -> Self {
        self.register(identity, embedder);
        self
    }

    pub fn register(&mut self, identity: EmbeddingIdentity, embedder: Arc<dyn Embedder>) {
        self.embedders.insert(identity, embedder);
    }

    pub fn identities(&self) -> Vec<EmbeddingIdentity> {
        let mut ids: Vec<_> = self.embedders.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl EmbedderResolver for EmbedderRegistry {
    fn resolve(&self, identity: &EmbeddingIdentity) -> Option<Arc<dyn Embedder>> {
        self.embedders.get(identity).cloned()
    }
}
