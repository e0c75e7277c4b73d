//! Embedding identity: which embedding space a stored vector belongs to.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Meta;

pub const EMBEDDING_BACKEND_KEY: &str = "embedding_backend";
pub const EMBEDDING_MODEL_KEY: &str = "embedding_model_name";
pub const EMBEDDING_PROFILE_KEY: &str = "embedding_profile";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmbeddingIdentity {
    pub backend: String,
    pub model_name: String,
}

impl EmbeddingIdentity {
    pub fn new(backend: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self { backend: backend.into(), model_name: model_name.into() }
    }

    /// Stable `"{backend}:{model_name}"` key stored alongside each vector.
    pub fn profile(&self) -> String {
        format!("{}:{}", self.backend, self.model_name)
    }

    /// Parse a profile string. Model names may themselves contain colons.
    pub fn from_profile(profile: &str) -> Option<Self> {
        let (backend, model_name) = profile.split_once(':')?;
        if backend.is_empty() || model_name.is_empty() {
            return None;
        }
        Some(Self::new(backend, model_name))
    }

    pub fn to_metadata(&self) -> Meta {
        let mut meta = Meta::new();
        meta.insert(EMBEDDING_BACKEND_KEY.into(), self.backend.clone().into());
        meta.insert(EMBEDDING_MODEL_KEY.into(), self.model_name.clone().into());
        meta.insert(EMBEDDING_PROFILE_KEY.into(), self.profile().into());
        meta
    }

    /// Read an identity back from vector metadata, preferring the combined
    /// profile field over the separate backend/model fields.
    pub fn from_metadata(meta: &Meta) -> Option<Self> {
        if let Some(identity) = meta
            .get(EMBEDDING_PROFILE_KEY)
            .and_then(|v| v.as_str())
            .and_then(Self::from_profile)
        {
            return Some(identity);
        }
        let backend = meta.get(EMBEDDING_BACKEND_KEY).and_then(|v| v.as_str())?;
        let model_name = meta.get(EMBEDDING_MODEL_KEY).and_then(|v| v.as_str())?;
        if backend.is_empty() || model_name.is_empty() {
            return None;
        }
        Some(Self::new(backend, model_name))
    }
}

impl fmt::Display for EmbeddingIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.backend, self.model_name)
    }
}
