pub mod config;
pub mod error;
pub mod heading;
pub mod identity;
pub mod intent;
pub mod snippet;
pub mod traits;
pub mod types;

pub use config::{expand_path, resolve_with_base, Config};
pub use error::{Error, Result};
pub use identity::EmbeddingIdentity;
pub use intent::{classify_intent, QueryIntent};
pub use types::*;
