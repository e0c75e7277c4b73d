use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid search criteria: {0}")]
    InvalidCriteria(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Provider '{provider}' failed: {message}")]
    Provider { provider: String, message: String },

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn provider(provider: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Provider { provider: provider.into(), message: message.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
