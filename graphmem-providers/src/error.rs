//! Error type for embedding providers

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider returned an error: {0}")]
    Upstream(String),

    #[error("provider returned {got} embeddings for {expected} inputs")]
    BatchSizeMismatch { expected: usize, got: usize },

    #[error("unsupported provider: {0}")]
    UnknownProvider(String),

    #[error("missing required configuration: {0}")]
    MissingConfig(String),
}

impl ProviderError {
    /// Whether this failure is a timeout, worth one retry against a
    /// local-runtime provider that may just be cold-starting a model.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Request(e) if e.is_timeout())
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
