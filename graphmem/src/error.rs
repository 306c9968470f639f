//! Error types for graphmem

use thiserror::Error;

/// graphmem error type
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configured embedding dimension is out of the valid range
    #[error("Invalid embedding dimensions: {0}")]
    InvalidEmbeddingDims(String),

    /// Provider's embedding dimension does not match the store's
    #[error("Embedding dimension mismatch: provider={provider}, store={store}")]
    EmbeddingDimsMismatch { provider: usize, store: usize },

    /// Upstream embedding provider failed or returned an inconsistent batch
    #[error("Embedding provider error: {0}")]
    EmbeddingsProviderError(String),

    /// The engine lacks the vector functions required to serve this query
    #[error("Vector search unsupported: {0}")]
    VectorSearchUnsupported(String),

    /// Named entity or relation does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request failed input validation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Multi-tenant token mismatch
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Generic error with operation context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Stable, machine-readable error code for the wire protocol (§7)
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidEmbeddingDims(_) => "INVALID_EMBEDDING_DIMS",
            Error::EmbeddingDimsMismatch { .. } => "EMBEDDING_DIMS_MISMATCH",
            Error::EmbeddingsProviderError(_) => "EMBEDDINGS_PROVIDER_ERROR",
            Error::VectorSearchUnsupported(_) => "VECTOR_SEARCH_UNSUPPORTED",
            Error::NotFound(_) => "NOT_FOUND",
            Error::InvalidArgument(_) => "INVALID_ARGUMENT",
            Error::Unauthorized(_) => "UNAUTHORIZED",
            Error::Database(_) => "DATABASE",
            Error::Io(_) => "IO",
            Error::Serialization(_) => "SERIALIZATION",
            Error::Other(_) => "ERROR",
        }
    }

    /// Wrap this error with additional operation context. Variants whose
    /// code callers rely on (e.g. `NOT_FOUND` at the tool boundary) keep
    /// their code; the rest collapse to `Other` since nothing downstream
    /// inspects their code past this point.
    pub fn with_context(self, context: &str) -> Self {
        match self {
            Error::NotFound(m) => Error::NotFound(format!("{context}: {m}")),
            Error::InvalidArgument(m) => Error::InvalidArgument(format!("{context}: {m}")),
            Error::Unauthorized(m) => Error::Unauthorized(format!("{context}: {m}")),
            Error::EmbeddingsProviderError(m) => Error::EmbeddingsProviderError(format!("{context}: {m}")),
            Error::VectorSearchUnsupported(m) => Error::VectorSearchUnsupported(format!("{context}: {m}")),
            Error::InvalidEmbeddingDims(m) => Error::InvalidEmbeddingDims(format!("{context}: {m}")),
            other => Error::Other(format!("{context}: {other}")),
        }
    }
}

/// Result type alias for graphmem operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("alice".to_string());
        assert_eq!(err.to_string(), "Not found: alice");
    }

    #[test]
    fn test_with_context_preserves_not_found_code() {
        let err = Error::NotFound("alice".to_string()).with_context("create_entities");
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(err.to_string().contains("create_entities"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::NotFound("x".into()).code(), "NOT_FOUND");
        assert_eq!(
            Error::InvalidArgument("x".into()).code(),
            "INVALID_ARGUMENT"
        );
        assert_eq!(Error::Unauthorized("x".into()).code(), "UNAUTHORIZED");
        assert_eq!(
            Error::EmbeddingDimsMismatch {
                provider: 4,
                store: 8
            }
            .code(),
            "EMBEDDING_DIMS_MISMATCH"
        );
    }
}
