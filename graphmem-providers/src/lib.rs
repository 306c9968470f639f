//! Pluggable embedding backends for the knowledge-graph memory service
//!
//! Each backend is a thin `reqwest` client over one provider's embeddings
//! endpoint. All of them implement the same [`EmbeddingProvider`] trait so
//! the core store can treat them interchangeably; a [`DimensionAdapter`]
//! wraps any provider to pad or truncate its output to a target width.

mod error;
pub mod providers;

use std::time::Duration;

use async_trait::async_trait;

pub use error::{ProviderError, Result};

/// Default per-request timeout for hosted providers (§4.8)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for local model runtimes (ollama, localai), which pay a cold-start
/// cost the first time a model is loaded (§4.8, §5)
pub const LOCAL_RUNTIME_TIMEOUT: Duration = Duration::from_secs(60);

/// An embedding backend. Implementations must be safe to call from multiple
/// tasks concurrently; `embed` returns vectors in the same order as `inputs`
/// and fails as a whole on any partial failure (§6 Embedding Provider contract).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short identifier used in logs and config (`"openai"`, `"ollama"`, ...)
    fn name(&self) -> &str;

    /// Native output width of this provider's model
    fn dimensions(&self) -> usize;

    /// Embed a batch of inputs, one vector per input, in order
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Which adaptation to perform when a provider's native width differs from
/// the store's configured dimension (§4.1, §9)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptMode {
    PadOrTruncate,
    Pad,
    Truncate,
}

/// Wraps any [`EmbeddingProvider`] to coerce its output to a fixed width,
/// so the store never has to special-case a provider/DB dimension mismatch.
pub struct DimensionAdapter<P> {
    inner: P,
    target_dims: usize,
    mode: AdaptMode,
}

impl<P: EmbeddingProvider> DimensionAdapter<P> {
    pub fn new(inner: P, target_dims: usize, mode: AdaptMode) -> Self {
        Self {
            inner,
            target_dims,
            mode,
        }
    }

    fn adapt(&self, mut vector: Vec<f32>) -> Vec<f32> {
        match self.mode {
            AdaptMode::Pad => {
                vector.resize(vector.len().max(self.target_dims), 0.0);
                vector
            }
            AdaptMode::Truncate => {
                vector.truncate(self.target_dims);
                vector
            }
            AdaptMode::PadOrTruncate => {
                vector.resize(self.target_dims, 0.0);
                vector
            }
        }
    }
}

#[async_trait]
impl<P: EmbeddingProvider> EmbeddingProvider for DimensionAdapter<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn dimensions(&self) -> usize {
        self.target_dims
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let raw = self.inner.embed(inputs).await?;
        Ok(raw.into_iter().map(|v| self.adapt(v)).collect())
    }
}
