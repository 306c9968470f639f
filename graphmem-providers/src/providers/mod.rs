//! HTTP-backed embedding providers, one module per backend (§4.8)

pub mod gemini;
pub mod localai;
pub mod ollama;
pub mod openai;
pub mod vertexai;
pub mod voyageai;

use std::time::Duration;

use crate::{EmbeddingProvider, ProviderError, Result};

/// Shared connection settings every HTTP provider is built from
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub host: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub project: Option<String>,
    pub location: Option<String>,
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            host: None,
            api_key: None,
            model: None,
            project: None,
            location: None,
            timeout: crate::DEFAULT_TIMEOUT,
        }
    }
}

/// Build a boxed provider by name, the single entry point the reference
/// binary's configuration layer calls into (§4.10, §6)
pub fn build(name: &str, config: ProviderConfig) -> Result<Box<dyn EmbeddingProvider + Send + Sync>> {
    match name {
        "openai" => Ok(Box::new(openai::OpenAiProvider::new(config)?)),
        "ollama" => Ok(Box::new(ollama::OllamaProvider::new(config)?)),
        "gemini" => Ok(Box::new(gemini::GeminiProvider::new(config)?)),
        "vertexai" => Ok(Box::new(vertexai::VertexAiProvider::new(config)?)),
        "localai" => Ok(Box::new(localai::LocalAiProvider::new(config)?)),
        "voyageai" => Ok(Box::new(voyageai::VoyageAiProvider::new(config)?)),
        other => Err(ProviderError::UnknownProvider(other.to_string())),
    }
}
