//! Ollama local embeddings API provider

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ProviderConfig;
use crate::{EmbeddingProvider, ProviderError, Result};

const DEFAULT_HOST: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "nomic-embed-text";
const DEFAULT_DIMENSIONS: usize = 768;

pub struct OllamaProvider {
    client: reqwest::Client,
    host: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            host: config.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            model: config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    #[allow(dead_code)]
    pub fn with_config(host: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Self::new(ProviderConfig {
            host: Some(host.into()),
            model: Some(model.into()),
            ..ProviderConfig::default()
        })
    }
}

#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn dimensions(&self) -> usize {
        DEFAULT_DIMENSIONS
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        match self.do_embed(inputs).await {
            Err(e) if e.is_timeout() => self.do_embed(inputs).await,
            result => result,
        }
    }
}

impl OllamaProvider {
    /// A model that's cold and still loading into memory can blow past the
    /// configured timeout on the first request; retried once by `embed`.
    async fn do_embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.host);
        let response = self
            .client
            .post(&url)
            .json(&OllamaEmbedRequest {
                model: &self.model,
                input: inputs,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream(format!("ollama embed failed: {body}")));
        }

        let parsed: OllamaEmbedResponse = response.json().await?;
        if parsed.embeddings.len() != inputs.len() {
            return Err(ProviderError::BatchSizeMismatch {
                expected: inputs.len(),
                got: parsed.embeddings.len(),
            });
        }
        Ok(parsed.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_construction() {
        let provider = OllamaProvider::new(ProviderConfig::default()).unwrap();
        assert_eq!(provider.host, DEFAULT_HOST);
        assert_eq!(provider.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_with_config_overrides_host_and_model() {
        let provider = OllamaProvider::with_config("http://ollama.local:11434", "mxbai-embed-large").unwrap();
        assert_eq!(provider.host, "http://ollama.local:11434");
        assert_eq!(provider.model, "mxbai-embed-large");
    }

    #[test]
    fn test_name_is_stable() {
        let provider = OllamaProvider::new(ProviderConfig::default()).unwrap();
        assert_eq!(provider.name(), "ollama");
    }
}
