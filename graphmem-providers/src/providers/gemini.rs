//! Google Gemini (generativelanguage) batch embeddings provider

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ProviderConfig;
use crate::{EmbeddingProvider, ProviderError, Result};

const DEFAULT_HOST: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "text-embedding-004";
const DEFAULT_DIMENSIONS: usize = 768;

pub struct GeminiProvider {
    client: reqwest::Client,
    host: String,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .ok_or_else(|| ProviderError::MissingConfig("gemini api_key".into()))?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            host: config.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            api_key,
            model: config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedContentRequest>,
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest {
    model: String,
    content: Content,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn dimensions(&self) -> usize {
        DEFAULT_DIMENSIONS
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let model_path = format!("models/{}", self.model);
        let url = format!(
            "{}/v1beta/{}:batchEmbedContents?key={}",
            self.host, model_path, self.api_key
        );

        let requests = inputs
            .iter()
            .map(|text| EmbedContentRequest {
                model: model_path.clone(),
                content: Content {
                    parts: vec![Part { text: text.clone() }],
                },
            })
            .collect();

        let response = self
            .client
            .post(&url)
            .json(&BatchEmbedRequest { requests })
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream(format!("gemini batchEmbedContents failed: {body}")));
        }

        let parsed: BatchEmbedResponse = response.json().await?;
        if parsed.embeddings.len() != inputs.len() {
            return Err(ProviderError::BatchSizeMismatch {
                expected: inputs.len(),
                got: parsed.embeddings.len(),
            });
        }
        Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
    }
}
