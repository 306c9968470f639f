//! Voyage AI embeddings provider

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ProviderConfig;
use crate::{EmbeddingProvider, ProviderError, Result};

const DEFAULT_HOST: &str = "https://api.voyageai.com";
const DEFAULT_MODEL: &str = "voyage-3";
const DEFAULT_DIMENSIONS: usize = 1024;

pub struct VoyageAiProvider {
    client: reqwest::Client,
    host: String,
    api_key: String,
    model: String,
}

impl VoyageAiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .ok_or_else(|| ProviderError::MissingConfig("voyageai api_key".into()))?;
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
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbedDatum {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for VoyageAiProvider {
    fn name(&self) -> &str {
        "voyageai"
    }

    fn dimensions(&self) -> usize {
        DEFAULT_DIMENSIONS
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.host);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbedRequest {
                model: &self.model,
                input: inputs,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream(format!("voyageai embeddings failed: {body}")));
        }

        let parsed: EmbedResponse = response.json().await?;
        if parsed.data.len() != inputs.len() {
            return Err(ProviderError::BatchSizeMismatch {
                expected: inputs.len(),
                got: parsed.data.len(),
            });
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}
