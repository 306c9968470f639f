//! LocalAI provider, OpenAI-compatible `/v1/embeddings` served from a
//! self-hosted runtime (subject to a cold-start model load, see
//! [`crate::LOCAL_RUNTIME_TIMEOUT`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ProviderConfig;
use crate::{EmbeddingProvider, ProviderError, Result};

const DEFAULT_HOST: &str = "http://localhost:8080";
const DEFAULT_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_DIMENSIONS: usize = 768;

pub struct LocalAiProvider {
    client: reqwest::Client,
    host: String,
    model: String,
}

impl LocalAiProvider {
    pub fn new(mut config: ProviderConfig) -> Result<Self> {
        if config.timeout == crate::DEFAULT_TIMEOUT {
            config.timeout = crate::LOCAL_RUNTIME_TIMEOUT;
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            host: config.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
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
impl EmbeddingProvider for LocalAiProvider {
    fn name(&self) -> &str {
        "localai"
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

impl LocalAiProvider {
    async fn do_embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.host);
        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.model,
                input: inputs,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream(format!("localai embeddings failed: {body}")));
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
