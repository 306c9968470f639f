//! Google Vertex AI text-embeddings provider (bearer-token authenticated)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ProviderConfig;
use crate::{EmbeddingProvider, ProviderError, Result};

const DEFAULT_HOST: &str = "https://us-central1-aiplatform.googleapis.com";
const DEFAULT_MODEL: &str = "text-embedding-004";
const DEFAULT_DIMENSIONS: usize = 768;

pub struct VertexAiProvider {
    client: reqwest::Client,
    host: String,
    api_key: String,
    model: String,
    project: String,
    location: String,
}

impl VertexAiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .ok_or_else(|| ProviderError::MissingConfig("vertexai access token".into()))?;
        let project = config
            .project
            .ok_or_else(|| ProviderError::MissingConfig("vertexai project".into()))?;
        let location = config.location.unwrap_or_else(|| "us-central1".to_string());
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            host: config.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            api_key,
            model: config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            project,
            location,
        })
    }
}

#[derive(Debug, Serialize)]
struct PredictRequest {
    instances: Vec<Instance>,
}

#[derive(Debug, Serialize)]
struct Instance {
    content: String,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    embeddings: PredictionEmbeddings,
}

#[derive(Debug, Deserialize)]
struct PredictionEmbeddings {
    values: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for VertexAiProvider {
    fn name(&self) -> &str {
        "vertexai"
    }

    fn dimensions(&self) -> usize {
        DEFAULT_DIMENSIONS
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:predict",
            self.host, self.project, self.location, self.model
        );

        let instances = inputs
            .iter()
            .map(|text| Instance { content: text.clone() })
            .collect();

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&PredictRequest { instances })
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream(format!("vertexai predict failed: {body}")));
        }

        let parsed: PredictResponse = response.json().await?;
        if parsed.predictions.len() != inputs.len() {
            return Err(ProviderError::BatchSizeMismatch {
                expected: inputs.len(),
                got: parsed.predictions.len(),
            });
        }
        Ok(parsed
            .predictions
            .into_iter()
            .map(|p| p.embeddings.values)
            .collect())
    }
}
