//! OpenAI embedding client.
//!
//! One network call per invocation: no batching, no caching, and no
//! internal retry. Provider failures propagate to the driver, which logs
//! them and moves on; pacing between calls is the driver's job, so a 429
//! here is just another per-document failure picked up by a later run.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::Config;

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// The seam between the backfill driver and the embedding provider.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier sent to the provider (e.g. `"text-embedding-ada-002"`).
    fn model_name(&self) -> &str;

    /// Embed one text, returning the vector from the first result element.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embedding client for `POST /v1/embeddings`.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: config.openai_api_key.clone(),
            model: config.embedding_model.clone(),
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let response = self
            .client
            .post(OPENAI_EMBEDDINGS_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .context("embedding request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response
            .json()
            .await
            .context("embedding response was not valid JSON")?;

        parse_embedding_response(&json)
    }
}

/// Extract the first `data[].embedding` vector from a response payload.
pub fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("invalid embedding response: missing data array"))?;

    let first = data
        .first()
        .ok_or_else(|| anyhow!("invalid embedding response: empty data array"))?;

    let embedding = first
        .get("embedding")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("invalid embedding response: missing embedding"))?;

    Ok(embedding
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}
