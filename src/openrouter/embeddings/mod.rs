#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{RequestFailure, RetryPolicy};
use crate::config::OpenRouterConfig;
use crate::{RagError, Result};

/// Client for the OpenRouter embeddings endpoint.
///
/// Splits input into fixed-size batches and retries each batch with
/// exponential backoff. Output order matches input order.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    url: Url,
    api_key: String,
    model: String,
    batch_size: usize,
    agent: ureq::Agent,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    #[inline]
    pub fn new(config: &OpenRouterConfig) -> Result<Self> {
        let url = config
            .api_url("embeddings")
            .map_err(|e| RagError::Config(e.to_string()))?;
        let api_key = config
            .api_key()
            .map_err(|e| RagError::Config(e.to_string()))?;

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.request_timeout()))
            .build()
            .into();

        Ok(Self {
            url,
            api_key,
            model: config.embedding_model.clone(),
            batch_size: config.batch_size as usize,
            agent,
            retry: RetryPolicy::new(
                config.max_retries,
                std::time::Duration::from_millis(config.base_delay_ms),
            ),
        })
    }

    #[inline]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Embed texts in input order, one vector per text.
    ///
    /// Inputs are split into batches of the configured size; each batch is
    /// retried independently, so a transient failure late in a large input
    /// does not re-embed earlier batches.
    #[inline]
    pub fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Embedding {} text(s)", texts.len());

        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            embeddings.extend(self.embed_batch(batch)?);
        }

        debug!("Generated {} embedding(s)", embeddings.len());
        Ok(embeddings)
    }

    fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        if batch.is_empty() {
            return Err(RagError::Embedding("empty batch".to_string()));
        }

        let request = EmbeddingsRequest {
            model: &self.model,
            input: batch,
        };

        let request_json = serde_json::to_string(&request)
            .map_err(|e| RagError::Embedding(format!("Failed to serialize request: {}", e)))?;

        let response_text = self
            .retry
            .run(|| {
                self.agent
                    .post(self.url.as_str())
                    .header("Authorization", &format!("Bearer {}", self.api_key))
                    .header("Content-Type", "application/json")
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .map_err(|failure| match failure {
                RequestFailure::Exhausted { .. } => RagError::Embedding(failure.message()),
                RequestFailure::Fatal(message) => RagError::Embedding(message),
            })?;

        let response: EmbeddingsResponse = serde_json::from_str(&response_text)
            .map_err(|e| RagError::Embedding(format!("Failed to parse response: {}", e)))?;

        if response.data.len() != batch.len() {
            return Err(RagError::Embedding(format!(
                "Mismatch between request and response counts: {} vs {}",
                batch.len(),
                response.data.len()
            )));
        }

        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}
