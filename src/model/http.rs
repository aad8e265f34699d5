//! HTTP-backed [`ModelAdapter`], talking to an opaque chat-completion
//! endpoint and an opaque text-embedding endpoint — the foundation-model
//! provider is out of scope here, described only by the interface it
//! presents over the network.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::error::{Error, Result};

use super::retry::{retry_with_backoff, ExponentialBackoff};
use super::{CompletionOptions, ModelAdapter, Usage};

#[derive(Debug, Clone)]
pub struct HttpModelAdapterConfig {
    pub base_url: String,
    pub embedding_dimension: usize,
    pub complete_timeout: Duration,
    pub embed_timeout: Duration,
    pub max_in_flight: usize,
    pub backoff: ExponentialBackoff,
}

pub struct HttpModelAdapter {
    client: reqwest::Client,
    config: HttpModelAdapterConfig,
    inflight: Arc<Semaphore>,
}

impl HttpModelAdapter {
    pub fn new(config: HttpModelAdapterConfig) -> Self {
        HttpModelAdapter {
            client: reqwest::Client::new(),
            inflight: Arc::new(Semaphore::new(config.max_in_flight)),
            config,
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    system: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    text: String,
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
    #[serde(default)]
    prompt_tokens: u32,
}

#[async_trait]
impl ModelAdapter for HttpModelAdapter {
    async fn complete(
        &self,
        prompt: &str,
        system: &str,
        options: CompletionOptions,
    ) -> Result<(String, Usage)> {
        let _permit = self
            .inflight
            .acquire()
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        let url = format!("{}/v1/complete", self.config.base_url);
        let body = CompletionRequest {
            prompt,
            system,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        let timeout = self.config.complete_timeout;
        let client = self.client.clone();
        let result = retry_with_backoff(
            self.config.backoff,
            || {
                let client = client.clone();
                let url = url.clone();
                let body = &body;
                async move {
                    let send = client.post(&url).json(body).send();
                    let resp = tokio::time::timeout(timeout, send)
                        .await
                        .map_err(|_| Error::ModelUnavailable("complete call timed out".into()))??;
                    if !resp.status().is_success() {
                        return Err(classify_status(resp.status().as_u16()));
                    }
                    let parsed: CompletionResponse = resp
                        .json()
                        .await
                        .map_err(|e| Error::ModelInvalid(e.to_string()))?;
                    Ok(parsed)
                }
            },
            |e| e.is_retryable(),
        )
        .await?;

        Ok((
            result.text,
            Usage {
                prompt_tokens: result.prompt_tokens,
                completion_tokens: result.completion_tokens,
            },
        ))
    }

    async fn embed(&self, text: &str) -> Result<(Vec<f32>, Usage)> {
        let _permit = self
            .inflight
            .acquire()
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        let url = format!("{}/v1/embed", self.config.base_url);
        let body = EmbeddingRequest { text };
        let timeout = self.config.embed_timeout;
        let client = self.client.clone();
        let dimension = self.config.embedding_dimension;

        let result = retry_with_backoff(
            self.config.backoff,
            || {
                let client = client.clone();
                let url = url.clone();
                let body = &body;
                async move {
                    let send = client.post(&url).json(body).send();
                    let resp = tokio::time::timeout(timeout, send)
                        .await
                        .map_err(|_| Error::ModelUnavailable("embed call timed out".into()))??;
                    if !resp.status().is_success() {
                        return Err(classify_status(resp.status().as_u16()));
                    }
                    let parsed: EmbeddingResponse = resp
                        .json()
                        .await
                        .map_err(|e| Error::ModelInvalid(e.to_string()))?;
                    Ok(parsed)
                }
            },
            |e| matches!(e, Error::ModelUnavailable(_)),
        )
        .await?;

        if result.embedding.len() != dimension {
            return Err(Error::ModelInvalid(format!(
                "embedding dimension {} does not match configured {}",
                result.embedding.len(),
                dimension
            )));
        }

        Ok((
            result.embedding,
            Usage {
                prompt_tokens: result.prompt_tokens,
                completion_tokens: 0,
            },
        ))
    }

    fn embedding_dimension(&self) -> usize {
        self.config.embedding_dimension
    }
}

fn classify_status(status: u16) -> Error {
    match status {
        429 => Error::ModelThrottled(format!("status {status}")),
        400..=499 => Error::ModelRejected(format!("status {status}")),
        _ => Error::ModelUnavailable(format!("status {status}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_status_maps_to_taxonomy() {
        assert!(matches!(classify_status(429), Error::ModelThrottled(_)));
        assert!(matches!(classify_status(403), Error::ModelRejected(_)));
        assert!(matches!(classify_status(503), Error::ModelUnavailable(_)));
    }
}
