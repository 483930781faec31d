//! HTTP client for chat completions.
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint. The retry
//! policy lives here, in the transport, and is off unless configured: the
//! refinement engine itself never retries a provider call.
//!
//! # Main Types
//! - `ChatClient`: Configurable HTTP client implementing `CompletionProvider`

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use super::model::{ChatRequest, ChatResponse};
use super::provider::{CompletionProvider, Credential};
use crate::config::ProviderConfig;
use crate::error::{GardenError, Result};

#[derive(Clone)]
pub struct ChatClient {
    endpoint: String,
    model: String,
    temperature: Option<f32>,
    client: Client,
    timeout: Duration,
    max_retries: usize,
}

impl ChatClient {
    pub fn new(base_url: &str, model: impl Into<String>) -> Self {
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        Self {
            endpoint,
            model: model.into(),
            temperature: None,
            client: Client::new(),
            timeout: Duration::from_secs(60),
            max_retries: 0,
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(&config.base_url, config.model.clone())
            .with_temperature(config.temperature)
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_max_retries(config.max_retries)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn chat_completion(
        &self,
        request: &ChatRequest,
        credential: &Credential,
    ) -> Result<ChatResponse> {
        retry(
            || self.execute_request(request, credential),
            self.max_retries,
            1000,
        )
        .await
    }

    async fn execute_request(
        &self,
        request: &ChatRequest,
        credential: &Credential,
    ) -> Result<ChatResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential.expose())
            .json(request)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            debug!("Provider error response ({}): {}", status, message);
            return Err(GardenError::Transport {
                status: Some(status.as_u16()),
                message,
            });
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|h| h.to_str().ok())
            .unwrap_or("missing")
            .to_string();
        debug!("Provider response status: {}, content-type: {}", status, content_type);

        let response_bytes = response.bytes().await?;
        match serde_json::from_slice(&response_bytes) {
            Ok(chat_response) => Ok(chat_response),
            Err(e) => {
                let preview = String::from_utf8_lossy(&response_bytes)
                    .chars()
                    .take(200)
                    .collect::<String>();
                Err(GardenError::Transport {
                    status: Some(status.as_u16()),
                    message: format!(
                        "failed to decode response body: {}\nResponse preview: {}",
                        e, preview
                    ),
                })
            }
        }
    }
}

#[async_trait::async_trait]
impl CompletionProvider for ChatClient {
    async fn complete(&self, prompt: &str, credential: &Credential) -> Result<String> {
        let mut request = ChatRequest::single(self.model.clone(), prompt);
        request.temperature = self.temperature;

        let response = self.chat_completion(&request, credential).await?;
        response
            .content()
            .map(str::to_string)
            .ok_or_else(|| GardenError::Transport {
                status: None,
                message: "provider response contained no choices".to_string(),
            })
    }
}

/// Longest wait between two attempts
const MAX_BACKOFF_MS: u64 = 60_000;

fn backoff_delay(base_delay_ms: u64, attempt: usize) -> Duration {
    let exponent = u32::try_from(attempt).unwrap_or(u32::MAX);
    let backoff = base_delay_ms
        .saturating_mul(2u64.saturating_pow(exponent))
        .min(MAX_BACKOFF_MS);
    let jitter = rand::random::<u64>() % 200;
    Duration::from_millis(backoff + jitter)
}

/// Exponential backoff with jitter, only for retryable errors
async fn retry<F, Fut, T>(mut f: F, max_retries: usize, base_delay_ms: u64) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0usize;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_retries && e.is_retryable() => {
                let delay = backoff_delay(base_delay_ms, attempt);
                debug!("Retrying provider call in {:?} after: {}", delay, e);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
