//! Hosted aggregator client (OpenRouter-compatible chat completions API).
//!
//! Thin transport layer: one POST, one timeout, no retry logic. Failure
//! classification and candidate selection belong to the router.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::classify::CallFailure;

const MAX_TOKENS: u32 = 4096;

/// The aggregator transport contract. The router drives (credential, model)
/// pairs through this; tests substitute a scripted implementation.
#[async_trait]
pub trait AggregatorApi: Send + Sync {
    async fn complete(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
        temperature: Option<f32>,
    ) -> Result<String, CallFailure>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

pub struct OpenRouterClient {
    client: reqwest::Client,
    base_url: String,
    timeout: std::time::Duration,
}

impl OpenRouterClient {
    pub fn new(timeout: std::time::Duration) -> Self {
        OpenRouterClient {
            client: reqwest::Client::builder()
                .build()
                .expect("Failed to build HTTP client"),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            timeout,
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl AggregatorApi for OpenRouterClient {
    async fn complete(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
        temperature: Option<f32>,
    ) -> Result<String, CallFailure> {
        let body = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: MAX_TOKENS,
            temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| CallFailure::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            // Non-2xx bodies carry the billing/rate-limit keywords the
            // classifier looks for.
            let body = response.text().await.unwrap_or_default();
            return Err(CallFailure {
                status: Some(status.as_u16()),
                message: body,
                timed_out: false,
                connection_refused: false,
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| CallFailure {
            status: None,
            message: format!("Malformed aggregator response: {e}"),
            timed_out: false,
            connection_refused: false,
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CallFailure {
                status: None,
                message: "Aggregator returned no choices".to_string(),
                timed_out: false,
                connection_refused: false,
            })?;

        debug!(model, chars = text.len(), "Aggregator call succeeded");
        Ok(text)
    }
}
