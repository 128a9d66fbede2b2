//! Direct vendor client (Gemini generateContent API), bypassing the
//! aggregator. Used as the fifth routing candidate when a vendor credential
//! is configured.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::classify::CallFailure;

const MAX_OUTPUT_TOKENS: u32 = 4096;

/// Direct vendor transport contract. The credential and model are baked in
/// at construction — there is exactly one (key, model) pair per process.
#[async_trait]
pub trait VendorApi: Send + Sync {
    async fn complete(&self, prompt: &str, temperature: Option<f32>) -> Result<String, CallFailure>;

    fn model(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: String,
}

pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: std::time::Duration,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, timeout: std::time::Duration) -> Self {
        GeminiClient {
            client: reqwest::Client::builder()
                .build()
                .expect("Failed to build HTTP client"),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key,
            model,
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
impl VendorApi for GeminiClient {
    async fn complete(&self, prompt: &str, temperature: Option<f32>) -> Result<String, CallFailure> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: MAX_OUTPUT_TOKENS,
                temperature,
            },
        };

        // The vendor API authenticates via query parameter, not a header.
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.model
        );
        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| CallFailure::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CallFailure {
                status: Some(status.as_u16()),
                message: body,
                timed_out: false,
                connection_refused: false,
            });
        }

        let parsed: GenerateContentResponse =
            response.json().await.map_err(|e| CallFailure {
                status: None,
                message: format!("Malformed vendor response: {e}"),
                timed_out: false,
                connection_refused: false,
            })?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| CallFailure {
                status: None,
                message: "Vendor returned no candidates".to_string(),
                timed_out: false,
                connection_refused: false,
            })?;

        debug!(model = %self.model, chars = text.len(), "Vendor call succeeded");
        Ok(text)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: "hello" }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: 128,
                temperature: Some(0.0),
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 128);
    }

    #[test]
    fn test_response_extracts_nested_text() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"result"}]}}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.candidates[0].content.parts[0].text, "result");
    }

    #[tokio::test]
    async fn test_connection_refused_surfaces_as_failure() {
        let client = GeminiClient::new(
            "key".to_string(),
            "gemini-1.5-flash".to_string(),
            std::time::Duration::from_secs(5),
        )
        .with_base_url("http://127.0.0.1:1");
        assert!(client.complete("prompt", None).await.is_err());
    }
}
