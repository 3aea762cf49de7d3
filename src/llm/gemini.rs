//! Gemini `generateContent` client.

use crate::config::Settings;
use crate::error::{LlmError, LlmResult};
use crate::llm::LanguageModel;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Client for the Gemini REST API
pub struct GeminiClient {
    api_key: String,
    model: String,
    endpoint: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiClient {
    /// Create a client for `settings.llm_model` at `settings.llm_endpoint`.
    ///
    /// # Errors
    /// Returns `LlmError::Request` if the HTTP client cannot be built
    pub fn new(api_key: String, settings: &Settings) -> LlmResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| LlmError::Request(e.to_string()))?;

        Ok(Self {
            api_key,
            model: settings.llm_model.clone(),
            endpoint: settings.llm_endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> LlmResult<String> {
        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "calling language model");

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({
                "contents": [
                    {"role": "user", "parts": [{"text": prompt}]}
                ],
                "generationConfig": {"temperature": 0.1}
            }))
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Request(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        extract_text(&body)
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(body: &str) -> LlmResult<String> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| LlmError::Decode(e.to_string()))?;

    let text: String = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(text)
}
