//! Hugging Face inference text-to-speech client.

use crate::config::Settings;
use crate::error::{RenderError, RenderResult};
use crate::voice::SpeechSynthesizer;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

/// Text-to-speech over the Hugging Face inference API
pub struct HuggingFaceTts {
    api_key: String,
    model: String,
    endpoint: String,
    client: Client,
}

impl HuggingFaceTts {
    /// # Errors
    /// Returns `RenderError::Synthesis` if the HTTP client cannot be built
    pub fn new(api_key: String, settings: &Settings) -> RenderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| RenderError::Synthesis(e.to_string()))?;

        Ok(Self {
            api_key,
            model: settings.tts_model.clone(),
            endpoint: settings.tts_endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self) -> String {
        format!("{}/{}", self.endpoint, self.model)
    }
}

impl SpeechSynthesizer for HuggingFaceTts {
    async fn synthesize(&self, text: &str) -> RenderResult<Vec<u8>> {
        let response = self
            .client
            .post(self.url())
            .bearer_auth(&self.api_key)
            .json(&json!({ "inputs": text }))
            .send()
            .await
            .map_err(|e| RenderError::Synthesis(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RenderError::Synthesis(format!("{}: {}", status, body)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RenderError::Synthesis(format!("Failed to read audio: {}", e)))?;
        Ok(bytes.to_vec())
    }
}
