//! User settings and preferences
//!
//! Manages application settings stored in ~/.talkgres/config.toml.
//! API keys never live in the file; they come from the environment.

use crate::config::ConnectionConfig;
use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Model used for both query synthesis and answer interpretation
    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    /// Base URL of the generative language API
    #[serde(default = "default_llm_endpoint")]
    pub llm_endpoint: String,

    /// Text-to-speech model id
    #[serde(default = "default_tts_model")]
    pub tts_model: String,

    /// Base URL of the speech inference API
    #[serde(default = "default_tts_endpoint")]
    pub tts_endpoint: String,

    /// Playback rate for the returned PCM samples
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Speak answers aloud
    #[serde(default = "default_true")]
    pub voice: bool,

    /// Echo the formatted statement before running it
    #[serde(default)]
    pub show_sql: bool,

    /// Maximum rows included in the interpretation prompt
    #[serde(default = "default_prompt_row_limit")]
    pub prompt_row_limit: usize,

    /// Per-request timeout for remote services
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Input that ends the session (case-insensitive)
    #[serde(default = "default_exit_token")]
    pub exit_token: String,
}

fn default_llm_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_llm_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_tts_model() -> String {
    "hexgrad/Kokoro-82M".to_string()
}

fn default_tts_endpoint() -> String {
    "https://api-inference.huggingface.co/models".to_string()
}

fn default_sample_rate() -> u32 {
    19_000
}

fn default_prompt_row_limit() -> usize {
    200
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_exit_token() -> String {
    "exit".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm_model: default_llm_model(),
            llm_endpoint: default_llm_endpoint(),
            tts_model: default_tts_model(),
            tts_endpoint: default_tts_endpoint(),
            sample_rate: default_sample_rate(),
            voice: default_true(),
            show_sql: false,
            prompt_row_limit: default_prompt_row_limit(),
            request_timeout_secs: default_request_timeout_secs(),
            exit_token: default_exit_token(),
        }
    }
}

impl Settings {
    fn validate(self) -> ConfigResult<Self> {
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be > 0".into()));
        }
        if self.prompt_row_limit == 0 {
            return Err(ConfigError::Invalid("prompt_row_limit must be > 0".into()));
        }
        if self.exit_token.trim().is_empty() {
            return Err(ConfigError::Invalid("exit_token must not be empty".into()));
        }
        Ok(self)
    }
}

/// Load settings from config file
pub fn load_settings() -> ConfigResult<Settings> {
    load_settings_from(&ConnectionConfig::config_dir()?.join("config.toml"))
}

fn load_settings_from(path: &Path) -> ConfigResult<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::NotFound(format!("Failed to read settings file: {}", e)))?;
    let settings: Settings = toml::from_str(&content)?;
    settings.validate()
}

/// Credentials for the remote services, taken from the environment
#[derive(Clone)]
pub struct ApiKeys {
    /// Key for the language-generation service
    pub llm: String,
    /// Key for the speech service; `None` disables voice
    pub speech: Option<String>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeys")
            .field("llm", &"<redacted>")
            .field("speech", &self.speech.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ApiKeys {
    /// Read `GEMINI_API_KEY` (required) and `HF_API_KEY` / `REPLICATE_API_KEY` (optional).
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let llm = non_empty("GEMINI_API_KEY").ok_or(ConfigError::MissingEnv("GEMINI_API_KEY"))?;
        let speech = non_empty("HF_API_KEY").or_else(|| non_empty("REPLICATE_API_KEY"));
        Ok(Self { llm, speech })
    }
}
