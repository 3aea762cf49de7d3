//! Language-generation boundary
//!
//! One prompt in, one completion out. The session calls this twice per
//! successful turn: once to write the query, once to read the result.

pub mod gemini;

use crate::error::LlmResult;

pub use gemini::GeminiClient;

/// A text-completion service
#[allow(async_fn_in_trait)]
pub trait LanguageModel {
    /// Send `prompt` and return the model's text response
    ///
    /// # Errors
    /// Returns `LlmError` on transport, status or decoding failures
    async fn generate(&self, prompt: &str) -> LlmResult<String>;
}
