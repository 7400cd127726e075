//! LLM abstraction and Gemini client.
//!
//! The relay needs one thing from a model: a single text completion for a prompt.
//! [`TextGenerator`] is that seam; [`GeminiClient`] implements it against `generateContent`.

mod gemini;

use async_trait::async_trait;

pub use gemini::{Candidate, Content, GeminiClient, GenerateContentResponse, Part, DEFAULT_BASE_URL};

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("generation request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("generation api error: {0}")]
    Api(String),
}

/// One-shot text generation. `Ok(None)` means the service answered without any text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Option<String>, LlmError>;
}
