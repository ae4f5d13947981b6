//! LLM client abstraction used by the LLM-backed collaborators.
//!
//! The rehearsal core never talks to a model directly: generation, scoring and style
//! classification go through the traits in [`crate::collaborator`]. The LLM-backed
//! implementations of those traits build prompts and call an [`LlmClient`].
//! Implementations: [`MockLlm`] (scripted, for tests) and [`OllamaChat`] (local Ollama server).

mod mock;
mod ollama;

pub use mock::MockLlm;
pub use ollama::{OllamaChat, OllamaOptions};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::message::Message;

/// Token usage for one LLM call (prompt + completion), when the backend reports it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Response from one LLM completion.
#[derive(Clone, Debug, Default)]
pub struct LlmResponse {
    /// Assistant message content (plain text, trimmed).
    pub content: String,
    pub usage: Option<LlmUsage>,
}

/// LLM client: given messages, returns the assistant text.
///
/// Must be shareable across concurrent sibling calls of one rehearsal level.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Invoke one completion over `messages`.
    async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, LlmError>;
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for std::sync::Arc<T> {
    async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, LlmError> {
        (**self).invoke(messages).await
    }
}
