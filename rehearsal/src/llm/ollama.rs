//! Ollama chat backend (`POST {base_url}/api/chat`, non-streaming).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::LlmError;
use crate::message::Message;

use super::{LlmClient, LlmResponse, LlmUsage};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_MODEL: &str = "phi3:instruct";

/// Sampling options forwarded as Ollama `options`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OllamaOptions {
    pub temperature: f32,
    /// Max tokens to generate.
    pub num_predict: u32,
    /// Context window.
    pub num_ctx: u32,
    pub repeat_penalty: f32,
}

impl Default for OllamaOptions {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            num_predict: 150,
            num_ctx: 1024,
            repeat_penalty: 1.1,
        }
    }
}

/// Chat client for a local or remote Ollama server.
///
/// Base URL comes from `OLLAMA_HOST` when set, else `http://127.0.0.1:11434`.
pub struct OllamaChat {
    client: reqwest::Client,
    base_url: String,
    model: String,
    options: OllamaOptions,
}

impl OllamaChat {
    pub fn new(model: impl Into<String>) -> Self {
        let base_url = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self {
            client: reqwest::Client::new(),
            base_url: normalize_base_url(&base_url),
            model: model.into(),
            options: OllamaOptions::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Self {
        self.base_url = normalize_base_url(base_url.as_ref());
        self
    }

    pub fn with_options(mut self, options: OllamaOptions) -> Self {
        self.options = options;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn build_body(&self, messages: &[Message]) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| json!({ "role": m.role(), "content": m.content() }))
            .collect();
        json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "options": self.options,
        })
    }

    /// Sends a one-word prompt so the server loads the model before the first real turn.
    pub async fn warm_up(&self) -> Result<(), LlmError> {
        self.invoke(&[Message::user("ping")]).await.map(|_| ())
    }
}

impl Default for OllamaChat {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}

/// Accepts `host:port` as well as full URLs; strips a trailing slash.
fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

fn parse_chat_response(body: &str) -> Result<LlmResponse, LlmError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::Decode(e.to_string()))?;
    let message = parsed
        .message
        .ok_or_else(|| LlmError::Decode("response has no message".to_string()))?;
    let usage = match (parsed.prompt_eval_count, parsed.eval_count) {
        (None, None) => None,
        (p, c) => {
            let prompt_tokens = p.unwrap_or(0);
            let completion_tokens = c.unwrap_or(0);
            Some(LlmUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            })
        }
    };
    Ok(LlmResponse {
        content: message.content.trim().to_string(),
        usage,
    })
}

#[async_trait]
impl LlmClient for OllamaChat {
    async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, LlmError> {
        let body = self.build_body(messages);
        tracing::debug!(model = %self.model, messages = messages.len(), "ollama chat request");
        let res = self.client.post(self.chat_url()).json(&body).send().await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        let response = parse_chat_response(&text)?;
        if let Some(ref usage) = response.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "ollama chat usage"
            );
        }
        Ok(response)
    }
}
