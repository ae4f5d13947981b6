//! Scripted LLM for tests and offline runs.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::LlmError;
use crate::message::Message;

use super::{LlmClient, LlmResponse};

/// Mock LLM: answers by matching substrings of the last user message against rules.
///
/// Rules are checked in insertion order; the first rule whose needle occurs in the last
/// user message wins, otherwise the default content is returned. Matching on content (not
/// call order) keeps answers stable when sibling calls run concurrently.
pub struct MockLlm {
    rules: Vec<(String, String)>,
    default: Option<String>,
    calls: AtomicUsize,
}

impl MockLlm {
    /// Returns `content` for every call.
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            default: Some(content.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// No default: calls matching no rule fail with [`LlmError::MockExhausted`].
    pub fn strict() -> Self {
        Self {
            rules: Vec::new(),
            default: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Adds a rule: when the last user message contains `needle`, reply `content`.
    pub fn when(mut self, needle: impl Into<String>, content: impl Into<String>) -> Self {
        self.rules.push((needle.into(), content.into()));
        self
    }

    /// Number of `invoke` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let last_user = messages
            .iter()
            .rev()
            .find_map(|m| match m {
                Message::User(s) => Some(s.as_str()),
                _ => None,
            })
            .unwrap_or("");
        let content = self
            .rules
            .iter()
            .find(|(needle, _)| last_user.contains(needle.as_str()))
            .map(|(_, content)| content.clone())
            .or_else(|| self.default.clone())
            .ok_or(LlmError::MockExhausted)?;
        Ok(LlmResponse {
            content,
            usage: None,
        })
    }
}
