//! `[session]` overrides: every field optional, layered under command-line flags.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Debate session settings read from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSettings {
    pub topic: Option<String>,
    pub turns: Option<usize>,
    pub depth: Option<usize>,
    pub breadth: Option<usize>,
    pub model: Option<String>,
    pub ollama_url: Option<String>,
    /// Directory for logs, transcripts and tree renders.
    pub outputs: Option<PathBuf>,
    pub discount: Option<f64>,
    pub min_aggregate_score: Option<f64>,
    pub call_timeout_ms: Option<u64>,
    /// Belief smoothing constant.
    pub smoothing: Option<f64>,
    pub fallback_utterance: Option<String>,
    /// `adversarial` or `best_first`.
    pub policy: Option<String>,
}

impl SessionSettings {
    /// Fields set in `over` replace ours.
    pub fn overlay(self, over: SessionSettings) -> SessionSettings {
        SessionSettings {
            topic: over.topic.or(self.topic),
            turns: over.turns.or(self.turns),
            depth: over.depth.or(self.depth),
            breadth: over.breadth.or(self.breadth),
            model: over.model.or(self.model),
            ollama_url: over.ollama_url.or(self.ollama_url),
            outputs: over.outputs.or(self.outputs),
            discount: over.discount.or(self.discount),
            min_aggregate_score: over.min_aggregate_score.or(self.min_aggregate_score),
            call_timeout_ms: over.call_timeout_ms.or(self.call_timeout_ms),
            smoothing: over.smoothing.or(self.smoothing),
            fallback_utterance: over.fallback_utterance.or(self.fallback_utterance),
            policy: over.policy.or(self.policy),
        }
    }
}
