//! Collaborator seams: candidate generation, judge scoring and opponent style classification.
//!
//! The rehearsal builder and the orchestrator only see these traits. Every call may block
//! for an arbitrary time; callers wrap each call in [`with_timeout`]. Implementations:
//!
//! - LLM-backed: [`LlmGenerator`], [`LlmScorer`], [`LlmStyleClassifier`] over an
//!   [`LlmClient`](crate::llm::LlmClient).
//! - Heuristic: [`KeywordClassifier`] (no model calls).
//! - Scripted, for tests: [`ScriptedGenerator`], [`ScriptedScorer`], [`ScriptedClassifier`].

mod heuristic;
mod llm_backed;
mod scripted;

pub use heuristic::KeywordClassifier;
pub use llm_backed::{LlmGenerator, LlmScorer, LlmStyleClassifier};
pub use scripted::{ScriptedClassifier, ScriptedGenerator, ScriptedScorer};

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::belief::Observation;
use crate::dialogue::{DialogueState, Speaker};
use crate::error::CollaboratorError;
use crate::scoring::CriterionScores;

/// One request for candidate utterances.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    /// Transcript plus the hypothetical line leading to the node being expanded.
    pub context: &'a DialogueState,
    /// Who is assumed to speak the candidates.
    pub speaker: Speaker,
    /// Maximum number of candidates wanted.
    pub n: usize,
    /// Theory-of-mind hint for the rehearsing agent's own utterances.
    pub guidance: Option<&'a str>,
}

/// Produces candidate utterances. May return fewer than `n`.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Vec<String>, CollaboratorError>;
}

/// Scores one utterance in context on every [`Criterion`](crate::scoring::Criterion).
///
/// `context` is the dialogue up to, but not including, `utterance`.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn evaluate(
        &self,
        utterance: &str,
        context: &DialogueState,
    ) -> Result<CriterionScores, CollaboratorError>;
}

/// Reads the emotional state and argument style behind an actual opponent utterance.
#[async_trait]
pub trait StyleClassifier: Send + Sync {
    async fn classify(
        &self,
        utterance: &str,
        context: &DialogueState,
    ) -> Result<Observation, CollaboratorError>;
}

/// Runs one collaborator call under `limit`; elapsing yields [`CollaboratorError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, CollaboratorError>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(CollaboratorError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn with_timeout_passes_through_fast_calls() {
        let out = with_timeout(Duration::from_secs(1), async { Ok::<_, CollaboratorError>(7) }).await;
        assert_eq!(out, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn with_timeout_reports_elapsed_limit() {
        let limit = Duration::from_millis(50);
        let out = with_timeout(limit, async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, CollaboratorError>(())
        })
        .await;
        assert_eq!(out, Err(CollaboratorError::Timeout(limit)));
    }
}
