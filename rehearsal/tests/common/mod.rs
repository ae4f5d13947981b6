//! Shared fixtures for rehearsal integration tests: the two-ply A/B script and a few
//! hand-written collaborators with behaviour the scripted ones cannot express.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rehearsal::{
    CollaboratorError, CriterionScores, DebateAgent, DialogueState, GenerationRequest, Generator,
    Scorer, ScriptedGenerator, ScriptedScorer, Speaker,
};

/// A1/A2 at the root, B1/B2 under each, with B scores depending on the parent:
/// A1 = 0.9 (B1 0.1, B2 0.3), A2 = 0.4 (B1 0.8, B2 0.6).
pub fn resilience_script() -> (ScriptedGenerator, ScriptedScorer) {
    let generator = ScriptedGenerator::new()
        .at_opening(&["A1", "A2"])
        .after("A1", &["B1", "B2"])
        .after("A2", &["B1", "B2"]);
    let scorer = ScriptedScorer::new()
        .score("A1", 0.9)
        .score("A2", 0.4)
        .score_after("A1", "B1", 0.1)
        .score_after("A1", "B2", 0.3)
        .score_after("A2", "B1", 0.8)
        .score_after("A2", "B2", 0.6);
    (generator, scorer)
}

/// An agent whose generator always offers `lines` and whose judge rates everything 0.5.
pub fn steady_agent(speaker: Speaker, lines: &[&str]) -> DebateAgent {
    DebateAgent::new(
        speaker,
        Arc::new(ScriptedGenerator::new().otherwise(lines)),
        Arc::new(ScriptedScorer::new().otherwise(0.5)),
    )
}

/// Fails whenever more than one candidate is asked for.
pub struct NarrowOnlyGenerator {
    pub line: String,
}

#[async_trait]
impl Generator for NarrowOnlyGenerator {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Vec<String>, CollaboratorError> {
        if request.n > 1 {
            return Err(CollaboratorError::Failed("context window exceeded".into()));
        }
        Ok(vec![self.line.clone()])
    }
}

/// Answers the opening at once but sleeps `delay` before every reply below it.
pub struct SlowRepliesGenerator {
    pub opening: Vec<String>,
    pub replies: Vec<String>,
    pub delay: Duration,
}

#[async_trait]
impl Generator for SlowRepliesGenerator {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Vec<String>, CollaboratorError> {
        if request.context.is_empty() {
            return Ok(self.opening.clone());
        }
        tokio::time::sleep(self.delay).await;
        Ok(self.replies.clone())
    }
}

/// Scores `0.1 * len` and sleeps longer for shorter utterances, so sibling completion order
/// is the reverse of generation order.
pub struct ReverseLatencyScorer;

#[async_trait]
impl Scorer for ReverseLatencyScorer {
    async fn evaluate(
        &self,
        utterance: &str,
        _context: &DialogueState,
    ) -> Result<CriterionScores, CollaboratorError> {
        let len = utterance.len().min(10) as u64;
        tokio::time::sleep(Duration::from_millis(100 * (10 - len))).await;
        Ok(CriterionScores::uniform(0.1 * len as f64))
    }
}
