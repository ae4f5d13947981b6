//! Scripted collaborators: deterministic answers keyed by the dialogue, for tests and demos.
//!
//! Answers are looked up by the last utterance of the context (the parent in the rehearsal
//! tree, or `None` at the opening), so the same script yields the same tree however the
//! concurrent calls interleave.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::belief::Observation;
use crate::dialogue::DialogueState;
use crate::error::CollaboratorError;
use crate::scoring::CriterionScores;

use super::{GenerationRequest, Generator, Scorer, StyleClassifier};

fn parent_key(context: &DialogueState) -> Option<String> {
    context.last().map(|t| t.utterance.clone())
}

/// Generator answering from a script keyed by the utterance being replied to.
#[derive(Default)]
pub struct ScriptedGenerator {
    by_parent: HashMap<Option<String>, Result<Vec<String>, CollaboratorError>>,
    otherwise: Option<Vec<String>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    guidance_seen: Mutex<Vec<Option<String>>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidates when the transcript is empty.
    pub fn at_opening(mut self, candidates: &[&str]) -> Self {
        self.by_parent.insert(None, Ok(to_strings(candidates)));
        self
    }

    /// Candidates replying to `parent`.
    pub fn after(mut self, parent: &str, candidates: &[&str]) -> Self {
        self.by_parent
            .insert(Some(parent.to_string()), Ok(to_strings(candidates)));
        self
    }

    /// Generation fails when replying to `parent` (`None` = at the opening).
    pub fn failing_after(mut self, parent: Option<&str>, error: CollaboratorError) -> Self {
        self.by_parent.insert(parent.map(str::to_string), Err(error));
        self
    }

    /// Candidates for any context without a specific entry. Without this, such contexts get none.
    pub fn otherwise(mut self, candidates: &[&str]) -> Self {
        self.otherwise = Some(to_strings(candidates));
        self
    }

    /// Sleeps before every answer (exercise timeouts and cancellation).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Guidance passed with each request, in call order.
    pub fn guidance_seen(&self) -> Vec<Option<String>> {
        self.guidance_seen
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Vec<String>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.guidance_seen.lock() {
            seen.push(request.guidance.map(str::to_string));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.by_parent.get(&parent_key(request.context)) {
            Some(answer) => answer.clone(),
            None => Ok(self.otherwise.clone().unwrap_or_default()),
        }
    }
}

/// Scorer answering from a script keyed by `(parent, utterance)`, then by utterance alone.
#[derive(Default)]
pub struct ScriptedScorer {
    by_pair: HashMap<(Option<String>, String), Result<CriterionScores, CollaboratorError>>,
    by_utterance: HashMap<String, Result<CriterionScores, CollaboratorError>>,
    otherwise: Option<CriterionScores>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every criterion of `utterance` scored `value`, so its aggregate is `value` under any weights.
    pub fn score(mut self, utterance: &str, value: f64) -> Self {
        self.by_utterance
            .insert(utterance.to_string(), Ok(CriterionScores::uniform(value)));
        self
    }

    /// Like [`score`](Self::score), only when `utterance` replies to `parent`.
    pub fn score_after(mut self, parent: &str, utterance: &str, value: f64) -> Self {
        self.by_pair.insert(
            (Some(parent.to_string()), utterance.to_string()),
            Ok(CriterionScores::uniform(value)),
        );
        self
    }

    /// Full per-criterion scores for `utterance`.
    pub fn scores(mut self, utterance: &str, scores: CriterionScores) -> Self {
        self.by_utterance.insert(utterance.to_string(), Ok(scores));
        self
    }

    /// Scoring `utterance` fails.
    pub fn fail(mut self, utterance: &str, error: CollaboratorError) -> Self {
        self.by_utterance.insert(utterance.to_string(), Err(error));
        self
    }

    /// Scoring `utterance` fails when it replies to `parent`.
    pub fn fail_after(mut self, parent: &str, utterance: &str, error: CollaboratorError) -> Self {
        self.by_pair
            .insert((Some(parent.to_string()), utterance.to_string()), Err(error));
        self
    }

    /// Uniform score for unscripted utterances. Without this they are malformed.
    pub fn otherwise(mut self, value: f64) -> Self {
        self.otherwise = Some(CriterionScores::uniform(value));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scorer for ScriptedScorer {
    async fn evaluate(
        &self,
        utterance: &str,
        context: &DialogueState,
    ) -> Result<CriterionScores, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let pair = (parent_key(context), utterance.to_string());
        if let Some(answer) = self.by_pair.get(&pair) {
            return answer.clone();
        }
        if let Some(answer) = self.by_utterance.get(utterance) {
            return answer.clone();
        }
        self.otherwise.clone().ok_or_else(|| {
            CollaboratorError::Malformed(format!("no scripted score for {:?}", utterance))
        })
    }
}

/// Classifier answering per utterance, with a default observation.
pub struct ScriptedClassifier {
    by_utterance: HashMap<String, Result<Observation, CollaboratorError>>,
    otherwise: Observation,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn new(otherwise: Observation) -> Self {
        Self {
            by_utterance: HashMap::new(),
            otherwise,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn on(mut self, utterance: &str, observation: Observation) -> Self {
        self.by_utterance.insert(utterance.to_string(), Ok(observation));
        self
    }

    pub fn fail_on(mut self, utterance: &str, error: CollaboratorError) -> Self {
        self.by_utterance.insert(utterance.to_string(), Err(error));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StyleClassifier for ScriptedClassifier {
    async fn classify(
        &self,
        utterance: &str,
        _context: &DialogueState,
    ) -> Result<Observation, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.by_utterance.get(utterance) {
            Some(answer) => answer.clone(),
            None => Ok(self.otherwise.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::Speaker;
    use crate::scoring::Criterion;

    #[tokio::test]
    async fn generator_keys_on_parent_utterance() {
        let gen = ScriptedGenerator::new()
            .at_opening(&["A1", "A2"])
            .after("A1", &["B1"]);
        let opening = DialogueState::new("t");
        let out = gen
            .generate(GenerationRequest {
                context: &opening,
                speaker: Speaker::Pro,
                n: 2,
                guidance: Some("be calm"),
            })
            .await
            .unwrap();
        assert_eq!(out, vec!["A1", "A2"]);

        let after = opening.extended(Speaker::Pro, "A1");
        let out = gen
            .generate(GenerationRequest {
                context: &after,
                speaker: Speaker::Con,
                n: 2,
                guidance: None,
            })
            .await
            .unwrap();
        assert_eq!(out, vec!["B1"]);
        assert_eq!(gen.calls(), 2);
        assert_eq!(gen.guidance_seen(), vec![Some("be calm".to_string()), None]);
    }

    #[tokio::test]
    async fn scorer_prefers_pair_over_utterance() {
        let scorer = ScriptedScorer::new()
            .score("B1", 0.5)
            .score_after("A1", "B1", 0.1);
        let opening = DialogueState::new("t");
        let under_a1 = opening.extended(Speaker::Pro, "A1");
        let under_a2 = opening.extended(Speaker::Pro, "A2");
        let s = scorer.evaluate("B1", &under_a1).await.unwrap();
        assert_eq!(s.get(Criterion::Logic), 0.1);
        let s = scorer.evaluate("B1", &under_a2).await.unwrap();
        assert_eq!(s.get(Criterion::Logic), 0.5);
        assert!(scorer.evaluate("unknown", &opening).await.is_err());
    }
}
