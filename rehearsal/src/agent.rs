//! A debater: one side's collaborators plus, when theory of mind is on, its opponent model.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::belief::{self, BeliefConfig, BeliefState, EmotionalEstimate};
use crate::collaborator::{with_timeout, Generator, KeywordClassifier, Scorer, StyleClassifier};
use crate::config::SessionConfig;
use crate::dialogue::{DialogueState, Speaker};
use crate::error::{CollaboratorError, DebateError};
use crate::scoring::ScoringWeights;
use crate::tree::{RehearsalTree, TreeBuilder};

/// One side of the debate.
pub struct DebateAgent {
    speaker: Speaker,
    generator: Arc<dyn Generator>,
    scorer: Arc<dyn Scorer>,
    classifier: Option<Arc<dyn StyleClassifier>>,
    belief: Option<BeliefState>,
}

impl DebateAgent {
    pub fn new(speaker: Speaker, generator: Arc<dyn Generator>, scorer: Arc<dyn Scorer>) -> Self {
        Self {
            speaker,
            generator,
            scorer,
            classifier: None,
            belief: None,
        }
    }

    /// Classifier used to read the opponent when theory of mind is enabled.
    pub fn with_classifier(mut self, classifier: Arc<dyn StyleClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    /// Current opponent model; `None` when theory of mind is off.
    pub fn belief(&self) -> Option<&BeliefState> {
        self.belief.as_ref()
    }

    pub fn tom_enabled(&self) -> bool {
        self.belief.is_some()
    }

    /// Turns theory of mind on (or off) and resets the opponent model to the prior.
    pub(crate) fn reset_belief(&mut self, enabled: bool, config: &BeliefConfig) {
        self.belief = enabled.then(|| BeliefState::prior(config));
        if enabled && self.classifier.is_none() {
            self.classifier = Some(Arc::new(KeywordClassifier::new()));
        }
    }

    /// Scoring weights for this turn's tree.
    pub fn turn_weights(&self, config: &SessionConfig) -> ScoringWeights {
        match &self.belief {
            Some(b) => b.scoring_weights(&config.weights, config.belief.adaptation_gain),
            None => config.weights,
        }
    }

    /// Prompt guidance for this turn's own utterances.
    pub fn guidance(&self) -> Option<String> {
        self.belief.as_ref().and_then(BeliefState::guidance)
    }

    /// Builds a rehearsal tree answering `transcript` with the given bounds.
    pub async fn rehearse(
        &self,
        transcript: &DialogueState,
        config: &SessionConfig,
        max_depth: usize,
        max_breadth: usize,
        cancel: &CancellationToken,
    ) -> Result<RehearsalTree, DebateError> {
        TreeBuilder::new(self.generator.as_ref(), self.scorer.as_ref())
            .with_weights(self.turn_weights(config))
            .with_timeout(config.call_timeout())
            .with_guidance(self.guidance())
            .with_cancellation(cancel.clone())
            .build(transcript, self.speaker, max_depth, max_breadth)
            .await
    }

    /// Folds the opponent's actual utterance into the belief. `context` is the transcript
    /// before the utterance.
    ///
    /// A classifier failure leaves the belief unchanged. Returns the new estimate, if any.
    pub async fn observe(
        &mut self,
        utterance: &str,
        context: &DialogueState,
        config: &BeliefConfig,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<EmotionalEstimate>, DebateError> {
        let Some(classifier) = self.classifier.clone() else {
            return Ok(None);
        };
        let Some(current) = self.belief.take() else {
            return Ok(None);
        };
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.belief = Some(current);
                return Err(DebateError::Cancelled);
            }
            read = with_timeout(timeout, classifier.classify(utterance, context)) => read,
        };
        let next = match read {
            Ok(observation) => belief::update(current, &observation, config),
            Err(e) => {
                log_classifier_failure(self.speaker, &e);
                current
            }
        };
        let estimate = next.emotional_estimate();
        tracing::debug!(
            observer = %self.speaker,
            state = ?estimate.state,
            probability = estimate.probability,
            confidence = estimate.confidence,
            "belief updated"
        );
        self.belief = Some(next);
        Ok(Some(estimate))
    }
}

fn log_classifier_failure(observer: Speaker, error: &CollaboratorError) {
    tracing::warn!(observer = %observer, error = %error, "style classification failed; belief unchanged");
}
