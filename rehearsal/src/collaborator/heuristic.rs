//! Keyword heuristic for reading an opponent without a model call.

use async_trait::async_trait;

use crate::belief::{ArgumentStyle, EmotionalState, Observation};
use crate::dialogue::DialogueState;
use crate::error::CollaboratorError;

use super::StyleClassifier;

const FRUSTRATED_MARKERS: &[&str] = &[
    "absurd",
    "ridiculous",
    "nonsense",
    "simply wrong",
    "outrageous",
    "how can anyone",
    "wake up",
];

const DEFENSIVE_MARKERS: &[&str] = &[
    "never said",
    "not what i",
    "misrepresent",
    "to be fair",
    "i didn't",
    "that's unfair",
    "taken out of context",
];

const EVIDENCE_MARKERS: &[&str] = &[
    "study", "studies", "research", "data", "percent", "%", "survey", "evidence", "statistics",
];

const AUTHORITY_MARKERS: &[&str] = &[
    "expert",
    "according to",
    "report",
    "institute",
    "university",
    "unesco",
    "professor",
];

const EMOTIONAL_MARKERS: &[&str] = &[
    "feel", "heart", "fear", "imagine", "children", "tragic", "hope", "dream",
];

fn count(text: &str, markers: &[&str]) -> usize {
    markers.iter().filter(|m| text.contains(*m)).count()
}

/// Classifies by counting marker phrases.
///
/// Emotion: two or more exclamation marks or any frustration marker reads as frustrated;
/// a defensive marker reads as defensive; otherwise calm. Style: the family with the most
/// markers wins, ties in order evidence, authority, emotional; no marker reads as direct.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn observe(&self, utterance: &str) -> Observation {
        let text = utterance.to_lowercase();
        let exclamations = text.matches('!').count();
        let emotion = if exclamations >= 2 || count(&text, FRUSTRATED_MARKERS) > 0 {
            EmotionalState::Frustrated
        } else if count(&text, DEFENSIVE_MARKERS) > 0 {
            EmotionalState::Defensive
        } else {
            EmotionalState::Calm
        };

        let candidates = [
            (ArgumentStyle::Evidence, count(&text, EVIDENCE_MARKERS)),
            (ArgumentStyle::Authority, count(&text, AUTHORITY_MARKERS)),
            (ArgumentStyle::Emotional, count(&text, EMOTIONAL_MARKERS)),
        ];
        let mut style = ArgumentStyle::Direct;
        let mut best = 0;
        for (candidate, hits) in candidates {
            if hits > best {
                style = candidate;
                best = hits;
            }
        }
        Observation::new(emotion, style)
    }
}

#[async_trait]
impl StyleClassifier for KeywordClassifier {
    async fn classify(
        &self,
        utterance: &str,
        _context: &DialogueState,
    ) -> Result<Observation, CollaboratorError> {
        Ok(self.observe(utterance))
    }
}
