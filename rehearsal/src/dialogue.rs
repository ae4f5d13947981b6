//! Dialogue state: the two sides of a debate and the turn-alternating transcript.
//!
//! [`DialogueState`] is both the canonical transcript owned by the orchestrator and the
//! immutable snapshot handed to rehearsal. Hypothetical lines are explored on extended
//! clones ([`DialogueState::extended`]), never on the canonical transcript.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DebateError;

/// One side of the debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Pro,
    Con,
}

impl Speaker {
    pub const BOTH: [Speaker; 2] = [Speaker::Pro, Speaker::Con];

    /// The other side.
    pub fn opponent(self) -> Speaker {
        match self {
            Speaker::Pro => Speaker::Con,
            Speaker::Con => Speaker::Pro,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Speaker::Pro => "PRO",
            Speaker::Con => "CON",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Speaker {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pro" => Ok(Speaker::Pro),
            "con" => Ok(Speaker::Con),
            _ => Err(format!("unknown speaker: {} (use pro or con)", s)),
        }
    }
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub utterance: String,
}

/// Debate topic plus the ordered, strictly alternating transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueState {
    pub topic: String,
    turns: Vec<Turn>,
}

impl DialogueState {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            turns: Vec::new(),
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn last_speaker(&self) -> Option<Speaker> {
        self.turns.last().map(|t| t.speaker)
    }

    /// The statement the next speaker answers: the last utterance, or the topic at the opening.
    pub fn statement_to_answer(&self) -> &str {
        self.turns
            .last()
            .map(|t| t.utterance.as_str())
            .unwrap_or(self.topic.as_str())
    }

    /// Appends a turn. Fails with [`DebateError::OutOfTurn`] when `speaker` spoke last.
    pub fn push(&mut self, speaker: Speaker, utterance: impl Into<String>) -> Result<(), DebateError> {
        if self.last_speaker() == Some(speaker) {
            return Err(DebateError::OutOfTurn { speaker });
        }
        self.turns.push(Turn {
            speaker,
            utterance: utterance.into(),
        });
        Ok(())
    }

    /// A snapshot with one hypothetical turn appended (used while rehearsing).
    pub fn extended(&self, speaker: Speaker, utterance: &str) -> DialogueState {
        let mut next = self.clone();
        next.turns.push(Turn {
            speaker,
            utterance: utterance.to_string(),
        });
        next
    }

    /// Most recent `n` utterances as `"SPEAKER: text"` lines, oldest first (prompt context).
    pub fn recent_lines(&self, n: usize) -> Vec<String> {
        let start = self.turns.len().saturating_sub(n);
        self.turns[start..]
            .iter()
            .map(|t| format!("{}: {}", t.speaker, t.utterance))
            .collect()
    }
}
