//! Progress events a running session can stream to an observer (CLI, UI, test).

use serde::Serialize;

use crate::belief::EmotionalEstimate;
use crate::dialogue::Speaker;

/// How a turn's utterance was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UtteranceSource {
    /// Selected from the full rehearsal tree.
    Rehearsed,
    /// Selected from the relaxed single-candidate retry.
    Relaxed,
    /// The configured fallback utterance.
    Fallback,
}

/// One session progress event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DebateEvent {
    TurnStarted {
        turn: usize,
        speaker: Speaker,
    },
    /// A rehearsal tree was built for the speaker.
    TreeBuilt {
        speaker: Speaker,
        nodes: usize,
        plies: usize,
        /// Root-level candidates in generation order.
        options: Vec<String>,
    },
    /// The selector chose `chosen` among the options.
    OptionSelected {
        speaker: Speaker,
        chosen: usize,
        /// Effective value per option, `None` where scoring failed.
        values: Vec<Option<f64>>,
    },
    Spoke {
        turn: usize,
        speaker: Speaker,
        utterance: String,
        source: UtteranceSource,
    },
    /// `observer` folded the opponent's utterance into its belief.
    BeliefUpdated {
        observer: Speaker,
        estimate: EmotionalEstimate,
    },
    Finished {
        turns: usize,
        cancelled: bool,
    },
}
