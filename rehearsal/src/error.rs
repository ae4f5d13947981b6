//! Error types for collaborator calls, LLM access and debate sessions.
//!
//! Node-local failures ([`CollaboratorError`]) are absorbed by the tree builder and
//! selector whenever a usable partial result remains; only failures that prevent a
//! turn from producing any utterance surface as [`DebateError`].

use std::time::Duration;

use thiserror::Error;

use crate::dialogue::{DialogueState, Speaker};

/// Failure of a single call into a generation, scoring or classification collaborator.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CollaboratorError {
    /// The call did not complete within the session's per-call timeout.
    #[error("collaborator call timed out after {0:?}")]
    Timeout(Duration),
    /// The collaborator reported an error (network, model, backend).
    #[error("collaborator call failed: {0}")]
    Failed(String),
    /// The collaborator answered, but the answer could not be used.
    #[error("malformed collaborator output: {0}")]
    Malformed(String),
}

impl CollaboratorError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<LlmError> for CollaboratorError {
    fn from(e: LlmError) -> Self {
        CollaboratorError::Failed(e.to_string())
    }
}

/// Errors from an [`LlmClient`](crate::llm::LlmClient).
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("mock exhausted: no scripted response left")]
    MockExhausted,
}

/// Errors surfaced by the rehearsal builder, the selector and the debate orchestrator.
#[derive(Debug, Error)]
pub enum DebateError {
    /// The generator produced no candidate where at least one is required (root of a turn).
    #[error("generation exhausted for {speaker}: {detail}")]
    GenerationExhausted { speaker: Speaker, detail: String },
    /// Every root candidate failed scoring, so no utterance is selectable.
    #[error("scoring failed for all {failed} candidates of {speaker}")]
    ScoringFailure { speaker: Speaker, failed: usize },
    /// The caller cancelled the session while a turn was being rehearsed.
    #[error("session cancelled")]
    Cancelled,
    #[error("invalid session config: {0}")]
    InvalidConfig(String),
    /// The transcript appended a turn out of order.
    #[error("{speaker} cannot speak twice in a row")]
    OutOfTurn { speaker: Speaker },
    /// A turn could not produce any utterance; the transcript up to that point is kept.
    #[error("session aborted after {turns_completed} turns: {cause}")]
    SessionAborted {
        transcript: DialogueState,
        turns_completed: usize,
        #[source]
        cause: Box<DebateError>,
    },
}

impl DebateError {
    /// The innermost cause when this is a [`DebateError::SessionAborted`], else `self`.
    pub fn root_cause(&self) -> &DebateError {
        match self {
            DebateError::SessionAborted { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// Partial transcript carried by an aborted session.
    pub fn transcript(&self) -> Option<&DialogueState> {
        match self {
            DebateError::SessionAborted { transcript, .. } => Some(transcript),
            _ => None,
        }
    }
}
