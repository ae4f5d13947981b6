//! # Rehearsal
//!
//! Two debate agents (PRO and CON) argue a topic in alternating turns. Before every turn the
//! active agent **rehearses**: it builds a bounded tree of hypothetical utterances and
//! counter-utterances, scores each node with a judge, and speaks the root-level option whose
//! line holds up best against the opponent's most damaging reply. Optionally an agent keeps
//! a **theory-of-mind** model of its opponent and adapts its scoring and tone to it.
//!
//! ## Main modules
//!
//! - [`dialogue`]: [`Speaker`], [`DialogueState`] (the alternating transcript).
//! - [`scoring`]: [`Criterion`], [`CriterionScores`], [`ScoringWeights`].
//! - [`collaborator`]: [`Generator`], [`Scorer`], [`StyleClassifier`] seams with LLM-backed,
//!   heuristic and scripted implementations; [`with_timeout`].
//! - [`tree`]: [`TreeBuilder`], [`RehearsalTree`], [`TreeNode`].
//! - [`select`]: [`PathSelector`], [`SelectionPolicy`], [`Selection`].
//! - [`belief`]: [`BeliefState`], [`Observation`], [`belief::update`].
//! - [`agent`]: [`DebateAgent`].
//! - [`debate`]: [`DebateSession`] (the orchestrator), [`DebateOutcome`], [`TurnRecord`].
//! - [`export`]: [`TreeExport`] (flat JSON and DOT), [`TreeRenderer`].
//! - [`events`]: [`DebateEvent`] stream.
//! - [`llm`]: [`LlmClient`], [`MockLlm`], [`OllamaChat`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rehearsal::{
//!     DebateAgent, DebateSession, LlmGenerator, LlmScorer, OllamaChat, SessionConfig, Speaker,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), rehearsal::DebateError> {
//! let llm = Arc::new(OllamaChat::new("phi3:instruct"));
//! let scorer = Arc::new(LlmScorer::new(llm.clone()));
//! let pro = DebateAgent::new(Speaker::Pro, Arc::new(LlmGenerator::new(llm.clone())), scorer.clone());
//! let con = DebateAgent::new(Speaker::Con, Arc::new(LlmGenerator::new(llm)), scorer);
//! let config = SessionConfig::default().with_tom(Speaker::Pro);
//! let mut session = DebateSession::new("Should schools adopt AI tutors?", config, pro, con)?;
//! let outcome = session.run(&CancellationToken::new()).await?;
//! for turn in outcome.transcript.turns() {
//!     println!("{}: {}", turn.speaker, turn.utterance);
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod belief;
pub mod collaborator;
pub mod config;
pub mod debate;
pub mod dialogue;
pub mod error;
pub mod events;
pub mod export;
pub mod llm;
pub mod message;
pub mod scoring;
pub mod select;
pub mod tree;

pub use agent::DebateAgent;
pub use belief::{
    ArgumentStyle, BeliefConfig, BeliefState, EmotionalEstimate, EmotionalState, Observation,
};
pub use collaborator::{
    with_timeout, GenerationRequest, Generator, KeywordClassifier, LlmGenerator, LlmScorer,
    LlmStyleClassifier, Scorer, ScriptedClassifier, ScriptedGenerator, ScriptedScorer,
    StyleClassifier,
};
pub use config::{full_tree_size, SessionConfig, MAX_TREE_NODES};
pub use debate::{DebateOutcome, DebateSession, Phase, Termination, TurnRecord};
pub use dialogue::{DialogueState, Speaker, Turn};
pub use error::{CollaboratorError, DebateError, LlmError};
pub use events::{DebateEvent, UtteranceSource};
pub use export::{ExportedNode, RenderError, TreeExport, TreeRenderer};
pub use llm::{LlmClient, LlmResponse, LlmUsage, MockLlm, OllamaChat, OllamaOptions};
pub use message::Message;
pub use scoring::{Criterion, CriterionScores, ScoringWeights};
pub use select::{PathSelector, Selection, SelectionPolicy};
pub use tree::{NodeStatus, RehearsalTree, TreeBuilder, TreeNode};
