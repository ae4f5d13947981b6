//! Session configuration: search bounds, scoring, belief and failure policy.
//!
//! Supplied once at session start and immutable for the session. Passed by reference into
//! the builder, the selector and the orchestrator.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::belief::BeliefConfig;
use crate::dialogue::Speaker;
use crate::error::DebateError;
use crate::scoring::ScoringWeights;
use crate::select::SelectionPolicy;

/// Upper bound on nodes in one rehearsal tree (all plies together).
pub const MAX_TREE_NODES: usize = 4096;

/// Nodes in a tree of `max_depth` plies with `max_breadth` children everywhere (saturating).
pub fn full_tree_size(max_depth: usize, max_breadth: usize) -> usize {
    let mut total: usize = 0;
    let mut level: usize = 1;
    for _ in 0..max_depth {
        level = level.saturating_mul(max_breadth);
        total = total.saturating_add(level);
    }
    total
}

/// Configuration for one debate session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Plies per rehearsal tree; 1 means only the agent's own candidates are scored.
    pub max_depth: usize,
    /// Candidates requested per expanded node.
    pub max_breadth: usize,
    /// Turns before the session terminates.
    pub num_turns: usize,
    /// Sides that keep a theory-of-mind model of their opponent.
    pub tom_enabled_for: Vec<Speaker>,
    /// Base scoring weights; ToM agents adapt them per turn.
    pub weights: ScoringWeights,
    pub belief: BeliefConfig,
    pub policy: SelectionPolicy,
    /// Depth-decay applied per ply when propagating effective values, in `(0, 1]`.
    pub discount: f64,
    /// Effective value of a node whose children all failed scoring.
    pub min_aggregate_score: f64,
    /// Per collaborator call.
    pub call_timeout_ms: u64,
    /// Retry a turn once with breadth 1 and depth 1 when the root yields no candidate.
    pub retry_relaxed: bool,
    /// Said instead of aborting when a turn yields no selectable utterance.
    pub fallback_utterance: Option<String>,
    pub opening_speaker: Speaker,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_breadth: 2,
            num_turns: 6,
            tom_enabled_for: Vec::new(),
            weights: ScoringWeights::default(),
            belief: BeliefConfig::default(),
            policy: SelectionPolicy::Adversarial,
            discount: 0.9,
            min_aggregate_score: 0.0,
            call_timeout_ms: 60_000,
            retry_relaxed: true,
            fallback_utterance: None,
            opening_speaker: Speaker::Pro,
        }
    }
}

impl SessionConfig {
    pub fn with_bounds(mut self, max_depth: usize, max_breadth: usize) -> Self {
        self.max_depth = max_depth;
        self.max_breadth = max_breadth;
        self
    }

    pub fn with_turns(mut self, num_turns: usize) -> Self {
        self.num_turns = num_turns;
        self
    }

    /// Enables theory of mind for `speaker`.
    pub fn with_tom(mut self, speaker: Speaker) -> Self {
        if !self.tom_enabled_for.contains(&speaker) {
            self.tom_enabled_for.push(speaker);
        }
        self
    }

    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_belief(mut self, belief: BeliefConfig) -> Self {
        self.belief = belief;
        self
    }

    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_discount(mut self, discount: f64) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_min_aggregate_score(mut self, min: f64) -> Self {
        self.min_aggregate_score = min;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_retry_relaxed(mut self, retry: bool) -> Self {
        self.retry_relaxed = retry;
        self
    }

    pub fn with_fallback_utterance(mut self, utterance: impl Into<String>) -> Self {
        self.fallback_utterance = Some(utterance.into());
        self
    }

    pub fn with_opening_speaker(mut self, speaker: Speaker) -> Self {
        self.opening_speaker = speaker;
        self
    }

    pub fn tom_enabled(&self, speaker: Speaker) -> bool {
        self.tom_enabled_for.contains(&speaker)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Number of nodes a full tree with these bounds would hold.
    pub fn full_tree_size(&self) -> usize {
        full_tree_size(self.max_depth, self.max_breadth)
    }

    pub fn validate(&self) -> Result<(), DebateError> {
        let invalid = |msg: String| Err(DebateError::InvalidConfig(msg));
        if self.max_depth == 0 {
            return invalid("max_depth must be at least 1".to_string());
        }
        if self.max_breadth == 0 {
            return invalid("max_breadth must be at least 1".to_string());
        }
        if self.full_tree_size() > MAX_TREE_NODES {
            return invalid(format!(
                "max_depth {} x max_breadth {} exceeds {} nodes per tree",
                self.max_depth, self.max_breadth, MAX_TREE_NODES
            ));
        }
        if !(self.discount > 0.0 && self.discount <= 1.0) {
            return invalid(format!("discount must be in (0, 1], got {}", self.discount));
        }
        if !(0.0..=1.0).contains(&self.min_aggregate_score) {
            return invalid(format!(
                "min_aggregate_score must be in [0, 1], got {}",
                self.min_aggregate_score
            ));
        }
        if self.call_timeout_ms == 0 {
            return invalid("call_timeout_ms must be positive".to_string());
        }
        self.belief.validate().map_err(DebateError::InvalidConfig)
    }
}
