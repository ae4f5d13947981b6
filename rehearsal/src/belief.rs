//! Theory-of-mind belief model: what a debater believes about its opponent.
//!
//! A [`BeliefState`] holds a distribution over the opponent's emotional state, a
//! distribution over its argument style, and a confidence that grows with every real
//! observation. [`update`] is pure: belief in, belief out. The orchestrator calls it once
//! per actual opponent turn, never for hypothetical tree nodes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scoring::ScoringWeights;

/// Coarse emotional read of the opponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionalState {
    Calm,
    Frustrated,
    Defensive,
}

/// Dominant way the opponent argues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentStyle {
    /// Leans on studies, numbers and sources.
    Evidence,
    /// Leans on experts and institutions.
    Authority,
    /// Leans on feelings, values and anecdotes.
    Emotional,
    /// Plain claims and rebuttals.
    Direct,
}

/// Closed set of labels a [`Distribution`] ranges over.
pub trait Category: Copy + Ord + 'static {
    const ALL: &'static [Self];

    /// Maps free-form classifier labels to a category.
    fn from_label(label: &str) -> Option<Self>;
}

impl Category for EmotionalState {
    const ALL: &'static [Self] = &[
        EmotionalState::Calm,
        EmotionalState::Frustrated,
        EmotionalState::Defensive,
    ];

    fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "calm" | "neutral" | "composed" => Some(EmotionalState::Calm),
            "frustrated" | "angry" | "annoyed" | "agitated" => Some(EmotionalState::Frustrated),
            "defensive" => Some(EmotionalState::Defensive),
            _ => None,
        }
    }
}

impl Category for ArgumentStyle {
    const ALL: &'static [Self] = &[
        ArgumentStyle::Evidence,
        ArgumentStyle::Authority,
        ArgumentStyle::Emotional,
        ArgumentStyle::Direct,
    ];

    fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().replace(['-', '_'], " ").as_str() {
            "evidence" | "evidence heavy" | "technical" | "data driven" => Some(ArgumentStyle::Evidence),
            "authority" | "appeal to authority" => Some(ArgumentStyle::Authority),
            "emotional" | "emotional appeal" | "pathos" => Some(ArgumentStyle::Emotional),
            "direct" | "neutral" | "logical" => Some(ArgumentStyle::Direct),
            _ => None,
        }
    }
}

/// Probability mass over the categories of `K`: non-negative entries summing to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution<K: Category>(BTreeMap<K, f64>);

impl<K: Category> Distribution<K> {
    pub fn uniform() -> Self {
        let p = 1.0 / K::ALL.len() as f64;
        Self(K::ALL.iter().map(|k| (*k, p)).collect())
    }

    pub fn one_hot(category: K) -> Self {
        Self(
            K::ALL
                .iter()
                .map(|k| (*k, if *k == category { 1.0 } else { 0.0 }))
                .collect(),
        )
    }

    pub fn get(&self, category: K) -> f64 {
        self.0.get(&category).copied().unwrap_or(0.0)
    }

    /// `alpha · observed + (1 − alpha) · self`, renormalized against float drift.
    pub fn blend(&self, observed: &Self, alpha: f64) -> Self {
        let mut out: BTreeMap<K, f64> = K::ALL
            .iter()
            .map(|k| {
                let v = alpha * observed.get(*k) + (1.0 - alpha) * self.get(*k);
                (*k, v.max(0.0))
            })
            .collect();
        let sum: f64 = out.values().sum();
        if sum > 0.0 {
            out.values_mut().for_each(|v| *v /= sum);
            Self(out)
        } else {
            Self::uniform()
        }
    }

    /// Most likely category with its probability; ties go to the first in `K::ALL`.
    pub fn dominant(&self) -> (K, f64) {
        let mut best = (K::ALL[0], self.get(K::ALL[0]));
        for k in &K::ALL[1..] {
            let p = self.get(*k);
            if p > best.1 {
                best = (*k, p);
            }
        }
        best
    }
}

/// One classifier read of an actual opponent utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub emotion: EmotionalState,
    pub style: ArgumentStyle,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub beliefs: Vec<String>,
}

impl Observation {
    pub fn new(emotion: EmotionalState, style: ArgumentStyle) -> Self {
        Self {
            emotion,
            style,
            weaknesses: Vec::new(),
            beliefs: Vec::new(),
        }
    }

    pub fn with_weaknesses(mut self, weaknesses: Vec<String>) -> Self {
        self.weaknesses = weaknesses;
        self
    }
}

/// Constants of the belief model, fixed for a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeliefConfig {
    /// Exponential smoothing constant α in `(0, 1]`.
    pub smoothing: f64,
    /// Confidence before any observation.
    pub confidence_prior: f64,
    /// Upper bound the confidence approaches.
    pub confidence_ceiling: f64,
    /// Strength of the ToM weight adaptation; 0 disables it.
    pub adaptation_gain: f64,
}

impl Default for BeliefConfig {
    fn default() -> Self {
        Self {
            smoothing: 0.5,
            confidence_prior: 0.1,
            confidence_ceiling: 0.95,
            adaptation_gain: 1.0,
        }
    }
}

impl BeliefConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.smoothing > 0.0 && self.smoothing <= 1.0) {
            return Err(format!("smoothing must be in (0, 1], got {}", self.smoothing));
        }
        if !(0.0..=1.0).contains(&self.confidence_ceiling) {
            return Err(format!(
                "confidence_ceiling must be in [0, 1], got {}",
                self.confidence_ceiling
            ));
        }
        if !(0.0..=self.confidence_ceiling).contains(&self.confidence_prior) {
            return Err(format!(
                "confidence_prior must be in [0, confidence_ceiling], got {}",
                self.confidence_prior
            ));
        }
        if !(self.adaptation_gain.is_finite() && self.adaptation_gain >= 0.0) {
            return Err(format!(
                "adaptation_gain must be finite and non-negative, got {}",
                self.adaptation_gain
            ));
        }
        Ok(())
    }
}

/// Estimated emotional state of the opponent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EmotionalEstimate {
    pub state: EmotionalState,
    pub probability: f64,
    pub confidence: f64,
}

/// Persistent per-opponent estimate. Reset at the start of every session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefState {
    pub emotion: Distribution<EmotionalState>,
    pub style: Distribution<ArgumentStyle>,
    /// In `[0, 1]`; non-decreasing across updates within a session.
    pub confidence: f64,
    pub observations: u32,
    /// Latest observed weak points of the opponent's case.
    pub weaknesses: Vec<String>,
    /// Latest observed core beliefs of the opponent.
    pub beliefs: Vec<String>,
}

impl BeliefState {
    /// The prior: uniform distributions at `config.confidence_prior`.
    pub fn prior(config: &BeliefConfig) -> Self {
        Self {
            emotion: Distribution::uniform(),
            style: Distribution::uniform(),
            confidence: config.confidence_prior.clamp(0.0, 1.0),
            observations: 0,
            weaknesses: Vec::new(),
            beliefs: Vec::new(),
        }
    }

    pub fn emotional_estimate(&self) -> EmotionalEstimate {
        let (state, probability) = self.emotion.dominant();
        EmotionalEstimate {
            state,
            probability,
            confidence: self.confidence,
        }
    }

    pub fn dominant_style(&self) -> ArgumentStyle {
        self.style.dominant().0
    }

    /// Share of mass on emotionally reactive states.
    pub fn reactivity(&self) -> f64 {
        self.emotion.get(EmotionalState::Frustrated) + self.emotion.get(EmotionalState::Defensive)
    }

    /// Scoring weights adapted to this belief.
    ///
    /// Persuasiveness is boosted by how reactive the opponent seems, evidence by how
    /// evidence-driven it seems, logic by how direct it seems; each boost is scaled by
    /// confidence and `gain`. Before the first observation the prior carries no evidence,
    /// so `base` is returned unchanged.
    pub fn scoring_weights(&self, base: &ScoringWeights, gain: f64) -> ScoringWeights {
        let k = gain * self.confidence;
        if self.observations == 0 || k == 0.0 {
            return *base;
        }
        base.scaled(
            1.0 + k * self.style.get(ArgumentStyle::Direct),
            1.0 + k * self.style.get(ArgumentStyle::Evidence),
            1.0 + k * self.reactivity(),
        )
    }

    /// Prompt guidance for the next turn's own utterances. `None` before any observation.
    pub fn guidance(&self) -> Option<String> {
        if self.observations == 0 {
            return None;
        }
        let estimate = self.emotional_estimate();
        let tone = match estimate.state {
            EmotionalState::Frustrated => "calm and factual",
            EmotionalState::Defensive => "supportive but firm",
            EmotionalState::Calm => "reasoned",
        };
        let approach = match estimate.state {
            EmotionalState::Frustrated => "acknowledge, then refute",
            EmotionalState::Defensive => "find common ground",
            EmotionalState::Calm => "logical rebuttal",
        };
        let state = match estimate.state {
            EmotionalState::Calm => "calm",
            EmotionalState::Frustrated => "frustrated",
            EmotionalState::Defensive => "defensive",
        };
        let style = match self.dominant_style() {
            ArgumentStyle::Evidence => "evidence-heavy",
            ArgumentStyle::Authority => "appeals to authority",
            ArgumentStyle::Emotional => "emotional appeals",
            ArgumentStyle::Direct => "direct",
        };
        let mut text = format!(
            "Opponent appears {} (confidence {:.2}) and argues with {}. Strategy: {}; tone: {}.",
            state, self.confidence, style, approach, tone
        );
        if let Some(weakness) = self.weaknesses.first() {
            text.push_str(&format!(" Target weakness: {}.", weakness));
        }
        if let Some(belief) = self.beliefs.first() {
            text.push_str(&format!(" Counter this belief: {}.", belief));
        }
        Some(text)
    }
}

/// Folds one observation into `belief` by exponential smoothing.
pub fn update(belief: BeliefState, observation: &Observation, config: &BeliefConfig) -> BeliefState {
    let alpha = config.smoothing;
    let ceiling = config.confidence_ceiling;
    let confidence = if belief.confidence >= ceiling {
        belief.confidence
    } else {
        (belief.confidence + alpha * (ceiling - belief.confidence)).min(ceiling)
    };
    BeliefState {
        emotion: belief
            .emotion
            .blend(&Distribution::one_hot(observation.emotion), alpha),
        style: belief.style.blend(&Distribution::one_hot(observation.style), alpha),
        confidence,
        observations: belief.observations.saturating_add(1),
        weaknesses: if observation.weaknesses.is_empty() {
            belief.weaknesses
        } else {
            observation.weaknesses.clone()
        },
        beliefs: if observation.beliefs.is_empty() {
            belief.beliefs
        } else {
            observation.beliefs.clone()
        },
    }
}
