//! Scoring criteria, per-criterion scores and the weighted aggregate.
//!
//! `aggregate = Σ weight[c] · score[c]` with weights normalized to sum 1, so an aggregate
//! of scores in `[0, 1]` stays in `[0, 1]`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;

/// A judged quality of one utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    /// Logical consistency.
    Logic,
    /// Evidence support.
    Evidence,
    Persuasiveness,
}

impl Criterion {
    pub const ALL: [Criterion; 3] = [Criterion::Logic, Criterion::Evidence, Criterion::Persuasiveness];

    pub fn key(self) -> &'static str {
        match self {
            Criterion::Logic => "logic",
            Criterion::Evidence => "evidence",
            Criterion::Persuasiveness => "persuasiveness",
        }
    }

    /// Maps judge output keys (including common synonyms) to a criterion.
    pub fn from_key(key: &str) -> Option<Criterion> {
        match key.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "logic" | "logical" | "logical_consistency" | "consistency" => Some(Criterion::Logic),
            "evidence" | "evidence_support" | "evidence_quality" => Some(Criterion::Evidence),
            "persuasiveness" | "persuasive" => Some(Criterion::Persuasiveness),
            _ => None,
        }
    }
}

/// Per-criterion scores for one utterance; every criterion present, each in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScores(BTreeMap<Criterion, f64>);

impl CriterionScores {
    pub fn new(logic: f64, evidence: f64, persuasiveness: f64) -> Self {
        let mut map = BTreeMap::new();
        map.insert(Criterion::Logic, clamp_unit(logic));
        map.insert(Criterion::Evidence, clamp_unit(evidence));
        map.insert(Criterion::Persuasiveness, clamp_unit(persuasiveness));
        Self(map)
    }

    /// All three criteria set to the same value.
    pub fn uniform(value: f64) -> Self {
        Self::new(value, value, value)
    }

    /// Builds scores from a raw judge mapping: values are clamped to `[0, 1]`; a missing
    /// criterion or a non-finite value is malformed output.
    pub fn from_raw<I, K>(raw: I) -> Result<Self, CollaboratorError>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let mut map = BTreeMap::new();
        for (key, value) in raw {
            let Some(criterion) = Criterion::from_key(key.as_ref()) else {
                continue;
            };
            if !value.is_finite() {
                return Err(CollaboratorError::Malformed(format!(
                    "non-finite score for {}",
                    criterion.key()
                )));
            }
            map.insert(criterion, clamp_unit(value));
        }
        if let Some(missing) = Criterion::ALL.iter().find(|c| !map.contains_key(c)) {
            return Err(CollaboratorError::Malformed(format!(
                "missing criterion {}",
                missing.key()
            )));
        }
        Ok(Self(map))
    }

    pub fn get(&self, criterion: Criterion) -> f64 {
        self.0.get(&criterion).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Criterion, f64)> + '_ {
        self.0.iter().map(|(c, v)| (*c, *v))
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        return 0.0;
    }
    v.clamp(0.0, 1.0)
}

/// Relative weight per criterion. Always normalized to sum 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWeights")]
pub struct ScoringWeights {
    logic: f64,
    evidence: f64,
    persuasiveness: f64,
}

#[derive(Deserialize)]
struct RawWeights {
    logic: f64,
    evidence: f64,
    persuasiveness: f64,
}

impl TryFrom<RawWeights> for ScoringWeights {
    type Error = String;

    fn try_from(raw: RawWeights) -> Result<Self, Self::Error> {
        ScoringWeights::new(raw.logic, raw.evidence, raw.persuasiveness)
    }
}

impl Default for ScoringWeights {
    /// Equal weights.
    fn default() -> Self {
        Self {
            logic: 1.0 / 3.0,
            evidence: 1.0 / 3.0,
            persuasiveness: 1.0 / 3.0,
        }
    }
}

impl ScoringWeights {
    /// Normalizes the given relative weights. Weights must be finite, non-negative and
    /// not all zero.
    pub fn new(logic: f64, evidence: f64, persuasiveness: f64) -> Result<Self, String> {
        let all = [logic, evidence, persuasiveness];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(format!(
                "weights must be finite and non-negative, got {:?}",
                all
            ));
        }
        let sum: f64 = all.iter().sum();
        if sum <= 0.0 {
            return Err("weights must not all be zero".to_string());
        }
        Ok(Self {
            logic: logic / sum,
            evidence: evidence / sum,
            persuasiveness: persuasiveness / sum,
        })
    }

    pub fn get(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::Logic => self.logic,
            Criterion::Evidence => self.evidence,
            Criterion::Persuasiveness => self.persuasiveness,
        }
    }

    /// Multiplies each weight by a factor and renormalizes. Factors are floored at zero.
    pub fn scaled(&self, logic: f64, evidence: f64, persuasiveness: f64) -> Self {
        Self::new(
            self.logic * logic.max(0.0),
            self.evidence * evidence.max(0.0),
            self.persuasiveness * persuasiveness.max(0.0),
        )
        .unwrap_or(*self)
    }

    /// Weighted sum of `scores`.
    pub fn aggregate(&self, scores: &CriterionScores) -> f64 {
        Criterion::ALL
            .iter()
            .map(|c| self.get(*c) * scores.get(*c))
            .sum()
    }
}
