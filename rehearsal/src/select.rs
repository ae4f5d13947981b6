//! Path selection over a built rehearsal tree.
//!
//! Under [`SelectionPolicy::Adversarial`] a leaf is worth its own aggregate and an inner node
//! is worth `discount` times the minimum of its scored children's values: the opponent is
//! assumed to reply with whatever hurts most, and deeper lines count for less. The option
//! with the highest value wins; ties go to an option whose value came from its replies rather
//! than from the all-replies-failed floor, then to the higher own aggregate, then to the
//! option generated first.

use serde::{Deserialize, Serialize};

use crate::dialogue::Speaker;
use crate::error::DebateError;
use crate::tree::{NodeStatus, RehearsalTree, TreeNode};

/// Values closer than this are treated as tied.
const TIE_EPSILON: f64 = 1e-9;

/// How the selector values a candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Worst-case reply with per-ply discount.
    #[default]
    Adversarial,
    /// Own aggregate only; replies are ignored.
    BestFirst,
}

/// The chosen root-level utterance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    /// Index into [`RehearsalTree::options`].
    pub index: usize,
    /// Node id of the chosen option.
    pub node_id: usize,
    pub utterance: String,
    /// Effective value under the policy.
    pub value: f64,
    /// The option's own aggregate score.
    pub aggregate_score: f64,
    /// Effective value per option, `None` where scoring failed.
    pub values: Vec<Option<f64>>,
}

/// Chooses one option from a rehearsal tree.
#[derive(Debug, Clone, Copy)]
pub struct PathSelector {
    policy: SelectionPolicy,
    discount: f64,
    min_score: f64,
}

impl Default for PathSelector {
    fn default() -> Self {
        Self::new(SelectionPolicy::Adversarial, 0.9, 0.0)
    }
}

impl PathSelector {
    /// `min_score` is the value of a node whose replies all failed scoring.
    pub fn new(policy: SelectionPolicy, discount: f64, min_score: f64) -> Self {
        Self {
            policy,
            discount,
            min_score,
        }
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Value of `node` under the policy; `None` when the node itself failed scoring.
    pub fn effective_value(&self, node: &TreeNode) -> Option<f64> {
        let own = node.aggregate_score?;
        match self.policy {
            SelectionPolicy::BestFirst => Some(own),
            SelectionPolicy::Adversarial => {
                if node.status == NodeStatus::ChildrenFailed {
                    return Some(self.min_score);
                }
                let worst = node
                    .children
                    .iter()
                    .filter_map(|child| self.effective_value(child))
                    .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))));
                match worst {
                    Some(worst) => Some(self.discount * worst),
                    None => Some(own),
                }
            }
        }
    }

    /// Picks the option with the highest effective value.
    ///
    /// Fails with [`DebateError::ScoringFailure`] when no option was scored.
    pub fn select(&self, tree: &RehearsalTree) -> Result<Selection, DebateError> {
        let values: Vec<Option<f64>> = tree
            .options
            .iter()
            .map(|option| self.effective_value(option))
            .collect();

        let mut best: Option<(usize, f64, f64, bool)> = None;
        for (index, (option, value)) in tree.options.iter().zip(&values).enumerate() {
            let (Some(value), Some(own)) = (*value, option.aggregate_score) else {
                continue;
            };
            let floored = self.policy == SelectionPolicy::Adversarial
                && option.status == NodeStatus::ChildrenFailed;
            let better = match best {
                None => true,
                Some((_, best_value, best_own, best_floored)) => {
                    if (value - best_value).abs() > TIE_EPSILON {
                        value > best_value
                    } else if floored != best_floored {
                        !floored
                    } else {
                        own - best_own > TIE_EPSILON
                    }
                }
            };
            if better {
                best = Some((index, value, own, floored));
            }
        }

        let (index, value, aggregate_score, _) = best.ok_or(DebateError::ScoringFailure {
            speaker: tree.speaker,
            failed: tree.options.len(),
        })?;
        let chosen = &tree.options[index];
        tracing::debug!(
            speaker = %tree.speaker,
            policy = ?self.policy,
            index,
            value,
            "option selected"
        );
        Ok(Selection {
            index,
            node_id: chosen.id,
            utterance: chosen.utterance.clone(),
            value,
            aggregate_score,
            values,
        })
    }

    /// The line the selector expects from `option` on: each step follows the reply with the
    /// lowest effective value (first one on ties).
    pub fn expected_line<'t>(&self, option: &'t TreeNode) -> Vec<(Speaker, &'t str)> {
        let mut line = vec![(option.speaker, option.utterance.as_str())];
        let mut node = option;
        loop {
            let mut next: Option<(&TreeNode, f64)> = None;
            for child in &node.children {
                let Some(v) = self.effective_value(child) else {
                    continue;
                };
                if next.map_or(true, |(_, best)| v < best - TIE_EPSILON) {
                    next = Some((child, v));
                }
            }
            match next {
                Some((child, _)) => {
                    line.push((child.speaker, child.utterance.as_str()));
                    node = child;
                }
                None => return line,
            }
        }
    }
}
