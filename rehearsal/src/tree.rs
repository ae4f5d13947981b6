//! Rehearsal tree: hypothetical utterance/counter-utterance plies explored before a turn.
//!
//! [`TreeBuilder::build`] asks the generator for up to `max_breadth` candidates for the
//! speaker, scores each, and, while `depth + 1 < max_depth`, expands every scored node as
//! if the other side replied. Siblings are scored and expanded concurrently but assembled
//! in candidate order, so equal collaborator outputs always give an equal tree.
//!
//! Failures stay local where possible: a node whose scoring fails is kept (for export) but
//! never expanded or selected; a generation failure below the root makes that node a leaf.
//! Only an empty or failed root generation is an error ([`DebateError::GenerationExhausted`]).

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::collaborator::{with_timeout, GenerationRequest, Generator, Scorer};
use crate::config::{full_tree_size, MAX_TREE_NODES};
use crate::dialogue::{DialogueState, Speaker};
use crate::error::{CollaboratorError, DebateError};
use crate::scoring::{CriterionScores, ScoringWeights};

/// Outcome of scoring one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Scored,
    /// The scorer failed or timed out; excluded from selection.
    ScoringFailed,
    /// Scored itself, but every generated reply failed scoring (pessimistic fallback).
    ChildrenFailed,
}

/// One hypothetical utterance at a given ply.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    /// Pre-order index within the tree.
    pub id: usize,
    /// Ply from the root; 0 is the rehearsing agent's own candidate.
    pub depth: usize,
    pub speaker: Speaker,
    pub utterance: String,
    pub scores: Option<CriterionScores>,
    /// Weighted sum of `scores`; `None` when scoring failed.
    pub aggregate_score: Option<f64>,
    pub status: NodeStatus,
    /// Why scoring or expansion failed, if it did.
    pub failure: Option<String>,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_scored(&self) -> bool {
        self.status != NodeStatus::ScoringFailed
    }

    /// Deepest ply under (and including) this node.
    pub fn max_depth(&self) -> usize {
        self.children
            .iter()
            .map(TreeNode::max_depth)
            .max()
            .unwrap_or(self.depth)
    }

    fn count(&self) -> usize {
        1 + self.children.iter().map(TreeNode::count).sum::<usize>()
    }

    fn max_breadth(&self) -> usize {
        self.children
            .iter()
            .map(TreeNode::max_breadth)
            .max()
            .unwrap_or(0)
            .max(self.children.len())
    }

    fn visit<'t>(&'t self, parent: Option<usize>, f: &mut dyn FnMut(&'t TreeNode, Option<usize>)) {
        f(self, parent);
        for child in &self.children {
            child.visit(Some(self.id), f);
        }
    }
}

/// A built rehearsal tree: the statement being answered and the candidate utterances.
#[derive(Debug, Clone, Serialize)]
pub struct RehearsalTree {
    /// The rehearsing agent.
    pub speaker: Speaker,
    /// Statement the candidates answer (last utterance, or the topic at the opening).
    pub anchor: String,
    pub max_depth: usize,
    pub max_breadth: usize,
    /// Weights the aggregates were computed with.
    pub weights: ScoringWeights,
    /// Root children: the speaker's candidate utterances at depth 0, in generation order.
    pub options: Vec<TreeNode>,
}

impl RehearsalTree {
    pub fn node_count(&self) -> usize {
        self.options.iter().map(TreeNode::count).sum()
    }

    /// Number of plies actually present.
    pub fn plies(&self) -> usize {
        self.options
            .iter()
            .map(|n| n.max_depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Largest number of siblings anywhere in the tree.
    pub fn widest(&self) -> usize {
        self.options
            .iter()
            .map(TreeNode::max_breadth)
            .max()
            .unwrap_or(0)
            .max(self.options.len())
    }

    /// Pre-order walk; `parent` is `None` for the root's children.
    pub fn walk<'t>(&'t self, mut f: impl FnMut(&'t TreeNode, Option<usize>)) {
        for option in &self.options {
            option.visit(None, &mut f);
        }
    }

    pub fn find(&self, id: usize) -> Option<&TreeNode> {
        let mut found = None;
        self.walk(|node, _| {
            if node.id == id {
                found = Some(node);
            }
        });
        found
    }
}

/// The build was cancelled through the caller's token.
struct Interrupted;

/// Builds rehearsal trees from a generator and a scorer.
pub struct TreeBuilder<'a> {
    generator: &'a dyn Generator,
    scorer: &'a dyn Scorer,
    weights: ScoringWeights,
    timeout: Duration,
    guidance: Option<String>,
    cancel: Option<CancellationToken>,
}

/// Bounds and identity of one build, shared by every level.
#[derive(Clone, Copy)]
struct Plan {
    root_speaker: Speaker,
    max_depth: usize,
    max_breadth: usize,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(generator: &'a dyn Generator, scorer: &'a dyn Scorer) -> Self {
        Self {
            generator,
            scorer,
            weights: ScoringWeights::default(),
            timeout: Duration::from_secs(60),
            guidance: None,
            cancel: None,
        }
    }

    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Per collaborator call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Hint passed to the generator for the rehearsing speaker's own utterances.
    pub fn with_guidance(mut self, guidance: Option<String>) -> Self {
        self.guidance = guidance;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Builds the tree for `speaker` answering `state`.
    pub async fn build(
        &self,
        state: &DialogueState,
        speaker: Speaker,
        max_depth: usize,
        max_breadth: usize,
    ) -> Result<RehearsalTree, DebateError> {
        if max_depth == 0 || max_breadth == 0 {
            return Err(DebateError::InvalidConfig(
                "rehearsal needs max_depth and max_breadth of at least 1".to_string(),
            ));
        }
        if full_tree_size(max_depth, max_breadth) > MAX_TREE_NODES {
            return Err(DebateError::InvalidConfig(format!(
                "max_depth {} x max_breadth {} exceeds {} nodes per tree",
                max_depth, max_breadth, MAX_TREE_NODES
            )));
        }
        let plan = Plan {
            root_speaker: speaker,
            max_depth,
            max_breadth,
        };
        let request = GenerationRequest {
            context: state,
            speaker,
            n: max_breadth,
            guidance: self.guidance.as_deref(),
        };
        let generated = self
            .call(self.generator.generate(request))
            .await
            .map_err(|Interrupted| DebateError::Cancelled)?;
        let candidates = match generated {
            Ok(candidates) => distinct_candidates(candidates, max_breadth),
            Err(e) => {
                tracing::warn!(speaker = %speaker, error = %e, "root generation failed");
                return Err(DebateError::GenerationExhausted {
                    speaker,
                    detail: e.to_string(),
                });
            }
        };
        if candidates.is_empty() {
            return Err(DebateError::GenerationExhausted {
                speaker,
                detail: "generator returned no candidates".to_string(),
            });
        }

        let mut options = self
            .expand_level(plan, state.clone(), candidates, speaker, 0)
            .await
            .map_err(|Interrupted| DebateError::Cancelled)?;
        let mut next_id = 0;
        assign_ids(&mut options, &mut next_id);

        let tree = RehearsalTree {
            speaker,
            anchor: state.statement_to_answer().to_string(),
            max_depth,
            max_breadth,
            weights: self.weights,
            options,
        };
        tracing::debug!(
            speaker = %speaker,
            nodes = tree.node_count(),
            plies = tree.plies(),
            "rehearsal tree built"
        );
        Ok(tree)
    }

    /// Runs one collaborator call under the timeout, racing the cancellation token.
    async fn call<T>(
        &self,
        fut: impl Future<Output = Result<T, CollaboratorError>>,
    ) -> Result<Result<T, CollaboratorError>, Interrupted> {
        let timed = with_timeout(self.timeout, fut);
        match &self.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(Interrupted),
                result = timed => Ok(result),
            },
            None => Ok(timed.await),
        }
    }

    /// Scores `candidates` (spoken by `speaker` at `depth`, answering `context`) and expands
    /// the scored ones while the depth bound allows.
    fn expand_level<'s>(
        &'s self,
        plan: Plan,
        context: DialogueState,
        candidates: Vec<String>,
        speaker: Speaker,
        depth: usize,
    ) -> BoxFuture<'s, Result<Vec<TreeNode>, Interrupted>> {
        async move {
            let scored = join_all(
                candidates
                    .iter()
                    .map(|c| self.call(self.scorer.evaluate(c, &context))),
            )
            .await;

            let mut nodes = Vec::with_capacity(candidates.len());
            for (utterance, result) in candidates.into_iter().zip(scored) {
                let node = match result? {
                    Ok(scores) => TreeNode {
                        id: 0,
                        depth,
                        speaker,
                        aggregate_score: Some(self.weights.aggregate(&scores)),
                        scores: Some(scores),
                        utterance,
                        status: NodeStatus::Scored,
                        failure: None,
                        children: Vec::new(),
                    },
                    Err(e) => {
                        tracing::warn!(depth, speaker = %speaker, error = %e, "scoring failed; node excluded");
                        TreeNode {
                            id: 0,
                            depth,
                            speaker,
                            utterance,
                            scores: None,
                            aggregate_score: None,
                            status: NodeStatus::ScoringFailed,
                            failure: Some(e.to_string()),
                            children: Vec::new(),
                        }
                    }
                };
                nodes.push(node);
            }

            if depth + 1 >= plan.max_depth {
                return Ok(nodes);
            }

            let expanded = join_all(
                nodes
                    .into_iter()
                    .map(|node| self.expand_node(plan, &context, node)),
            )
            .await;
            expanded.into_iter().collect()
        }
        .boxed()
    }

    /// Generates and builds the replies to one scored node.
    async fn expand_node(
        &self,
        plan: Plan,
        context: &DialogueState,
        mut node: TreeNode,
    ) -> Result<TreeNode, Interrupted> {
        if !node.is_scored() {
            return Ok(node);
        }
        let child_context = context.extended(node.speaker, &node.utterance);
        let replier = node.speaker.opponent();
        let guidance = if replier == plan.root_speaker {
            self.guidance.as_deref()
        } else {
            None
        };
        let request = GenerationRequest {
            context: &child_context,
            speaker: replier,
            n: plan.max_breadth,
            guidance,
        };
        let replies = match self.call(self.generator.generate(request)).await? {
            Ok(replies) => distinct_candidates(replies, plan.max_breadth),
            Err(e) => {
                tracing::warn!(depth = node.depth, error = %e, "expansion failed; node kept as leaf");
                node.failure = Some(e.to_string());
                return Ok(node);
            }
        };
        if replies.is_empty() {
            return Ok(node);
        }
        let children = self
            .expand_level(plan, child_context, replies, replier, node.depth + 1)
            .await?;
        if children.iter().all(|c| !c.is_scored()) {
            node.status = NodeStatus::ChildrenFailed;
        }
        node.children = children;
        Ok(node)
    }
}

/// Drops blank and repeated candidates (trimmed, case-insensitive), keeps first occurrences,
/// and caps the list at `limit`.
pub fn distinct_candidates(candidates: Vec<String>, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for candidate in candidates {
        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !seen.insert(trimmed.to_lowercase()) {
            tracing::debug!(candidate = %trimmed, "duplicate candidate dropped");
            continue;
        }
        out.push(trimmed.to_string());
        if out.len() == limit {
            break;
        }
    }
    out
}

fn assign_ids(nodes: &mut [TreeNode], next: &mut usize) {
    for node in nodes {
        node.id = *next;
        *next += 1;
        assign_ids(&mut node.children, next);
    }
}
