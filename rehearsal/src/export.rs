//! Tree export: a flat JSON-friendly node list and Graphviz DOT.
//!
//! Exports are for inspection only; the selector never reads them. Renderers that write
//! files live outside this crate and plug in through [`TreeRenderer`].

use std::fmt::Write;

use serde::Serialize;
use thiserror::Error;

use crate::dialogue::Speaker;
use crate::select::Selection;
use crate::tree::{NodeStatus, RehearsalTree};

/// Characters of an utterance shown in a DOT label.
pub const LABEL_CHARS: usize = 50;

/// One node of an exported tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedNode {
    pub id: usize,
    /// `None` for the root's children.
    pub parent_id: Option<usize>,
    pub depth: usize,
    pub speaker: Speaker,
    pub utterance: String,
    pub aggregate_score: Option<f64>,
    pub status: NodeStatus,
}

/// Flat pre-order export of a rehearsal tree.
#[derive(Debug, Clone, Serialize)]
pub struct TreeExport {
    pub speaker: Speaker,
    pub anchor: String,
    /// Node id of the selected option, when known.
    pub selected: Option<usize>,
    pub nodes: Vec<ExportedNode>,
}

impl TreeExport {
    pub fn new(tree: &RehearsalTree, selection: Option<&Selection>) -> Self {
        let mut nodes = Vec::with_capacity(tree.node_count());
        tree.walk(|node, parent_id| {
            nodes.push(ExportedNode {
                id: node.id,
                parent_id,
                depth: node.depth,
                speaker: node.speaker,
                utterance: node.utterance.clone(),
                aggregate_score: node.aggregate_score,
                status: node.status,
            })
        });
        Self {
            speaker: tree.speaker,
            anchor: tree.anchor.clone(),
            selected: selection.map(|s| s.node_id),
            nodes,
        }
    }

    /// Graphviz DOT: one box per node labelled with a truncated utterance and its score,
    /// hanging off a root box holding the anchor statement.
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph rehearsal {\n");
        dot.push_str("  node [shape=box];\n");
        let _ = writeln!(
            dot,
            "  root [label=\"{}\", style=bold];",
            escape(&truncate(&self.anchor))
        );
        for node in &self.nodes {
            let score = match node.aggregate_score {
                Some(s) => format!("(Score: {:.2})", s),
                None => "(Score: failed)".to_string(),
            };
            let mut attrs = String::new();
            if self.selected == Some(node.id) {
                attrs.push_str(", style=filled, fillcolor=lightgreen");
            } else if node.status == NodeStatus::ScoringFailed {
                attrs.push_str(", style=dashed");
            }
            let _ = writeln!(
                dot,
                "  n{} [label=\"{}: {}\\n{}\"{}];",
                node.id,
                node.speaker,
                escape(&truncate(&node.utterance)),
                score,
                attrs
            );
        }
        dot.push('\n');
        for node in &self.nodes {
            match node.parent_id {
                Some(parent) => {
                    let _ = writeln!(dot, "  n{} -> n{};", parent, node.id);
                }
                None => {
                    let _ = writeln!(dot, "  root -> n{};", node.id);
                }
            }
        }
        dot.push_str("}\n");
        dot
    }
}

fn truncate(text: &str) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= LABEL_CHARS {
        return flat;
    }
    let mut out: String = flat.chars().take(LABEL_CHARS).collect();
    out.push_str("...");
    out
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Failure to render or persist a tree.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("renderer failed: {0}")]
    Renderer(String),
}

/// Receives every turn's tree and selection, e.g. to write `.dot` files.
///
/// The session calls it on tokio's blocking pool, so implementations may do blocking I/O.
/// Failures are logged by the session and never abort it.
pub trait TreeRenderer: Send + Sync {
    fn render(&self, name: &str, export: &TreeExport) -> Result<(), RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{CriterionScores, ScoringWeights};
    use crate::tree::TreeNode;

    fn leaf(id: usize, text: &str, score: Option<f64>) -> TreeNode {
        TreeNode {
            id,
            depth: 1,
            speaker: Speaker::Con,
            utterance: text.to_string(),
            scores: score.map(CriterionScores::uniform),
            aggregate_score: score,
            status: if score.is_some() {
                NodeStatus::Scored
            } else {
                NodeStatus::ScoringFailed
            },
            failure: None,
            children: Vec::new(),
        }
    }

    fn sample() -> RehearsalTree {
        RehearsalTree {
            speaker: Speaker::Pro,
            anchor: "Should \"AI\" grade essays?".into(),
            max_depth: 2,
            max_breadth: 2,
            weights: ScoringWeights::default(),
            options: vec![TreeNode {
                id: 0,
                depth: 0,
                speaker: Speaker::Pro,
                utterance: "x".repeat(80),
                scores: Some(CriterionScores::uniform(0.5)),
                aggregate_score: Some(0.5),
                status: NodeStatus::Scored,
                failure: None,
                children: vec![leaf(1, "B1", Some(0.25)), leaf(2, "B2", None)],
            }],
        }
    }

    #[test]
    fn export_lists_nodes_with_parents() {
        let export = TreeExport::new(&sample(), None);
        let parents: Vec<_> = export.nodes.iter().map(|n| n.parent_id).collect();
        assert_eq!(parents, vec![None, Some(0), Some(0)]);
        assert_eq!(export.nodes[2].status, NodeStatus::ScoringFailed);
    }

    #[test]
    fn dot_truncates_labels_and_shows_scores() {
        let dot = TreeExport::new(&sample(), None).to_dot();
        assert!(dot.starts_with("digraph rehearsal {"));
        assert!(dot.contains(&format!("PRO: {}...", "x".repeat(LABEL_CHARS))));
        assert!(dot.contains("(Score: 0.25)"));
        assert!(dot.contains("(Score: failed)"));
        assert!(dot.contains("Should \\\"AI\\\" grade essays?"));
        assert!(dot.contains("root -> n0;"));
        assert!(dot.contains("n0 -> n2;"));
    }

    #[test]
    fn export_serializes_to_json() {
        let export = TreeExport::new(&sample(), None);
        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["speaker"], "pro");
        assert_eq!(json["nodes"][1]["utterance"], "B1");
        assert_eq!(json["nodes"][2]["status"], "scoring_failed");
    }
}
