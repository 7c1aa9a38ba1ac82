//! Conversion between the persisted graph and the canvas.
//!
//! `hydrate` followed by `dehydrate` gives back the original graph, up to
//! defaults for absent fields, for every graph that validates. Whatever the
//! canvas cannot represent faithfully is listed in the [`HydrationReport`]
//! instead of disappearing silently.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::{
    canvas::{Canvas, CanvasEdge, CanvasNode},
    config::EditorConfig,
    model::{GraphEdge, NodeId, Violation, WorkflowGraph, validate},
};

/// Something in the persisted graph that will not come back unchanged on the next save.
#[derive(Debug, Clone, PartialEq)]
pub enum HydrationIssue {
    /// A node or edge breaking a schema invariant was left off the canvas.
    Dropped(Violation),
    /// An edge from a non-branching node carried a condition; it was reset to the default output.
    ConditionCleared {
        index: usize,
        source_id: NodeId,
        condition: String,
    },
    /// The node was stored with `stop_on_failure = false`; it will be saved as true.
    StopOnFailureForced {
        node_id: NodeId,
    },
    /// The stored configuration does not fit the node's typed fields. It is
    /// kept verbatim and still round-trips, but its fields are not editable.
    UntypedConfig {
        node_id: NodeId,
        reason: String,
    },
}

impl HydrationIssue {
    /// Whether the next save will differ from what was loaded.
    pub fn is_lossy(&self) -> bool {
        !matches!(self, HydrationIssue::UntypedConfig { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HydrationReport {
    pub issues: Vec<HydrationIssue>,
}

impl HydrationReport {
    /// True when saving the canvas right away reproduces the loaded graph.
    pub fn is_faithful(&self) -> bool {
        !self.issues.iter().any(HydrationIssue::is_lossy)
    }

    pub fn dropped(&self) -> impl Iterator<Item = &Violation> {
        self.issues.iter().filter_map(|issue| match issue {
            HydrationIssue::Dropped(v) => Some(v),
            _ => None,
        })
    }
}

/// Builds a fresh canvas from a persisted graph.
pub fn hydrate(
    graph: &WorkflowGraph,
    config: &EditorConfig,
) -> (Canvas, HydrationReport) {
    let mut canvas = Canvas::new(config);
    let mut report = HydrationReport::default();

    let violations = validate(graph);
    let mut dropped_edges = HashSet::new();
    let mut cleared_edges = HashSet::new();
    for violation in violations {
        match &violation {
            Violation::DanglingEdge { index, .. } => {
                dropped_edges.insert(*index);
            }
            Violation::InvalidCondition {
                index,
                source_id,
                agent_type,
                condition,
            } if !agent_type.is_branching() => {
                cleared_edges.insert(*index);
                report.issues.push(HydrationIssue::ConditionCleared {
                    index: *index,
                    source_id: source_id.clone(),
                    condition: condition.clone(),
                });
                continue;
            }
            Violation::InvalidCondition { index, .. } => {
                dropped_edges.insert(*index);
            }
            Violation::EmptyNodeId | Violation::DuplicateNodeId { .. } => {}
        }
        report.issues.push(HydrationIssue::Dropped(violation));
    }

    let mut seen = HashSet::new();
    for node in graph.nodes.iter() {
        if node.id.is_empty() || !seen.insert(node.id.as_str()) {
            continue;
        }
        if !node.stop_on_failure {
            report.issues.push(HydrationIssue::StopOnFailureForced { node_id: node.id.clone() });
        }
        let (canvas_node, issue) = CanvasNode::from_agent_node(node, canvas.label_max_chars);
        if let Some(reason) = issue {
            report.issues.push(HydrationIssue::UntypedConfig {
                node_id: node.id.clone(),
                reason,
            });
        }
        canvas.node_ids.observe(&node.id);
        canvas.nodes.push(canvas_node);
    }

    for (index, edge) in graph.edges.iter().enumerate() {
        if dropped_edges.contains(&index) {
            continue;
        }
        let mut canvas_edge = CanvasEdge::from_graph_edge(index, edge);
        if cleared_edges.contains(&index) {
            canvas_edge = CanvasEdge::new(canvas_edge.id, canvas_edge.source, canvas_edge.target, "");
        }
        canvas.edges.push(canvas_edge);
    }
    canvas.edge_ids = super::IdGenerator::starting_at(super::EDGE_ID_PREFIX, graph.edges.len() as u64);

    debug!(
        session = %canvas.session_id(),
        nodes = canvas.nodes.len(),
        edges = canvas.edges.len(),
        issues = report.issues.len(),
        "hydrated canvas"
    );
    for issue in report.issues.iter().filter(|i| i.is_lossy()) {
        warn!(session = %canvas.session_id(), ?issue, "graph will not round-trip unchanged");
    }

    (canvas, report)
}

/// Serializes the canvas back into the persisted graph.
pub fn dehydrate(canvas: &Canvas) -> WorkflowGraph {
    WorkflowGraph {
        nodes: canvas.nodes.iter().map(CanvasNode::to_agent_node).collect(),
        edges: canvas.edges.iter().map(CanvasEdge::to_graph_edge).collect::<Vec<GraphEdge>>(),
    }
}
