//! Editable canvas representation of a workflow graph.
//!
//! The canvas is rebuilt from the persisted graph on every load and turned
//! back into one on every save. In between it takes the user's gestures:
//! adding, moving, connecting, disconnecting and deleting nodes. Every
//! gesture keeps the canvas well-formed, so a save never carries dangling
//! edges or conditions a node does not expose.

mod adapter;
mod edge;
mod id;
mod node;

use std::collections::HashMap;

use petgraph::{algo::toposort, graph::DiGraph, visit::EdgeRef};
use tracing::{debug, trace, warn};

use crate::{
    FlowCanvasError, Result,
    config::EditorConfig,
    editor::NodeEditor,
    model::{AgentConfig, AgentType, NodeId, OutputHandle, Position, WorkflowGraph},
    run::NodeRunResult,
    utils,
};

pub use adapter::{HydrationIssue, HydrationReport, dehydrate, hydrate};
pub use edge::{CanvasEdge, EdgeId};
pub use id::IdGenerator;
pub use node::{CanvasNode, NodeOverlay, label_for};

const EDGE_ID_PREFIX: &str = "e-";

/// Outcome of a connect gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    /// A new edge was added.
    Created(EdgeId),
    /// An identical edge already existed; nothing changed.
    Existing(EdgeId),
}

impl Connection {
    pub fn edge_id(&self) -> &EdgeId {
        match self {
            Connection::Created(id) | Connection::Existing(id) => id,
        }
    }
}

/// The nodes and edges of one editing session.
#[derive(Debug, Clone)]
pub struct Canvas {
    session_id: String,
    nodes: Vec<CanvasNode>,
    edges: Vec<CanvasEdge>,
    node_ids: IdGenerator,
    edge_ids: IdGenerator,
    label_max_chars: usize,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(&EditorConfig::default())
    }
}

impl Canvas {
    /// create an empty canvas
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            session_id: utils::longid(),
            nodes: Vec::new(),
            edges: Vec::new(),
            node_ids: IdGenerator::new(config.node_id_prefix.clone()),
            edge_ids: IdGenerator::starting_at(EDGE_ID_PREFIX, 0),
            label_max_chars: config.label_max_chars,
        }
    }

    /// Builds a canvas from a persisted graph, see [`hydrate`].
    pub fn from_graph(
        graph: &WorkflowGraph,
        config: &EditorConfig,
    ) -> (Self, HydrationReport) {
        hydrate(graph, config)
    }

    /// Serializes the canvas, see [`dehydrate`].
    pub fn to_graph(&self) -> WorkflowGraph {
        dehydrate(self)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn nodes(&self) -> &[CanvasNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[CanvasEdge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn label_max_chars(&self) -> usize {
        self.label_max_chars
    }

    /// get node by id
    pub fn node(
        &self,
        id: &str,
    ) -> Option<&CanvasNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// get edge by id
    pub fn edge(
        &self,
        id: &str,
    ) -> Option<&CanvasEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    fn node_mut(
        &mut self,
        id: &str,
    ) -> Result<&mut CanvasNode> {
        self.nodes.iter_mut().find(|n| n.id == id).ok_or_else(|| FlowCanvasError::Canvas(format!("node {} not found", id)))
    }

    /// Adds a node of the given type and returns its freshly minted id.
    pub fn add_node(
        &mut self,
        agent_type: AgentType,
        position: Position,
    ) -> NodeId {
        let nodes = &self.nodes;
        let id = self.node_ids.mint(|candidate| nodes.iter().any(|n| n.id == candidate));
        self.nodes.push(CanvasNode::new(id.clone(), AgentConfig::new(agent_type), position, self.label_max_chars));
        debug!(session = %self.session_id, node = %id, agent_type = agent_type.as_ref(), "added node");
        id
    }

    /// drag a node to a new position
    pub fn move_node(
        &mut self,
        id: &str,
        position: Position,
    ) -> Result<()> {
        self.node_mut(id)?.position = position;
        Ok(())
    }

    /// Links or unlinks a reusable agent definition.
    pub fn set_agent_def(
        &mut self,
        id: &str,
        agent_def_id: Option<String>,
    ) -> Result<()> {
        self.node_mut(id)?.agent_def_id = agent_def_id.filter(|d| !d.is_empty());
        Ok(())
    }

    /// Opens the configuration editor on one node.
    pub fn edit(
        &mut self,
        id: &str,
    ) -> Result<NodeEditor<'_>> {
        let label_max_chars = self.label_max_chars;
        let node = self.node_mut(id)?;
        Ok(NodeEditor::new(node, label_max_chars))
    }

    /// Deletes a node together with every edge touching it. Returns the removed edges.
    pub fn remove_node(
        &mut self,
        id: &str,
    ) -> Result<Vec<CanvasEdge>> {
        if self.node(id).is_none() {
            return Err(FlowCanvasError::Canvas(format!("node {} not found", id)));
        }
        self.nodes.retain(|n| n.id != id);

        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.edges).into_iter().partition(|e| e.touches(id));
        self.edges = kept;
        debug!(session = %self.session_id, node = %id, edges = removed.len(), "removed node");
        Ok(removed)
    }

    /// Draws an edge from `source`'s `handle` to `target`.
    ///
    /// A named handle on a node that only has the default output is
    /// corrected to the default output. A branching node must be connected
    /// from one of its branches. Drawing an edge that already exists is a
    /// no-op.
    pub fn connect(
        &mut self,
        source: &str,
        handle: OutputHandle,
        target: &str,
    ) -> Result<Connection> {
        let source_type = self.node(source).map(|n| n.agent_type()).ok_or_else(|| FlowCanvasError::Canvas(format!("source node {} not found", source)))?;
        if self.node(target).is_none() {
            return Err(FlowCanvasError::Canvas(format!("target node {} not found", target)));
        }

        let handle = if source_type.exposes(handle) {
            handle
        } else if !source_type.is_branching() {
            trace!(session = %self.session_id, from = source, handle = handle.as_ref(), "corrected handle to default output");
            OutputHandle::Default
        } else {
            warn!(session = %self.session_id, from = source, handle = handle.as_ref(), "rejected connection without a branch");
            return Err(FlowCanvasError::Canvas(format!(
                "{} node {} must be connected from one of its branches: {}",
                source_type.as_ref(),
                source,
                source_type.handles().iter().map(|h| h.condition()).collect::<Vec<_>>().join(", ")
            )));
        };

        let condition = handle.condition();
        if let Some(existing) = self.edges.iter().find(|e| e.source == source && e.target == target && e.condition() == condition) {
            return Ok(Connection::Existing(existing.id.clone()));
        }

        let edges = &self.edges;
        let id = self.edge_ids.mint(|candidate| edges.iter().any(|e| e.id == candidate));
        self.edges.push(CanvasEdge::new(id.clone(), source.to_string(), target.to_string(), condition));
        debug!(session = %self.session_id, edge = %id, from = source, to = target, condition, "connected nodes");
        Ok(Connection::Created(id))
    }

    /// Deletes a single edge.
    pub fn disconnect(
        &mut self,
        edge_id: &str,
    ) -> Result<CanvasEdge> {
        let idx = self.edges.iter().position(|e| e.id == edge_id).ok_or_else(|| FlowCanvasError::Canvas(format!("edge {} not found", edge_id)))?;
        Ok(self.edges.remove(idx))
    }

    /// Overlays per-node run results. Only nodes present in `results` are
    /// touched, and only their overlay. Returns how many nodes were updated.
    pub fn apply_overlay(
        &mut self,
        results: &HashMap<NodeId, NodeRunResult>,
    ) -> usize {
        let mut applied = 0;
        for node in self.nodes.iter_mut() {
            if let Some(result) = results.get(&node.id) {
                node.overlay = Some(NodeOverlay {
                    status: result.status,
                    duration_ms: result.duration_ms,
                });
                applied += 1;
            }
        }
        applied
    }

    /// Removes every run overlay.
    pub fn clear_overlays(&mut self) {
        self.nodes.iter_mut().for_each(|n| n.overlay = None);
    }

    /// Output a human-readable representation of the canvas
    pub fn describe(&self) -> String {
        let mut graph: DiGraph<&CanvasNode, &CanvasEdge> = DiGraph::new();
        let mut indices = HashMap::new();
        for node in self.nodes.iter() {
            indices.insert(node.id.as_str(), graph.add_node(node));
        }
        for edge in self.edges.iter() {
            if let (Some(s), Some(t)) = (indices.get(edge.source.as_str()), indices.get(edge.target.as_str())) {
                graph.add_edge(*s, *t, edge);
            }
        }

        let mut lines = Vec::new();

        lines.push("=== Canvas ===".to_string());
        lines.push(format!("Nodes: {}, Edges: {}", graph.node_count(), graph.edge_count()));
        lines.push(String::new());

        lines.push("--- Nodes ---".to_string());
        for idx in graph.node_indices() {
            let node = graph[idx];
            let status = match node.overlay() {
                Some(o) => format!("{} {}ms", o.status.as_ref(), o.duration_ms),
                None => "-".to_string(),
            };
            lines.push(format!("[{}] {} (type: {}, status: {})", node.id, node.label(), node.agent_type().as_ref(), status));
        }
        lines.push(String::new());

        lines.push("--- Edges ---".to_string());
        for edge_ref in graph.edge_references() {
            let edge = edge_ref.weight();
            let handle = edge.source_handle.as_deref().unwrap_or("default");
            lines.push(format!("{} --[{}]--> {} (id: {})", edge.source, handle, edge.target, edge.id));
        }
        lines.push(String::new());

        lines.push("--- Order ---".to_string());
        match toposort(&graph, None) {
            Ok(order) => lines.push(order.iter().map(|idx| graph[*idx].id.as_str()).collect::<Vec<_>>().join(" -> ")),
            Err(cycle) => lines.push(format!("(cycle through {})", graph[cycle.node_id()].id)),
        }

        lines.join("\n")
    }

    #[cfg(test)]
    pub(crate) fn push_edge_unchecked(
        &mut self,
        edge: CanvasEdge,
    ) {
        self.edges.push(edge);
    }
}
