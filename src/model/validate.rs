//! Graph invariant checks.
//!
//! A graph is well-formed when node ids are unique and non-empty, every
//! edge points at nodes that exist, and every edge condition names a handle
//! its source node actually exposes. Cycles are allowed here; rejecting them
//! is up to the execution engine.

use std::collections::{HashMap, HashSet};

use crate::model::{
    agent::AgentType,
    edge::OutputHandle,
    node::NodeId,
    workflow::WorkflowGraph,
};

/// A single broken invariant. `index` always refers to the position of the
/// offending edge in [`WorkflowGraph::edges`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    EmptyNodeId,
    DuplicateNodeId {
        id: NodeId,
    },
    DanglingEdge {
        index: usize,
        node_id: NodeId,
    },
    InvalidCondition {
        index: usize,
        source_id: NodeId,
        agent_type: AgentType,
        condition: String,
    },
}

impl std::fmt::Display for Violation {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Violation::EmptyNodeId => write!(f, "node with empty id"),
            Violation::DuplicateNodeId { id } => write!(f, "duplicate node id '{}'", id),
            Violation::DanglingEdge { index, node_id } => write!(f, "edge #{} references missing node '{}'", index, node_id),
            Violation::InvalidCondition {
                index,
                source_id,
                agent_type,
                condition,
            } => write!(
                f,
                "edge #{} from {} node '{}' has invalid condition '{}'",
                index,
                agent_type.as_ref(),
                source_id,
                condition
            ),
        }
    }
}

/// Checks `graph` against the schema invariants, reporting every violation found.
pub fn validate(graph: &WorkflowGraph) -> Vec<Violation> {
    let mut violations = Vec::new();

    let mut seen = HashSet::new();
    let mut types: HashMap<&str, AgentType> = HashMap::new();
    for node in graph.nodes.iter() {
        if node.id.is_empty() {
            violations.push(Violation::EmptyNodeId);
            continue;
        }
        if !seen.insert(node.id.as_str()) {
            violations.push(Violation::DuplicateNodeId { id: node.id.clone() });
            continue;
        }
        types.insert(node.id.as_str(), node.agent_type);
    }

    for (index, edge) in graph.edges.iter().enumerate() {
        for endpoint in [&edge.source_id, &edge.target_id] {
            if !types.contains_key(endpoint.as_str()) {
                violations.push(Violation::DanglingEdge {
                    index,
                    node_id: endpoint.clone(),
                });
            }
        }

        let Some(agent_type) = types.get(edge.source_id.as_str()) else {
            continue;
        };
        let exposed = OutputHandle::from_condition(&edge.condition).is_some_and(|h| agent_type.exposes(h));
        if !exposed {
            violations.push(Violation::InvalidCondition {
                index,
                source_id: edge.source_id.clone(),
                agent_type: *agent_type,
                condition: edge.condition.clone(),
            });
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AgentNode, GraphEdge};

    fn graph(
        nodes: Vec<AgentNode>,
        edges: Vec<GraphEdge>,
    ) -> WorkflowGraph {
        WorkflowGraph { nodes, edges }
    }

    #[test]
    fn test_valid_graph() {
        let g = graph(
            vec![
                AgentNode::new("check", AgentType::Conditional),
                AgentNode::new("yes", AgentType::Llm),
                AgentNode::new("no", AgentType::ApiCall),
            ],
            vec![
                GraphEdge::new("check", "yes", OutputHandle::True),
                GraphEdge::new("check", "no", OutputHandle::False),
                GraphEdge::new("yes", "no", OutputHandle::Default),
            ],
        );
        assert!(validate(&g).is_empty());
        assert!(g.ensure_valid().is_ok());
    }

    #[test]
    fn test_cycles_are_allowed() {
        let g = graph(
            vec![AgentNode::new("a", AgentType::Llm), AgentNode::new("b", AgentType::Llm)],
            vec![GraphEdge::new("a", "b", OutputHandle::Default), GraphEdge::new("b", "a", OutputHandle::Default)],
        );
        assert!(validate(&g).is_empty());
    }

    #[test]
    fn test_duplicate_and_empty_ids() {
        let g = graph(
            vec![AgentNode::new("a", AgentType::Llm), AgentNode::new("a", AgentType::CodeExec), AgentNode::new("", AgentType::Llm)],
            vec![],
        );
        assert_eq!(validate(&g), vec![Violation::DuplicateNodeId { id: "a".to_string() }, Violation::EmptyNodeId]);
    }

    #[test]
    fn test_dangling_edges() {
        let g = graph(
            vec![AgentNode::new("a", AgentType::Llm)],
            vec![GraphEdge::new("a", "ghost", OutputHandle::Default), GraphEdge::new("x", "y", OutputHandle::Default)],
        );
        let violations = validate(&g);
        assert_eq!(violations.len(), 3);
        assert_eq!(
            violations[0],
            Violation::DanglingEdge {
                index: 0,
                node_id: "ghost".to_string()
            }
        );
    }

    #[test]
    fn test_conditional_edge_needs_branch() {
        let g = graph(
            vec![AgentNode::new("check", AgentType::Conditional), AgentNode::new("next", AgentType::Llm)],
            vec![GraphEdge::new("check", "next", OutputHandle::Default)],
        );
        let violations = validate(&g);
        assert_eq!(
            violations,
            vec![Violation::InvalidCondition {
                index: 0,
                source_id: "check".to_string(),
                agent_type: AgentType::Conditional,
                condition: String::new(),
            }]
        );
    }

    #[test]
    fn test_plain_edge_must_be_unconditional() {
        let mut edge = GraphEdge::new("a", "b", OutputHandle::Default);
        edge.condition = "maybe".to_string();
        let g = graph(vec![AgentNode::new("a", AgentType::Llm), AgentNode::new("b", AgentType::Llm)], vec![
            GraphEdge::new("a", "b", OutputHandle::True),
            edge,
        ]);
        let violations = validate(&g);
        assert_eq!(violations.len(), 2);
        assert!(violations[1].to_string().contains("invalid condition 'maybe'"));
    }
}
