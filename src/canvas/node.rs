use crate::{
    model::{AgentConfig, AgentNode, AgentType, NodeId, OutputHandle, Position},
    run::NodeRunStatus,
};

/// Run outcome shown on a node after a run; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeOverlay {
    pub status: NodeRunStatus,
    pub duration_ms: u64,
}

/// A node as it lives on the canvas while being edited.
///
/// `objective` and `config` are only changed through the node editor so the
/// label never goes stale.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasNode {
    /// same id as the persisted node
    pub id: NodeId,
    /// linked agent definition
    pub agent_def_id: Option<String>,
    pub position: Position,
    pub(crate) objective: String,
    pub(crate) config: AgentConfig,
    pub(crate) label: String,
    pub(crate) overlay: Option<NodeOverlay>,
}

impl CanvasNode {
    pub(crate) fn new(
        id: NodeId,
        config: AgentConfig,
        position: Position,
        label_max_chars: usize,
    ) -> Self {
        let label = label_for("", config.agent_type(), label_max_chars);
        Self {
            id,
            agent_def_id: None,
            position,
            objective: String::new(),
            config,
            label,
            overlay: None,
        }
    }

    /// Builds the canvas node for a persisted node. The second value is the
    /// reason the stored configuration could not be read into typed fields.
    pub(crate) fn from_agent_node(
        node: &AgentNode,
        label_max_chars: usize,
    ) -> (Self, Option<String>) {
        let (config, issue) = AgentConfig::from_overrides(node.agent_type, node.config_overrides.clone());
        let canvas_node = Self {
            id: node.id.clone(),
            agent_def_id: node.agent_def().map(str::to_string),
            position: node.position,
            objective: node.objective.clone(),
            label: label_for(&node.objective, node.agent_type, label_max_chars),
            config,
            overlay: None,
        };
        (canvas_node, issue)
    }

    /// The persisted form of this node. `stop_on_failure` is always saved as true.
    pub(crate) fn to_agent_node(&self) -> AgentNode {
        AgentNode {
            id: self.id.clone(),
            agent_type: self.config.agent_type(),
            objective: self.objective.clone(),
            agent_def_id: self.agent_def_id.clone().unwrap_or_default(),
            config_overrides: self.config.to_overrides(),
            position: self.position,
            stop_on_failure: true,
        }
    }

    pub fn agent_type(&self) -> AgentType {
        self.config.agent_type()
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn overlay(&self) -> Option<&NodeOverlay> {
        self.overlay.as_ref()
    }

    pub fn handles(&self) -> &'static [OutputHandle] {
        self.config.handles()
    }

    pub(crate) fn relabel(
        &mut self,
        label_max_chars: usize,
    ) {
        self.label = label_for(&self.objective, self.agent_type(), label_max_chars);
    }
}

/// Display label: the first `max_chars` characters of the objective, or the
/// agent type when the objective is blank.
pub fn label_for(
    objective: &str,
    agent_type: AgentType,
    max_chars: usize,
) -> String {
    if objective.trim().is_empty() {
        return agent_type.as_ref().to_string();
    }
    objective.chars().take(max_chars).collect()
}
