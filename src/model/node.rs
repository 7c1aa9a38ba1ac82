use serde::{Deserialize, Serialize};

use crate::model::agent::{AgentType, Overrides};

/// node id
pub type NodeId = String;

/// Canvas coordinate; presentational only.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

impl Position {
    pub fn new(
        x: f64,
        y: f64,
    ) -> Self {
        Self { x, y }
    }
}

/// A persisted workflow node.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AgentNode {
    /// node id, unique within a graph and stable across saves
    pub id: NodeId,
    /// which agent runs this step
    #[serde(default)]
    pub agent_type: AgentType,
    /// free text instruction
    #[serde(default)]
    pub objective: String,
    /// reusable agent definition, empty when not linked
    #[serde(default)]
    pub agent_def_id: String,
    /// per-type configuration keyed by field name
    #[serde(default)]
    pub config_overrides: Overrides,
    #[serde(default)]
    pub position: Position,
    /// halt downstream propagation when this node fails
    #[serde(default = "default_stop_on_failure")]
    pub stop_on_failure: bool,
}

fn default_stop_on_failure() -> bool {
    true
}

impl AgentNode {
    pub fn new(
        id: impl Into<NodeId>,
        agent_type: AgentType,
    ) -> Self {
        Self {
            id: id.into(),
            agent_type,
            objective: String::new(),
            agent_def_id: String::new(),
            config_overrides: Overrides::new(),
            position: Position::default(),
            stop_on_failure: true,
        }
    }

    /// The linked agent definition, if any.
    pub fn agent_def(&self) -> Option<&str> {
        if self.agent_def_id.is_empty() { None } else { Some(&self.agent_def_id) }
    }
}
