//! Persisted edge definitions.
//!
//! An edge leaving a conditional node records which branch it hangs off in
//! `condition` ("true" or "false"); every other edge leaves through the
//! default output and carries an empty condition.

use serde::{Deserialize, Serialize};

use crate::model::node::NodeId;

/// Output ports a node can expose.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutputHandle {
    /// Single unnamed output of every non-branching node.
    #[default]
    Default,
    /// True branch for conditional nodes.
    True,
    /// False branch for conditional nodes.
    False,
}

impl OutputHandle {
    /// The persisted `condition` string for edges leaving this handle.
    pub fn condition(&self) -> &'static str {
        match self {
            OutputHandle::Default => "",
            OutputHandle::True => "true",
            OutputHandle::False => "false",
        }
    }

    /// Maps a persisted `condition` back to its handle.
    pub fn from_condition(condition: &str) -> Option<Self> {
        match condition {
            "" => Some(OutputHandle::Default),
            "true" => Some(OutputHandle::True),
            "false" => Some(OutputHandle::False),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source_id: NodeId,
    pub target_id: NodeId,
    /// Branch label for conditional sources, empty otherwise.
    #[serde(default)]
    pub condition: String,
}

impl GraphEdge {
    pub fn new(
        source_id: impl Into<NodeId>,
        target_id: impl Into<NodeId>,
        handle: OutputHandle,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            condition: handle.condition().to_string(),
        }
    }

    pub fn is_conditional(&self) -> bool {
        !self.condition.is_empty()
    }

    /// Whether this edge starts or ends at `id`.
    pub fn touches(
        &self,
        id: &str,
    ) -> bool {
        self.source_id == id || self.target_id == id
    }
}
