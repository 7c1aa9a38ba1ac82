use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::NodeId;

const FAILED_AT_NODE: &str = "Failed at node: ";

/// Status of one node in a run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeRunStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    /// The agent raised instead of returning a result.
    Error,
}

/// Status of a whole run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Error,
}

/// Result of a single node execution
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct NodeRunResult {
    #[serde(default)]
    pub status: NodeRunStatus,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default)]
    pub tokens_used: u64,
    #[serde(default)]
    pub cost_usd: f64,
}

/// What the workflow api returns for a run.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RunResult {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub status: RunStatus,
    #[serde(default)]
    pub node_results: HashMap<NodeId, NodeRunResult>,
    #[serde(default)]
    pub output_data: Option<Value>,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_node: Option<NodeId>,
}

impl RunResult {
    /// Synthetic result standing in for a run that never produced one.
    pub fn error(
        message: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            status: RunStatus::Error,
            error: Some(message.into()),
            duration_ms,
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == RunStatus::Error
    }

    /// The node the run stopped at, if it stopped early. Falls back to the
    /// `Failed at node: <id>` error message when the field is absent.
    pub fn failed_node(&self) -> Option<&str> {
        self.failed_node.as_deref().or_else(|| self.error.as_deref().and_then(|e| e.strip_prefix(FAILED_AT_NODE)))
    }

    /// Per-node results with the given status.
    pub fn nodes_with_status(
        &self,
        status: NodeRunStatus,
    ) -> Vec<&NodeId> {
        let mut ids: Vec<&NodeId> = self.node_results.iter().filter(|(_, r)| r.status == status).map(|(id, _)| id).collect();
        ids.sort();
        ids
    }
}
