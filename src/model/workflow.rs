use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    FlowCanvasError, Result,
    model::{
        edge::GraphEdge,
        node::{AgentNode, NodeId},
        validate::{Violation, validate},
    },
};

/// The persisted graph: nodes plus the edges between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    #[serde(default)]
    pub nodes: Vec<AgentNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

impl WorkflowGraph {
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str::<WorkflowGraph>(s).map_err(|e| FlowCanvasError::Convert(format!("invalid workflow graph: {}", e)))
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// get node by id
    pub fn node(
        &self,
        id: &str,
    ) -> Option<&AgentNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    /// Lists every schema invariant the graph breaks.
    pub fn validate(&self) -> Vec<Violation> {
        validate(self)
    }

    /// Like [`WorkflowGraph::validate`], as a `Result`.
    pub fn ensure_valid(&self) -> Result<()> {
        let violations = self.validate();
        if violations.is_empty() { Ok(()) } else { Err(FlowCanvasError::Validation(violations)) }
    }
}

/// A workflow record as served by the workflow api.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub graph: WorkflowGraph,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub schedule_cron: Option<String>,
    #[serde(default, deserialize_with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Accepts RFC 3339 timestamps as well as naive ones, which are read as UTC.
fn timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(t) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(t.with_timezone(&Utc)));
    }
    raw.parse::<NaiveDateTime>().map(|t| Some(t.and_utc())).map_err(serde::de::Error::custom)
}
