use crate::model::{GraphEdge, NodeId, OutputHandle};

/// edge id, synthetic and only meaningful on the canvas
pub type EdgeId = String;

/// An edge as drawn on the canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    /// Branch handle the edge leaves from; `None` for the default output.
    pub source_handle: Option<String>,
    /// Text drawn on the edge, the branch name for conditional edges.
    pub label: Option<String>,
    /// Conditional edges are drawn animated to show the flow direction.
    pub animated: bool,
}

impl CanvasEdge {
    pub(crate) fn new(
        id: EdgeId,
        source: NodeId,
        target: NodeId,
        condition: &str,
    ) -> Self {
        let handle = (!condition.is_empty()).then(|| condition.to_string());
        Self {
            id,
            source,
            target,
            animated: handle.is_some(),
            label: handle.clone(),
            source_handle: handle,
        }
    }

    pub(crate) fn from_graph_edge(
        index: usize,
        edge: &GraphEdge,
    ) -> Self {
        Self::new(format!("e-{}", index), edge.source_id.clone(), edge.target_id.clone(), &edge.condition)
    }

    pub(crate) fn to_graph_edge(&self) -> GraphEdge {
        GraphEdge {
            source_id: self.source.clone(),
            target_id: self.target.clone(),
            condition: self.condition().to_string(),
        }
    }

    /// The persisted condition of this edge.
    pub fn condition(&self) -> &str {
        self.source_handle.as_deref().unwrap_or_default()
    }

    pub fn handle(&self) -> Option<OutputHandle> {
        OutputHandle::from_condition(self.condition())
    }

    pub fn touches(
        &self,
        id: &str,
    ) -> bool {
        self.source == id || self.target == id
    }
}
