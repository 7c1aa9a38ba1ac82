mod agent;
mod edge;
mod node;
mod validate;
mod workflow;

pub use agent::{AgentConfig, AgentType, ApiCallConfig, ConditionOperator, ConditionalConfig, HttpMethod, LlmConfig, Overrides};
pub use edge::{GraphEdge, OutputHandle};
pub use node::{AgentNode, NodeId, Position};
pub use validate::{Violation, validate};
pub use workflow::{Workflow, WorkflowGraph};
