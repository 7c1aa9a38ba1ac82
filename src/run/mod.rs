//! Running a workflow from the editor: the api client, the save-then-run
//! controller and the results it brings back.

mod api;
mod controller;
mod result;

pub use api::{HttpWorkflowApi, WorkflowApi};
pub use controller::{RunController, RunPhase, RunRejection, parse_input, save_graph};
pub use result::{NodeRunResult, NodeRunStatus, RunResult, RunStatus};
