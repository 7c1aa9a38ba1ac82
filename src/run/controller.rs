//! Save-then-run orchestration for one workflow.
//!
//! A run always persists the current canvas first so the server executes
//! exactly what is on screen. The phase moves
//! `Idle -> Saving -> Running -> Completed | Errored`; a new run may start
//! from any phase except `Saving` and `Running`.

use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::{
    FlowCanvasError, Result, ShareLock,
    canvas::Canvas,
    model::{Workflow, WorkflowGraph},
    run::{RunResult, WorkflowApi},
    utils,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RunPhase {
    #[default]
    Idle,
    Saving,
    Running,
    Completed,
    Errored,
}

impl RunPhase {
    /// A run is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, RunPhase::Saving | RunPhase::Running)
    }
}

/// Why a run was refused before anything was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum RunRejection {
    #[strum(to_string = "canvas has no nodes")]
    EmptyCanvas,
    #[strum(to_string = "a run is already in progress")]
    AlreadyRunning,
}

#[derive(Debug, Default)]
struct RunState {
    phase: RunPhase,
    last_result: Option<RunResult>,
}

/// Holds the busy phase for the lifetime of one run.
///
/// A run future dropped before it finishes leaves the phase at `Errored`
/// so the next run is not rejected as already running.
struct RunGuard<'a> {
    state: &'a RwLock<RunState>,
    finished: bool,
}

impl<'a> RunGuard<'a> {
    fn acquire(state: &'a RwLock<RunState>) -> Result<Self> {
        let mut current = state.write()?;
        if current.phase.is_busy() {
            return Err(FlowCanvasError::Rejected(RunRejection::AlreadyRunning));
        }
        current.phase = RunPhase::Saving;
        Ok(Self { state, finished: false })
    }

    fn finish(
        mut self,
        phase: RunPhase,
        result: Option<RunResult>,
    ) -> Result<()> {
        self.finished = true;
        let mut state = self.state.write()?;
        state.phase = phase;
        if result.is_some() {
            state.last_result = result;
        }
        Ok(())
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Ok(mut state) = self.state.write() {
            warn!(phase = state.phase.as_ref(), "run abandoned before it finished");
            state.phase = RunPhase::Errored;
        }
    }
}

/// Parses the run input text.
///
/// Anything that is not a JSON object becomes `{}` unless `strict` is set,
/// in which case it is a [`FlowCanvasError::MalformedInput`].
pub fn parse_input(
    text: &str,
    strict: bool,
) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    match serde_json::from_str::<Value>(text) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(other) if strict => Err(FlowCanvasError::MalformedInput(format!("expected a JSON object, got {}", kind_of(&other)))),
        Err(e) if strict => Err(FlowCanvasError::MalformedInput(e.to_string())),
        _ => {
            warn!("run input is not a JSON object, sending {{}}");
            Ok(Value::Object(Map::new()))
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Validates and persists a graph.
pub async fn save_graph(
    api: &dyn WorkflowApi,
    workflow_id: &str,
    graph: &WorkflowGraph,
) -> Result<Option<Workflow>> {
    graph.ensure_valid()?;
    debug!(workflow_id, nodes = graph.nodes.len(), edges = graph.edges.len(), "saving graph");
    api.save_graph(workflow_id, graph).await.map_err(|e| FlowCanvasError::Persistence(e.to_string()))
}

/// Drives runs of one workflow against a [`WorkflowApi`].
pub struct RunController {
    api: Arc<dyn WorkflowApi>,
    workflow_id: String,
    strict_input: bool,
    state: ShareLock<RunState>,
}

impl RunController {
    pub fn new(
        api: Arc<dyn WorkflowApi>,
        workflow_id: impl Into<String>,
        strict_input: bool,
    ) -> Self {
        Self {
            api,
            workflow_id: workflow_id.into(),
            strict_input,
            state: Arc::new(RwLock::new(RunState::default())),
        }
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn phase(&self) -> RunPhase {
        self.state.read().map(|s| s.phase).unwrap_or(RunPhase::Errored)
    }

    pub fn is_running(&self) -> bool {
        self.phase().is_busy()
    }

    /// The result of the last run that got as far as executing.
    pub fn last_result(&self) -> Option<RunResult> {
        self.state.read().ok().and_then(|s| s.last_result.clone())
    }

    /// Saves the canvas, runs it and overlays the node results.
    ///
    /// Validation, input and save failures are returned as errors and leave
    /// the canvas untouched. Once the run request is sent, failures are
    /// reported as a [`RunResult`] with status `error` instead, and its node
    /// results are not written onto the canvas.
    pub async fn run(
        &self,
        canvas: &ShareLock<Canvas>,
        input_text: &str,
    ) -> Result<RunResult> {
        if canvas.read()?.is_empty() {
            return Err(FlowCanvasError::Rejected(RunRejection::EmptyCanvas));
        }
        let guard = RunGuard::acquire(&self.state)?;
        info!(workflow_id = %self.workflow_id, "run requested");

        match self.save_and_run(canvas, input_text).await {
            Ok(result) => {
                let phase = if result.is_error() { RunPhase::Errored } else { RunPhase::Completed };
                guard.finish(phase, Some(result.clone()))?;
                Ok(result)
            }
            Err(err) => {
                warn!(workflow_id = %self.workflow_id, error = %err, "run aborted before execution");
                guard.finish(RunPhase::Errored, None)?;
                Err(err)
            }
        }
    }

    async fn save_and_run(
        &self,
        canvas: &ShareLock<Canvas>,
        input_text: &str,
    ) -> Result<RunResult> {
        let input = parse_input(input_text, self.strict_input)?;
        let graph = canvas.read()?.to_graph();
        save_graph(self.api.as_ref(), &self.workflow_id, &graph).await?;

        self.state.write()?.phase = RunPhase::Running;
        let started = utils::time::time_millis();
        let result = match self.api.run(&self.workflow_id, &input).await {
            Ok(result) => result,
            Err(err) => {
                let elapsed = (utils::time::time_millis() - started).max(0) as u64;
                warn!(workflow_id = %self.workflow_id, error = %err, "run request failed");
                return Ok(RunResult::error(FlowCanvasError::Execution(err.to_string()).to_string(), elapsed));
            }
        };

        if result.is_error() {
            warn!(workflow_id = %self.workflow_id, error = ?result.error, "run reported an error");
            return Ok(result);
        }

        let applied = {
            let mut canvas = canvas.write()?;
            canvas.clear_overlays();
            canvas.apply_overlay(&result.node_results)
        };
        info!(
            workflow_id = %self.workflow_id,
            status = result.status.as_ref(),
            nodes = applied,
            duration_ms = result.duration_ms,
            "run finished"
        );
        Ok(result)
    }

}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::{
        canvas::CanvasEdge,
        config::EditorConfig,
        model::{AgentType, GraphEdge, OutputHandle, Position},
        run::{NodeRunResult, NodeRunStatus, RunStatus},
    };

    #[derive(Default)]
    struct MockApi {
        save_error: Option<FlowCanvasError>,
        run_error: Option<FlowCanvasError>,
        result: RunResult,
        delay_ms: u64,
        saves: AtomicUsize,
        runs: AtomicUsize,
        saved: Mutex<Option<WorkflowGraph>>,
        input: Mutex<Option<Value>>,
    }

    #[async_trait]
    impl WorkflowApi for MockApi {
        async fn get_workflow(
            &self,
            id: &str,
        ) -> Result<Workflow> {
            Err(FlowCanvasError::Api {
                status: 404,
                message: format!("{} not found", id),
            })
        }

        async fn save_graph(
            &self,
            _id: &str,
            graph: &WorkflowGraph,
        ) -> Result<Option<Workflow>> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if let Some(err) = &self.save_error {
                return Err(err.clone());
            }
            *self.saved.lock().unwrap() = Some(graph.clone());
            Ok(None)
        }

        async fn run(
            &self,
            _id: &str,
            input: &Value,
        ) -> Result<RunResult> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            *self.input.lock().unwrap() = Some(input.clone());
            match &self.run_error {
                Some(err) => Err(err.clone()),
                None => Ok(self.result.clone()),
            }
        }
    }

    fn two_node_canvas() -> (ShareLock<Canvas>, String, String) {
        let mut canvas = Canvas::new(&EditorConfig::default());
        let a = canvas.add_node(AgentType::Llm, Position::new(0.0, 0.0));
        let b = canvas.add_node(AgentType::CodeExec, Position::new(200.0, 0.0));
        canvas.connect(&a, OutputHandle::Default, &b).unwrap();
        (Arc::new(RwLock::new(canvas)), a, b)
    }

    fn completed(
        a: &str,
        b: &str,
    ) -> RunResult {
        RunResult {
            status: RunStatus::Completed,
            node_results: HashMap::from([
                (
                    a.to_string(),
                    NodeRunResult {
                        status: NodeRunStatus::Completed,
                        duration_ms: 80,
                        ..Default::default()
                    },
                ),
                (
                    b.to_string(),
                    NodeRunResult {
                        status: NodeRunStatus::Failed,
                        duration_ms: 120,
                        ..Default::default()
                    },
                ),
            ]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_run_overlays_node_results() {
        let (canvas, a, b) = two_node_canvas();
        let api = Arc::new(MockApi {
            result: completed(&a, &b),
            ..Default::default()
        });
        let controller = RunController::new(api.clone(), "wf-1", false);

        let result = controller.run(&canvas, r#"{"topic": "rust"}"#).await.unwrap();
        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(controller.phase(), RunPhase::Completed);
        assert_eq!(controller.last_result(), Some(result));

        let canvas = canvas.read().unwrap();
        let overlay = canvas.node(&b).unwrap().overlay().unwrap();
        assert_eq!(overlay.status, NodeRunStatus::Failed);
        assert_eq!(overlay.duration_ms, 120);
        assert_eq!(canvas.node(&a).unwrap().overlay().unwrap().status, NodeRunStatus::Completed);

        assert_eq!(api.saves.load(Ordering::SeqCst), 1);
        assert_eq!(*api.input.lock().unwrap(), Some(json!({"topic": "rust"})));
        assert_eq!(api.saved.lock().unwrap().as_ref().unwrap(), &canvas.to_graph());
    }

    #[tokio::test]
    async fn test_empty_canvas_is_rejected() {
        let canvas = Arc::new(RwLock::new(Canvas::default()));
        let api = Arc::new(MockApi::default());
        let controller = RunController::new(api.clone(), "wf-1", false);

        let err = controller.run(&canvas, "{}").await.unwrap_err();
        assert_eq!(err, FlowCanvasError::Rejected(RunRejection::EmptyCanvas));
        assert_eq!(controller.phase(), RunPhase::Idle);
        assert_eq!(api.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_graph_blocks_save() {
        let (canvas, a, _) = two_node_canvas();
        canvas
            .write()
            .unwrap()
            .push_edge_unchecked(CanvasEdge::from_graph_edge(7, &GraphEdge::new(&a, "ghost", OutputHandle::Default)));
        let api = Arc::new(MockApi::default());
        let controller = RunController::new(api.clone(), "wf-1", false);

        let err = controller.run(&canvas, "{}").await.unwrap_err();
        assert!(matches!(err, FlowCanvasError::Validation(ref v) if v.len() == 1));
        assert_eq!(controller.phase(), RunPhase::Errored);
        assert_eq!(api.saves.load(Ordering::SeqCst), 0);
        assert_eq!(api.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_save_failure_skips_run() {
        let (canvas, _, _) = two_node_canvas();
        let api = Arc::new(MockApi {
            save_error: Some(FlowCanvasError::Api {
                status: 500,
                message: "database is down".to_string(),
            }),
            ..Default::default()
        });
        let controller = RunController::new(api.clone(), "wf-1", false);

        let err = controller.run(&canvas, "{}").await.unwrap_err();
        assert!(matches!(err, FlowCanvasError::Persistence(ref m) if m.contains("database is down")));
        assert_eq!(controller.phase(), RunPhase::Errored);
        assert_eq!(api.runs.load(Ordering::SeqCst), 0);
        assert!(canvas.read().unwrap().nodes().iter().all(|n| n.overlay().is_none()));
    }

    #[tokio::test]
    async fn test_run_failure_becomes_error_result() {
        let (canvas, a, b) = two_node_canvas();
        let api = Arc::new(MockApi {
            result: completed(&a, &b),
            ..Default::default()
        });
        let controller = RunController::new(api, "wf-1", false);
        controller.run(&canvas, "{}").await.unwrap();

        let failing = Arc::new(MockApi {
            run_error: Some(FlowCanvasError::Transport("connection reset".to_string())),
            ..Default::default()
        });
        let controller = RunController::new(failing, "wf-1", false);
        let result = controller.run(&canvas, "{}").await.unwrap();
        assert!(result.is_error());
        assert!(result.error.as_deref().unwrap().contains("connection reset"));
        assert_eq!(controller.phase(), RunPhase::Errored);

        // overlays from the previous run stay as they were
        let canvas = canvas.read().unwrap();
        assert_eq!(canvas.node(&b).unwrap().overlay().unwrap().status, NodeRunStatus::Failed);
    }

    #[tokio::test]
    async fn test_remote_error_status_is_not_overlaid() {
        let (canvas, a, b) = two_node_canvas();
        let mut result = completed(&a, &b);
        result.status = RunStatus::Error;
        result.error = Some("executor crashed".to_string());
        let api = Arc::new(MockApi {
            result,
            ..Default::default()
        });
        let controller = RunController::new(api, "wf-1", false);

        let result = controller.run(&canvas, "{}").await.unwrap();
        assert!(result.is_error());
        assert_eq!(controller.phase(), RunPhase::Errored);
        assert!(canvas.read().unwrap().nodes().iter().all(|n| n.overlay().is_none()));
    }

    #[tokio::test]
    async fn test_lenient_and_strict_input() {
        let (canvas, a, b) = two_node_canvas();
        let api = Arc::new(MockApi {
            result: completed(&a, &b),
            ..Default::default()
        });

        let lenient = RunController::new(api.clone(), "wf-1", false);
        lenient.run(&canvas, "{not json").await.unwrap();
        assert_eq!(*api.input.lock().unwrap(), Some(json!({})));

        let strict = RunController::new(api.clone(), "wf-1", true);
        let err = strict.run(&canvas, "[1, 2]").await.unwrap_err();
        assert!(matches!(err, FlowCanvasError::MalformedInput(_)));
        assert_eq!(api.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_run_is_rejected() {
        let (canvas, a, b) = two_node_canvas();
        let api = Arc::new(MockApi {
            result: completed(&a, &b),
            delay_ms: 50,
            ..Default::default()
        });
        let controller = RunController::new(api.clone(), "wf-1", false);

        let (first, second) = tokio::join!(controller.run(&canvas, "{}"), controller.run(&canvas, "{}"));
        assert!(first.is_ok());
        assert_eq!(second.unwrap_err(), FlowCanvasError::Rejected(RunRejection::AlreadyRunning));
        assert_eq!(api.runs.load(Ordering::SeqCst), 1);

        // a finished run does not block the next one
        assert!(controller.run(&canvas, "{}").await.is_ok());
    }

    #[tokio::test]
    async fn test_abandoned_run_releases_phase() {
        let (canvas, a, b) = two_node_canvas();
        let api = Arc::new(MockApi {
            result: completed(&a, &b),
            delay_ms: 200,
            ..Default::default()
        });
        let controller = RunController::new(api.clone(), "wf-1", false);

        let abandoned = tokio::time::timeout(Duration::from_millis(20), controller.run(&canvas, "{}")).await;
        assert!(abandoned.is_err());
        assert_eq!(controller.phase(), RunPhase::Errored);
        assert!(!controller.is_running());
        assert_eq!(api.runs.load(Ordering::SeqCst), 0);

        let result = controller.run(&canvas, "{}").await.unwrap();
        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(controller.phase(), RunPhase::Completed);
        assert_eq!(api.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("", true).unwrap(), json!({}));
        assert_eq!(parse_input(" {\"a\": 1} ", true).unwrap(), json!({"a": 1}));
        assert_eq!(parse_input("42", false).unwrap(), json!({}));
        assert!(matches!(parse_input("42", true), Err(FlowCanvasError::MalformedInput(m)) if m.contains("a number")));
        assert!(parse_input("{", true).is_err());
    }
}
