//! An editing session on one workflow.
//!
//! The session owns the canvas and ties it to the workflow api: load
//! hydrates the stored graph, save persists it, run goes through the
//! [`RunController`]. Gestures go through [`EditorSession::with_canvas`] or
//! directly on the shared canvas lock; the lock is never held across a
//! network call.

use std::sync::{Arc, RwLock};

use tracing::info;

use crate::{
    Config, Result, ShareLock,
    canvas::{Canvas, HydrationReport, hydrate},
    model::Workflow,
    run::{HttpWorkflowApi, RunController, RunPhase, RunResult, WorkflowApi, save_graph},
};

pub struct EditorSession {
    config: Config,
    api: Arc<dyn WorkflowApi>,
    canvas: ShareLock<Canvas>,
    workflow: ShareLock<Option<Workflow>>,
    controller: RunController,
}

impl EditorSession {
    /// Starts a session with an empty canvas.
    pub fn new(
        workflow_id: impl Into<String>,
        api: Arc<dyn WorkflowApi>,
        config: Config,
    ) -> Self {
        let controller = RunController::new(api.clone(), workflow_id, config.run.strict_input);
        Self {
            canvas: Arc::new(RwLock::new(Canvas::new(&config.editor))),
            workflow: Arc::new(RwLock::new(None)),
            config,
            api,
            controller,
        }
    }

    /// Starts a session talking to the api configured in `config`.
    pub fn connect(
        workflow_id: impl Into<String>,
        config: Config,
    ) -> Result<Self> {
        let api = Arc::new(HttpWorkflowApi::new(&config.api)?);
        Ok(Self::new(workflow_id, api, config))
    }

    pub fn workflow_id(&self) -> &str {
        self.controller.workflow_id()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The workflow record as last loaded or saved.
    pub fn workflow(&self) -> Option<Workflow> {
        self.workflow.read().ok().and_then(|w| w.clone())
    }

    /// Shared handle to the canvas.
    pub fn canvas(&self) -> ShareLock<Canvas> {
        self.canvas.clone()
    }

    /// Runs a gesture against the canvas.
    pub fn with_canvas<R>(
        &self,
        f: impl FnOnce(&mut Canvas) -> R,
    ) -> Result<R> {
        let mut canvas = self.canvas.write()?;
        Ok(f(&mut canvas))
    }

    /// Fetches the workflow and replaces the canvas with its graph.
    pub async fn load(&self) -> Result<HydrationReport> {
        let workflow = self.api.get_workflow(self.workflow_id()).await?;
        let (canvas, report) = hydrate(&workflow.graph, &self.config.editor);
        info!(
            workflow_id = %self.workflow_id(),
            session = %canvas.session_id(),
            nodes = canvas.nodes().len(),
            faithful = report.is_faithful(),
            "workflow loaded"
        );
        *self.canvas.write()? = canvas;
        *self.workflow.write()? = Some(workflow);
        Ok(report)
    }

    /// Validates and persists the canvas without running it.
    pub async fn save(&self) -> Result<()> {
        let graph = self.canvas.read()?.to_graph();
        let saved = save_graph(self.api.as_ref(), self.workflow_id(), &graph).await?;
        let mut workflow = self.workflow.write()?;
        match saved {
            Some(saved) => *workflow = Some(saved),
            None => {
                if let Some(current) = workflow.as_mut() {
                    current.graph = graph;
                }
            }
        }
        info!(workflow_id = %self.workflow_id(), "workflow saved");
        Ok(())
    }

    /// Saves and runs the canvas, see [`RunController::run`].
    pub async fn run(
        &self,
        input_text: &str,
    ) -> Result<RunResult> {
        self.controller.run(&self.canvas, input_text).await
    }

    pub fn phase(&self) -> RunPhase {
        self.controller.phase()
    }

    pub fn last_result(&self) -> Option<RunResult> {
        self.controller.last_result()
    }

    /// Drops the run overlays from every node.
    pub fn clear_overlays(&self) -> Result<()> {
        self.with_canvas(Canvas::clear_overlays)
    }
}
