//! # Flowcanvas
//!
//! Flowcanvas is the editing core of a visual workflow builder: a canvas of
//! agent nodes and directed edges that maps losslessly onto a persisted
//! workflow graph, plus the save-then-run loop that executes it remotely
//! and paints per-node results back onto the canvas.
//!
//! ## Core Features
//!
//! - **Typed Graph Schema**: Agent types, per-type configuration and branch handles checked at the type level
//! - **Lossless Adapter**: Hydrate and dehydrate between the persisted graph and the canvas, with a report of anything that will not round-trip
//! - **Node Editing**: Per-type configuration fields edited through a single typed entry point
//! - **Run Controller**: Save, run and overlay results with rejection of empty canvases and concurrent runs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flowcanvas::{Config, EditorSession, model::{AgentType, OutputHandle, Position}};
//!
//! let session = EditorSession::connect("wf-1", Config::create("flowcanvas.toml")?)?;
//! session.load().await?;
//!
//! session.with_canvas(|canvas| {
//!     let a = canvas.add_node(AgentType::WebSearch, Position::new(0.0, 0.0));
//!     let b = canvas.add_node(AgentType::Llm, Position::new(240.0, 0.0));
//!     canvas.connect(&a, OutputHandle::Default, &b)
//! })??;
//!
//! let result = session.run(r#"{"topic": "rust"}"#).await?;
//! ```

pub mod canvas;
mod config;
pub mod editor;
mod error;
pub mod model;
pub mod run;
mod session;
mod utils;

use std::sync::{Arc, RwLock};

pub use canvas::{Canvas, HydrationReport};
pub use config::{ApiConfig, Config, EditorConfig, RunConfig};
pub use error::FlowCanvasError;
pub use run::{HttpWorkflowApi, RunController, RunPhase, RunResult, WorkflowApi};
pub use session::EditorSession;

/// Result type alias for flowcanvas operations.
pub type Result<T> = std::result::Result<T, FlowCanvasError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub type ShareLock<T> = Arc<RwLock<T>>;
