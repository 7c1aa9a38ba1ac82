//! Error types for flowcanvas.
//!
//! All errors are represented by the `FlowCanvasError` enum. The variants
//! follow the failure categories of an editing session: a graph that does
//! not validate, a save that fails, a run that fails, and the plumbing
//! errors underneath them.

use std::sync::PoisonError;

use thiserror::Error;

use crate::{model::Violation, run::RunRejection};

/// Unified error type for all flowcanvas operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowCanvasError {
    /// The graph breaks one or more schema invariants; save is blocked.
    #[error("graph has {} violation(s): {}", .0.len(), join_violations(.0))]
    Validation(Vec<Violation>),

    /// Persisting the graph failed; the run was not attempted.
    #[error("save failed: {0}")]
    Persistence(String),

    /// The remote run failed or reported an error.
    #[error("run failed: {0}")]
    Execution(String),

    /// The user supplied run input could not be parsed as a JSON object.
    #[error("malformed run input: {0}")]
    MalformedInput(String),

    /// A run was refused before anything was sent.
    #[error("run rejected: {0}")]
    Rejected(RunRejection),

    /// Non-2xx response from the workflow API.
    #[error("api error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
    },

    /// Transport level failure talking to the workflow API.
    #[error("{0}")]
    Transport(String),

    /// Configuration parsing errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON, TOML).
    #[error("{0}")]
    Convert(String),

    /// Canvas gesture errors (unknown node, miswired connection).
    #[error("{0}")]
    Canvas(String),

    /// Node configuration editing errors.
    #[error("{0}")]
    Editor(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),
}

fn join_violations(violations: &[Violation]) -> String {
    violations.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("; ")
}

impl From<FlowCanvasError> for String {
    fn from(val: FlowCanvasError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for FlowCanvasError {
    fn from(error: std::io::Error) -> Self {
        FlowCanvasError::IoError(error.to_string())
    }
}

impl From<serde_json::Error> for FlowCanvasError {
    fn from(error: serde_json::Error) -> Self {
        FlowCanvasError::Convert(error.to_string())
    }
}

impl From<toml::de::Error> for FlowCanvasError {
    fn from(error: toml::de::Error) -> Self {
        FlowCanvasError::Config(error.to_string())
    }
}

impl From<reqwest::Error> for FlowCanvasError {
    fn from(error: reqwest::Error) -> Self {
        FlowCanvasError::Transport(error.to_string())
    }
}

impl<T> From<PoisonError<T>> for FlowCanvasError {
    fn from(_: PoisonError<T>) -> Self {
        FlowCanvasError::Canvas("canvas lock poisoned".to_string())
    }
}
