use std::{fs, path::Path};

use serde::Deserialize;

use crate::{FlowCanvasError, Result};

/// Default number of objective characters shown as a node label.
pub const DEFAULT_LABEL_MAX_CHARS: usize = 40;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// workflow api config
    pub api: ApiConfig,
    /// canvas editing config
    pub editor: EditorConfig,
    /// run controller config
    pub run: RunConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// base url of the workflow api, e.g. `http://localhost:8000/api`
    pub base_url: String,
    /// bearer token sent with every request
    pub token: Option<String>,
    /// request timeout in milliseconds, defaults to 30000
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// number of objective characters used for a node label, defaults to 40
    pub label_max_chars: usize,
    /// prefix for node ids minted on the canvas, defaults to `node_`
    pub node_id_prefix: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// reject malformed run input instead of sending an empty object
    pub strict_input: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            token: None,
            request_timeout_ms: 30_000,
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            label_max_chars: DEFAULT_LABEL_MAX_CHARS,
            node_id_prefix: "node_".to_string(),
        }
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref())
            .map_err(|e| FlowCanvasError::Config(format!("failed to load config file {:?}: {}", path.as_ref(), e)))?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config = toml::from_str::<Config>(toml_str)?;
        if config.editor.label_max_chars == 0 {
            return Err(FlowCanvasError::Config("editor.label_max_chars must be greater than 0".to_string()));
        }
        Ok(config)
    }
}
