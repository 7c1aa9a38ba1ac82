//! Node configuration editor.
//!
//! A [`NodeEditor`] borrows exactly one canvas node and changes its
//! objective or typed configuration in place. There is no commit step: the
//! next save picks the change up. Run overlays are left alone.

use serde_json::Value;
use tracing::trace;

use crate::{
    FlowCanvasError, Result,
    canvas::CanvasNode,
    model::{AgentConfig, AgentType, ConditionOperator, HttpMethod, Overrides},
};

/// Configuration fields editable beyond the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ConfigField {
    SystemPrompt,
    Url,
    Method,
    Field,
    Operator,
    Value,
}

/// Which configuration fields a node type exposes in the editor.
pub fn editable_fields(agent_type: AgentType) -> &'static [ConfigField] {
    match agent_type {
        AgentType::Llm => &[ConfigField::SystemPrompt],
        AgentType::ApiCall => &[ConfigField::Url, ConfigField::Method],
        AgentType::Conditional => &[ConfigField::Field, ConfigField::Operator, ConfigField::Value],
        AgentType::WebSearch | AgentType::CodeExec | AgentType::DataTransform => &[],
    }
}

/// One edit coming from the configuration panel.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEdit {
    Objective(String),
    SystemPrompt(String),
    Url(String),
    Method(HttpMethod),
    Field(String),
    Operator(ConditionOperator),
    Value(Value),
}

impl FieldEdit {
    /// Parses raw text typed into the panel field `name`.
    pub fn parse(
        name: &str,
        raw: &str,
    ) -> Result<Self> {
        if name == "objective" {
            return Ok(FieldEdit::Objective(raw.to_string()));
        }
        let field = name.parse::<ConfigField>().map_err(|_| FlowCanvasError::Editor(format!("unknown field '{}'", name)))?;
        let edit = match field {
            ConfigField::SystemPrompt => FieldEdit::SystemPrompt(raw.to_string()),
            ConfigField::Url => FieldEdit::Url(raw.to_string()),
            ConfigField::Method => FieldEdit::Method(raw.parse().map_err(|_| FlowCanvasError::Editor(format!("invalid method '{}'", raw)))?),
            ConfigField::Field => FieldEdit::Field(raw.to_string()),
            ConfigField::Operator => FieldEdit::Operator(raw.parse().map_err(|_| FlowCanvasError::Editor(format!("invalid operator '{}'", raw)))?),
            ConfigField::Value => FieldEdit::Value(Value::String(raw.to_string())),
        };
        Ok(edit)
    }

    /// The configuration field this edit targets, `None` for the objective.
    pub fn field(&self) -> Option<ConfigField> {
        match self {
            FieldEdit::Objective(_) => None,
            FieldEdit::SystemPrompt(_) => Some(ConfigField::SystemPrompt),
            FieldEdit::Url(_) => Some(ConfigField::Url),
            FieldEdit::Method(_) => Some(ConfigField::Method),
            FieldEdit::Field(_) => Some(ConfigField::Field),
            FieldEdit::Operator(_) => Some(ConfigField::Operator),
            FieldEdit::Value(_) => Some(ConfigField::Value),
        }
    }
}

pub struct NodeEditor<'a> {
    node: &'a mut CanvasNode,
    label_max_chars: usize,
}

impl<'a> NodeEditor<'a> {
    pub(crate) fn new(
        node: &'a mut CanvasNode,
        label_max_chars: usize,
    ) -> Self {
        Self { node, label_max_chars }
    }

    pub fn node(&self) -> &CanvasNode {
        self.node
    }

    pub fn fields(&self) -> &'static [ConfigField] {
        editable_fields(self.node.agent_type())
    }

    /// Sets the objective and recomputes the label.
    pub fn set_objective(
        &mut self,
        objective: impl Into<String>,
    ) {
        self.node.objective = objective.into();
        self.node.relabel(self.label_max_chars);
    }

    /// Parses and applies a raw panel value, see [`FieldEdit::parse`].
    pub fn set(
        &mut self,
        name: &str,
        raw: &str,
    ) -> Result<()> {
        self.apply(FieldEdit::parse(name, raw)?)
    }

    /// Applies one edit. Fields the node's type does not expose are rejected
    /// and leave the node untouched. Empty text clears the field.
    pub fn apply(
        &mut self,
        edit: FieldEdit,
    ) -> Result<()> {
        let agent_type = self.node.agent_type();
        let field: &'static str = edit.field().map(<&'static str>::from).unwrap_or("objective");
        trace!(node = %self.node.id, field, "editing node");

        if let FieldEdit::Objective(objective) = edit {
            self.set_objective(objective);
            return Ok(());
        }

        match (edit, &mut self.node.config) {
            (FieldEdit::SystemPrompt(s), AgentConfig::Llm(c)) => c.system_prompt = text(&mut c.extra, "system_prompt", s),
            (FieldEdit::Url(s), AgentConfig::ApiCall(c)) => c.url = text(&mut c.extra, "url", s),
            (FieldEdit::Method(m), AgentConfig::ApiCall(c)) => {
                c.extra.remove("method");
                c.method = Some(m);
            }
            (FieldEdit::Field(s), AgentConfig::Conditional(c)) => c.field = text(&mut c.extra, "field", s),
            (FieldEdit::Operator(op), AgentConfig::Conditional(c)) => {
                c.extra.remove("operator");
                c.operator = Some(op);
            }
            (FieldEdit::Value(v), AgentConfig::Conditional(c)) => {
                c.extra.remove("value");
                c.value = Some(v);
            }
            (_, _) => {
                return Err(FlowCanvasError::Editor(format!("{} nodes have no '{}' field", agent_type.as_ref(), field)));
            }
        }
        Ok(())
    }
}

/// Moves a text field out of the pass-through map and returns its new typed value.
fn text(
    extra: &mut Overrides,
    key: &str,
    value: String,
) -> Option<String> {
    extra.remove(key);
    if value.is_empty() { None } else { Some(value) }
}
