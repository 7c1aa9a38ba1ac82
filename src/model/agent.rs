//! Typed agent configuration.
//!
//! Persisted nodes carry an `agent_type` tag and an untyped
//! `config_overrides` map. On the canvas every node instead holds an
//! [`AgentConfig`], a closed variant per agent type with its own typed
//! fields. Keys a variant does not know about are kept in a pass-through
//! map so nothing is lost between load and save.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::model::edge::OutputHandle;

/// Untyped per-node configuration as persisted.
pub type Overrides = Map<String, Value>;

/// The fixed set of agent kinds a node can be.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumString, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgentType {
    #[default]
    Llm,
    WebSearch,
    CodeExec,
    ApiCall,
    DataTransform,
    Conditional,
}

const DEFAULT_HANDLES: &[OutputHandle] = &[OutputHandle::Default];
const BRANCH_HANDLES: &[OutputHandle] = &[OutputHandle::True, OutputHandle::False];

impl AgentType {
    /// Output handles a node of this type exposes.
    pub fn handles(&self) -> &'static [OutputHandle] {
        match self {
            AgentType::Conditional => BRANCH_HANDLES,
            _ => DEFAULT_HANDLES,
        }
    }

    /// Whether edges may leave a node of this type through `handle`.
    pub fn exposes(
        &self,
        handle: OutputHandle,
    ) -> bool {
        self.handles().contains(&handle)
    }

    /// Whether this type routes flow through named branches.
    pub fn is_branching(&self) -> bool {
        !self.exposes(OutputHandle::Default)
    }
}

/// HTTP method of an `api_call` node.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[strum(ascii_case_insensitive)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
}

/// Comparison applied by a `conditional` node.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConditionOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    NotContains,
    IsEmpty,
    IsNotEmpty,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct LlmConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(flatten)]
    pub extra: Overrides,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ApiCallConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    #[serde(flatten)]
    pub extra: Overrides,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ConditionalConfig {
    /// dot path into the upstream output, e.g. `fetch.status`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<ConditionOperator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(flatten)]
    pub extra: Overrides,
}

/// Typed configuration of a node, one variant per [`AgentType`].
///
/// `web_search`, `code_exec` and `data_transform` have no editable fields;
/// their configuration comes from the referenced agent definition, so they
/// only carry the pass-through map.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentConfig {
    Llm(LlmConfig),
    WebSearch(Overrides),
    CodeExec(Overrides),
    ApiCall(ApiCallConfig),
    DataTransform(Overrides),
    Conditional(ConditionalConfig),
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig::new(AgentType::default())
    }
}

impl AgentConfig {
    /// Empty configuration for a freshly created node.
    pub fn new(agent_type: AgentType) -> Self {
        match agent_type {
            AgentType::Llm => AgentConfig::Llm(LlmConfig::default()),
            AgentType::WebSearch => AgentConfig::WebSearch(Overrides::new()),
            AgentType::CodeExec => AgentConfig::CodeExec(Overrides::new()),
            AgentType::ApiCall => AgentConfig::ApiCall(ApiCallConfig::default()),
            AgentType::DataTransform => AgentConfig::DataTransform(Overrides::new()),
            AgentType::Conditional => AgentConfig::Conditional(ConditionalConfig::default()),
        }
    }

    /// Builds the typed configuration from persisted overrides.
    ///
    /// Never loses data: when a known key has a value of the wrong shape
    /// (e.g. `method = "PATCH"`) the typed fields stay empty, every key is
    /// kept in the pass-through map, and the parse error is returned
    /// alongside so the caller can report the node.
    pub fn from_overrides(
        agent_type: AgentType,
        overrides: Overrides,
    ) -> (Self, Option<String>) {
        match agent_type {
            AgentType::Llm => {
                let (config, issue) = typed(overrides, |extra| LlmConfig {
                    extra,
                    ..Default::default()
                });
                (AgentConfig::Llm(config), issue)
            }
            AgentType::ApiCall => {
                let (config, issue) = typed(overrides, |extra| ApiCallConfig {
                    extra,
                    ..Default::default()
                });
                (AgentConfig::ApiCall(config), issue)
            }
            AgentType::Conditional => {
                let (config, issue) = typed(overrides, |extra| ConditionalConfig {
                    extra,
                    ..Default::default()
                });
                (AgentConfig::Conditional(config), issue)
            }
            AgentType::WebSearch => (AgentConfig::WebSearch(overrides), None),
            AgentType::CodeExec => (AgentConfig::CodeExec(overrides), None),
            AgentType::DataTransform => (AgentConfig::DataTransform(overrides), None),
        }
    }

    /// Flattens the typed configuration back into persisted overrides.
    pub fn to_overrides(&self) -> Overrides {
        match self {
            AgentConfig::Llm(c) => to_map(c),
            AgentConfig::ApiCall(c) => to_map(c),
            AgentConfig::Conditional(c) => to_map(c),
            AgentConfig::WebSearch(m) | AgentConfig::CodeExec(m) | AgentConfig::DataTransform(m) => m.clone(),
        }
    }

    pub fn agent_type(&self) -> AgentType {
        match self {
            AgentConfig::Llm(_) => AgentType::Llm,
            AgentConfig::WebSearch(_) => AgentType::WebSearch,
            AgentConfig::CodeExec(_) => AgentType::CodeExec,
            AgentConfig::ApiCall(_) => AgentType::ApiCall,
            AgentConfig::DataTransform(_) => AgentType::DataTransform,
            AgentConfig::Conditional(_) => AgentType::Conditional,
        }
    }

    /// Output handles of the node this configuration belongs to.
    pub fn handles(&self) -> &'static [OutputHandle] {
        self.agent_type().handles()
    }
}

/// Typed configs that carry a pass-through map.
trait PassThrough {
    fn extra_mut(&mut self) -> &mut Overrides;
}

impl PassThrough for LlmConfig {
    fn extra_mut(&mut self) -> &mut Overrides {
        &mut self.extra
    }
}

impl PassThrough for ApiCallConfig {
    fn extra_mut(&mut self) -> &mut Overrides {
        &mut self.extra
    }
}

impl PassThrough for ConditionalConfig {
    fn extra_mut(&mut self) -> &mut Overrides {
        &mut self.extra
    }
}

/// Keys stored as an explicit `null` stay in the pass-through map, since an
/// empty typed field is not written back.
fn typed<T: DeserializeOwned + PassThrough>(
    overrides: Overrides,
    fallback: impl FnOnce(Overrides) -> T,
) -> (T, Option<String>) {
    let (nulls, values): (Overrides, Overrides) = overrides.iter().map(|(k, v)| (k.clone(), v.clone())).partition(|(_, v)| v.is_null());
    match serde_json::from_value::<T>(Value::Object(values)) {
        Ok(mut config) => {
            config.extra_mut().extend(nulls);
            (config, None)
        }
        Err(e) => (fallback(overrides), Some(e.to_string())),
    }
}

fn to_map<T: Serialize>(config: &T) -> Overrides {
    match serde_json::to_value(config) {
        Ok(Value::Object(map)) => map,
        _ => Overrides::new(),
    }
}
