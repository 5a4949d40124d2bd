//! Tool trait and registry.
//!
//! Tools are the local functions a model can ask for mid-stream. The vendor
//! adapter collects the requested calls, the turn dispatches them through
//! the [`ToolRegistry`], and the results are replayed to the model in the
//! next request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::ToolError;

/// A function declaration sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The function name
    pub name: String,

    /// Description of what the function does
    #[serde(default)]
    pub description: String,

    /// JSON Schema describing the function's parameters
    #[serde(default = "empty_object_schema")]
    pub parameters: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Vendor call id, or a generated `call_<uuid>` when the vendor sends none
    pub id: String,

    pub name: String,

    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// A call with a freshly generated id.
    pub fn generated(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            arguments,
        }
    }
}

/// The value a handler returned for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call: ToolCall,
    pub return_value: String,
}

/// One batch of calls from a single streamed response plus their results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolRound {
    /// Text the model produced alongside the calls
    #[serde(default)]
    pub text: String,

    pub results: Vec<ToolResult>,
}

/// A locally executable function.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The exact name the model uses to call this tool.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the argument object.
    fn parameters_schema(&self) -> Value;

    /// Run the tool. Arguments have already been validated.
    async fn execute(&self, arguments: Map<String, Value>) -> Result<String, ToolError>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

type Handler = dyn Fn(Map<String, Value>) -> Result<String, ToolError> + Send + Sync;

/// Adapts a plain closure into a [`Tool`].
pub struct FnTool {
    name: String,
    description: String,
    schema: Value,
    handler: Arc<Handler>,
}

impl FnTool {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, schema: Value, handler: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            handler: Arc::new(handler),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<String, ToolError> {
        (self.handler)(arguments)
    }
}

/// Name → handler map for one app.
///
/// Immutable once the app is built; shared across turns behind an `Arc`.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Definitions of every registered tool, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<_> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Keep only the named tools.
    pub fn restricted_to<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Self {
        let tools = names
            .into_iter()
            .filter_map(|n| self.tools.get(n).map(|t| (n.to_string(), Arc::clone(t))))
            .collect();
        Self { tools }
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Look up, validate and run one call.
    ///
    /// `null` arguments are dropped before validation.
    pub async fn dispatch(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        let arguments: Map<String, Value> = call
            .arguments
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        validate_arguments(&call.name, &tool.parameters_schema(), &arguments)?;

        debug!(tool = %call.name, "Dispatching tool call");
        let return_value = tool.execute(arguments).await?;

        Ok(ToolResult {
            call: call.clone(),
            return_value,
        })
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

/// Check an argument object against a function's declared parameters.
///
/// Every `required` key must be present. Unless the schema sets
/// `additionalProperties: true`, every supplied key must be a declared
/// property.
pub fn validate_arguments(
    tool_name: &str,
    schema: &Value,
    arguments: &Map<String, Value>,
) -> Result<(), ToolError> {
    let invalid = |reason: String| ToolError::InvalidArguments {
        tool_name: tool_name.to_string(),
        reason,
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !arguments.contains_key(key) {
                return Err(invalid(format!("missing required argument '{key}'")));
            }
        }
    }

    let open = schema
        .get("additionalProperties")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !open {
        let declared = schema.get("properties").and_then(Value::as_object);
        for key in arguments.keys() {
            if !declared.is_some_and(|p| p.contains_key(key)) {
                return Err(invalid(format!("unexpected argument '{key}'")));
            }
        }
    }

    Ok(())
}
