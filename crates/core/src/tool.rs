//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! look up the weather, read the clock, query an index, etc.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::error::ToolError;
use crate::message::ToolCallRequest;
use crate::progress::ToolProgress;
use crate::provider::ToolDefinition;

/// The core Tool trait.
///
/// Each tool implements this trait and is registered once in a
/// [`ToolRegistry`]. The registry is immutable after startup.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "weather_lookup").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool.
    ///
    /// `progress` is this invocation's progress handle; the start frame has
    /// already been sent when this is called.
    async fn execute(
        &self,
        arguments: serde_json::Map<String, serde_json::Value>,
        progress: &ToolProgress,
    ) -> std::result::Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// One argument of a tool, flattened from its JSON schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolArg {
    pub arg: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
}

/// Public description of a registered tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub args_schema: Vec<ToolArg>,
}

/// Flatten the top-level `properties` of a JSON schema into [`ToolArg`]s.
/// Untyped properties are reported as `string`.
fn schema_args(schema: &serde_json::Value) -> Vec<ToolArg> {
    let required: Vec<&str> = schema["required"]
        .as_array()
        .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    schema["properties"]
        .as_object()
        .map(|props| {
            props
                .iter()
                .map(|(name, details)| ToolArg {
                    arg: name.clone(),
                    kind: details["type"].as_str().unwrap_or("string").to_string(),
                    description: details["description"].as_str().map(String::from),
                    required: required.contains(&name.as_str()),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// A registry of available tools.
///
/// The agent loop uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Look up and execute tools when the LLM requests them
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool definitions (for sending to the LLM), ordered by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    pub fn infos(&self) -> Vec<ToolInfo> {
        self.tools
            .values()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
                args_schema: schema_args(&t.parameters_schema()),
            })
            .collect()
    }

    /// Execute one tool call through its progress handle.
    ///
    /// Sends the start frame, runs the tool with the handle installed as the
    /// ambient [`ToolProgress::current`], then closes the invocation. A tool
    /// failure sends no completion frame.
    pub async fn execute(
        &self,
        call: &ToolCallRequest,
        progress: Arc<ToolProgress>,
    ) -> std::result::Result<String, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        debug!(tool = %call.name, call_id = %call.id, "Executing tool");
        progress.start()?;
        let output = progress
            .clone()
            .scope(tool.execute(call.arguments.clone(), &progress))
            .await?;
        progress.finish()?;
        Ok(output)
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
