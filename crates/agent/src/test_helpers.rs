//! Shared test helpers for agent loop tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use librarian_checkpoint::InMemoryCheckpointStore;
use librarian_core::error::{Error, ProviderError, Result, ToolError};
use librarian_core::message::{Message, ToolCallRequest};
use librarian_core::model::{ChunkStream, ModelConfig, ModelGateway};
use librarian_core::progress::ToolProgress;
use librarian_core::provider::{StreamChunk, ToolDefinition};
use librarian_core::tool::{Tool, ToolRegistry};
use tokio::sync::mpsc;

use crate::loop_runner::AgentLoop;

/// One scripted model response.
#[derive(Clone)]
pub enum Step {
    /// Answer with this message. Streamed as one delta plus the final chunk.
    Reply(Message),
    /// Stream these deltas, then finish with the given tool calls.
    Deltas(Vec<&'static str>, Vec<ToolCallRequest>),
    /// Fail the call.
    Fail(ProviderError),
    /// Stream these deltas, then never finish.
    Stall(Vec<&'static str>),
}

/// A gateway that plays back a script, one step per call.
///
/// Panics if more calls are made than steps provided.
pub struct ScriptedGateway {
    steps: Mutex<Vec<Step>>,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedGateway {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// Message log passed to call number `n`.
    pub fn seen(&self, n: usize) -> Vec<Message> {
        self.seen.lock().unwrap()[n].clone()
    }

    fn next(&self, messages: &[Message]) -> Step {
        let mut seen = self.seen.lock().unwrap();
        let steps = self.steps.lock().unwrap();
        let step = steps
            .get(seen.len())
            .cloned()
            .unwrap_or_else(|| panic!("ScriptedGateway: no step for call #{}", seen.len()));
        seen.push(messages.to_vec());
        step
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn invoke(
        &self,
        _config: &ModelConfig,
        messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> Result<Message> {
        match self.next(messages) {
            Step::Reply(message) => Ok(message),
            Step::Deltas(deltas, calls) => Ok(assemble(&deltas, calls)),
            Step::Fail(err) => Err(Error::ModelInvocation(err)),
            Step::Stall(_) => std::future::pending().await,
        }
    }

    async fn stream(
        &self,
        _config: &ModelConfig,
        messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> Result<ChunkStream> {
        let (deltas, calls, stall) = match self.next(messages) {
            Step::Reply(message) => match message {
                Message::Assistant {
                    content, tool_calls, ..
                } => (vec![content], tool_calls, false),
                other => {
                    return Err(Error::RoutingInvariant {
                        found: other.role().to_string(),
                    });
                }
            },
            Step::Deltas(deltas, calls) => (deltas.into_iter().map(String::from).collect(), calls, false),
            Step::Fail(err) => return Err(Error::ModelInvocation(err)),
            Step::Stall(deltas) => (deltas.into_iter().map(String::from).collect(), Vec::new(), true),
        };

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            for delta in deltas.into_iter().filter(|d| !d.is_empty()) {
                if tx.send(Ok(StreamChunk::delta(delta))).await.is_err() {
                    return;
                }
            }
            if stall {
                tx.closed().await;
                return;
            }
            let finish_reason = if calls.is_empty() { "stop" } else { "tool_calls" };
            let _ = tx
                .send(Ok(StreamChunk {
                    tool_calls: calls,
                    finish_reason: Some(finish_reason.into()),
                    done: true,
                    ..Default::default()
                }))
                .await;
        });
        Ok(rx)
    }
}

fn assemble(deltas: &[&str], calls: Vec<ToolCallRequest>) -> Message {
    let content = deltas.concat();
    if calls.is_empty() {
        Message::assistant(content)
    } else {
        Message::assistant_with_tools(content, calls)
    }
}

pub fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCallRequest {
    ToolCallRequest::new(id, name, args.as_object().cloned().unwrap_or_default())
}

/// An assistant message requesting the given tool calls.
pub fn tool_request(calls: Vec<ToolCallRequest>) -> Step {
    Step::Reply(Message::assistant_with_tools("", calls))
}

pub fn answer(text: &str) -> Step {
    Step::Reply(Message::assistant(text))
}

/// Reports one progress frame, then returns a fixed forecast.
pub struct GetWeatherTool;

#[async_trait]
impl Tool for GetWeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Weather for a location"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "location": { "type": "string" } },
            "required": ["location"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Map<String, serde_json::Value>,
        progress: &ToolProgress,
    ) -> std::result::Result<String, ToolError> {
        let location = arguments
            .get("location")
            .and_then(|v| v.as_str())
            .unwrap_or("nowhere");
        progress.send_progress(format!("Checking {location}"), serde_json::Map::new())?;
        Ok("Sunny, 25C".into())
    }
}

/// Always fails.
pub struct BrokenTool;

#[async_trait]
impl Tool for BrokenTool {
    fn name(&self) -> &str {
        "broken"
    }

    fn description(&self) -> &str {
        "Fails every time"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(
        &self,
        _arguments: serde_json::Map<String, serde_json::Value>,
        _progress: &ToolProgress,
    ) -> std::result::Result<String, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: "broken".into(),
            reason: "backend unreachable".into(),
        })
    }
}

/// Reports one progress frame, then never returns.
pub struct StuckTool;

#[async_trait]
impl Tool for StuckTool {
    fn name(&self) -> &str {
        "stuck"
    }

    fn description(&self) -> &str {
        "Starts and never finishes"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(
        &self,
        _arguments: serde_json::Map<String, serde_json::Value>,
        progress: &ToolProgress,
    ) -> std::result::Result<String, ToolError> {
        progress.send_progress("Searching the stacks", serde_json::Map::new())?;
        std::future::pending().await
    }
}

pub fn registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(GetWeatherTool));
    registry.register(Box::new(BrokenTool));
    registry.register(Box::new(StuckTool));
    Arc::new(registry)
}

pub struct Harness {
    pub agent: Arc<AgentLoop>,
    pub gateway: Arc<ScriptedGateway>,
    pub store: Arc<InMemoryCheckpointStore>,
}

pub fn harness(steps: Vec<Step>) -> Harness {
    let gateway = Arc::new(ScriptedGateway::new(steps));
    let store = Arc::new(InMemoryCheckpointStore::new());
    let agent = Arc::new(AgentLoop::new(gateway.clone(), registry(), store.clone()));
    Harness {
        agent,
        gateway,
        store,
    }
}
