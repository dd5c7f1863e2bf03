//! Tool progress channel.
//!
//! Every tool invocation gets its own [`ToolProgress`] handle. A running tool
//! reports zero or more progress frames and at most one completion frame
//! through it. The handle is passed to [`Tool::execute`](crate::tool::Tool::execute)
//! and is also reachable through [`ToolProgress::current`] while the
//! invocation is in flight.
//!
//! Frame lifecycle per invocation:
//!
//! ```text
//! start ─► delta* ─► completed
//! ```
//!
//! Misuse (progress after completion, a second completion) poisons the
//! handle, and the registry then fails the invocation.

use std::future::Future;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    Start,
    Delta,
    Completed,
}

/// One frame emitted on behalf of a running tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFrame {
    #[serde(rename = "type")]
    pub kind: FrameKind,
    pub tool_name: String,
    pub call_id: String,
    /// Progress text for `Delta`, final output for `Completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_tokens: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Destination for tool frames. Implemented by the agent's signal channel.
pub trait FrameSink: Send + Sync {
    fn deliver(&self, frame: ToolFrame);
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Pending,
    Running,
    Completed,
    Poisoned(String),
}

tokio::task_local! {
    static CURRENT_PROGRESS: Arc<ToolProgress>;
}

/// Per-invocation progress handle. Never shared between invocations.
pub struct ToolProgress {
    tool_name: String,
    call_id: String,
    sink: Option<Arc<dyn FrameSink>>,
    phase: Mutex<Phase>,
}

impl std::fmt::Debug for ToolProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolProgress")
            .field("tool_name", &self.tool_name)
            .field("call_id", &self.call_id)
            .field("attached", &self.sink.is_some())
            .finish()
    }
}

impl ToolProgress {
    /// A handle whose frames are delivered to `sink`.
    pub fn new(tool_name: impl Into<String>, call_id: impl Into<String>, sink: Arc<dyn FrameSink>) -> Self {
        Self {
            tool_name: tool_name.into(),
            call_id: call_id.into(),
            sink: Some(sink),
            phase: Mutex::new(Phase::Pending),
        }
    }

    /// A handle that enforces the same lifecycle but drops every frame.
    /// Used in blocking mode.
    pub fn detached(tool_name: impl Into<String>, call_id: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            call_id: call_id.into(),
            sink: None,
            phase: Mutex::new(Phase::Pending),
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Emit the start frame. Called by the registry before the tool runs.
    pub fn start(&self) -> Result<(), ToolError> {
        let mut phase = self.lock();
        if *phase != Phase::Pending {
            return Err(self.poison(&mut phase, "start called twice"));
        }
        *phase = Phase::Running;
        self.emit(FrameKind::Start, None, serde_json::Map::new());
        Ok(())
    }

    /// Report intermediate progress.
    pub fn send_progress(
        &self,
        tool_tokens: impl Into<String>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), ToolError> {
        let mut phase = self.lock();
        match phase.clone() {
            Phase::Running => {
                self.emit(FrameKind::Delta, Some(tool_tokens.into()), metadata);
                Ok(())
            }
            Phase::Pending => Err(self.poison(&mut phase, "progress sent before start")),
            Phase::Completed => Err(self.poison(&mut phase, "progress sent after completion")),
            Phase::Poisoned(reason) => Err(self.misuse(reason)),
        }
    }

    /// Report completion. At most once per invocation.
    pub fn send_complete(
        &self,
        output: Option<String>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), ToolError> {
        let mut phase = self.lock();
        match phase.clone() {
            Phase::Running => {
                *phase = Phase::Completed;
                self.emit(FrameKind::Completed, output, metadata);
                Ok(())
            }
            Phase::Pending => Err(self.poison(&mut phase, "completion sent before start")),
            Phase::Completed => Err(self.poison(&mut phase, "completion sent twice")),
            Phase::Poisoned(reason) => Err(self.misuse(reason)),
        }
    }

    /// Close the invocation after the tool returned successfully.
    ///
    /// Synthesizes a payload-less completion frame if the tool never sent one.
    /// Fails if the handle was poisoned, even when the tool ignored the error.
    pub fn finish(&self) -> Result<(), ToolError> {
        let mut phase = self.lock();
        match phase.clone() {
            Phase::Running => {
                *phase = Phase::Completed;
                self.emit(FrameKind::Completed, None, serde_json::Map::new());
                Ok(())
            }
            Phase::Completed => Ok(()),
            Phase::Pending => Err(self.poison(&mut phase, "finished before start")),
            Phase::Poisoned(reason) => Err(self.misuse(reason)),
        }
    }

    pub fn is_completed(&self) -> bool {
        *self.lock() == Phase::Completed
    }

    /// The handle of the invocation currently running on this task.
    pub fn current() -> Result<Arc<ToolProgress>, ToolError> {
        CURRENT_PROGRESS.try_with(Arc::clone).map_err(|_| {
            ToolError::ChannelUnavailable("progress requested outside of a tool invocation".into())
        })
    }

    /// Run `fut` with this handle installed as [`ToolProgress::current`].
    /// The slot is cleared when `fut` finishes or is dropped.
    pub async fn scope<F>(self: Arc<Self>, fut: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_PROGRESS.scope(self, fut).await
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn poison(&self, phase: &mut Phase, reason: &str) -> ToolError {
        warn!(tool = %self.tool_name, call_id = %self.call_id, reason, "Tool progress misuse");
        *phase = Phase::Poisoned(reason.to_string());
        self.misuse(reason.to_string())
    }

    fn misuse(&self, reason: String) -> ToolError {
        ToolError::ProgressMisuse {
            tool_name: self.tool_name.clone(),
            reason,
        }
    }

    fn emit(
        &self,
        kind: FrameKind,
        tool_tokens: Option<String>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) {
        if let Some(sink) = &self.sink {
            sink.deliver(ToolFrame {
                kind,
                tool_name: self.tool_name.clone(),
                call_id: self.call_id.clone(),
                tool_tokens,
                metadata,
            });
        }
    }
}
