//! Streaming events.
//!
//! `StreamEvent` is what a streaming turn produces, one per SSE frame.
//! Every payload carries its `type` plus the `thread_id` and `llm_config`
//! of the turn, so a client can correlate frames without extra state.

use librarian_core::message::ThreadId;
use librarian_core::model::ModelConfig;
use serde::Serialize;

/// The kind-specific part of a [`StreamEvent`].
///
/// Wire names:
/// - `stream.start`                 — first event of a turn
/// - `stream.llm_tokens.start`      — a model response began producing text
/// - `stream.llm_tokens.delta`      — one text delta
/// - `stream.llm_tokens.completed`  — the text phase closed, full text attached
/// - `stream.tool_call.start`       — a tool began executing
/// - `stream.tool_call.delta`       — progress reported by the tool
/// - `stream.tool_call.completed`   — the tool finished
/// - `stream.completed`             — the turn ended normally
/// - `stream.error`                 — the turn failed; nothing follows
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum StreamEventKind {
    #[serde(rename = "stream.start")]
    Start,

    #[serde(rename = "stream.llm_tokens.start")]
    LlmTokensStart,

    #[serde(rename = "stream.llm_tokens.delta")]
    LlmTokensDelta { llm_tokens: String },

    #[serde(rename = "stream.llm_tokens.completed")]
    LlmTokensCompleted { llm_tokens: String },

    #[serde(rename = "stream.tool_call.start")]
    ToolCallStart {
        tool_name: String,
        call_id: String,
        metadata: serde_json::Map<String, serde_json::Value>,
    },

    #[serde(rename = "stream.tool_call.delta")]
    ToolCallDelta {
        tool_name: String,
        call_id: String,
        tool_tokens: String,
        metadata: serde_json::Map<String, serde_json::Value>,
    },

    #[serde(rename = "stream.tool_call.completed")]
    ToolCallCompleted {
        tool_name: String,
        call_id: String,
        output: Option<String>,
        metadata: serde_json::Map<String, serde_json::Value>,
    },

    #[serde(rename = "stream.completed")]
    Completed,

    #[serde(rename = "stream.error")]
    Error { error: String },
}

/// One event of a streaming turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamEvent {
    #[serde(flatten)]
    pub kind: StreamEventKind,
    pub thread_id: ThreadId,
    pub llm_config: ModelConfig,
}

impl StreamEvent {
    pub fn new(kind: StreamEventKind, thread_id: ThreadId, llm_config: ModelConfig) -> Self {
        Self {
            kind,
            thread_id,
            llm_config,
        }
    }

    /// SSE event name for this event.
    pub fn event_name(&self) -> &'static str {
        match self.kind {
            StreamEventKind::Start => "stream.start",
            StreamEventKind::LlmTokensStart => "stream.llm_tokens.start",
            StreamEventKind::LlmTokensDelta { .. } => "stream.llm_tokens.delta",
            StreamEventKind::LlmTokensCompleted { .. } => "stream.llm_tokens.completed",
            StreamEventKind::ToolCallStart { .. } => "stream.tool_call.start",
            StreamEventKind::ToolCallDelta { .. } => "stream.tool_call.delta",
            StreamEventKind::ToolCallCompleted { .. } => "stream.tool_call.completed",
            StreamEventKind::Completed => "stream.completed",
            StreamEventKind::Error { .. } => "stream.error",
        }
    }

    /// `stream.completed` or `stream.error`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            StreamEventKind::Completed | StreamEventKind::Error { .. }
        )
    }

    /// JSON payload of the `data:` line.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
