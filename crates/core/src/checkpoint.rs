//! Conversation state and the checkpoint contract.
//!
//! A [`ConversationState`] is the unit of persistence. The agent loop loads
//! it at the start of a turn and saves it once the turn ends, fatally or not.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CheckpointError, Error, Result};
use crate::message::{Message, ThreadId, UsedTool};
use crate::model::ModelConfig;

/// Everything the runtime remembers about one thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub thread_id: ThreadId,

    /// Ordered, append-only within a turn.
    pub messages: Vec<Message>,

    pub llm_config: ModelConfig,

    /// Tools executed during the current turn. Reset when a turn starts.
    #[serde(default)]
    pub used_tools: Vec<UsedTool>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(thread_id: ThreadId, llm_config: ModelConfig) -> Self {
        let now = Utc::now();
        Self {
            thread_id,
            messages: Vec::new(),
            llm_config,
            used_tools: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message.
    ///
    /// A `ToolResult` must answer a call issued by an earlier assistant message.
    pub fn push(&mut self, message: Message) -> Result<()> {
        if let Message::ToolResult { call_id, .. } = &message {
            let known = self
                .messages
                .iter()
                .rev()
                .flat_map(|m| m.tool_calls())
                .any(|c| &c.id == call_id);
            if !known {
                return Err(Error::OrphanToolResult {
                    call_id: call_id.clone(),
                });
            }
        }
        self.updated_at = Utc::now();
        self.messages.push(message);
        Ok(())
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn reset_used_tools(&mut self) {
        self.used_tools.clear();
    }
}

/// Loads and saves conversation state keyed by thread.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Backend name (e.g., "memory", "file").
    fn name(&self) -> &str;

    /// `None` when the thread has never been saved.
    async fn load(&self, thread_id: &ThreadId) -> std::result::Result<Option<ConversationState>, CheckpointError>;

    async fn save(&self, thread_id: &ThreadId, state: &ConversationState) -> std::result::Result<(), CheckpointError>;
}
