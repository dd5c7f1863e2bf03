//! In-memory store — the default, and what the tests use.

use async_trait::async_trait;
use librarian_core::checkpoint::{CheckpointStore, ConversationState};
use librarian_core::error::CheckpointError;
use librarian_core::message::ThreadId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Keeps one state per thread in a map. Lost when the process exits.
pub struct InMemoryCheckpointStore {
    states: Arc<RwLock<HashMap<ThreadId, ConversationState>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of threads saved so far.
    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }
}

impl Default for InMemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self, thread_id: &ThreadId) -> Result<Option<ConversationState>, CheckpointError> {
        Ok(self.states.read().await.get(thread_id).cloned())
    }

    async fn save(&self, thread_id: &ThreadId, state: &ConversationState) -> Result<(), CheckpointError> {
        self.states
            .write()
            .await
            .insert(thread_id.clone(), state.clone());
        Ok(())
    }
}
