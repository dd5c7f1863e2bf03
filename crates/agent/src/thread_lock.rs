//! Per-thread turn serialization.
//!
//! A turn holds its thread's guard from checkpoint load to checkpoint save,
//! so two turns on the same thread never interleave. Turns on different
//! threads do not contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use librarian_core::message::ThreadId;
use tokio::sync::OwnedMutexGuard;

pub type ThreadGuard = OwnedMutexGuard<()>;

#[derive(Default)]
pub struct ThreadLocks {
    locks: Mutex<HashMap<ThreadId, Arc<tokio::sync::Mutex<()>>>>,
}

impl ThreadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `thread_id`. Released when the guard drops.
    pub async fn acquire(&self, thread_id: &ThreadId) -> ThreadGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Entries nobody holds or waits on are dropped.
            locks.retain(|id, lock| id == thread_id || Arc::strong_count(lock) > 1);
            locks.entry(thread_id.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of threads currently tracked.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
