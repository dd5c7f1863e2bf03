//! The agent loop: the heart of Librarian.
//!
//! A turn follows a **model → tools → model** cycle:
//!
//! 1. **Load** the thread's conversation state and append the new messages
//! 2. **Invoke** the model with the log and the tool definitions
//! 3. **If tool calls**: execute them in order, append results, loop back to 2
//! 4. **If a plain answer**: end the turn and save the state
//!
//! In streaming mode the same cycle reports model deltas and tool progress
//! frames, which the [`EventTranslator`] turns into `stream.*` events.

pub mod loop_runner;
pub mod signal;
pub mod stream_event;
pub mod thread_lock;
pub mod translator;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use loop_runner::{AgentLoop, DEFAULT_MAX_STEPS, TurnRequest, TurnResponse, TurnResult};
pub use signal::{LoopSignal, SignalSink};
pub use stream_event::{StreamEvent, StreamEventKind};
pub use thread_lock::{ThreadGuard, ThreadLocks};
pub use translator::EventTranslator;
