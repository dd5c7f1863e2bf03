//! # Librarian Core
//!
//! Domain types, traits, and error definitions for the Librarian agent runtime.
//! This crate has **no framework dependencies**. It defines the domain model
//! that all other crates implement against.
//!
//! Every collaborator of the agent loop is a trait here:
//! - [`ModelGateway`] produces the next assistant message
//! - [`Tool`] executes a capability and reports progress through [`ToolProgress`]
//! - [`CheckpointStore`] persists [`ConversationState`] per thread

pub mod checkpoint;
pub mod error;
pub mod message;
pub mod model;
pub mod progress;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use checkpoint::{CheckpointStore, ConversationState};
pub use error::{CheckpointError, Error, ProviderError, Result, ToolError};
pub use message::{ChatMessage, Message, Role, ThreadId, ToolCallRequest, UsedTool};
pub use model::{ChunkStream, ModelConfig, ModelGateway};
pub use progress::{FrameKind, FrameSink, ToolFrame, ToolProgress};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolDefinition, Usage};
pub use tool::{Tool, ToolArg, ToolInfo, ToolRegistry};
