//! Error types for the Librarian domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the top-level [`Error`]
//! classifies everything that can end an agent turn.

use thiserror::Error;

/// The top-level error type. Every variant is fatal to the turn that raised it.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model errors ---
    #[error("Model initialization failed: {0}")]
    ModelInitialization(String),

    #[error("Model invocation failed: {0}")]
    ModelInvocation(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool execution failed: {0}")]
    ToolExecution(ToolError),

    #[error("Progress channel unavailable: {0}")]
    StreamChannelUnavailable(String),

    // --- Loop errors ---
    #[error("Routing invariant violated: expected an assistant message, found {found}")]
    RoutingInvariant { found: String },

    #[error("Step limit exceeded: more than {max_steps} model invocations in one turn")]
    StepLimitExceeded { max_steps: usize },

    #[error("Tool result references unknown call id: {call_id}")]
    OrphanToolResult { call_id: String },

    #[error("Turn cancelled by the consumer")]
    Cancelled,

    // --- Persistence ---
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    // --- Input / configuration ---
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ToolError> for Error {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::ChannelUnavailable(reason) => Error::StreamChannelUnavailable(reason),
            other => Error::ToolExecution(other),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Progress misuse in {tool_name}: {reason}")]
    ProgressMisuse { tool_name: String, reason: String },

    #[error("No active tool invocation: {0}")]
    ChannelUnavailable(String),
}

#[derive(Debug, Clone, Error)]
pub enum CheckpointError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupted checkpoint for thread {thread_id}: {reason}")]
    Corrupted { thread_id: String, reason: String },
}
