//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `GET  /v1/sys/health`     — Liveness check
//! - `GET  /v1/agents/models`  — Model identifiers the agent can use
//! - `GET  /v1/agents/tools`   — Tools the agent can call
//! - `POST /v1/agents/invoke`  — Run a turn, get the final answer
//! - `POST /v1/agents/stream`  — Run a turn, get an SSE stream of `stream.*` events
//!
//! Conversations continue when the request repeats a `thread_id`; only the
//! new messages need to be sent.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::sse::{Event as SseEvent, Sse},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use librarian_agent::{AgentLoop, TurnRequest, TurnResponse};
use librarian_core::error::Error;
use librarian_core::tool::ToolInfo;

// ── State ─────────────────────────────────────────────────────────────────

/// Shared state for the v1 API.
pub struct ApiState {
    pub agent: Arc<AgentLoop>,
}

pub type SharedApiState = Arc<ApiState>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/sys/health", get(health_handler))
        .route("/agents/models", get(list_models_handler))
        .route("/agents/tools", get(list_tools_handler))
        .route("/agents/invoke", post(invoke_handler))
        .route("/agents/stream", post(stream_handler))
        .with_state(state)
}

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelListResponse {
    pub models: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// A failed request: status code plus a `{"detail": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidRequest(reason) => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                detail: reason,
            },
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                detail: format!("Agent execution failed: {other}"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { detail: self.detail })).into_response()
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// `GET /v1/agents/models` — List the models available to the agent endpoints.
async fn list_models_handler(State(state): State<SharedApiState>) -> Json<ModelListResponse> {
    Json(ModelListResponse {
        models: state.agent.gateway().models(),
    })
}

/// `GET /v1/agents/tools` — List the tools the agent may call.
async fn list_tools_handler(State(state): State<SharedApiState>) -> Json<ToolListResponse> {
    Json(ToolListResponse {
        tools: state.agent.tools().infos(),
    })
}

/// `POST /v1/agents/invoke` — Run one turn and return the final answer.
async fn invoke_handler(
    State(state): State<SharedApiState>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    info!(
        thread_id = ?request.thread_id,
        messages = request.messages.len(),
        "v1/agents/invoke request"
    );

    let result = state.agent.run(request).await.map_err(|e| {
        warn!(error = %e, "Agent invocation failed");
        ApiError::from(e)
    })?;
    Ok(Json(result.into_response()))
}

/// `POST /v1/agents/stream` — Run one turn, streaming `stream.*` events.
///
/// Failures are reported in-band as a `stream.error` event. Closing the
/// connection cancels the turn.
async fn stream_handler(
    State(state): State<SharedApiState>,
    Json(request): Json<TurnRequest>,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    info!(
        thread_id = ?request.thread_id,
        messages = request.messages.len(),
        "v1/agents/stream SSE request"
    );

    let stream = state.agent.clone().stream(request).map(|event| {
        let data = event.to_json().unwrap_or_default();
        Ok(SseEvent::default().event(event.event_name()).data(data))
    });

    Sse::new(stream)
}
