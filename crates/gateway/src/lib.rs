//! HTTP API gateway for Librarian.
//!
//! Exposes the agent over REST and Server-Sent Events:
//! health check, model and tool listings, blocking invocation and
//! streaming invocation.
//!
//! Built on Axum.

pub mod api_v1;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use librarian_agent::AgentLoop;
use librarian_checkpoint::{FileCheckpointStore, InMemoryCheckpointStore};
use librarian_config::{AppConfig, CheckpointBackend};
use librarian_core::checkpoint::CheckpointStore;
use librarian_tools::ToolSettings;

/// Build the full router: the v1 API plus CORS and HTTP trace logging.
pub fn build_router(state: api_v1::SharedApiState, allowed_origins: &[String]) -> Router {
    Router::new()
        .nest("/v1", api_v1::v1_router(state))
        .layer(cors_layer(allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// `*` allows any origin; anything else is an exact-match list.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

/// Assemble the agent loop from configuration: provider router, built-in
/// tools and the configured checkpoint store.
pub fn build_agent(config: &AppConfig) -> Arc<AgentLoop> {
    let gateway = Arc::new(librarian_providers::build_from_config(config));
    let tools = Arc::new(librarian_tools::default_registry(&tool_settings(config)));

    let store: Arc<dyn CheckpointStore> = match config.checkpoint.backend {
        CheckpointBackend::Memory => Arc::new(InMemoryCheckpointStore::new()),
        CheckpointBackend::File => Arc::new(FileCheckpointStore::new(config.checkpoint_dir())),
    };
    info!(
        store = store.name(),
        tools = tools.len(),
        default_model = %config.default_model,
        "Agent assembled"
    );

    Arc::new(
        AgentLoop::new(gateway, tools, store)
            .with_default_config(config.model_config())
            .with_max_steps(config.max_steps),
    )
}

fn tool_settings(config: &AppConfig) -> ToolSettings {
    ToolSettings {
        openweathermap_api_key: config.tools.openweathermap_api_key.clone(),
        google_books_api_key: config.tools.google_books_api_key.clone(),
        google_books_max_results: config.tools.google_books_max_results,
    }
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    if !config.has_api_key() {
        warn!("No provider API key configured; only local providers will answer");
    }

    let state = Arc::new(api_v1::ApiState {
        agent: build_agent(&config),
    });
    let app = build_router(state, &config.gateway.allowed_origins);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn state() -> api_v1::SharedApiState {
        Arc::new(api_v1::ApiState {
            agent: build_agent(&AppConfig::default()),
        })
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(state(), &["*".to_string()]);

        let req = Request::builder()
            .uri("/v1/sys/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn cors_allows_configured_origin() {
        let app = build_router(state(), &["http://localhost:3000".to_string()]);

        let req = Request::builder()
            .uri("/v1/sys/health")
            .header("Origin", "http://localhost:3000")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://localhost:3000"
        );
    }

    #[tokio::test]
    async fn cors_rejects_unknown_origin() {
        let app = build_router(state(), &["http://localhost:3000".to_string()]);

        let req = Request::builder()
            .uri("/v1/sys/health")
            .header("Origin", "http://evil.example")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert!(response.headers().get("access-control-allow-origin").is_none());
    }

    #[test]
    fn build_agent_uses_config_defaults() {
        let mut config = AppConfig::default();
        config.default_model = "groq:llama-3.1-8b-instant".into();
        let agent = build_agent(&config);
        assert_eq!(agent.default_config().model, "groq:llama-3.1-8b-instant");
        assert_eq!(
            agent.tools().names(),
            vec!["date_time", "google_books", "weather_lookup"]
        );
    }
}
