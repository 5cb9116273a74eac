//! `wayfinder serve` -- HTTP JSON API for the flow lifecycle controller.
//!
//! Exposes the lifecycle controller over an async HTTP service using
//! `axum` + `tokio`. Supports concurrent request handling; per-flow
//! transition ordering comes from the storage layer's version checks,
//! not from request serialization.
//!
//! Security features:
//! - CORS headers on all responses (permissive for local dev)
//! - Per-IP rate limiting (default: 60 req/min, configurable)
//! - Optional API key authentication via WAYFINDER_API_KEY env var
//!
//! Endpoints:
//! - GET    /health                   - Server status (exempt from auth)
//! - POST   /flows                    - Create a flow
//! - GET    /flows                    - List the tenant's flows
//! - GET    /flows/{flow_id}          - Current flow state
//! - POST   /flows/{flow_id}/advance  - Attempt one phase transition
//! - POST   /flows/{flow_id}/input    - Supply external input
//! - POST   /flows/{flow_id}/cancel   - Cancel the flow
//! - DELETE /flows/{flow_id}?force=   - Delete the flow
//!
//! All responses use Content-Type: application/json.

mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{middleware as axum_middleware, Json, Router};
use tower_http::cors::{Any, CorsLayer};

use wayfinder_engine::{HeuristicProvider, LifecycleController};
use wayfinder_storage::MemoryStore;

use self::handlers::{
    handle_advance, handle_cancel, handle_create_flow, handle_delete_flow, handle_get_flow,
    handle_health, handle_input, handle_list_flows, handle_not_found,
};
use self::middleware::{auth_middleware, rate_limit_middleware};
use self::state::{AppState, RateLimiter};

/// Maximum request body size: 10 MB.
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Default rate limit: 60 requests per minute per IP.
const DEFAULT_RATE_LIMIT: u64 = 60;

/// Rate limit window duration in seconds (1 minute).
const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

/// Build the router over fresh in-process state.
pub(crate) fn build_app(rate_limit: u64, api_key: Option<String>) -> Router {
    let controller = LifecycleController::new(
        Arc::new(MemoryStore::new()),
        Arc::new(HeuristicProvider),
    );
    let state = Arc::new(AppState {
        controller,
        rate_limiter: RateLimiter::new(rate_limit),
        api_key,
    });

    // CORS: permissive for local dev; tighten for production.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/flows", post(handle_create_flow).get(handle_list_flows))
        .route("/flows/{flow_id}", get(handle_get_flow))
        .route("/flows/{flow_id}", delete(handle_delete_flow))
        .route("/flows/{flow_id}/advance", post(handle_advance))
        .route("/flows/{flow_id}/input", post(handle_input))
        .route("/flows/{flow_id}/cancel", post(handle_cancel))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Start the HTTP server on the given port.
///
/// Security:
/// - Rate limit: Per-IP, from `WAYFINDER_RATE_LIMIT` env var (default 60 req/min).
/// - API key: If `WAYFINDER_API_KEY` is set, all endpoints except /health require auth.
pub async fn start_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let rate_limit = std::env::var("WAYFINDER_RATE_LIMIT")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_RATE_LIMIT);

    let api_key = std::env::var("WAYFINDER_API_KEY")
        .ok()
        .filter(|k| !k.is_empty());

    if api_key.is_some() {
        tracing::info!("API key authentication enabled");
    }
    tracing::info!(rate_limit, "rate limit (requests per minute per IP)");

    let app = build_app(rate_limit, api_key);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("wayfinder listening on http://{addr}");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("received shutdown signal");
}
