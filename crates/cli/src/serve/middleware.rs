//! Request guards applied ahead of routing: per-IP rate limiting and
//! optional API key authentication.
//!
//! Guard refusals use the same `kind`-tagged JSON error shape as the route
//! handlers, so clients can branch on `kind` uniformly.

use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::state::AppState;

fn refuse(status: StatusCode, kind: &str, message: &str) -> Response {
    let body = serde_json::json!({
        "error": message,
        "kind": kind,
    });
    (status, Json(body)).into_response()
}

/// Charge the request against the caller's per-IP budget before routing.
pub(crate) async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<std::net::SocketAddr>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if let Err(retry_after) = state.rate_limiter.try_acquire(addr.ip()).await {
        let body = serde_json::json!({
            "error": "rate limit exceeded",
            "kind": "rate_limited",
            "retry_after": retry_after,
        });
        return (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    }
    next.run(request).await
}

/// The API key the request presents, from `Authorization: Bearer <key>` or
/// `X-API-Key: <key>`.
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    bearer.or_else(|| headers.get("x-api-key").and_then(|v| v.to_str().ok()))
}

/// Require the configured API key on every route except `/health`, which
/// stays open for load balancer checks. A missing credential is 401; a
/// wrong one is 403.
pub(crate) async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let expected = match &state.api_key {
        Some(key) => key.as_str(),
        None => return next.run(request).await,
    };
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }
    match presented_key(request.headers()) {
        Some(key) if key == expected => next.run(request).await,
        Some(_) => refuse(StatusCode::FORBIDDEN, "forbidden", "invalid API key"),
        None => refuse(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "authentication required",
        ),
    }
}
