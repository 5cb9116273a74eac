//! HTTP route handlers for the flow lifecycle API.
//!
//! A failed gate is not an error: `advance` returns 200 with
//! `outcome: "paused"` and the structured missing list. Error statuses are
//! reserved for the error taxonomy, mapped from each error's wire kind.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use wayfinder_core::{FlowError, FlowType, PhaseInput, TenantContext};

use super::json_error;
use super::state::AppState;

/// Tenant identifiers carried in query parameters (GET/DELETE).
#[derive(Debug, Deserialize)]
pub(crate) struct TenantQuery {
    client_account_id: String,
    engagement_id: String,
}

impl TenantQuery {
    fn tenant(&self) -> TenantContext {
        TenantContext::new(&self.client_account_id, &self.engagement_id)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateFlowRequest {
    flow_type: FlowType,
    client_account_id: String,
    engagement_id: String,
}

/// Tenant identifiers carried in POST bodies.
#[derive(Debug, Deserialize)]
pub(crate) struct TenantBody {
    client_account_id: String,
    engagement_id: String,
}

impl TenantBody {
    fn tenant(&self) -> TenantContext {
        TenantContext::new(&self.client_account_id, &self.engagement_id)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct InputRequest {
    client_account_id: String,
    engagement_id: String,
    input: PhaseInput,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeleteQuery {
    client_account_id: String,
    engagement_id: String,
    #[serde(default)]
    force: bool,
}

/// Map a lifecycle error to an HTTP response with its machine-readable kind.
fn error_response(err: FlowError) -> Response {
    let status = match err.kind() {
        "invalid_tenant_context" | "input_not_accepted" => StatusCode::BAD_REQUEST,
        "not_found" => StatusCode::NOT_FOUND,
        "version_conflict" | "has_dependents" | "invalid_state" => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = serde_json::json!({
        "error": err.to_string(),
        "kind": err.kind(),
    });
    (status, Json(body)).into_response()
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

/// POST /flows
pub(crate) async fn handle_create_flow(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateFlowRequest>,
) -> Response {
    let tenant = TenantContext::new(&request.client_account_id, &request.engagement_id);
    match state.controller.initialize(request.flow_type, tenant).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /flows
pub(crate) async fn handle_list_flows(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TenantQuery>,
) -> Response {
    match state.controller.list(&query.tenant()).await {
        Ok(flows) => {
            (StatusCode::OK, Json(serde_json::json!({ "flows": flows }))).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /flows/{flow_id}
pub(crate) async fn handle_get_flow(
    State(state): State<Arc<AppState>>,
    Path(flow_id): Path<String>,
    Query(query): Query<TenantQuery>,
) -> Response {
    match state.controller.get_status(&flow_id, &query.tenant()).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /flows/{flow_id}/advance
pub(crate) async fn handle_advance(
    State(state): State<Arc<AppState>>,
    Path(flow_id): Path<String>,
    Json(body): Json<TenantBody>,
) -> Response {
    match state.controller.advance(&flow_id, &body.tenant()).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /flows/{flow_id}/input
pub(crate) async fn handle_input(
    State(state): State<Arc<AppState>>,
    Path(flow_id): Path<String>,
    Json(request): Json<InputRequest>,
) -> Response {
    let tenant = TenantContext::new(&request.client_account_id, &request.engagement_id);
    match state
        .controller
        .supply_input(&flow_id, &tenant, request.input)
        .await
    {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /flows/{flow_id}/cancel
pub(crate) async fn handle_cancel(
    State(state): State<Arc<AppState>>,
    Path(flow_id): Path<String>,
    Json(body): Json<TenantBody>,
) -> Response {
    match state.controller.cancel(&flow_id, &body.tenant()).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /flows/{flow_id}?force=
pub(crate) async fn handle_delete_flow(
    State(state): State<Arc<AppState>>,
    Path(flow_id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> Response {
    let tenant = TenantContext::new(&query.client_account_id, &query.engagement_id);
    match state
        .controller
        .delete(&flow_id, &tenant, query.force)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}
