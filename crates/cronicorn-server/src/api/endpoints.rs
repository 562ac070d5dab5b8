//! Endpoint CRUD + the two manual-operator actions spec.md §6 lists as
//! externally originating mutations: pausing and nudging `nextRunAt`.
//! Every mutation here goes through the same `cronicorn-store` primitives
//! the scheduler tick and the AI planner use — no privileged path.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use cronicorn_domain::{Baseline, Endpoint, Guardrails, RequestConfig, RunSource};

use crate::state::AppState;

fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ListEndpointsQuery {
    pub job_id: Uuid,
}

pub async fn list_endpoints(
    State(state): State<AppState>,
    Query(q): Query<ListEndpointsQuery>,
) -> impl IntoResponse {
    match state.endpoint_store.list_endpoints_for_job(q.job_id).await {
        Ok(endpoints) => {
            Json(serde_json::json!({ "endpoints": endpoints, "count": endpoints.len() }))
                .into_response()
        }
        Err(err) => api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateEndpointRequest {
    pub job_id: Uuid,
    pub tenant_id: String,
    pub baseline: Baseline,
    #[serde(default)]
    pub guardrails: Guardrails,
    pub request: RequestConfig,
}

pub async fn create_endpoint(
    State(state): State<AppState>,
    Json(req): Json<CreateEndpointRequest>,
) -> impl IntoResponse {
    if state.endpoint_store.get_job(req.job_id).await.is_err() {
        return api_error(StatusCode::NOT_FOUND, "job not found");
    }

    let now = state.clock.now();
    if let Baseline::Cron { expression } = &req.baseline {
        if let Err(e) = cronicorn_cron::validate_cron(expression) {
            return api_error(
                StatusCode::BAD_REQUEST,
                format!("invalid cron expression: {e}"),
            );
        }
    }
    let initial_next_run = match &req.baseline {
        Baseline::Interval { ms } => now + chrono::Duration::milliseconds(*ms as i64),
        Baseline::Cron { expression } => match cronicorn_cron::cron_next(expression, &now) {
            Some(t) => t,
            None => {
                return api_error(
                    StatusCode::BAD_REQUEST,
                    "cron expression has no occurrence within the next year",
                )
            }
        },
    };

    let endpoint = Endpoint {
        id: Uuid::new_v4(),
        job_id: req.job_id,
        tenant_id: req.tenant_id,
        baseline: req.baseline,
        guardrails: req.guardrails,
        ai_hints: Default::default(),
        paused_until: None,
        archived_at: None,
        last_run_at: None,
        next_run_at: initial_next_run,
        failure_count: 0,
        request: req.request,
        locked_until: None,
        next_run_source: RunSource::Baseline,
    };

    if let Err(err) = endpoint.validate() {
        return api_error(StatusCode::BAD_REQUEST, err.to_string());
    }

    match state.endpoint_store.add_endpoint(endpoint.clone()).await {
        Ok(()) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "endpoint": endpoint })),
        )
            .into_response(),
        Err(err) => api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

pub async fn get_endpoint(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.endpoint_store.get_endpoint(id).await {
        Ok(endpoint) => Json(serde_json::json!({ "endpoint": endpoint })).into_response(),
        Err(_) => api_error(StatusCode::NOT_FOUND, "endpoint not found"),
    }
}

pub async fn archive_endpoint(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let now = state.clock.now();
    match state.endpoint_store.archive_endpoint(id, now).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(_) => api_error(StatusCode::NOT_FOUND, "endpoint not found"),
    }
}

#[derive(Debug, Deserialize)]
pub struct PauseRequest {
    /// `null`/absent clears the pause.
    pub until: Option<DateTime<Utc>>,
}

pub async fn pause_endpoint(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<PauseRequest>,
) -> impl IntoResponse {
    match state.endpoint_store.set_paused_until(id, req.until).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(_) => api_error(StatusCode::NOT_FOUND, "endpoint not found"),
    }
}

#[derive(Debug, Deserialize)]
pub struct NudgeRequest {
    pub next_run_at: DateTime<Utc>,
}

/// Manual nudge — guardrail-clamped, pause-respecting, bypasses the
/// backoff monotonicity rule (I6), exactly like an AI `propose_next_time`
/// call but attributed `RunSource::Manual`.
pub async fn nudge_endpoint(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<NudgeRequest>,
) -> impl IntoResponse {
    let now = state.clock.now();
    match state
        .endpoint_store
        .set_next_run_at_if_earlier(id, req.next_run_at, RunSource::Manual, now)
        .await
    {
        Ok(applied) => Json(serde_json::json!({ "applied": applied })).into_response(),
        Err(_) => api_error(StatusCode::NOT_FOUND, "endpoint not found"),
    }
}
