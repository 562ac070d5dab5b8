//! Run inspection API — read-only views over the dispatch history, plus
//! AI session history for the same endpoint.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use uuid::Uuid;

use crate::state::AppState;

fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ListRunsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

pub async fn list_runs_for_endpoint(
    State(state): State<AppState>,
    Path(endpoint_id): Path<Uuid>,
    Query(q): Query<ListRunsQuery>,
) -> impl IntoResponse {
    let limit = q.limit.min(500);
    match state
        .run_store
        .list_runs_for_endpoint(endpoint_id, limit)
        .await
    {
        Ok(runs) => Json(serde_json::json!({ "runs": runs, "count": runs.len() })).into_response(),
        Err(err) => api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

pub async fn get_run(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.run_store.get_run(id).await {
        Ok(run) => Json(serde_json::json!({ "run": run })).into_response(),
        Err(_) => api_error(StatusCode::NOT_FOUND, "run not found"),
    }
}

pub async fn list_ai_sessions_for_endpoint(
    State(state): State<AppState>,
    Path(endpoint_id): Path<Uuid>,
    Query(q): Query<ListRunsQuery>,
) -> impl IntoResponse {
    let limit = q.limit.min(500);
    match state
        .run_store
        .list_ai_sessions_for_endpoint(endpoint_id, limit)
        .await
    {
        Ok(sessions) => {
            Json(serde_json::json!({ "sessions": sessions, "count": sessions.len() }))
                .into_response()
        }
        Err(err) => api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}
