//! Job CRUD — basic local-testing surface (spec.md §1 marks the full
//! user-facing API out of scope; this exists so `cronicorn-scheduler` has
//! something to claim against without hand-editing the store).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use uuid::Uuid;

use cronicorn_domain::Job;

use crate::state::AppState;

fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

fn default_user_id() -> String {
    "default".to_string()
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(q): Query<ListJobsQuery>,
) -> impl IntoResponse {
    match state.endpoint_store.list_jobs(&q.user_id).await {
        Ok(jobs) => Json(serde_json::json!({ "jobs": jobs, "count": jobs.len() })).into_response(),
        Err(err) => api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

pub async fn create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJobRequest>,
) -> impl IntoResponse {
    let now = state.clock.now();
    let mut job = Job::new(req.user_id, req.name, now);
    job.description = req.description;

    match state.endpoint_store.add_job(job.clone()).await {
        Ok(()) => (StatusCode::CREATED, Json(serde_json::json!({ "job": job }))).into_response(),
        Err(err) => api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

pub async fn get_job(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.endpoint_store.get_job(id).await {
        Ok(job) => Json(serde_json::json!({ "job": job })).into_response(),
        Err(_) => api_error(StatusCode::NOT_FOUND, "job not found"),
    }
}

pub async fn archive_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let now = state.clock.now();
    match state.endpoint_store.archive_job(id, now).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(_) => api_error(StatusCode::NOT_FOUND, "job not found"),
    }
}
