use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

/// Liveness/readiness probe. Public, no auth — mirrors the teacher's
/// `/v1/health` route.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "scheduler": {
            "tick_interval_ms": state.config.scheduler.tick_interval_ms,
            "parallelism": state.config.scheduler.parallelism,
        },
    }))
}
