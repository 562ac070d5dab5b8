pub mod auth;
pub mod endpoints;
pub mod health;
pub mod jobs;
pub mod runs;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Routes are split into **public** (no auth required) and **protected**
/// (gated behind the bearer-token middleware) — same shape as the
/// teacher's `api::router`.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/v1/health", get(health::health));

    let protected = Router::new()
        // Jobs
        .route("/v1/jobs", get(jobs::list_jobs).post(jobs::create_job))
        .route("/v1/jobs/:id", get(jobs::get_job))
        .route("/v1/jobs/:id/archive", post(jobs::archive_job))
        // Endpoints
        .route(
            "/v1/endpoints",
            get(endpoints::list_endpoints).post(endpoints::create_endpoint),
        )
        .route("/v1/endpoints/:id", get(endpoints::get_endpoint))
        .route(
            "/v1/endpoints/:id/archive",
            post(endpoints::archive_endpoint),
        )
        .route("/v1/endpoints/:id/pause", post(endpoints::pause_endpoint))
        .route("/v1/endpoints/:id/nudge", post(endpoints::nudge_endpoint))
        // Runs + AI sessions
        .route(
            "/v1/endpoints/:id/runs",
            get(runs::list_runs_for_endpoint),
        )
        .route(
            "/v1/endpoints/:id/ai-sessions",
            get(runs::list_ai_sessions_for_endpoint),
        )
        .route("/v1/runs/:id", get(runs::get_run))
        // Apply API auth middleware to all protected routes.
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_token,
        ));

    public
        .merge(protected)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
