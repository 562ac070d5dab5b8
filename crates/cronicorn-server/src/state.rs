//! Shared application state, grouped by concern the way the teacher's
//! `gateway::state::AppState` is (`crates/gateway/src/state.rs`): every
//! field is an `Arc`, the whole struct is `Clone`, and axum hands a clone
//! to every handler.

use std::sync::Arc;

use cronicorn_domain::{Clock, Config};
use cronicorn_planner::LlmProvider;
use cronicorn_scheduler::QuotaGuard;
use cronicorn_store::{EndpointStore, RunStore};

use crate::signing::InMemorySigningKeys;

#[derive(Clone)]
pub struct AppState {
    // ── Config ────────────────────────────────────────────────────
    pub config: Arc<Config>,

    // ── Persistence ───────────────────────────────────────────────
    pub endpoint_store: Arc<dyn EndpointStore>,
    pub run_store: Arc<dyn RunStore>,

    // ── Scheduling collaborators ──────────────────────────────────
    pub quota: Arc<dyn QuotaGuard>,
    pub signing_keys: Arc<InMemorySigningKeys>,
    pub clock: Arc<dyn Clock>,
    pub http_client: reqwest::Client,

    // ── AI planner (absent when no provider is configured) ───────
    pub llm: Option<Arc<dyn LlmProvider>>,

    // ── Security ──────────────────────────────────────────────────
    /// SHA-256 digest of the configured API bearer token. `None` means dev
    /// mode: unauthenticated access is allowed (teacher's
    /// `require_api_token` posture).
    pub api_token_hash: Option<Vec<u8>>,
}
