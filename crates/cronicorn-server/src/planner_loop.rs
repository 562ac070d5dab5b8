//! The AI planner worker loop (C10, spec §4.5): independent of the
//! scheduler tick, polls every active endpoint for whether it is due for
//! analysis and runs a session when it is.
//!
//! Grounded on the same `tokio::time::interval` + `CancellationToken`
//! shape as `cronicorn_scheduler::worker::run_worker_loop`; due-detection
//! is new (the scheduler tick has no equivalent — `nextAnalysisAt` lives
//! on the AI Session log, not the endpoint row, so it has to be read back
//! per endpoint each poll rather than claimed in a batch).

use std::sync::Arc;
use std::time::Duration as StdDuration;

use cronicorn_domain::{Clock, PlannerConfig};
use cronicorn_planner::{run_session, LlmProvider};
use cronicorn_store::{EndpointStore, RunStore};
use cronicorn_scheduler::QuotaGuard;
use tokio_util::sync::CancellationToken;

/// Runs planner sessions on a poll interval until `shutdown` fires. A
/// no-op if `llm` is `None` — local/dev deployments without a configured
/// provider simply never analyze, which is a valid (if advisory-less)
/// configuration per spec §9 ("the planner is strictly advisory").
pub async fn run_planner_loop(
    endpoint_store: Arc<dyn EndpointStore>,
    run_store: Arc<dyn RunStore>,
    quota: Arc<dyn QuotaGuard>,
    llm: Option<Arc<dyn LlmProvider>>,
    config: PlannerConfig,
    clock: Arc<dyn Clock>,
    poll_interval: StdDuration,
    shutdown: CancellationToken,
) {
    let Some(llm) = llm else {
        tracing::info!("no LLM provider configured, planner loop disabled");
        return;
    };

    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("planner loop shutting down");
                break;
            }
            _ = interval.tick() => {
                poll_once(
                    endpoint_store.as_ref(),
                    run_store.as_ref(),
                    quota.as_ref(),
                    llm.as_ref(),
                    &config,
                    clock.as_ref(),
                )
                .await;
            }
        }
    }
}

async fn poll_once(
    endpoint_store: &dyn EndpointStore,
    run_store: &dyn RunStore,
    quota: &dyn QuotaGuard,
    llm: &dyn LlmProvider,
    config: &PlannerConfig,
    clock: &dyn Clock,
) {
    let now = clock.now();
    let endpoints = match endpoint_store.list_active_endpoints().await {
        Ok(e) => e,
        Err(err) => {
            tracing::error!(error = %err, "planner loop: failed to list active endpoints");
            return;
        }
    };

    for endpoint in endpoints {
        if endpoint.is_paused(now) {
            continue;
        }

        let latest = run_store
            .list_ai_sessions_for_endpoint(endpoint.id, 1)
            .await
            .unwrap_or_default();
        let due = match latest.first() {
            Some(session) => session.next_analysis_at <= now,
            // Never analyzed: due immediately.
            None => true,
        };
        if !due {
            continue;
        }

        // Step 1 of spec §4.5: per-tenant quota gate, consulted before
        // each AI analysis exactly as before each dispatch.
        if !quota.can_proceed(&endpoint.tenant_id).await {
            tracing::info!(endpoint_id = %endpoint.id, tenant_id = %endpoint.tenant_id, "quota denied, skipping analysis");
            continue;
        }

        match run_session(endpoint_store, run_store, llm, config, endpoint.id, now).await {
            Ok(outcome) => tracing::info!(
                endpoint_id = %endpoint.id,
                session_id = %outcome.session_id,
                tool_calls = outcome.tool_call_count,
                next_analysis_at = %outcome.next_analysis_at,
                "analysis session complete"
            ),
            Err(err) => {
                tracing::error!(endpoint_id = %endpoint.id, error = %err, "analysis session failed")
            }
        }
    }
}
