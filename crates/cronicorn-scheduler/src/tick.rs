//! Scheduler tick orchestration (C9, spec §4.3): claim → dispatch → record →
//! update, with a per-worker bounded-concurrency fan-out over the claimed
//! batch.
//!
//! Grounded on the teacher's `ScheduleRunner::tick`/`spawn_run`
//! (`crates/gateway/src/runtime/schedule_runner.rs`): the per-schedule
//! concurrency guard there becomes a flat per-worker `Semaphore` here (spec
//! §5 calls for a worker-wide parallelism cap, not a per-endpoint one,
//! since I5 already guarantees at-most-one dispatch per endpoint via the
//! lease), and `spawn_run`'s "record success/failure, then update" sequence
//! becomes the Run-finalize-then-`update_after_run` pair below.

use std::sync::Arc;

use cronicorn_algebra::{compute_next_run, Outcome};
use cronicorn_dispatcher::{DispatchStatus, SigningKeyLookup};
use cronicorn_domain::config::DispatcherConfig;
use cronicorn_domain::{Clock, Config, Run, RunSource, RunStatus};
use cronicorn_store::{EndpointStore, RunFinish, RunStore};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::quota::QuotaGuard;

/// Everything one tick needs, grouped the way `AppState` groups its fields
/// in the teacher (field-per-concern, each wrapped in its own `Arc`).
pub struct TickContext {
    pub endpoint_store: Arc<dyn EndpointStore>,
    pub run_store: Arc<dyn RunStore>,
    pub quota: Arc<dyn QuotaGuard>,
    pub signing_keys: Arc<dyn SigningKeyLookup>,
    pub clock: Arc<dyn Clock>,
    pub http_client: reqwest::Client,
    pub config: Config,
}

/// What happened to one claimed endpoint, returned for logging/testing —
/// the tick itself never surfaces these to a caller beyond a summary count.
#[derive(Debug)]
pub enum ClaimOutcome {
    Dispatched { run_id: Uuid, status: DispatchStatus },
    QuotaDenied,
}

/// Runs one tick: claim a batch, dispatch each claimed endpoint concurrently
/// (bounded by `config.scheduler.parallelism`), record the outcome, and
/// commit the next schedule. Returns one [`ClaimOutcome`] per claimed id, in
/// no particular order (spec §5(c): "across endpoints, no ordering is
/// guaranteed").
pub async fn run_tick(ctx: &TickContext) -> Vec<ClaimOutcome> {
    let now = ctx.clock.now();
    let claimed = match ctx
        .endpoint_store
        .claim_due_endpoints(
            ctx.config.scheduler.claim_batch,
            ctx.config.scheduler.claim_horizon_ms,
            now,
        )
        .await
    {
        Ok(ids) => ids,
        Err(err) => {
            // StoreUnavailable (spec §7): log and move on, lease was never
            // taken so nothing to roll back.
            tracing::error!(error = %err, "claim_due_endpoints failed");
            return Vec::new();
        }
    };

    if claimed.is_empty() {
        return Vec::new();
    }
    tracing::debug!(count = claimed.len(), "claimed due endpoints");

    let semaphore = Arc::new(Semaphore::new(ctx.config.scheduler.parallelism.max(1)));
    let mut tasks = tokio::task::JoinSet::new();

    for id in claimed {
        let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closes");
        let ctx = TaskCtx {
            endpoint_store: ctx.endpoint_store.clone(),
            run_store: ctx.run_store.clone(),
            quota: ctx.quota.clone(),
            signing_keys: ctx.signing_keys.clone(),
            clock: ctx.clock.clone(),
            http_client: ctx.http_client.clone(),
            dispatcher_config: ctx.config.dispatcher.clone(),
        };
        tasks.spawn(async move {
            let _permit = permit;
            dispatch_one(&ctx, id).await
        });
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(join_err) => {
                // A panic in one task never aborts siblings (spec §9); it
                // simply contributes no outcome for that endpoint.
                tracing::error!(error = %join_err, "dispatch task panicked");
            }
        }
    }
    outcomes
}

/// Per-task dependency bundle: an owned clone so the spawned task has no
/// lifetime tied to the caller's stack frame.
struct TaskCtx {
    endpoint_store: Arc<dyn EndpointStore>,
    run_store: Arc<dyn RunStore>,
    quota: Arc<dyn QuotaGuard>,
    signing_keys: Arc<dyn SigningKeyLookup>,
    clock: Arc<dyn Clock>,
    http_client: reqwest::Client,
    dispatcher_config: DispatcherConfig,
}

async fn dispatch_one(ctx: &TaskCtx, id: Uuid) -> ClaimOutcome {
    let now = ctx.clock.now();

    let endpoint = match ctx.endpoint_store.get_endpoint(id).await {
        Ok(e) => e,
        Err(err) => {
            tracing::error!(endpoint_id = %id, error = %err, "claimed endpoint vanished mid-tick");
            let _ = ctx.endpoint_store.clear_lock(id).await;
            return ClaimOutcome::QuotaDenied;
        }
    };

    // (b) Quota guard (spec §4.3 step b, §7 QuotaExceeded).
    if !ctx.quota.can_proceed(&endpoint.tenant_id).await {
        tracing::info!(endpoint_id = %id, tenant_id = %endpoint.tenant_id, "quota denied, skipping dispatch");
        let _ = ctx.endpoint_store.clear_lock(id).await;
        return ClaimOutcome::QuotaDenied;
    }

    // (c) Create the `running` Run, attributing source from the endpoint's
    // last-computed `next_run_source` (spec §4.3: "the tick decides the
    // source before dispatch by inspecting which component drove the
    // candidate").
    let source = endpoint.next_run_source;
    let attempt = endpoint.failure_count + 1;
    let run = Run::start(endpoint.id, attempt, source, now);
    let run_id = run.id;
    if let Err(err) = ctx.run_store.create_run(run).await {
        tracing::error!(endpoint_id = %id, error = %err, "failed to create run row");
        let _ = ctx.endpoint_store.clear_lock(id).await;
        return ClaimOutcome::QuotaDenied;
    }

    // (d) Dispatch (C5).
    let outcome = cronicorn_dispatcher::execute(
        &endpoint,
        &endpoint.tenant_id,
        ctx.signing_keys.as_ref(),
        ctx.dispatcher_config.signing_policy,
        &ctx.dispatcher_config.user_agent,
        &ctx.http_client,
    )
    .await;

    let finished_at = ctx.clock.now();
    let status = match outcome.status {
        DispatchStatus::Success => RunStatus::Success,
        DispatchStatus::Failed => RunStatus::Failed,
    };

    // (e) Finalize the Run.
    if let Err(err) = ctx
        .run_store
        .finalize_run(
            run_id,
            RunFinish {
                status,
                finished_at,
                duration_ms: outcome.duration_ms,
                error_message: outcome.error_message.clone(),
                http_status: outcome.status_code,
                response_body: outcome.response_body.clone(),
            },
        )
        .await
    {
        tracing::error!(run_id = %run_id, error = %err, "failed to finalize run");
    }

    // (f) Compute the algebra result against the fresh snapshot.
    let algebra_outcome = match outcome.status {
        DispatchStatus::Success => Outcome::Success,
        DispatchStatus::Failed => Outcome::Failed,
    };
    let mut endpoint_snapshot = endpoint.clone();
    endpoint_snapshot.last_run_at = Some(now);
    let result = compute_next_run(&endpoint_snapshot, algebra_outcome, finished_at);

    // (g) Commit: updateAfterRun carries out the lease handoff.
    if let Err(err) = ctx
        .endpoint_store
        .update_after_run(id, result, now, finished_at)
        .await
    {
        tracing::error!(endpoint_id = %id, error = %err, "failed to commit updateAfterRun");
    }

    ClaimOutcome::Dispatched {
        run_id,
        status: outcome.status,
    }
}

/// Human-readable label for a [`RunSource`], used in log lines.
pub fn source_label(source: RunSource) -> &'static str {
    match source {
        RunSource::Baseline => "baseline",
        RunSource::AiInterval => "ai-interval",
        RunSource::AiOneshot => "ai-oneshot",
        RunSource::Manual => "manual",
        RunSource::Test => "test",
    }
}
