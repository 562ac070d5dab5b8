//! The scheduler worker loop: tick on an interval until cancelled, plus a
//! parallel zombie-sweeper loop (spec §4.3 crash recovery).
//!
//! Grounded on `sa-node-macos/src/main.rs`'s `CancellationToken` shutdown
//! pattern (own a token, spawn a ctrl-c listener that cancels it, `select!`
//! against it in the work loop) and the teacher's periodic-tick wiring in
//! `gateway/src/main.rs` (`tokio::time::interval` driving `ScheduleRunner::tick`).

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use cronicorn_domain::Clock;
use cronicorn_store::RunStore;
use tokio_util::sync::CancellationToken;

use crate::tick::{run_tick, TickContext};

/// Runs ticks on `config.scheduler.tick_interval_ms` until `shutdown` fires.
/// Per spec §5 cancellation semantics: stop claiming new batches on
/// shutdown, but this function does not itself cancel in-flight dispatches
/// — each dispatch already carries its own per-request deadline
/// (`timeoutMs`), so the in-flight `run_tick` call is simply allowed to
/// finish before the loop exits.
pub async fn run_worker_loop(ctx: Arc<TickContext>, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(StdDuration::from_millis(
        ctx.config.scheduler.tick_interval_ms,
    ));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("scheduler worker shutting down");
                break;
            }
            _ = interval.tick() => {
                let outcomes = run_tick(&ctx).await;
                if !outcomes.is_empty() {
                    tracing::debug!(dispatched = outcomes.len(), "tick complete");
                }
            }
        }
    }
}

/// Periodically sweeps `running` Runs older than `zombie_threshold_ms` to
/// `failed` (spec §4.3: "A `running` run older than a configured zombie
/// threshold is swept to `failed`"). Runs on the same cadence as the tick
/// loop by default but is independent of it — a stalled tick loop does not
/// block the sweeper, and vice versa.
pub async fn run_zombie_sweeper(
    run_store: Arc<dyn RunStore>,
    clock: Arc<dyn Clock>,
    threshold_ms: u64,
    sweep_interval: StdDuration,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(sweep_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let threshold = Duration::milliseconds(threshold_ms as i64);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("zombie sweeper shutting down");
                break;
            }
            _ = interval.tick() => {
                match run_store.sweep_zombies(threshold, clock.now()).await {
                    Ok(swept) if !swept.is_empty() => {
                        tracing::warn!(count = swept.len(), "swept zombie runs");
                    }
                    Ok(_) => {}
                    Err(err) => tracing::error!(error = %err, "zombie sweep failed"),
                }
            }
        }
    }
}
