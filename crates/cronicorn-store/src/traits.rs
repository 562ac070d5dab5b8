//! Store traits (C6, C7). Spec §5: "the persistent store is the only
//! shared state" — these traits are the seam a relational backend would
//! implement; `memory::InMemoryStore` is the reference implementation used
//! by the scheduler's tests and the single-process deployment.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use cronicorn_domain::{AiSession, Endpoint, Job, JsonValue, Result, Run, RunSource, RunStatus};
use uuid::Uuid;

use crate::patch::{AiHintWrite, EndpointPatch};

#[async_trait]
pub trait EndpointStore: Send + Sync {
    async fn add_job(&self, job: Job) -> Result<()>;
    async fn get_job(&self, id: Uuid) -> Result<Job>;
    async fn archive_job(&self, id: Uuid, now: DateTime<Utc>) -> Result<()>;
    /// All jobs for a user, newest first. Ambient CRUD surface for local
    /// testing/administration, not a scheduling primitive.
    async fn list_jobs(&self, user_id: &str) -> Result<Vec<Job>>;

    async fn add_endpoint(&self, endpoint: Endpoint) -> Result<()>;
    async fn get_endpoint(&self, id: Uuid) -> Result<Endpoint>;
    /// Every non-archived endpoint, regardless of job. Used by the planner
    /// worker loop (spec §4.5: "for each endpoint due for analysis") since
    /// analysis cadence is independent of the dispatch claim and has no
    /// query shape of its own.
    async fn list_active_endpoints(&self) -> Result<Vec<Endpoint>>;
    /// Sibling visibility (spec §4.5 step 2: "sibling-endpoint names in the
    /// same job").
    async fn list_endpoints_for_job(&self, job_id: Uuid) -> Result<Vec<Endpoint>>;
    async fn update_endpoint(&self, id: Uuid, patch: EndpointPatch) -> Result<Endpoint>;
    /// Idempotent: sets `archivedAt` if unset, no-ops if already archived.
    async fn archive_endpoint(&self, id: Uuid, now: DateTime<Utc>) -> Result<()>;

    /// Atomic batch claim (spec §4.2 — "the single most important operation
    /// in the system"). Ascending `nextRunAt`, ties broken by id.
    async fn claim_due_endpoints(
        &self,
        limit: u32,
        horizon_ms: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Uuid>>;

    async fn set_lock(&self, id: Uuid, until: DateTime<Utc>) -> Result<()>;
    async fn clear_lock(&self, id: Uuid) -> Result<()>;

    /// Apply the guardrail clamp to `t`; commit only if the clamped value is
    /// earlier than the current `nextRunAt`. No-op while paused (P6).
    /// Bypasses the monotonicity rule that governs backoff (I6).
    async fn set_next_run_at_if_earlier(
        &self,
        id: Uuid,
        t: DateTime<Utc>,
        source: RunSource,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    async fn write_ai_hint(&self, id: Uuid, hint: AiHintWrite) -> Result<()>;
    async fn set_paused_until(&self, id: Uuid, until: Option<DateTime<Utc>>) -> Result<()>;

    /// Commits an algebra result (§4.1) and performs the lease handoff from
    /// §4.3 step (g): `_lockedUntil := nextRunAt if nextRunAt > now else null`.
    /// `run_started_at` becomes the endpoint's new `lastRunAt`.
    async fn update_after_run(
        &self,
        id: Uuid,
        result: cronicorn_algebra::AlgebraResult,
        run_started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<()>;

    async fn clear_ai_hints(&self, id: Uuid) -> Result<()>;
    async fn reset_failure_count(&self, id: Uuid) -> Result<()>;
}

/// Terminal fields set when a Run finishes (spec §3 Run fields). `status`
/// must not be `Running`.
#[derive(Debug, Clone)]
pub struct RunFinish {
    pub status: RunStatus,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub error_message: Option<String>,
    pub http_status: Option<u16>,
    pub response_body: Option<JsonValue>,
}

#[async_trait]
pub trait RunStore: Send + Sync {
    async fn create_run(&self, run: Run) -> Result<()>;
    async fn finalize_run(&self, id: Uuid, patch: RunFinish) -> Result<()>;
    async fn get_run(&self, id: Uuid) -> Result<Run>;
    async fn list_runs_for_endpoint(&self, endpoint_id: Uuid, limit: usize) -> Result<Vec<Run>>;

    /// Marks `running` runs older than `threshold` as `failed` (spec §4.3
    /// crash recovery). Returns the ids swept.
    async fn sweep_zombies(&self, threshold: Duration, now: DateTime<Utc>) -> Result<Vec<Uuid>>;

    async fn add_ai_session(&self, session: AiSession) -> Result<()>;
    async fn list_ai_sessions_for_endpoint(
        &self,
        endpoint_id: Uuid,
        limit: usize,
    ) -> Result<Vec<AiSession>>;
}
