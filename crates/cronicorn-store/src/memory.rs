//! In-memory reference implementation of [`EndpointStore`] and [`RunStore`],
//! grounded on the teacher's `ScheduleStore`
//! (`crates/gateway/src/runtime/schedules/store.rs`): a single lock guarding
//! a handful of `HashMap`s, with whole-value clones handed back to callers.
//! The teacher uses `std::sync::RwLock`; this store uses `tokio::sync::Mutex`
//! since `claim_due_endpoints` must hold the lock across a multi-field
//! read-then-write that the teacher's single-process schedule runner never
//! needed to make atomic against concurrent claimers.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use cronicorn_algebra::AlgebraResult;
use cronicorn_domain::{AiSession, Endpoint, Error, JobStatus, Job, Result, Run, RunSource, RunStatus};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::patch::{AiHintWrite, EndpointPatch};
use crate::traits::{EndpointStore, RunFinish, RunStore};

#[derive(Default)]
struct StoreInner {
    jobs: HashMap<Uuid, Job>,
    endpoints: HashMap<Uuid, Endpoint>,
    runs: HashMap<Uuid, Run>,
    ai_sessions: HashMap<Uuid, AiSession>,
}

pub struct InMemoryStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(kind: &str, id: Uuid) -> Error {
    Error::NotFound(format!("{kind} {id} not found"))
}

#[async_trait]
impl EndpointStore for InMemoryStore {
    async fn add_job(&self, job: Job) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.jobs.insert(job.id, job);
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Job> {
        let inner = self.inner.lock().await;
        inner.jobs.get(&id).cloned().ok_or_else(|| not_found("job", id))
    }

    async fn archive_job(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let job = inner.jobs.get_mut(&id).ok_or_else(|| not_found("job", id))?;
        job.status = JobStatus::Archived;
        if job.archived_at.is_none() {
            job.archived_at = Some(now);
        }
        Ok(())
    }

    async fn list_jobs(&self, user_id: &str) -> Result<Vec<Job>> {
        let inner = self.inner.lock().await;
        let mut jobs: Vec<Job> = inner
            .jobs
            .values()
            .filter(|j| j.user_id == user_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn add_endpoint(&self, endpoint: Endpoint) -> Result<()> {
        endpoint.validate()?;
        let mut inner = self.inner.lock().await;
        inner.endpoints.insert(endpoint.id, endpoint);
        Ok(())
    }

    async fn get_endpoint(&self, id: Uuid) -> Result<Endpoint> {
        let inner = self.inner.lock().await;
        inner
            .endpoints
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("endpoint", id))
    }

    async fn list_active_endpoints(&self) -> Result<Vec<Endpoint>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .endpoints
            .values()
            .filter(|e| e.archived_at.is_none())
            .cloned()
            .collect())
    }

    async fn list_endpoints_for_job(&self, job_id: Uuid) -> Result<Vec<Endpoint>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .endpoints
            .values()
            .filter(|e| e.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn update_endpoint(&self, id: Uuid, patch: EndpointPatch) -> Result<Endpoint> {
        let mut inner = self.inner.lock().await;
        let endpoint = inner
            .endpoints
            .get_mut(&id)
            .ok_or_else(|| not_found("endpoint", id))?;
        if let Some(baseline) = patch.baseline {
            endpoint.baseline = baseline;
        }
        if let Some(guardrails) = patch.guardrails {
            endpoint.guardrails = guardrails;
        }
        if let Some(request) = patch.request {
            endpoint.request = request;
        }
        endpoint.validate()?;
        Ok(endpoint.clone())
    }

    async fn archive_endpoint(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let endpoint = inner
            .endpoints
            .get_mut(&id)
            .ok_or_else(|| not_found("endpoint", id))?;
        if endpoint.archived_at.is_none() {
            endpoint.archived_at = Some(now);
        }
        Ok(())
    }

    async fn claim_due_endpoints(
        &self,
        limit: u32,
        horizon_ms: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Uuid>> {
        let mut inner = self.inner.lock().await;
        let horizon = now + Duration::milliseconds(horizon_ms as i64);

        let mut eligible: Vec<(DateTime<Utc>, Uuid)> = inner
            .endpoints
            .values()
            .filter(|e| e.archived_at.is_none())
            .filter(|e| e.next_run_at <= horizon)
            .filter(|e| e.paused_until.map_or(true, |p| p <= now))
            .filter(|e| e.locked_until.map_or(true, |l| l <= now))
            .filter(|e| {
                inner
                    .jobs
                    .get(&e.job_id)
                    .map_or(true, |j| j.status != JobStatus::Archived)
            })
            .map(|e| (e.next_run_at, e.id))
            .collect();

        eligible.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        eligible.truncate(limit as usize);

        let claimed: Vec<Uuid> = eligible.into_iter().map(|(_, id)| id).collect();
        for id in &claimed {
            let endpoint = inner.endpoints.get_mut(id).expect("claimed id must exist");
            let lease_ms = endpoint
                .request
                .max_execution_time_ms
                .max(horizon_ms)
                .max(60_000);
            endpoint.locked_until = Some(now + Duration::milliseconds(lease_ms as i64));
        }
        if !claimed.is_empty() {
            tracing::debug!(count = claimed.len(), "claimed due endpoints");
        }
        Ok(claimed)
    }

    async fn set_lock(&self, id: Uuid, until: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let endpoint = inner
            .endpoints
            .get_mut(&id)
            .ok_or_else(|| not_found("endpoint", id))?;
        endpoint.locked_until = Some(until);
        Ok(())
    }

    async fn clear_lock(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let endpoint = inner
            .endpoints
            .get_mut(&id)
            .ok_or_else(|| not_found("endpoint", id))?;
        endpoint.locked_until = None;
        Ok(())
    }

    async fn set_next_run_at_if_earlier(
        &self,
        id: Uuid,
        t: DateTime<Utc>,
        source: RunSource,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let endpoint = inner
            .endpoints
            .get_mut(&id)
            .ok_or_else(|| not_found("endpoint", id))?;
        if endpoint.is_paused(now) {
            return Ok(false);
        }
        let clamped = cronicorn_algebra::clamp_to_guardrails(&endpoint.guardrails, now, t);
        if clamped < endpoint.next_run_at {
            endpoint.next_run_at = clamped;
            endpoint.next_run_source = source;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn write_ai_hint(&self, id: Uuid, hint: AiHintWrite) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let endpoint = inner
            .endpoints
            .get_mut(&id)
            .ok_or_else(|| not_found("endpoint", id))?;
        if hint.next_run_at.is_some() {
            endpoint.ai_hints.next_run_at = hint.next_run_at;
        }
        if hint.interval_ms.is_some() {
            endpoint.ai_hints.interval_ms = hint.interval_ms;
        }
        endpoint.ai_hints.expires_at = Some(hint.expires_at);
        if hint.reason.is_some() {
            endpoint.ai_hints.reason = hint.reason;
        }
        Ok(())
    }

    async fn set_paused_until(&self, id: Uuid, until: Option<DateTime<Utc>>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let endpoint = inner
            .endpoints
            .get_mut(&id)
            .ok_or_else(|| not_found("endpoint", id))?;
        endpoint.paused_until = until;
        Ok(())
    }

    async fn update_after_run(
        &self,
        id: Uuid,
        result: AlgebraResult,
        run_started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let endpoint = inner
            .endpoints
            .get_mut(&id)
            .ok_or_else(|| not_found("endpoint", id))?;
        endpoint.last_run_at = Some(run_started_at);
        endpoint.next_run_at = result.next_run_at;
        endpoint.next_run_source = result.next_run_source;
        endpoint.failure_count = result.failure_count;
        endpoint.ai_hints = result.ai_hints;
        endpoint.locked_until = if result.next_run_at > now {
            Some(result.next_run_at)
        } else {
            None
        };
        tracing::debug!(
            endpoint_id = %id,
            next_run_at = %result.next_run_at,
            failure_count = result.failure_count,
            "committed updateAfterRun"
        );
        Ok(())
    }

    async fn clear_ai_hints(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let endpoint = inner
            .endpoints
            .get_mut(&id)
            .ok_or_else(|| not_found("endpoint", id))?;
        endpoint.ai_hints.clear();
        Ok(())
    }

    async fn reset_failure_count(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let endpoint = inner
            .endpoints
            .get_mut(&id)
            .ok_or_else(|| not_found("endpoint", id))?;
        endpoint.failure_count = 0;
        Ok(())
    }
}

#[async_trait]
impl RunStore for InMemoryStore {
    async fn create_run(&self, run: Run) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.runs.insert(run.id, run);
        Ok(())
    }

    async fn finalize_run(&self, id: Uuid, patch: RunFinish) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let run = inner.runs.get_mut(&id).ok_or_else(|| not_found("run", id))?;
        run.status = patch.status;
        run.finished_at = Some(patch.finished_at);
        run.duration_ms = Some(patch.duration_ms);
        run.error_message = patch.error_message;
        run.http_status = patch.http_status;
        run.response_body = patch.response_body;
        Ok(())
    }

    async fn get_run(&self, id: Uuid) -> Result<Run> {
        let inner = self.inner.lock().await;
        inner.runs.get(&id).cloned().ok_or_else(|| not_found("run", id))
    }

    async fn list_runs_for_endpoint(&self, endpoint_id: Uuid, limit: usize) -> Result<Vec<Run>> {
        let inner = self.inner.lock().await;
        let mut runs: Vec<Run> = inner
            .runs
            .values()
            .filter(|r| r.endpoint_id == endpoint_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit);
        Ok(runs)
    }

    async fn sweep_zombies(&self, threshold: Duration, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let mut inner = self.inner.lock().await;
        let mut swept = Vec::new();
        for run in inner.runs.values_mut() {
            if run.status == RunStatus::Running && now - run.started_at > threshold {
                run.status = RunStatus::Failed;
                run.finished_at = Some(now);
                run.duration_ms = Some((now - run.started_at).num_milliseconds().max(0) as u64);
                run.error_message = Some("swept: exceeded zombie threshold".to_string());
                swept.push(run.id);
            }
        }
        Ok(swept)
    }

    async fn add_ai_session(&self, session: AiSession) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.ai_sessions.insert(session.id, session);
        Ok(())
    }

    async fn list_ai_sessions_for_endpoint(
        &self,
        endpoint_id: Uuid,
        limit: usize,
    ) -> Result<Vec<AiSession>> {
        let inner = self.inner.lock().await;
        let mut sessions: Vec<AiSession> = inner
            .ai_sessions
            .values()
            .filter(|s| s.endpoint_id == endpoint_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.analyzed_at.cmp(&a.analyzed_at));
        sessions.truncate(limit);
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cronicorn_domain::{AiHints, Baseline, Guardrails, HttpMethod, RequestConfig};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn job() -> Job {
        Job {
            id: Uuid::new_v4(),
            user_id: "user-1".into(),
            name: "job".into(),
            description: None,
            status: JobStatus::Active,
            created_at: now(),
            archived_at: None,
        }
    }

    fn endpoint(job_id: Uuid, next_run_at: DateTime<Utc>) -> Endpoint {
        Endpoint {
            id: Uuid::new_v4(),
            job_id,
            tenant_id: "tenant-1".into(),
            baseline: Baseline::Interval { ms: 60_000 },
            guardrails: Guardrails::default(),
            ai_hints: AiHints::default(),
            paused_until: None,
            archived_at: None,
            last_run_at: None,
            next_run_at,
            failure_count: 0,
            request: RequestConfig {
                url: "https://example.com".into(),
                method: HttpMethod::Get,
                ..Default::default()
            },
            locked_until: None,
            next_run_source: RunSource::Baseline,
        }
    }

    #[tokio::test]
    async fn claim_respects_horizon_pause_lock_and_archive() {
        let store = InMemoryStore::new();
        let j = job();
        store.add_job(j.clone()).await.unwrap();

        let due = endpoint(j.id, now());
        let not_due = endpoint(j.id, now() + Duration::hours(1));
        let paused = {
            let mut e = endpoint(j.id, now());
            e.paused_until = Some(now() + Duration::hours(1));
            e
        };
        let locked = {
            let mut e = endpoint(j.id, now());
            e.locked_until = Some(now() + Duration::hours(1));
            e
        };
        let archived = {
            let mut e = endpoint(j.id, now());
            e.archived_at = Some(now());
            e
        };

        for e in [&due, &not_due, &paused, &locked, &archived] {
            store.add_endpoint(e.clone()).await.unwrap();
        }

        let claimed = store.claim_due_endpoints(100, 1_000, now()).await.unwrap();
        assert_eq!(claimed, vec![due.id]);
    }

    #[tokio::test]
    async fn claim_excludes_archived_job() {
        let store = InMemoryStore::new();
        let mut j = job();
        j.status = JobStatus::Archived;
        store.add_job(j.clone()).await.unwrap();

        let e = endpoint(j.id, now());
        store.add_endpoint(e.clone()).await.unwrap();

        let claimed = store.claim_due_endpoints(100, 1_000, now()).await.unwrap();
        assert!(claimed.is_empty());
    }

    #[tokio::test]
    async fn claim_sets_lease_at_least_sixty_seconds() {
        let store = InMemoryStore::new();
        let j = job();
        store.add_job(j.clone()).await.unwrap();
        let e = endpoint(j.id, now());
        let id = e.id;
        store.add_endpoint(e).await.unwrap();

        store.claim_due_endpoints(10, 500, now()).await.unwrap();
        let claimed = store.get_endpoint(id).await.unwrap();
        let locked_until = claimed.locked_until.unwrap();
        assert_eq!(locked_until, now() + Duration::seconds(60));
    }

    /// P6: a nudge on a paused endpoint is a no-op.
    #[tokio::test]
    async fn set_next_run_at_if_earlier_noop_while_paused() {
        let store = InMemoryStore::new();
        let j = job();
        store.add_job(j.clone()).await.unwrap();
        let mut e = endpoint(j.id, now() + Duration::hours(1));
        e.paused_until = Some(now() + Duration::hours(2));
        let id = e.id;
        store.add_endpoint(e.clone()).await.unwrap();

        let applied = store
            .set_next_run_at_if_earlier(id, now(), RunSource::Manual, now())
            .await
            .unwrap();
        assert!(!applied);
        let after = store.get_endpoint(id).await.unwrap();
        assert_eq!(after.next_run_at, e.next_run_at);
    }

    #[tokio::test]
    async fn set_next_run_at_if_earlier_respects_guardrail_floor() {
        let store = InMemoryStore::new();
        let j = job();
        store.add_job(j.clone()).await.unwrap();
        let mut e = endpoint(j.id, now() + Duration::hours(1));
        e.guardrails.min_interval_ms = Some(300_000);
        let id = e.id;
        store.add_endpoint(e).await.unwrap();

        let applied = store
            .set_next_run_at_if_earlier(id, now(), RunSource::AiOneshot, now())
            .await
            .unwrap();
        assert!(applied);
        let after = store.get_endpoint(id).await.unwrap();
        assert_eq!(after.next_run_at, now() + Duration::seconds(300));
        assert_eq!(after.next_run_source, RunSource::AiOneshot);
    }

    #[tokio::test]
    async fn list_active_endpoints_excludes_archived() {
        let store = InMemoryStore::new();
        let j = job();
        store.add_job(j.clone()).await.unwrap();
        let live = endpoint(j.id, now());
        let mut archived = endpoint(j.id, now());
        archived.archived_at = Some(now());
        store.add_endpoint(live.clone()).await.unwrap();
        store.add_endpoint(archived).await.unwrap();

        let active = store.list_active_endpoints().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, live.id);
    }

    #[tokio::test]
    async fn list_jobs_filters_by_user() {
        let store = InMemoryStore::new();
        let mine = job();
        let mut other = job();
        other.user_id = "user-2".into();
        store.add_job(mine.clone()).await.unwrap();
        store.add_job(other).await.unwrap();

        let jobs = store.list_jobs(&mine.user_id).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, mine.id);
    }

    #[tokio::test]
    async fn sweep_zombies_marks_stale_running_runs_failed() {
        let store = InMemoryStore::new();
        let endpoint_id = Uuid::new_v4();
        let mut run = Run::start(endpoint_id, 1, RunSource::Baseline, now() - Duration::hours(1));
        run.status = RunStatus::Running;
        let run_id = run.id;
        store.create_run(run).await.unwrap();

        let swept = store
            .sweep_zombies(Duration::minutes(10), now())
            .await
            .unwrap();
        assert_eq!(swept, vec![run_id]);

        let after = store.get_run(run_id).await.unwrap();
        assert_eq!(after.status, RunStatus::Failed);
        assert!(after.error_message.is_some());
    }
}
