//! The scheduling algebra (C8): a pure, total function from (endpoint
//! snapshot, last outcome, now) to a new `nextRunAt`, failure counter, and
//! hint-clear decision.
//!
//! Grounded on the teacher's `cooldown_minutes` exponential-backoff
//! arithmetic and `runs_to_fire`/`missed_window_count` candidate reasoning
//! (`crates/gateway/src/runtime/schedules.rs`, `schedule_runner.rs`),
//! generalized to cover hint precedence, guardrail clamping, and pause
//! overlay — none of which the teacher's schedules have. No I/O, no clock
//! reads: `now` is always supplied by the caller.

#![forbid(unsafe_code)]

use chrono::{DateTime, Duration, Utc};
use cronicorn_domain::{AiHints, Baseline, Endpoint, Guardrails, RunSource};

/// Exponential backoff cap (spec §4.1): `2^min(failureCount, CAP)`, so the
/// worst-case blow-up is 64x.
pub const BACKOFF_CAP: u32 = 6;

/// Outcome of the last dispatch attempt against this endpoint, or the
/// absence of one (first scheduling, or an out-of-band recompute).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed,
    Canceled,
    None,
}

impl Outcome {
    fn is_failure(self) -> bool {
        matches!(self, Outcome::Failed | Outcome::Canceled)
    }
}

/// The algebra's output: everything `updateAfterRun` needs to commit.
#[derive(Debug, Clone, PartialEq)]
pub struct AlgebraResult {
    pub next_run_at: DateTime<Utc>,
    pub next_run_source: RunSource,
    pub failure_count: u32,
    /// Hints after the hint-clear policy has been applied. The store
    /// persists this verbatim.
    pub ai_hints: AiHints,
}

struct Candidate {
    at: DateTime<Utc>,
    source: RunSource,
}

/// Compute the next scheduled run. Total over its inputs; never panics,
/// never performs I/O.
pub fn compute_next_run(endpoint: &Endpoint, outcome: Outcome, now: DateTime<Utc>) -> AlgebraResult {
    let anchor = endpoint.last_run_at.unwrap_or(now);

    let baseline = baseline_candidate(endpoint, anchor);
    let mut winner = baseline;

    if let Some(c) = active_interval_hint(endpoint, anchor, now) {
        if c.at < winner.at {
            winner = c;
        }
    }
    if let Some(c) = active_one_shot_hint(endpoint, now) {
        if c.at <= winner.at {
            winner = c;
        }
    }

    let old_failure_count = endpoint.failure_count;
    let mut t_star = winner.at;
    if outcome.is_failure() && winner.source != RunSource::AiOneshot {
        let multiplier = 1u64 << old_failure_count.min(BACKOFF_CAP);
        let delta = winner.at - anchor;
        t_star = anchor + delta * multiplier as i32;
    }

    t_star = clamp_to_guardrails(&endpoint.guardrails, now, t_star);

    if let Some(paused_until) = endpoint.paused_until {
        if paused_until > t_star {
            t_star = paused_until;
        }
    }

    let failure_count = match outcome {
        Outcome::Success => 0,
        Outcome::Failed | Outcome::Canceled => old_failure_count + 1,
        Outcome::None => old_failure_count,
    };

    let ai_hints = apply_hint_clear_policy(&endpoint.ai_hints, now);

    AlgebraResult {
        next_run_at: t_star,
        next_run_source: winner.source,
        failure_count,
        ai_hints,
    }
}

/// Guardrail clamp (spec §4.1): floor first, then ceiling, so an aggressive
/// hint can never land below the floor. Shared with `cronicorn-store`'s
/// `setNextRunAtIfEarlier`, which applies the same clamp outside the algebra.
pub fn clamp_to_guardrails(guardrails: &Guardrails, now: DateTime<Utc>, t: DateTime<Utc>) -> DateTime<Utc> {
    let mut t = t;
    if let Some(min_ms) = guardrails.min_interval_ms {
        let floor = now + Duration::milliseconds(min_ms as i64);
        if t < floor {
            t = floor;
        }
    }
    if let Some(max_ms) = guardrails.max_interval_ms {
        let ceiling = now + Duration::milliseconds(max_ms as i64);
        if t > ceiling {
            t = ceiling;
        }
    }
    t
}

fn baseline_candidate(endpoint: &Endpoint, anchor: DateTime<Utc>) -> Candidate {
    let at = match &endpoint.baseline {
        Baseline::Cron { expression } => {
            cronicorn_cron::cron_next(expression, &anchor).unwrap_or(anchor)
        }
        Baseline::Interval { ms } => anchor + Duration::milliseconds(*ms as i64),
    };
    Candidate {
        at,
        source: RunSource::Baseline,
    }
}

fn active_interval_hint(
    endpoint: &Endpoint,
    anchor: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<Candidate> {
    let hints = &endpoint.ai_hints;
    let ms = hints.interval_ms?;
    let expires = hints.expires_at?;
    if expires <= now {
        return None;
    }
    Some(Candidate {
        at: anchor + Duration::milliseconds(ms as i64),
        source: RunSource::AiInterval,
    })
}

fn active_one_shot_hint(endpoint: &Endpoint, now: DateTime<Utc>) -> Option<Candidate> {
    let hints = &endpoint.ai_hints;
    let at = hints.next_run_at?;
    let expires = hints.expires_at?;
    if expires <= now {
        return None;
    }
    if let Some(last_run_at) = endpoint.last_run_at {
        if at <= last_run_at {
            return None; // already consumed
        }
    }
    Some(Candidate {
        at,
        source: RunSource::AiOneshot,
    })
}

fn apply_hint_clear_policy(hints: &AiHints, now: DateTime<Utc>) -> AiHints {
    let mut next = hints.clone();
    if hints.expires_at.map_or(false, |e| e <= now) {
        next.clear();
        return next;
    }
    if hints.next_run_at.map_or(false, |t| t <= now) {
        next.next_run_at = None;
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use cronicorn_domain::{Guardrails, HttpMethod, RequestConfig};
    use uuid::Uuid;

    fn t(secs_from_epoch: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs_from_epoch, 0).unwrap()
    }

    fn endpoint(baseline: Baseline) -> Endpoint {
        Endpoint {
            id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            tenant_id: "tenant-1".into(),
            baseline,
            guardrails: Guardrails::default(),
            ai_hints: AiHints::default(),
            paused_until: None,
            archived_at: None,
            last_run_at: Some(t(0)),
            next_run_at: t(0),
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

    /// Scenario 1: three consecutive failures at T, T+60s, T+180s produce
    /// nextRunAt T+60s, T+120s, T+240s (x1, x2, x4), no clamp.
    #[test]
    fn baseline_interval_backoff_scenario() {
        let mut e = endpoint(Baseline::Interval { ms: 60_000 });
        e.last_run_at = Some(t(0));

        let r1 = compute_next_run(&e, Outcome::Failed, t(0));
        assert_eq!(r1.next_run_at, t(60));
        assert_eq!(r1.failure_count, 1);

        e.last_run_at = Some(t(60));
        e.failure_count = 1;
        let r2 = compute_next_run(&e, Outcome::Failed, t(60));
        assert_eq!(r2.next_run_at, t(60 + 120));
        assert_eq!(r2.failure_count, 2);

        e.last_run_at = Some(t(180));
        e.failure_count = 2;
        let r3 = compute_next_run(&e, Outcome::Failed, t(180));
        assert_eq!(r3.next_run_at, t(180 + 240));
        assert_eq!(r3.failure_count, 3);
    }

    /// Scenario 2: maxIntervalMs=150s clamps the third backoff (would be
    /// 240s) down to 150s.
    #[test]
    fn max_interval_clamp_overrides_backoff() {
        let mut e = endpoint(Baseline::Interval { ms: 60_000 });
        e.guardrails.max_interval_ms = Some(150_000);
        e.last_run_at = Some(t(180));
        e.failure_count = 2;

        let r = compute_next_run(&e, Outcome::Failed, t(180));
        assert_eq!(r.next_run_at, t(180 + 150));
    }

    /// Scenario 3: a one-shot hint beats the 1h baseline; after it fires it
    /// clears, and the following nextRunAt reverts to baseline from the
    /// consumed hint's lastRunAt.
    #[test]
    fn one_shot_hint_beats_baseline_then_clears() {
        let mut e = endpoint(Baseline::Interval { ms: 3_600_000 });
        e.last_run_at = Some(t(0));
        e.ai_hints.next_run_at = Some(t(120));
        e.ai_hints.expires_at = Some(t(600));

        let r1 = compute_next_run(&e, Outcome::None, t(0));
        assert_eq!(r1.next_run_at, t(120));
        assert_eq!(r1.next_run_source, RunSource::AiOneshot);
        assert!(r1.ai_hints.next_run_at.is_some()); // not yet due, not cleared

        // Dispatch happens at T+120s.
        e.last_run_at = Some(t(120));
        let r2 = compute_next_run(&e, Outcome::Success, t(120));
        assert_eq!(r2.next_run_at, t(120 + 3_600));
        assert_eq!(r2.next_run_source, RunSource::Baseline);
        assert!(r2.ai_hints.next_run_at.is_none()); // consumed, cleared
    }

    /// Backoff never applies to an active one-shot hint.
    #[test]
    fn backoff_exempts_one_shot_hint() {
        let mut e = endpoint(Baseline::Interval { ms: 60_000 });
        e.last_run_at = Some(t(0));
        e.failure_count = 3;
        e.ai_hints.next_run_at = Some(t(10));
        e.ai_hints.expires_at = Some(t(600));

        let r = compute_next_run(&e, Outcome::Failed, t(0));
        assert_eq!(r.next_run_at, t(10));
        assert_eq!(r.next_run_source, RunSource::AiOneshot);
    }

    /// Pause overlay wins over any computed candidate.
    #[test]
    fn pause_overlay_pushes_past_computed_candidate() {
        let mut e = endpoint(Baseline::Interval { ms: 60_000 });
        e.last_run_at = Some(t(0));
        e.paused_until = Some(t(3_600));

        let r = compute_next_run(&e, Outcome::Success, t(0));
        assert_eq!(r.next_run_at, t(3_600));
    }

    /// Guardrail floor applies even with no failure (e.g. an aggressive
    /// one-shot hint cannot run below minIntervalMs).
    #[test]
    fn guardrail_floor_clamps_aggressive_hint() {
        let mut e = endpoint(Baseline::Interval { ms: 60_000 });
        e.guardrails.min_interval_ms = Some(300_000);
        e.last_run_at = Some(t(0));
        e.ai_hints.next_run_at = Some(t(1));
        e.ai_hints.expires_at = Some(t(600));

        let r = compute_next_run(&e, Outcome::None, t(0));
        assert_eq!(r.next_run_at, t(300));
    }

    /// Success resets the failure counter to zero.
    #[test]
    fn success_resets_failure_count() {
        let mut e = endpoint(Baseline::Interval { ms: 60_000 });
        e.failure_count = 5;
        e.last_run_at = Some(t(0));

        let r = compute_next_run(&e, Outcome::Success, t(0));
        assert_eq!(r.failure_count, 0);
    }

    /// TTL expiry clears all hint fields, not just the one-shot.
    #[test]
    fn ttl_expiry_clears_all_hints() {
        let mut e = endpoint(Baseline::Interval { ms: 60_000 });
        e.last_run_at = Some(t(0));
        e.ai_hints.interval_ms = Some(30_000);
        e.ai_hints.expires_at = Some(t(10));
        e.ai_hints.reason = Some("testing".into());

        let r = compute_next_run(&e, Outcome::None, t(20));
        assert!(r.ai_hints.is_empty());
        assert!(r.ai_hints.reason.is_none());
    }

    /// Cron baseline: next occurrence strictly after the anchor.
    #[test]
    fn cron_baseline_uses_next_occurrence() {
        let mut e = endpoint(Baseline::Cron {
            expression: "0 * * * *".into(),
        });
        e.last_run_at = Some(
            DateTime::parse_from_rfc3339("2024-06-15T10:05:00Z")
                .unwrap()
                .with_timezone(&Utc),
        );

        let r = compute_next_run(&e, Outcome::Success, e.last_run_at.unwrap());
        let expected = DateTime::parse_from_rfc3339("2024-06-15T11:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(r.next_run_at, expected);
    }
}
