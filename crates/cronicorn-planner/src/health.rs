//! Multi-window health summary (spec §4.5 step 2): "1h / 4h / 24h: success
//! rate, counts, average duration, current failure streak." Pure, derived
//! from the Runs log — grounded on spec §7's "a health summary roll-up...
//! is derivable from the Runs log" note; no teacher file computes this
//! (the teacher's schedules have no analogous telemetry rollup).

use chrono::{DateTime, Duration, Utc};
use cronicorn_domain::{Run, RunStatus};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowHealth {
    pub success_count: u32,
    pub failure_count: u32,
    pub avg_duration_ms: Option<f64>,
}

impl WindowHealth {
    pub fn success_rate(&self) -> Option<f64> {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            None
        } else {
            Some(self.success_count as f64 / total as f64)
        }
    }

    fn from_runs<'a>(runs: impl Iterator<Item = &'a Run>) -> Self {
        let mut success_count = 0u32;
        let mut failure_count = 0u32;
        let mut duration_sum = 0u64;
        let mut duration_n = 0u32;

        for run in runs {
            match run.status {
                RunStatus::Success => success_count += 1,
                RunStatus::Failed | RunStatus::Canceled => failure_count += 1,
                RunStatus::Running => continue,
            }
            if let Some(d) = run.duration_ms {
                duration_sum += d;
                duration_n += 1;
            }
        }

        let avg_duration_ms = if duration_n > 0 {
            Some(duration_sum as f64 / duration_n as f64)
        } else {
            None
        };

        Self {
            success_count,
            failure_count,
            avg_duration_ms,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthSummary {
    pub window_1h: WindowHealth,
    pub window_4h: WindowHealth,
    pub window_24h: WindowHealth,
    pub current_failure_streak: u32,
}

/// `runs` need not be sorted; this function sorts a local copy by
/// `startedAt` descending to compute the failure streak.
pub fn compute_health_summary(runs: &[Run], now: DateTime<Utc>) -> HealthSummary {
    let within = |hours: i64| {
        let cutoff = now - Duration::hours(hours);
        runs.iter().filter(move |r| r.started_at >= cutoff)
    };

    let mut sorted: Vec<&Run> = runs.iter().collect();
    sorted.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    let mut current_failure_streak = 0u32;
    for run in sorted {
        match run.status {
            RunStatus::Failed | RunStatus::Canceled => current_failure_streak += 1,
            RunStatus::Success => break,
            RunStatus::Running => continue,
        }
    }

    HealthSummary {
        window_1h: WindowHealth::from_runs(within(1)),
        window_4h: WindowHealth::from_runs(within(4)),
        window_24h: WindowHealth::from_runs(within(24)),
        current_failure_streak,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cronicorn_domain::RunSource;
    use uuid::Uuid;

    fn run_at(hours_ago: i64, status: RunStatus, duration_ms: Option<u64>) -> Run {
        let now = DateTime::parse_from_rfc3339("2024-01-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        Run {
            id: Uuid::new_v4(),
            endpoint_id: Uuid::new_v4(),
            status,
            attempt: 1,
            source: RunSource::Baseline,
            started_at: now - Duration::hours(hours_ago),
            finished_at: Some(now - Duration::hours(hours_ago)),
            duration_ms,
            error_message: None,
            http_status: Some(200),
            response_body: None,
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn windows_only_include_runs_within_range() {
        let runs = vec![
            run_at(0, RunStatus::Success, Some(100)),
            run_at(2, RunStatus::Success, Some(200)),
            run_at(10, RunStatus::Failed, Some(300)),
            run_at(30, RunStatus::Failed, Some(400)),
        ];
        let summary = compute_health_summary(&runs, now());
        assert_eq!(summary.window_1h.success_count, 1);
        assert_eq!(summary.window_4h.success_count, 2);
        assert_eq!(summary.window_24h.success_count, 2);
        assert_eq!(summary.window_24h.failure_count, 1);
    }

    #[test]
    fn failure_streak_stops_at_most_recent_success() {
        let runs = vec![
            run_at(0, RunStatus::Failed, Some(100)),
            run_at(1, RunStatus::Failed, Some(100)),
            run_at(2, RunStatus::Success, Some(100)),
            run_at(3, RunStatus::Failed, Some(100)),
        ];
        let summary = compute_health_summary(&runs, now());
        assert_eq!(summary.current_failure_streak, 2);
    }

    #[test]
    fn average_duration_only_counts_runs_with_duration() {
        let runs = vec![
            run_at(0, RunStatus::Success, Some(100)),
            run_at(0, RunStatus::Success, Some(300)),
        ];
        let summary = compute_health_summary(&runs, now());
        assert_eq!(summary.window_1h.avg_duration_ms, Some(200.0));
    }
}
