//! Core entities: [`Job`], [`Endpoint`], [`Run`], [`AiSession`] (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::json_value::JsonValue;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Job
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Active,
    Paused,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            name: name.into(),
            description: None,
            status: JobStatus::Active,
            created_at: now,
            archived_at: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Endpoint
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// Baseline cadence: exactly one of these two variants (I1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Baseline {
    Cron { expression: String },
    Interval { ms: u64 },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Guardrails {
    pub min_interval_ms: Option<u64>,
    pub max_interval_ms: Option<u64>,
}

impl Guardrails {
    /// I2: if both are set, min must be <= max.
    pub fn validate(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.min_interval_ms, self.max_interval_ms) {
            if min > max {
                return Err(Error::Validation(format!(
                    "minIntervalMs ({min}) must be <= maxIntervalMs ({max})"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiHints {
    pub interval_ms: Option<u64>,
    /// One-shot override.
    pub next_run_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

impl AiHints {
    pub fn is_empty(&self) -> bool {
        self.interval_ms.is_none() && self.next_run_at.is_none() && self.expires_at.is_none()
    }

    pub fn clear(&mut self) {
        *self = AiHints::default();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<JsonValue>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_execution_ms")]
    pub max_execution_time_ms: u64,
    #[serde(default = "default_max_response_kb")]
    pub max_response_size_kb: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: default_method(),
            headers: HashMap::new(),
            body: None,
            timeout_ms: default_timeout_ms(),
            max_execution_time_ms: default_max_execution_ms(),
            max_response_size_kb: default_max_response_kb(),
        }
    }
}

fn default_method() -> HttpMethod {
    HttpMethod::Get
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_max_execution_ms() -> u64 {
    60_000
}
fn default_max_response_kb() -> u64 {
    100
}

pub const MIN_TIMEOUT_MS: u64 = 1_000;
pub const MAX_EXECUTION_TIME_MS_CEILING: u64 = 30 * 60 * 1_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: Uuid,
    pub job_id: Uuid,
    pub tenant_id: String,
    pub baseline: Baseline,
    #[serde(default)]
    pub guardrails: Guardrails,
    #[serde(default)]
    pub ai_hints: AiHints,
    pub paused_until: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: DateTime<Utc>,
    #[serde(default)]
    pub failure_count: u32,
    pub request: RequestConfig,
    /// Adapter-private lease timestamp. Not part of the public API surface;
    /// only the store mutates it.
    #[serde(default)]
    pub locked_until: Option<DateTime<Utc>>,
    /// Which component last drove `next_run_at`. Read at claim time to
    /// attribute the new Run's `source` (§4.3) without re-deriving it from
    /// hint state, which would be ambiguous once a hint has been cleared.
    #[serde(default = "default_run_source")]
    pub next_run_source: RunSource,
}

fn default_run_source() -> RunSource {
    RunSource::Baseline
}

impl Endpoint {
    /// I1/I2 validation, run at creation and update.
    pub fn validate(&self) -> Result<()> {
        self.guardrails.validate()?;
        if self.request.timeout_ms < MIN_TIMEOUT_MS {
            return Err(Error::Validation(format!(
                "timeoutMs must be >= {MIN_TIMEOUT_MS}"
            )));
        }
        if self.request.max_execution_time_ms > MAX_EXECUTION_TIME_MS_CEILING {
            return Err(Error::Validation(format!(
                "maxExecutionTimeMs must be <= {MAX_EXECUTION_TIME_MS_CEILING}"
            )));
        }
        if let Baseline::Cron { expression } = &self.baseline {
            cronicorn_cron::validate_cron(expression)
                .map_err(|e| Error::Validation(format!("invalid cron expression: {e}")))?;
        }
        Ok(())
    }

    pub fn is_paused(&self, now: DateTime<Utc>) -> bool {
        self.paused_until.map_or(false, |t| t > now)
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunSource {
    Baseline,
    AiInterval,
    AiOneshot,
    Manual,
    Test,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub status: RunStatus,
    pub attempt: u32,
    pub source: RunSource,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub error_message: Option<String>,
    pub http_status: Option<u16>,
    pub response_body: Option<JsonValue>,
}

impl Run {
    pub fn start(endpoint_id: Uuid, attempt: u32, source: RunSource, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint_id,
            status: RunStatus::Running,
            attempt,
            source,
            started_at: now,
            finished_at: None,
            duration_ms: None,
            error_message: None,
            http_status: None,
            response_body: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AI Analysis Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub arguments: JsonValue,
    pub result: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSession {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    pub tool_calls: Vec<ToolCallRecord>,
    pub reasoning: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub next_analysis_at: DateTime<Utc>,
    pub failure_count_at_analysis: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn base_endpoint() -> Endpoint {
        Endpoint {
            id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            tenant_id: "tenant-1".into(),
            baseline: Baseline::Interval { ms: 60_000 },
            guardrails: Guardrails::default(),
            ai_hints: AiHints::default(),
            paused_until: None,
            archived_at: None,
            last_run_at: None,
            next_run_at: now(),
            failure_count: 0,
            request: RequestConfig {
                url: "https://example.com".into(),
                ..Default::default()
            },
            locked_until: None,
            next_run_source: RunSource::Baseline,
        }
    }

    #[test]
    fn guardrails_min_greater_than_max_rejected() {
        let mut e = base_endpoint();
        e.guardrails.min_interval_ms = Some(100);
        e.guardrails.max_interval_ms = Some(50);
        assert!(e.validate().is_err());
    }

    #[test]
    fn guardrails_min_equal_max_allowed() {
        let mut e = base_endpoint();
        e.guardrails.min_interval_ms = Some(100);
        e.guardrails.max_interval_ms = Some(100);
        assert!(e.validate().is_ok());
    }

    #[test]
    fn timeout_below_floor_rejected() {
        let mut e = base_endpoint();
        e.request.timeout_ms = 500;
        assert!(e.validate().is_err());
    }

    #[test]
    fn max_execution_time_above_ceiling_rejected() {
        let mut e = base_endpoint();
        e.request.max_execution_time_ms = MAX_EXECUTION_TIME_MS_CEILING + 1;
        assert!(e.validate().is_err());
    }

    #[test]
    fn is_paused_respects_now() {
        let mut e = base_endpoint();
        e.paused_until = Some(now() + chrono::Duration::hours(1));
        assert!(e.is_paused(now()));
        assert!(!e.is_paused(now() + chrono::Duration::hours(2)));
    }

    #[test]
    fn request_config_defaults() {
        let json = serde_json::json!({ "url": "https://example.com" });
        let rc: RequestConfig = serde_json::from_value(json).unwrap();
        assert_eq!(rc.timeout_ms, 30_000);
        assert_eq!(rc.max_execution_time_ms, 60_000);
        assert_eq!(rc.max_response_size_kb, 100);
        assert_eq!(rc.method, HttpMethod::Get);
    }
}
