//! Top-level configuration tree, module-per-concern (teacher's
//! `domain::config` layout: one file per settings group, `#[serde(default)]`
//! everywhere so partial TOML files still deserialize).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scheduler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often each worker runs a tick.
    #[serde(default = "d_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// `claimDueEndpoints` batch size.
    #[serde(default = "d_claim_batch")]
    pub claim_batch: u32,
    /// `claimDueEndpoints` horizon (spec §4.2 — small, positive).
    #[serde(default = "d_claim_horizon_ms")]
    pub claim_horizon_ms: u64,
    /// Minimum lease duration floor (spec: `max(maxExecutionTimeMs, horizon, 60s)`).
    #[serde(default = "d_min_lease_ms")]
    pub min_lease_ms: u64,
    /// Per-worker bound on concurrent dispatches within one tick.
    #[serde(default = "d_parallelism")]
    pub parallelism: usize,
    /// A `running` Run older than this is swept to `failed` by the zombie sweeper.
    #[serde(default = "d_zombie_threshold_ms")]
    pub zombie_threshold_ms: u64,
    /// Exponential backoff cap (spec §4.1: CAP = 6, ≤ 64x blow-up).
    #[serde(default = "d_backoff_cap")]
    pub backoff_cap: u32,
}

fn d_tick_interval_ms() -> u64 {
    1_000
}
fn d_claim_batch() -> u32 {
    100
}
fn d_claim_horizon_ms() -> u64 {
    1_000
}
fn d_min_lease_ms() -> u64 {
    60_000
}
fn d_parallelism() -> usize {
    8
}
fn d_zombie_threshold_ms() -> u64 {
    10 * 60 * 1_000
}
fn d_backoff_cap() -> u32 {
    6
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: d_tick_interval_ms(),
            claim_batch: d_claim_batch(),
            claim_horizon_ms: d_claim_horizon_ms(),
            min_lease_ms: d_min_lease_ms(),
            parallelism: d_parallelism(),
            zombie_threshold_ms: d_zombie_threshold_ms(),
            backoff_cap: d_backoff_cap(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatcher
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What happens when a tenant has no registered signing key (spec §9 Open
/// Questions: "treat this as a configurable policy rather than a
/// hard-coded choice").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningPolicy {
    /// Proceed unsigned, log a warning (availability over strict integrity).
    FailOpen,
    /// Refuse to dispatch when signing is required but the key is unavailable.
    FailClosed,
}

impl Default for SigningPolicy {
    fn default() -> Self {
        Self::FailOpen
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default)]
    pub signing_policy: SigningPolicy,
    /// User-Agent sent on every dispatched request.
    #[serde(default = "d_user_agent")]
    pub user_agent: String,
}

fn d_user_agent() -> String {
    "cronicorn/1.0".to_string()
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            signing_policy: SigningPolicy::default(),
            user_agent: d_user_agent(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Planner
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "d_default_analysis_interval_ms")]
    pub default_analysis_interval_ms: u64,
    #[serde(default = "d_min_analysis_interval_ms")]
    pub min_analysis_interval_ms: u64,
    #[serde(default = "d_max_analysis_interval_ms")]
    pub max_analysis_interval_ms: u64,
    #[serde(default = "d_max_tool_calls_per_session")]
    pub max_tool_calls_per_session: u32,
    #[serde(default = "d_response_history_limit")]
    pub response_history_limit: u32,
}

fn d_default_analysis_interval_ms() -> u64 {
    5 * 60 * 1_000
}
fn d_min_analysis_interval_ms() -> u64 {
    5 * 60 * 1_000
}
fn d_max_analysis_interval_ms() -> u64 {
    24 * 60 * 60 * 1_000
}
fn d_max_tool_calls_per_session() -> u32 {
    16
}
fn d_response_history_limit() -> u32 {
    50
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            default_analysis_interval_ms: d_default_analysis_interval_ms(),
            min_analysis_interval_ms: d_min_analysis_interval_ms(),
            max_analysis_interval_ms: d_max_analysis_interval_ms(),
            max_tool_calls_per_session: d_max_tool_calls_per_session(),
            response_history_limit: d_response_history_limit(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory for JSON snapshot persistence (teacher's
    /// `data/schedules.json` pattern).
    #[serde(default = "d_state_dir")]
    pub state_dir: String,
}

fn d_state_dir() -> String {
    "./data".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_dir: d_state_dir(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_bind_addr")]
    pub bind_addr: String,
    /// Environment variable holding the API bearer token. Unset = dev mode
    /// (no auth enforced), matching the teacher's `require_api_token` posture.
    #[serde(default = "d_api_token_env")]
    pub api_token_env: String,
}

fn d_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}
fn d_api_token_env() -> String {
    "CRONICORN_API_TOKEN".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: d_bind_addr(),
            api_token_env: d_api_token_env(),
        }
    }
}
