//! Partial-update payloads accepted by the store (spec §4.2 operation
//! table). Fields left `None` are left untouched.

use chrono::{DateTime, Utc};
use cronicorn_domain::{Baseline, Guardrails, RequestConfig};

#[derive(Debug, Clone, Default)]
pub struct EndpointPatch {
    pub baseline: Option<Baseline>,
    pub guardrails: Option<Guardrails>,
    pub request: Option<RequestConfig>,
}

/// `writeAIHint`'s payload. `expires_at` is mandatory per spec §4.2;
/// `next_run_at`/`interval_ms`/`reason` are overwritten only when provided.
/// Explicit clearing goes through `clear_ai_hints` instead.
#[derive(Debug, Clone)]
pub struct AiHintWrite {
    pub next_run_at: Option<DateTime<Utc>>,
    pub interval_ms: Option<u64>,
    pub expires_at: DateTime<Utc>,
    pub reason: Option<String>,
}
