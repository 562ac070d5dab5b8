//! Dispatcher (C5): executes one HTTP request per the ordered steps in
//! spec §4.4. Grounded on the teacher's `WebFetchSkill` (client
//! construction, timeout, size-capped body read) generalized with signing
//! and SSRF gating ahead of the request, and classification of the result
//! into the scheduling algebra's `Outcome` rather than a skill result.
//! Holds no persistent state and never retries — retries are the
//! scheduler's business via the backoff overlay.

use std::time::{Duration as StdDuration, Instant};

use chrono::Utc;
use cronicorn_domain::{Endpoint, HttpMethod, JsonValue, SigningPolicy};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};

use crate::signer;
use crate::ssrf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub status: DispatchStatus,
    pub duration_ms: u64,
    pub error_message: Option<String>,
    pub status_code: Option<u16>,
    pub response_body: Option<JsonValue>,
}

impl DispatchOutcome {
    fn failed(error_message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            status: DispatchStatus::Failed,
            duration_ms,
            error_message: Some(error_message.into()),
            status_code: None,
            response_body: None,
        }
    }
}

/// Looks up a tenant's signing key (spec §6 "Signing-key lookup" external
/// collaborator). `Ok(None)` means the tenant has no key registered —
/// dispatch proceeds unsigned, which is not a failure. `Err` models a
/// lookup failure (store unavailable, etc.), handled per
/// [`SigningPolicy`].
#[async_trait::async_trait]
pub trait SigningKeyLookup: Send + Sync {
    async fn get_key(&self, tenant_id: &str) -> Result<Option<Vec<u8>>, String>;
}

pub async fn execute(
    endpoint: &Endpoint,
    tenant_id: &str,
    key_lookup: &dyn SigningKeyLookup,
    signing_policy: SigningPolicy,
    user_agent: &str,
    client: &reqwest::Client,
) -> DispatchOutcome {
    let start = Instant::now();

    // 1. SSRF gate (C3).
    if let Err(rejection) = ssrf::validate_url(&endpoint.request.url).await {
        return DispatchOutcome::failed(
            format!("ssrf rejected: {rejection}"),
            elapsed_ms(start),
        );
    }

    let method = to_reqwest_method(endpoint.request.method);
    let has_body = endpoint.request.body.is_some()
        && !matches!(endpoint.request.method, HttpMethod::Get);
    let body_bytes = if has_body {
        serde_json::to_vec(&endpoint.request.body.as_ref().unwrap().to_serde())
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    let mut builder = client
        .request(method, &endpoint.request.url)
        .header(USER_AGENT, user_agent)
        .timeout(StdDuration::from_millis(
            endpoint.request.timeout_ms.max(cronicorn_domain::entities::MIN_TIMEOUT_MS),
        ));

    for (name, value) in &endpoint.request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    // 2. Signing (C4).
    match key_lookup.get_key(tenant_id).await {
        Ok(Some(key)) => {
            let signed = signer::sign(&key, Utc::now(), &body_bytes);
            builder = builder
                .header("X-Cronicorn-Timestamp", signed.timestamp)
                .header("X-Cronicorn-Signature", signed.signature);
        }
        Ok(None) => {}
        Err(err) => match signing_policy {
            SigningPolicy::FailOpen => {
                tracing::warn!(tenant_id, error = %err, "signing key lookup failed, dispatching unsigned");
            }
            SigningPolicy::FailClosed => {
                return DispatchOutcome::failed(
                    format!("signing key lookup failed (fail-closed policy): {err}"),
                    elapsed_ms(start),
                );
            }
        },
    }

    // 3. Content-Type default.
    let user_set_content_type = endpoint
        .request
        .headers
        .keys()
        .any(|k| k.eq_ignore_ascii_case("content-type"));
    if has_body && !user_set_content_type {
        builder = builder.header(CONTENT_TYPE, "application/json");
    }
    if has_body {
        builder = builder.body(body_bytes);
    }

    // 4. Transport, with a deadline.
    let response = match builder.send().await {
        Ok(resp) => resp,
        Err(err) => {
            let reason = if err.is_timeout() {
                "request timed out".to_string()
            } else {
                format!("transport error: {err}")
            };
            return DispatchOutcome::failed(reason, elapsed_ms(start));
        }
    };

    let status_code = response.status().as_u16();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    // 5. Outcome classification.
    let max_bytes = (endpoint.request.max_response_size_kb as usize) * 1024;
    let bytes = match response.bytes().await {
        Ok(b) => b,
        Err(err) => {
            return DispatchOutcome::failed(
                format!("failed reading response body: {err}"),
                elapsed_ms(start),
            );
        }
    };

    let response_body = if content_type.contains("json") && bytes.len() <= max_bytes {
        serde_json::from_slice::<serde_json::Value>(&bytes)
            .ok()
            .map(JsonValue::from_serde)
    } else {
        None
    };

    let duration_ms = elapsed_ms(start);
    if (200..300).contains(&status_code) {
        DispatchOutcome {
            status: DispatchStatus::Success,
            duration_ms,
            error_message: None,
            status_code: Some(status_code),
            response_body,
        }
    } else {
        DispatchOutcome {
            status: DispatchStatus::Failed,
            duration_ms,
            error_message: Some(format!("endpoint responded with status {status_code}")),
            status_code: Some(status_code),
            response_body,
        }
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoKey;

    #[async_trait::async_trait]
    impl SigningKeyLookup for NoKey {
        async fn get_key(&self, _tenant_id: &str) -> Result<Option<Vec<u8>>, String> {
            Ok(None)
        }
    }

    /// SSRF rejection short-circuits before any network call.
    #[tokio::test]
    async fn ssrf_blocked_url_fails_without_dispatch() {
        let mut e = cronicorn_domain::Endpoint {
            id: uuid::Uuid::new_v4(),
            job_id: uuid::Uuid::new_v4(),
            tenant_id: "tenant-1".into(),
            baseline: cronicorn_domain::Baseline::Interval { ms: 60_000 },
            guardrails: Default::default(),
            ai_hints: Default::default(),
            paused_until: None,
            archived_at: None,
            last_run_at: None,
            next_run_at: Utc::now(),
            failure_count: 0,
            request: cronicorn_domain::RequestConfig {
                url: "http://169.254.169.254/latest/meta-data/".into(),
                ..Default::default()
            },
            locked_until: None,
            next_run_source: cronicorn_domain::RunSource::Baseline,
        };
        e.request.method = HttpMethod::Get;

        let client = reqwest::Client::new();
        let outcome = execute(
            &e,
            "tenant-1",
            &NoKey,
            SigningPolicy::FailOpen,
            "cronicorn/1.0",
            &client,
        )
        .await;
        assert_eq!(outcome.status, DispatchStatus::Failed);
        assert!(outcome.error_message.unwrap().contains("ssrf"));
    }
}
