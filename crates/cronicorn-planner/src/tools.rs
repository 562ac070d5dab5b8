//! The planner's closed toolset (spec §4.5 step 3): every mutation goes
//! through a `cronicorn-store` primitive and is subject to the same
//! guardrails, pause semantics, and monotonicity as manual operations — the
//! planner has no privileged path. Grounded on the teacher's
//! `ToolDefinition`/`ToolCall` shape (`crates/domain/src/tool.rs`); the
//! handlers themselves are new, since the teacher has no per-endpoint
//! advisory loop.

use chrono::{DateTime, Duration, Utc};
use cronicorn_domain::{Error, JsonValue, Result, RunSource};
use cronicorn_store::{AiHintWrite, EndpointStore, RunStore};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::llm::{ToolCall, ToolDefinition};

pub const PROPOSE_INTERVAL: &str = "propose_interval";
pub const PROPOSE_NEXT_TIME: &str = "propose_next_time";
pub const PAUSE_UNTIL: &str = "pause_until";
pub const GET_LATEST_RESPONSE: &str = "get_latest_response";
pub const GET_RESPONSE_HISTORY: &str = "get_response_history";
pub const GET_SIBLING_LATEST_RESPONSES: &str = "get_sibling_latest_responses";
pub const SUBMIT_ANALYSIS: &str = "submit_analysis";

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: PROPOSE_INTERVAL.into(),
            description: "Propose a new interval cadence, TTL-scoped, nudging the next run earlier if the new interval is sooner.".into(),
            parameters: json!({
                "type": "object",
                "required": ["interval_ms", "ttl_minutes", "reason"],
                "properties": {
                    "interval_ms": { "type": "integer", "minimum": 1 },
                    "ttl_minutes": { "type": "integer", "minimum": 1 },
                    "reason": { "type": "string" }
                }
            }),
        },
        ToolDefinition {
            name: PROPOSE_NEXT_TIME.into(),
            description: "Propose a one-shot override run time, TTL-scoped, nudging the next run earlier if sooner.".into(),
            parameters: json!({
                "type": "object",
                "required": ["next_run_at", "ttl_minutes", "reason"],
                "properties": {
                    "next_run_at": { "type": "string", "format": "date-time" },
                    "ttl_minutes": { "type": "integer", "minimum": 1 },
                    "reason": { "type": "string" }
                }
            }),
        },
        ToolDefinition {
            name: PAUSE_UNTIL.into(),
            description: "Pause (or resume, with null) the endpoint until a given time.".into(),
            parameters: json!({
                "type": "object",
                "required": ["reason"],
                "properties": {
                    "until": { "type": ["string", "null"], "format": "date-time" },
                    "reason": { "type": "string" }
                }
            }),
        },
        ToolDefinition {
            name: GET_LATEST_RESPONSE.into(),
            description: "Read the most recent run's captured response body.".into(),
            parameters: json!({ "type": "object", "properties": {} }),
        },
        ToolDefinition {
            name: GET_RESPONSE_HISTORY.into(),
            description: "Read up to `limit` (<=50) recent runs with their outcomes.".into(),
            parameters: json!({
                "type": "object",
                "properties": { "limit": { "type": "integer", "minimum": 1, "maximum": 50 } }
            }),
        },
        ToolDefinition {
            name: GET_SIBLING_LATEST_RESPONSES.into(),
            description: "Read the latest response from every other endpoint in the same job.".into(),
            parameters: json!({ "type": "object", "properties": {} }),
        },
        ToolDefinition {
            name: SUBMIT_ANALYSIS.into(),
            description: "Terminate the session with a reasoning summary and the next analysis interval.".into(),
            parameters: json!({
                "type": "object",
                "required": ["reasoning"],
                "properties": {
                    "reasoning": { "type": "string" },
                    "next_analysis_in_ms": { "type": "integer", "minimum": 1 },
                    "confidence": { "type": "number", "minimum": 0, "maximum": 1 }
                }
            }),
        },
    ]
}

/// Outcome of `submit_analysis`, the only tool that ends the session.
pub struct SubmitAnalysis {
    pub reasoning: String,
    pub next_analysis_in_ms: Option<u64>,
}

pub enum ToolOutcome {
    Continue(Value),
    Terminate(SubmitAnalysis, Value),
}

pub async fn dispatch_tool_call(
    endpoint_store: &dyn EndpointStore,
    run_store: &dyn RunStore,
    endpoint_id: Uuid,
    job_id: Uuid,
    now: DateTime<Utc>,
    call: &ToolCall,
) -> Result<ToolOutcome> {
    let result = match call.tool_name.as_str() {
        PROPOSE_INTERVAL => propose_interval(endpoint_store, endpoint_id, now, &call.arguments).await?,
        PROPOSE_NEXT_TIME => propose_next_time(endpoint_store, endpoint_id, now, &call.arguments).await?,
        PAUSE_UNTIL => pause_until(endpoint_store, endpoint_id, &call.arguments).await?,
        GET_LATEST_RESPONSE => get_latest_response(run_store, endpoint_id).await?,
        GET_RESPONSE_HISTORY => get_response_history(run_store, endpoint_id, &call.arguments).await?,
        GET_SIBLING_LATEST_RESPONSES => {
            get_sibling_latest_responses(endpoint_store, run_store, endpoint_id, job_id).await?
        }
        SUBMIT_ANALYSIS => return submit_analysis(&call.arguments).map(|(s, v)| ToolOutcome::Terminate(s, v)),
        other => return Err(Error::Validation(format!("unknown tool: {other}"))),
    };
    Ok(ToolOutcome::Continue(result))
}

fn arg_u64(args: &Value, key: &str) -> Result<u64> {
    args.get(key)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| Error::Validation(format!("missing or invalid '{key}'")))
}

fn arg_str(args: &Value, key: &str) -> Result<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::Validation(format!("missing or invalid '{key}'")))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Validation(format!("invalid timestamp '{raw}': {e}")))
}

async fn propose_interval(
    store: &dyn EndpointStore,
    endpoint_id: Uuid,
    now: DateTime<Utc>,
    args: &Value,
) -> Result<Value> {
    let interval_ms = arg_u64(args, "interval_ms")?;
    let ttl_minutes = arg_u64(args, "ttl_minutes")?;
    let reason = arg_str(args, "reason").ok();
    let expires_at = now + Duration::minutes(ttl_minutes as i64);

    store
        .write_ai_hint(
            endpoint_id,
            AiHintWrite {
                next_run_at: None,
                interval_ms: Some(interval_ms),
                expires_at,
                reason,
            },
        )
        .await?;

    let endpoint = store.get_endpoint(endpoint_id).await?;
    let anchor = endpoint.last_run_at.unwrap_or(now);
    let candidate = anchor + Duration::milliseconds(interval_ms as i64);
    let applied = store
        .set_next_run_at_if_earlier(endpoint_id, candidate, RunSource::AiInterval, now)
        .await?;

    Ok(json!({ "applied": applied, "expires_at": expires_at.to_rfc3339() }))
}

async fn propose_next_time(
    store: &dyn EndpointStore,
    endpoint_id: Uuid,
    now: DateTime<Utc>,
    args: &Value,
) -> Result<Value> {
    let next_run_at = parse_timestamp(&arg_str(args, "next_run_at")?)?;
    let ttl_minutes = arg_u64(args, "ttl_minutes")?;
    let reason = arg_str(args, "reason").ok();
    let expires_at = now + Duration::minutes(ttl_minutes as i64);

    store
        .write_ai_hint(
            endpoint_id,
            AiHintWrite {
                next_run_at: Some(next_run_at),
                interval_ms: None,
                expires_at,
                reason,
            },
        )
        .await?;

    let applied = store
        .set_next_run_at_if_earlier(endpoint_id, next_run_at, RunSource::AiOneshot, now)
        .await?;

    Ok(json!({ "applied": applied, "expires_at": expires_at.to_rfc3339() }))
}

async fn pause_until(store: &dyn EndpointStore, endpoint_id: Uuid, args: &Value) -> Result<Value> {
    let until = match args.get("until").and_then(|v| v.as_str()) {
        Some(raw) => Some(parse_timestamp(raw)?),
        None => None,
    };
    store.set_paused_until(endpoint_id, until).await?;
    Ok(json!({ "paused_until": until.map(|t| t.to_rfc3339()) }))
}

fn run_summary_json(run: &cronicorn_domain::Run) -> Value {
    json!({
        "started_at": run.started_at.to_rfc3339(),
        "status": serde_json::to_value(run.status).unwrap_or(Value::Null),
        "http_status": run.http_status,
        "response_body": run.response_body.as_ref().map(JsonValue::to_serde),
    })
}

async fn get_latest_response(store: &dyn RunStore, endpoint_id: Uuid) -> Result<Value> {
    let runs = store.list_runs_for_endpoint(endpoint_id, 1).await?;
    Ok(match runs.first() {
        Some(run) => run_summary_json(run),
        None => Value::Null,
    })
}

async fn get_response_history(store: &dyn RunStore, endpoint_id: Uuid, args: &Value) -> Result<Value> {
    let limit = args
        .get("limit")
        .and_then(|v| v.as_u64())
        .unwrap_or(10)
        .min(50) as usize;
    let runs = store.list_runs_for_endpoint(endpoint_id, limit).await?;
    Ok(Value::Array(runs.iter().map(run_summary_json).collect()))
}

async fn get_sibling_latest_responses(
    endpoint_store: &dyn EndpointStore,
    run_store: &dyn RunStore,
    endpoint_id: Uuid,
    job_id: Uuid,
) -> Result<Value> {
    let siblings = endpoint_store.list_endpoints_for_job(job_id).await?;
    let mut out = Vec::new();
    for sibling in siblings.into_iter().filter(|e| e.id != endpoint_id) {
        let runs = run_store.list_runs_for_endpoint(sibling.id, 1).await?;
        out.push(json!({
            "endpoint_id": sibling.id.to_string(),
            "latest_response": runs.first().map(run_summary_json),
        }));
    }
    Ok(Value::Array(out))
}

fn submit_analysis(args: &Value) -> Result<(SubmitAnalysis, Value)> {
    let reasoning = arg_str(args, "reasoning")?;
    let next_analysis_in_ms = args.get("next_analysis_in_ms").and_then(|v| v.as_u64());
    let record = json!({
        "reasoning": reasoning,
        "next_analysis_in_ms": next_analysis_in_ms,
        "confidence": args.get("confidence"),
    });
    Ok((
        SubmitAnalysis {
            reasoning,
            next_analysis_in_ms,
        },
        record,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cronicorn_domain::{Baseline, Endpoint, Guardrails, Job, RequestConfig};
    use cronicorn_store::InMemoryStore;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn endpoint(job_id: Uuid) -> Endpoint {
        Endpoint {
            id: Uuid::new_v4(),
            job_id,
            tenant_id: "tenant-1".into(),
            baseline: Baseline::Interval { ms: 60_000 },
            guardrails: Guardrails::default(),
            ai_hints: Default::default(),
            paused_until: None,
            archived_at: None,
            last_run_at: Some(now()),
            next_run_at: now() + Duration::minutes(1),
            failure_count: 0,
            request: RequestConfig {
                url: "https://example.com".into(),
                ..Default::default()
            },
            locked_until: None,
            next_run_source: RunSource::Baseline,
        }
    }

    #[tokio::test]
    async fn propose_interval_nudges_next_run_earlier() {
        let store = InMemoryStore::new();
        let job = Job::new("user-1", "job", now());
        store.add_job(job.clone()).await.unwrap();
        let mut ep = endpoint(job.id);
        ep.next_run_at = now() + Duration::hours(1);
        let ep_id = ep.id;
        store.add_endpoint(ep).await.unwrap();

        let call = ToolCall {
            call_id: "c1".into(),
            tool_name: PROPOSE_INTERVAL.into(),
            arguments: json!({ "interval_ms": 30_000, "ttl_minutes": 10, "reason": "bursty" }),
        };
        let outcome = dispatch_tool_call(&store, &store, ep_id, job.id, now(), &call)
            .await
            .unwrap();
        match outcome {
            ToolOutcome::Continue(v) => assert_eq!(v["applied"], true),
            ToolOutcome::Terminate(..) => panic!("should not terminate"),
        }
        let updated = store.get_endpoint(ep_id).await.unwrap();
        assert!(updated.next_run_at < now() + Duration::hours(1));
        assert_eq!(updated.next_run_source, RunSource::AiInterval);
    }

    #[tokio::test]
    async fn submit_analysis_terminates_with_reasoning() {
        let store = InMemoryStore::new();
        let job = Job::new("user-1", "job", now());
        store.add_job(job.clone()).await.unwrap();
        let ep = endpoint(job.id);
        let ep_id = ep.id;
        store.add_endpoint(ep).await.unwrap();

        let call = ToolCall {
            call_id: "c1".into(),
            tool_name: SUBMIT_ANALYSIS.into(),
            arguments: json!({ "reasoning": "steady state", "next_analysis_in_ms": 600_000 }),
        };
        let outcome = dispatch_tool_call(&store, &store, ep_id, job.id, now(), &call)
            .await
            .unwrap();
        match outcome {
            ToolOutcome::Terminate(summary, _) => {
                assert_eq!(summary.reasoning, "steady state");
                assert_eq!(summary.next_analysis_in_ms, Some(600_000));
            }
            ToolOutcome::Continue(_) => panic!("should terminate"),
        }
    }

    #[tokio::test]
    async fn get_sibling_latest_responses_excludes_self() {
        let store = InMemoryStore::new();
        let job = Job::new("user-1", "job", now());
        store.add_job(job.clone()).await.unwrap();
        let ep_a = endpoint(job.id);
        let ep_b = endpoint(job.id);
        let ep_a_id = ep_a.id;
        store.add_endpoint(ep_a).await.unwrap();
        store.add_endpoint(ep_b.clone()).await.unwrap();

        let call = ToolCall {
            call_id: "c1".into(),
            tool_name: GET_SIBLING_LATEST_RESPONSES.into(),
            arguments: json!({}),
        };
        let outcome = dispatch_tool_call(&store, &store, ep_a_id, job.id, now(), &call)
            .await
            .unwrap();
        match outcome {
            ToolOutcome::Continue(Value::Array(entries)) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0]["endpoint_id"], ep_b.id.to_string());
            }
            _ => panic!("unexpected outcome"),
        }
    }
}
