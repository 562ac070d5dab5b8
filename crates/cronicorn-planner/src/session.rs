//! The per-endpoint analysis loop (spec §4.5 steps 2-4). Grounded on the
//! teacher's tool loop in `crates/gateway/src/runtime/turn.rs`
//! (`run_turn`/`MAX_TOOL_LOOPS`): assemble a prompt, call the provider, drain
//! tool calls one round at a time until the model calls the terminal tool or
//! the call budget is exhausted.

use chrono::{DateTime, Duration, Utc};
use cronicorn_domain::{AiSession, Endpoint, JsonValue, PlannerConfig, Result, ToolCallRecord};
use cronicorn_store::{EndpointStore, RunStore};
use serde_json::json;

use crate::health::{compute_health_summary, HealthSummary, WindowHealth};
use crate::llm::{ChatRequest, LlmProvider, Message, ToolCall};
use crate::tools::{dispatch_tool_call, tool_definitions, ToolOutcome};

/// Outcome returned to the caller after one endpoint's session completes, so
/// the caller can log/assert without re-reading the store.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: uuid::Uuid,
    pub reasoning: String,
    pub next_analysis_at: DateTime<Utc>,
    pub tool_call_count: usize,
}

/// Runs one analysis session for `endpoint_id`. Does not check whether the
/// endpoint is actually due — callers (the planner worker loop) do that.
pub async fn run_session(
    endpoint_store: &dyn EndpointStore,
    run_store: &dyn RunStore,
    llm: &dyn LlmProvider,
    config: &PlannerConfig,
    endpoint_id: uuid::Uuid,
    now: DateTime<Utc>,
) -> Result<SessionOutcome> {
    let endpoint = endpoint_store.get_endpoint(endpoint_id).await?;
    let recent_runs = run_store
        .list_runs_for_endpoint(endpoint_id, config.response_history_limit as usize)
        .await?;
    let health = compute_health_summary(&recent_runs, now);
    let siblings = endpoint_store.list_endpoints_for_job(endpoint.job_id).await?;

    let prompt = build_prompt(&endpoint, &health, sibling_count(&siblings, endpoint_id));
    let tools = tool_definitions();

    let mut messages = vec![Message::system(SYSTEM_PROMPT), Message::user(prompt)];
    let mut tool_calls_made: Vec<ToolCallRecord> = Vec::new();
    let mut input_tokens = 0u32;
    let mut output_tokens = 0u32;

    let (reasoning, next_analysis_in_ms) = loop {
        if tool_calls_made.len() as u32 >= config.max_tool_calls_per_session {
            break (
                "tool call budget exhausted without an explicit submit_analysis".to_string(),
                None,
            );
        }

        let response = llm
            .chat(ChatRequest {
                messages: messages.clone(),
                tools: tools.clone(),
                max_tokens: None,
            })
            .await?;
        input_tokens += response.input_tokens;
        output_tokens += response.output_tokens;

        if response.tool_calls.is_empty() {
            break (response.content, None);
        }

        let mut terminated = None;
        for call in &response.tool_calls {
            let record = execute_one_call(
                endpoint_store,
                run_store,
                endpoint.id,
                endpoint.job_id,
                now,
                call,
            )
            .await?;
            let result_text = record.result.to_serde().to_string();
            messages.push(Message::tool_result(&call.call_id, result_text));

            if call.tool_name == crate::tools::SUBMIT_ANALYSIS {
                if let Some(reasoning) = record.result.to_serde().get("reasoning").and_then(|v| v.as_str()) {
                    let next_ms = record
                        .result
                        .to_serde()
                        .get("next_analysis_in_ms")
                        .and_then(|v| v.as_u64());
                    terminated = Some((reasoning.to_string(), next_ms));
                }
            }
            tool_calls_made.push(record);
        }

        if let Some(done) = terminated {
            break done;
        }
    };

    let next_analysis_at = clamp_next_analysis(config, &endpoint, now, next_analysis_in_ms);

    let session = AiSession {
        id: uuid::Uuid::new_v4(),
        endpoint_id: endpoint.id,
        analyzed_at: now,
        tool_calls: tool_calls_made.clone(),
        reasoning: reasoning.clone(),
        input_tokens,
        output_tokens,
        next_analysis_at,
        failure_count_at_analysis: endpoint.failure_count,
    };
    run_store.add_ai_session(session.clone()).await?;

    Ok(SessionOutcome {
        session_id: session.id,
        reasoning,
        next_analysis_at,
        tool_call_count: tool_calls_made.len(),
    })
}

async fn execute_one_call(
    endpoint_store: &dyn EndpointStore,
    run_store: &dyn RunStore,
    endpoint_id: uuid::Uuid,
    job_id: uuid::Uuid,
    now: DateTime<Utc>,
    call: &ToolCall,
) -> Result<ToolCallRecord> {
    let outcome = dispatch_tool_call(endpoint_store, run_store, endpoint_id, job_id, now, call).await?;
    let result = match outcome {
        ToolOutcome::Continue(v) => v,
        ToolOutcome::Terminate(_, record) => record,
    };
    Ok(ToolCallRecord {
        tool_name: call.tool_name.clone(),
        arguments: JsonValue::from_serde(call.arguments.clone()),
        result: JsonValue::from_serde(result),
    })
}

/// Spec §4.5: `nextAnalysisAt` defaults to `baselineIntervalMs` or 5 min when
/// the model's `submit_analysis` call omits `next_analysis_in_ms` — a cron
/// baseline has no natural interval, so that case falls back to the
/// configured default.
fn clamp_next_analysis(
    config: &PlannerConfig,
    endpoint: &Endpoint,
    now: DateTime<Utc>,
    requested_ms: Option<u64>,
) -> DateTime<Utc> {
    let requested = requested_ms.unwrap_or_else(|| match &endpoint.baseline {
        cronicorn_domain::Baseline::Interval { ms } => *ms,
        cronicorn_domain::Baseline::Cron { .. } => config.default_analysis_interval_ms,
    });
    let clamped = requested
        .max(config.min_analysis_interval_ms)
        .min(config.max_analysis_interval_ms);
    now + Duration::milliseconds(clamped as i64)
}

fn sibling_count(siblings: &[Endpoint], endpoint_id: uuid::Uuid) -> usize {
    siblings.iter().filter(|e| e.id != endpoint_id).count()
}

const SYSTEM_PROMPT: &str = "You monitor one scheduled HTTP endpoint. Use the provided tools \
to adjust its cadence or pause it if its recent telemetry warrants it, then call \
submit_analysis to end the session. Only use the tools you were given.";

fn build_prompt(endpoint: &Endpoint, health: &HealthSummary, sibling_count: usize) -> String {
    let summary = json!({
        "endpoint_id": endpoint.id.to_string(),
        "job_id": endpoint.job_id.to_string(),
        "baseline": match &endpoint.baseline {
            cronicorn_domain::Baseline::Cron { expression } => json!({ "kind": "cron", "expression": expression }),
            cronicorn_domain::Baseline::Interval { ms } => json!({ "kind": "interval", "ms": ms }),
        },
        "failure_count": endpoint.failure_count,
        "paused_until": endpoint.paused_until.map(|t| t.to_rfc3339()),
        "sibling_endpoint_count": sibling_count,
        "health": {
            "window_1h": window_json(&health.window_1h),
            "window_4h": window_json(&health.window_4h),
            "window_24h": window_json(&health.window_24h),
            "current_failure_streak": health.current_failure_streak,
        },
    });
    summary.to_string()
}

fn window_json(w: &WindowHealth) -> serde_json::Value {
    json!({
        "success_count": w.success_count,
        "failure_count": w.failure_count,
        "success_rate": w.success_rate(),
        "avg_duration_ms": w.avg_duration_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cronicorn_domain::{Baseline, Guardrails, Job, RequestConfig};
    use cronicorn_store::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn endpoint(job_id: uuid::Uuid) -> Endpoint {
        Endpoint {
            id: uuid::Uuid::new_v4(),
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
            next_run_source: cronicorn_domain::RunSource::Baseline,
        }
    }

    /// Scripted provider: round 0 calls `propose_interval`, round 1 calls
    /// `submit_analysis`.
    struct ScriptedProvider {
        round: AtomicUsize,
        calls_seen: StdMutex<Vec<usize>>,
    }

    #[async_trait::async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat(&self, req: ChatRequest) -> Result<crate::llm::ChatResponse> {
            let round = self.round.fetch_add(1, Ordering::SeqCst);
            self.calls_seen.lock().unwrap().push(req.messages.len());
            let tool_calls = if round == 0 {
                vec![ToolCall {
                    call_id: "call-0".into(),
                    tool_name: crate::tools::PROPOSE_INTERVAL.into(),
                    arguments: json!({ "interval_ms": 30_000, "ttl_minutes": 10, "reason": "busy" }),
                }]
            } else {
                vec![ToolCall {
                    call_id: "call-1".into(),
                    tool_name: crate::tools::SUBMIT_ANALYSIS.into(),
                    arguments: json!({ "reasoning": "tightened cadence", "next_analysis_in_ms": 900_000 }),
                }]
            };
            Ok(crate::llm::ChatResponse {
                content: String::new(),
                tool_calls,
                input_tokens: 10,
                output_tokens: 5,
            })
        }
    }

    #[tokio::test]
    async fn session_runs_to_submit_analysis_and_persists() {
        let store = InMemoryStore::new();
        let job = Job::new("user-1", "job", now());
        store.add_job(job.clone()).await.unwrap();
        let mut ep = endpoint(job.id);
        ep.next_run_at = now() + Duration::hours(1);
        let ep_id = ep.id;
        store.add_endpoint(ep).await.unwrap();

        let provider = ScriptedProvider {
            round: AtomicUsize::new(0),
            calls_seen: StdMutex::new(Vec::new()),
        };
        let config = cronicorn_domain::Config::default().planner;

        let outcome = run_session(&store, &store, &provider, &config, ep_id, now())
            .await
            .unwrap();

        assert_eq!(outcome.reasoning, "tightened cadence");
        assert_eq!(outcome.tool_call_count, 2);
        assert_eq!(outcome.next_analysis_at, now() + Duration::milliseconds(900_000));

        let updated = store.get_endpoint(ep_id).await.unwrap();
        assert!(updated.next_run_at < now() + Duration::hours(1));

        let sessions = store.list_ai_sessions_for_endpoint(ep_id, 10).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].tool_calls.len(), 2);
    }

    #[tokio::test]
    async fn session_stops_at_tool_call_budget() {
        struct NeverEndingProvider;
        #[async_trait::async_trait]
        impl LlmProvider for NeverEndingProvider {
            async fn chat(&self, _req: ChatRequest) -> Result<crate::llm::ChatResponse> {
                Ok(crate::llm::ChatResponse {
                    content: String::new(),
                    tool_calls: vec![ToolCall {
                        call_id: "loop".into(),
                        tool_name: crate::tools::GET_LATEST_RESPONSE.into(),
                        arguments: json!({}),
                    }],
                    input_tokens: 1,
                    output_tokens: 1,
                })
            }
        }

        let store = InMemoryStore::new();
        let job = Job::new("user-1", "job", now());
        store.add_job(job.clone()).await.unwrap();
        let ep = endpoint(job.id);
        let ep_id = ep.id;
        store.add_endpoint(ep).await.unwrap();

        let mut config = cronicorn_domain::Config::default().planner;
        config.max_tool_calls_per_session = 2;

        let outcome = run_session(&store, &store, &NeverEndingProvider, &config, ep_id, now())
            .await
            .unwrap();
        assert_eq!(outcome.tool_call_count, 2);
        assert!(outcome.reasoning.contains("budget exhausted"));
    }
}
