//! The AI planner (C10): a per-endpoint advisory loop, decoupled from the
//! scheduler tick, that reads recent telemetry and proposes cadence changes
//! through the same store primitives a human operator would use.

pub mod health;
pub mod llm;
pub mod session;
pub mod tools;

pub use health::{compute_health_summary, HealthSummary, WindowHealth};
pub use llm::{ChatRequest, ChatResponse, LlmProvider, Message, Role, ToolCall, ToolDefinition};
pub use session::{run_session, SessionOutcome};
