//! Provider-agnostic tool-calling types, trimmed from the teacher's
//! `crates/providers/src/traits.rs` (`LlmProvider`, `ChatRequest`,
//! `ChatResponse`) and `crates/domain/src/tool.rs` (`ToolCall`,
//! `ToolDefinition`, `Message`). The teacher's `Message` carries a
//! multi-part `MessageContent` for multi-modal providers and streaming;
//! the planner only ever sends plain text, so that sum type is dropped —
//! see DESIGN.md.

use cronicorn_domain::Result;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
        }
    }
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }
    pub fn tool_result(tool_call_id: &str, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: format!("[{tool_call_id}] {}", content.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: Value,
}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// The "LLM client" external collaborator (spec §6): `planWithTools(prompt,
/// tools, maxTokens) -> {toolCalls, reasoning, tokenUsage}`.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse>;
}
