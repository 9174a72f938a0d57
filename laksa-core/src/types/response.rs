//! The canonical response shape adapters parse into.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::tools::ToolCall;

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Why the model stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
}

/// A provider-side code execution artifact (Gemini emits these as distinct
/// response parts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CodeExecutionResult {
    /// Code the model generated for the sandbox.
    Code { language: String, code: String },
    /// The sandbox outcome for previously generated code.
    Outcome { outcome: String, output: String },
}

/// One grounded source behind a grounded answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundingAttribution {
    pub title: Option<String>,
    pub uri: Option<String>,
    pub snippet: Option<String>,
}

/// Web-grounding metadata returned alongside the text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundingMetadata {
    pub web_search_queries: Option<Vec<String>>,
    pub attributions: Vec<GroundingAttribution>,
    pub search_entry_point: Option<String>,
}

/// Unified response returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub usage: Usage,
    pub finish_reason: FinishReason,
    /// The untouched provider payload, for callers that need more than the
    /// canonical surface.
    pub raw: Value,
    #[serde(default)]
    pub code_execution_results: Vec<CodeExecutionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding: Option<GroundingMetadata>,
    /// Provider-emitted reasoning, opaque to the rest of the pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
}

impl LlmResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}
