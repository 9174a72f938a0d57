//! Canonical request/response types shared by every adapter.

mod chat;
mod response;
mod tools;

pub use chat::{ChatMessage, ChatRequest, ContentPart, MediaSource, MessageRole};
pub use response::{
    CodeExecutionResult, FinishReason, GroundingAttribution, GroundingMetadata, LlmResponse, Usage,
};
pub use tools::{ToolCall, ToolChoice, ToolDefinition};
