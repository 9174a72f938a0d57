//! Messages and multimodal content parts.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::tools::{ToolCall, ToolChoice, ToolDefinition};
use crate::params::GenerationConfig;

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// Where a media payload lives.
///
/// `Path` marks a local file pending upload; adapters without an upload
/// facility reject it with `UnsupportedFeature`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum MediaSource {
    Inline { data: Vec<u8>, mime_type: String },
    Url { url: String },
    Path { path: PathBuf },
}

impl MediaSource {
    pub fn inline(data: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self::Inline {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self::Url { url: url.into() }
    }
}

/// One piece of message content.
///
/// `Thought` carries provider-emitted reasoning; it is kept opaque and never
/// re-sent to other providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { source: MediaSource },
    Video { source: MediaSource },
    Audio { source: MediaSource },
    File { source: MediaSource },
    ToolCall { call: ToolCall },
    ToolResult { call_id: String, content: String },
    Thought { text: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image_inline(data: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            source: MediaSource::inline(data, mime_type),
        }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Self::Image {
            source: MediaSource::url(url),
        }
    }

    pub fn tool_call(call: ToolCall) -> Self {
        Self::ToolCall { call }
    }

    pub fn thought(text: impl Into<String>) -> Self {
        Self::Thought { text: text.into() }
    }

    pub fn is_tool_call(&self) -> bool {
        matches!(self, Self::ToolCall { .. })
    }

    pub fn is_media(&self) -> bool {
        matches!(
            self,
            Self::Image { .. } | Self::Video { .. } | Self::Audio { .. } | Self::File { .. }
        )
    }
}

/// A single conversation message.
///
/// Tool-role messages carry the `tool_call_id` they answer plus a single
/// `ToolResult` part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub parts: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            parts: vec![ContentPart::text(text)],
            tool_call_id: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            parts: vec![ContentPart::text(text)],
            tool_call_id: None,
        }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: MessageRole::User,
            parts,
            tool_call_id: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            parts: vec![ContentPart::text(text)],
            tool_call_id: None,
        }
    }

    /// Assistant message replaying tool calls exactly as the provider issued
    /// them (ids preserved).
    pub fn assistant_tool_calls(text: Option<String>, calls: Vec<ToolCall>) -> Self {
        let mut parts = Vec::with_capacity(calls.len() + 1);
        if let Some(text) = text.filter(|t| !t.is_empty()) {
            parts.push(ContentPart::text(text));
        }
        parts.extend(calls.into_iter().map(ContentPart::tool_call));
        Self {
            role: MessageRole::Assistant,
            parts,
            tool_call_id: None,
        }
    }

    /// Tool result message answering `tool_call_id`.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let call_id = tool_call_id.into();
        Self {
            role: MessageRole::Tool,
            parts: vec![ContentPart::ToolResult {
                call_id: call_id.clone(),
                content: content.into(),
            }],
            tool_call_id: Some(call_id),
        }
    }

    /// Concatenated text content of the message.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                ContentPart::Text { text } => out.push_str(text),
                ContentPart::ToolResult { content, .. } => out.push_str(content),
                _ => {}
            }
        }
        out
    }

    /// Tool calls carried by this message.
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::ToolCall { call } => Some(call),
                _ => None,
            })
            .collect()
    }

    /// Whether any part is non-text media.
    pub fn has_media(&self) -> bool {
        self.parts.iter().any(ContentPart::is_media)
    }
}

/// The canonical request every adapter translates from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub config: GenerationConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_message_carries_call_id_in_both_places() {
        let msg = ChatMessage::tool("call_1", "42");
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.text(), "42");
    }

    #[test]
    fn assistant_tool_calls_preserves_order_and_ids() {
        let msg = ChatMessage::assistant_tool_calls(
            None,
            vec![
                ToolCall::new("t1", "add", json!({"a": 1})),
                ToolCall::new("t2", "mul", json!({"b": 2})),
            ],
        );
        let calls = msg.tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "t1");
        assert_eq!(calls[1].id, "t2");
    }
}
