//! Canonical message -> Gemini `contents` conversion.
//!
//! Gemini has no system role: system content becomes `systemInstruction`.
//! Assistant maps to role `model`; tool results ride in role `user` as
//! `functionResponse` parts, merged when consecutive.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};

use laksa_core::error::LlmError;
use laksa_core::types::{ChatMessage, ContentPart, MediaSource, MessageRole};

/// Map tool-call ids to function names by scanning prior assistant turns.
/// Gemini identifies results by function name, not call id.
fn tool_call_names(messages: &[ChatMessage]) -> HashMap<String, String> {
    let mut names = HashMap::new();
    for msg in messages {
        if msg.role == MessageRole::Assistant {
            for call in msg.tool_calls() {
                names.insert(call.id.clone(), call.name.clone());
            }
        }
    }
    names
}

fn inline_data(data: &[u8], mime_type: &str) -> Value {
    json!({
        "inlineData": {
            "mimeType": mime_type,
            "data": BASE64.encode(data),
        }
    })
}

fn media_part(source: &MediaSource, what: &str) -> Result<Value, LlmError> {
    match source {
        MediaSource::Inline { data, mime_type } => Ok(inline_data(data, mime_type)),
        MediaSource::Url { .. } | MediaSource::Path { .. } => {
            Err(LlmError::UnsupportedFeature(format!(
                "{what} references require a prior file upload; inline the bytes instead"
            )))
        }
    }
}

/// Convert one content part to a Gemini part.
pub(crate) fn part_to_json(part: &ContentPart) -> Result<Value, LlmError> {
    match part {
        ContentPart::Text { text } => Ok(json!({ "text": text })),
        ContentPart::Thought { text } => Ok(json!({ "text": text, "thought": true })),
        ContentPart::Image { source } => media_part(source, "image"),
        ContentPart::Video { source } => media_part(source, "video"),
        ContentPart::Audio { source } => media_part(source, "audio"),
        ContentPart::File { source } => match source {
            MediaSource::Inline { data, mime_type } => Ok(inline_data(data, mime_type)),
            MediaSource::Url { url } => Ok(json!({ "fileData": { "fileUri": url } })),
            MediaSource::Path { path } => Err(LlmError::UnsupportedFeature(format!(
                "local file '{}' requires an upload step",
                path.display()
            ))),
        },
        ContentPart::ToolCall { call } => {
            let args = if call.arguments.is_object() {
                call.arguments.clone()
            } else {
                json!({ "value": call.arguments })
            };
            Ok(json!({ "functionCall": { "name": call.name, "args": args } }))
        }
        ContentPart::ToolResult { .. } => Err(LlmError::Parse(
            "tool results convert at message level".into(),
        )),
    }
}

/// The `functionResponse` payload: JSON objects pass through, everything
/// else is wrapped under `result`.
fn function_response_payload(content: &str) -> Value {
    match serde_json::from_str::<Value>(content) {
        Ok(value) if value.is_object() => value,
        Ok(value) => json!({ "result": value }),
        Err(_) => json!({ "result": content }),
    }
}

/// Split messages into `systemInstruction` parts and `contents`.
pub(crate) fn messages_to_contents(
    messages: &[ChatMessage],
) -> Result<(Option<Value>, Vec<Value>), LlmError> {
    let names = tool_call_names(messages);
    let mut system_parts: Vec<Value> = Vec::new();
    let mut contents: Vec<Value> = Vec::new();
    let mut last_was_tool = false;

    for msg in messages {
        match msg.role {
            MessageRole::System => {
                for part in &msg.parts {
                    system_parts.push(part_to_json(part)?);
                }
                last_was_tool = false;
            }
            MessageRole::User => {
                let parts: Vec<Value> = msg
                    .parts
                    .iter()
                    .map(part_to_json)
                    .collect::<Result<_, _>>()?;
                contents.push(json!({ "role": "user", "parts": parts }));
                last_was_tool = false;
            }
            MessageRole::Assistant => {
                let mut parts = Vec::with_capacity(msg.parts.len());
                for part in &msg.parts {
                    parts.push(part_to_json(part)?);
                }
                if !parts.is_empty() {
                    contents.push(json!({ "role": "model", "parts": parts }));
                }
                last_was_tool = false;
            }
            MessageRole::Tool => {
                let call_id = msg.tool_call_id.as_deref().unwrap_or_default();
                let name = names
                    .get(call_id)
                    .cloned()
                    .unwrap_or_else(|| call_id.to_string());
                let part = json!({
                    "functionResponse": {
                        "name": name,
                        "response": function_response_payload(&msg.text()),
                    }
                });
                if last_was_tool {
                    if let Some(parts) = contents
                        .last_mut()
                        .and_then(|content| content["parts"].as_array_mut())
                    {
                        parts.push(part);
                    }
                } else {
                    contents.push(json!({ "role": "user", "parts": [part] }));
                }
                last_was_tool = true;
            }
        }
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(json!({ "parts": system_parts }))
    };
    Ok((system, contents))
}
