//! OpenAI-compatible request building and response parsing.

use serde_json::{json, Map, Value};

use laksa_core::adapter::{ApiAdapter, Feature};
use laksa_core::capabilities::capabilities_for;
use laksa_core::config::{ModelConfig, ProviderConfig};
use laksa_core::error::LlmError;
use laksa_core::execution::{ProviderRequest, ProviderResponse};
use laksa_core::keys::CredentialLease;
use laksa_core::params::{GenerationConfig, ResponseFormat};
use laksa_core::types::{
    ChatMessage, ChatRequest, ContentPart, FinishReason, LlmResponse, MediaSource, MessageRole,
    ToolCall, ToolChoice, ToolDefinition, Usage,
};

/// Adapter for the OpenAI chat-completions wire format.
///
/// Two stock instances exist: [`OpenAiCompatAdapter::openai`] for the
/// official API (versioned paths) and [`OpenAiCompatAdapter::general`] for
/// compatible servers whose `api_base` already carries the version prefix.
#[derive(Debug)]
pub struct OpenAiCompatAdapter {
    api_type: &'static str,
    chat_path: &'static str,
    embeddings_path: &'static str,
}

impl OpenAiCompatAdapter {
    pub fn openai() -> Self {
        Self {
            api_type: "openai",
            chat_path: "/v1/chat/completions",
            embeddings_path: "/v1/embeddings",
        }
    }

    pub fn general() -> Self {
        Self {
            api_type: "general_openai_compat",
            chat_path: "/chat/completions",
            embeddings_path: "/embeddings",
        }
    }

    pub(crate) fn with_paths(
        api_type: &'static str,
        chat_path: &'static str,
        embeddings_path: &'static str,
    ) -> Self {
        Self {
            api_type,
            chat_path,
            embeddings_path,
        }
    }

    pub(crate) fn chat_url(&self, provider: &ProviderConfig) -> Result<String, LlmError> {
        Ok(format!("{}{}", provider.resolved_api_base()?, self.chat_path))
    }

    pub(crate) fn embeddings_url(&self, provider: &ProviderConfig) -> Result<String, LlmError> {
        Ok(format!(
            "{}{}",
            provider.resolved_api_base()?,
            self.embeddings_path
        ))
    }
}

/// Standard headers: JSON content type, bearer auth, provider extras.
pub(crate) fn bearer_headers(
    credential: &CredentialLease,
    provider: &ProviderConfig,
) -> Vec<(String, String)> {
    let mut headers = vec![
        ("content-type".to_string(), "application/json".to_string()),
        (
            "authorization".to_string(),
            format!("Bearer {}", credential.expose()),
        ),
    ];
    for (name, value) in &provider.default_headers {
        headers.push((name.clone(), value.clone()));
    }
    headers
}

/// Flatten canonical messages to the OpenAI `messages` array.
///
/// Plain-text messages keep string content; media parts switch to the part
/// array form, which is only allowed when the model is known multimodal.
pub(crate) fn convert_messages(
    messages: &[ChatMessage],
    multimodal_ok: bool,
) -> Result<Vec<Value>, LlmError> {
    let mut out = Vec::with_capacity(messages.len());
    for msg in messages {
        match msg.role {
            MessageRole::Tool => {
                let call_id = msg.tool_call_id.clone().ok_or_else(|| {
                    LlmError::BadRequest {
                        status: None,
                        message: "tool message without tool_call_id".into(),
                    }
                })?;
                out.push(json!({
                    "role": "tool",
                    "tool_call_id": call_id,
                    "content": msg.text(),
                }));
            }
            MessageRole::Assistant => {
                let mut entry = Map::new();
                entry.insert("role".into(), json!("assistant"));
                entry.insert("content".into(), json!(msg.text()));
                let calls = msg.tool_calls();
                if !calls.is_empty() {
                    let replayed: Vec<Value> = calls
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": call.arguments.to_string(),
                                },
                            })
                        })
                        .collect();
                    entry.insert("tool_calls".into(), Value::Array(replayed));
                }
                out.push(Value::Object(entry));
            }
            MessageRole::System | MessageRole::User => {
                let role = if msg.role == MessageRole::System {
                    "system"
                } else {
                    "user"
                };
                if msg.has_media() {
                    if !multimodal_ok {
                        return Err(LlmError::UnsupportedFeature(
                            "model does not accept multimodal input".into(),
                        ));
                    }
                    out.push(json!({
                        "role": role,
                        "content": convert_parts(&msg.parts)?,
                    }));
                } else {
                    out.push(json!({ "role": role, "content": msg.text() }));
                }
            }
        }
    }
    Ok(out)
}

fn convert_parts(parts: &[ContentPart]) -> Result<Vec<Value>, LlmError> {
    let mut out = Vec::with_capacity(parts.len());
    for part in parts {
        match part {
            ContentPart::Text { text } => out.push(json!({ "type": "text", "text": text })),
            ContentPart::Image { source } => {
                let url = match source {
                    MediaSource::Url { url } => url.clone(),
                    MediaSource::Inline { data, mime_type } => {
                        use base64::{engine::general_purpose::STANDARD, Engine as _};
                        format!("data:{};base64,{}", mime_type, STANDARD.encode(data))
                    }
                    MediaSource::Path { path } => {
                        return Err(LlmError::UnsupportedFeature(format!(
                            "local file '{}' requires an upload step this protocol lacks",
                            path.display()
                        )))
                    }
                };
                out.push(json!({ "type": "image_url", "image_url": { "url": url } }));
            }
            ContentPart::Video { .. } | ContentPart::Audio { .. } | ContentPart::File { .. } => {
                return Err(LlmError::UnsupportedFeature(
                    "only text and image parts map to this protocol".into(),
                ))
            }
            // Provider-internal reasoning is never replayed to a provider.
            ContentPart::Thought { .. } => {}
            ContentPart::ToolCall { .. } | ContentPart::ToolResult { .. } => {}
        }
    }
    Ok(out)
}

/// Tool declarations in the `tools` array form.
pub(crate) fn serialize_tools(tools: &[ToolDefinition]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.schema(),
                },
            })
        })
        .collect()
}

pub(crate) fn tool_choice_value(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Required => json!("required"),
        ToolChoice::Tool { name } => json!({
            "type": "function",
            "function": { "name": name },
        }),
    }
}

/// Apply the supported subset of the generation config to the body.
/// `top_k` and `repetition_penalty` have no OpenAI equivalent and are
/// dropped; Gemini-only switches are likewise ignored here.
pub(crate) fn apply_config(
    body: &mut Map<String, Value>,
    config: &GenerationConfig,
) -> Result<(), LlmError> {
    config.validate()?;

    if let Some(t) = config.temperature {
        body.insert("temperature".into(), json!(t));
    }
    if let Some(m) = config.max_tokens {
        body.insert("max_tokens".into(), json!(m));
    }
    if let Some(p) = config.top_p {
        body.insert("top_p".into(), json!(p));
    }
    if let Some(p) = config.frequency_penalty {
        body.insert("frequency_penalty".into(), json!(p));
    }
    if let Some(p) = config.presence_penalty {
        body.insert("presence_penalty".into(), json!(p));
    }
    if let Some(stop) = &config.stop {
        body.insert("stop".into(), json!(stop));
    }
    if config.top_k.is_some() || config.repetition_penalty.is_some() {
        tracing::debug!("dropping top_k/repetition_penalty: no OpenAI equivalent");
    }
    match &config.response_format {
        Some(ResponseFormat::JsonObject) => {
            body.insert("response_format".into(), json!({ "type": "json_object" }));
        }
        Some(ResponseFormat::JsonSchema { schema }) => {
            body.insert(
                "response_format".into(),
                json!({
                    "type": "json_schema",
                    "json_schema": {
                        "name": "structured_response",
                        "schema": schema,
                        "strict": true,
                    },
                }),
            );
        }
        Some(ResponseFormat::Text) | None => {}
    }
    Ok(())
}

pub(crate) fn build_chat_body(
    request: &ChatRequest,
    model: &ModelConfig,
) -> Result<Value, LlmError> {
    let multimodal_ok = capabilities_for(&model.model_name).image_input;
    let mut body = Map::new();
    body.insert("model".into(), json!(model.model_name));
    body.insert(
        "messages".into(),
        Value::Array(convert_messages(&request.messages, multimodal_ok)?),
    );
    if let Some(tools) = &request.tools {
        if !tools.is_empty() {
            body.insert("tools".into(), Value::Array(serialize_tools(tools)));
        }
    }
    if let Some(choice) = &request.tool_choice {
        body.insert("tool_choice".into(), tool_choice_value(choice));
    }
    apply_config(&mut body, &request.config)?;
    Ok(Value::Object(body))
}

fn map_finish_reason(reason: Option<&str>, has_tool_calls: bool) -> FinishReason {
    match reason {
        Some("stop") => FinishReason::Stop,
        Some("length") => FinishReason::Length,
        Some("tool_calls") | Some("function_call") => FinishReason::ToolCalls,
        Some("content_filter") => FinishReason::ContentFilter,
        _ if has_tool_calls => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    }
}

fn parse_usage(value: &Value) -> Usage {
    Usage {
        prompt_tokens: value["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: value["completion_tokens"].as_u64().unwrap_or(0) as u32,
        total_tokens: value["total_tokens"].as_u64().unwrap_or(0) as u32,
    }
}

/// Parse a 2xx chat-completions body into the canonical response.
pub(crate) fn parse_chat_body(body: &Value) -> Result<LlmResponse, LlmError> {
    if body.get("error").is_some() {
        // Some compatible servers tunnel errors through 200 responses.
        return Err(envelope_error(body, 200, "openai-compatible provider"));
    }
    let choice = body["choices"]
        .get(0)
        .ok_or_else(|| LlmError::Parse("response has no choices".into()))?;
    let message = &choice["message"];

    let text = message["content"].as_str().unwrap_or("").trim().to_string();

    let mut tool_calls = Vec::new();
    if let Some(raw_calls) = message["tool_calls"].as_array() {
        for raw in raw_calls {
            if raw["type"].as_str().unwrap_or("function") != "function" {
                continue;
            }
            let id = raw["id"]
                .as_str()
                .ok_or_else(|| LlmError::Parse("tool call without id".into()))?;
            let name = raw["function"]["name"]
                .as_str()
                .ok_or_else(|| LlmError::Parse("tool call without function name".into()))?;
            let raw_args = raw["function"]["arguments"].as_str().unwrap_or("{}");
            // Providers occasionally emit arguments that are not valid
            // JSON; keep them as a string and let schema validation reject.
            let arguments = serde_json::from_str(raw_args)
                .unwrap_or_else(|_| Value::String(raw_args.to_string()));
            tool_calls.push(ToolCall::new(id, name, arguments));
        }
    }

    let finish_reason = map_finish_reason(choice["finish_reason"].as_str(), !tool_calls.is_empty());
    Ok(LlmResponse {
        text,
        usage: parse_usage(&body["usage"]),
        finish_reason,
        tool_calls,
        raw: body.clone(),
        code_execution_results: Vec::new(),
        grounding: None,
        thought: message["reasoning_content"].as_str().map(str::to_string),
    })
}

pub(crate) fn parse_embeddings_body(body: &Value) -> Result<Vec<Vec<f32>>, LlmError> {
    let data = body["data"]
        .as_array()
        .ok_or_else(|| LlmError::Parse("embeddings response has no data array".into()))?;
    data.iter()
        .map(|item| {
            item["embedding"]
                .as_array()
                .ok_or_else(|| LlmError::Parse("embeddings entry has no vector".into()))
                .map(|values| {
                    values
                        .iter()
                        .filter_map(Value::as_f64)
                        .map(|v| v as f32)
                        .collect()
                })
        })
        .collect()
}

/// Map the OpenAI error envelope onto the taxonomy, falling back to the
/// HTTP status when the body carries no machine-readable code.
pub(crate) fn envelope_error(body: &Value, status: u16, provider: &str) -> LlmError {
    let error = &body["error"];
    let message = error["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());
    let code = error["code"].as_str().unwrap_or("");
    let error_type = error["type"].as_str().unwrap_or("");

    match (code, error_type) {
        ("invalid_api_key" | "authentication_failed", _) | (_, "authentication_error") => {
            LlmError::Auth {
                provider: provider.to_string(),
                status,
                message,
            }
        }
        ("rate_limit_exceeded" | "quota_exceeded" | "insufficient_quota", _)
        | (_, "insufficient_quota") => LlmError::RateLimited {
            provider: provider.to_string(),
            message,
            retry_after: None,
        },
        ("context_length_exceeded" | "model_not_found" | "invalid_model", _) => {
            LlmError::BadRequest {
                status: Some(status),
                message,
            }
        }
        (_, "content_filter") => LlmError::ContentFiltered { reason: message },
        _ => LlmError::from_status(provider, status, message),
    }
}

impl ApiAdapter for OpenAiCompatAdapter {
    fn api_type(&self) -> &'static str {
        self.api_type
    }

    fn supports(&self, feature: Feature) -> bool {
        matches!(
            feature,
            Feature::Tools | Feature::Multimodal | Feature::JsonMode | Feature::Embeddings
        )
    }

    fn build_chat_request(
        &self,
        request: &ChatRequest,
        credential: &CredentialLease,
        provider: &ProviderConfig,
        model: &ModelConfig,
    ) -> Result<ProviderRequest, LlmError> {
        Ok(ProviderRequest {
            url: self.chat_url(provider)?,
            headers: bearer_headers(credential, provider),
            body: build_chat_body(request, model)?,
        })
    }

    fn parse_chat_response(&self, response: &ProviderResponse) -> Result<LlmResponse, LlmError> {
        parse_chat_body(&response.json())
    }

    fn build_embeddings_request(
        &self,
        texts: &[String],
        _task_type: Option<&str>,
        credential: &CredentialLease,
        provider: &ProviderConfig,
        model: &ModelConfig,
    ) -> Result<ProviderRequest, LlmError> {
        Ok(ProviderRequest {
            url: self.embeddings_url(provider)?,
            headers: bearer_headers(credential, provider),
            body: json!({
                "model": model.model_name,
                "input": texts,
            }),
        })
    }

    fn parse_embeddings_response(
        &self,
        response: &ProviderResponse,
    ) -> Result<Vec<Vec<f32>>, LlmError> {
        parse_embeddings_body(&response.json())
    }

    fn extract_error(&self, response: &ProviderResponse, provider: &str) -> LlmError {
        envelope_error(&response.json(), response.status, provider)
    }
}
