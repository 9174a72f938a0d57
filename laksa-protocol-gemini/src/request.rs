//! Gemini `generateContent` request building.

use serde_json::{json, Map, Value};

use laksa_core::config::{ModelConfig, ProviderConfig};
use laksa_core::error::LlmError;
use laksa_core::execution::ProviderRequest;
use laksa_core::keys::CredentialLease;
use laksa_core::params::{GenerationConfig, ResponseFormat};
use laksa_core::types::{ChatRequest, ToolChoice, ToolDefinition};

use crate::convert::messages_to_contents;

/// Thinking budget scale: the 0.0..=1.0 hint maps onto this many tokens.
const THINKING_BUDGET_TOKENS: f64 = 32_768.0;

const DEFAULT_SAFETY_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";
const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

pub(crate) fn build_chat_request(
    request: &ChatRequest,
    credential: &CredentialLease,
    provider: &ProviderConfig,
    model: &ModelConfig,
) -> Result<ProviderRequest, LlmError> {
    request.config.validate()?;

    let url = format!(
        "{}/v1beta/models/{}:generateContent?key={}",
        provider.resolved_api_base()?,
        model.model_name,
        credential.expose(),
    );

    let (system_instruction, contents) = messages_to_contents(&request.messages)?;

    let mut body = Map::new();
    body.insert("contents".into(), Value::Array(contents));
    if let Some(system) = system_instruction {
        body.insert("systemInstruction".into(), system);
    }

    if let Some(tools) = build_tools(request.tools.as_deref(), &request.config) {
        body.insert("tools".into(), tools);
    }
    if let Some(tool_config) = build_tool_config(request.tool_choice.as_ref()) {
        body.insert("toolConfig".into(), tool_config);
    }

    let generation_config = map_generation_config(&request.config);
    if !generation_config.is_empty() {
        body.insert("generationConfig".into(), Value::Object(generation_config));
    }
    body.insert(
        "safetySettings".into(),
        safety_settings(&request.config),
    );

    let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
    for (name, value) in &provider.default_headers {
        headers.push((name.clone(), value.clone()));
    }

    Ok(ProviderRequest {
        url,
        headers,
        body: Value::Object(body),
    })
}

/// Function declarations plus the provider-side tool switches.
fn build_tools(tools: Option<&[ToolDefinition]>, config: &GenerationConfig) -> Option<Value> {
    let mut entries: Vec<Value> = Vec::new();
    let mut function_entry = Map::new();

    if let Some(tools) = tools {
        if !tools.is_empty() {
            let declarations: Vec<Value> = tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.schema(),
                    })
                })
                .collect();
            function_entry.insert("functionDeclarations".into(), Value::Array(declarations));
        }
    }
    if !function_entry.is_empty() {
        entries.push(Value::Object(function_entry));
    }

    if config.enable_code_execution == Some(true) {
        entries.push(json!({ "codeExecution": {} }));
    }
    if config.enable_grounding == Some(true) {
        entries.push(json!({ "googleSearchRetrieval": {} }));
    }

    (!entries.is_empty()).then(|| Value::Array(entries))
}

fn build_tool_config(choice: Option<&ToolChoice>) -> Option<Value> {
    let fc = match choice? {
        ToolChoice::Auto => json!({ "mode": "AUTO" }),
        ToolChoice::None => json!({ "mode": "NONE" }),
        ToolChoice::Required => json!({ "mode": "ANY" }),
        ToolChoice::Tool { name } => json!({
            "mode": "ANY",
            "allowedFunctionNames": [name],
        }),
    };
    Some(json!({ "functionCallingConfig": fc }))
}

/// Translate the flat config into `generationConfig`. Token-reuse penalties
/// have no Gemini equivalent and are dropped.
fn map_generation_config(config: &GenerationConfig) -> Map<String, Value> {
    let mut params = Map::new();
    if let Some(t) = config.temperature {
        params.insert("temperature".into(), json!(t));
    }
    if let Some(m) = config.max_tokens {
        params.insert("maxOutputTokens".into(), json!(m));
    }
    if let Some(p) = config.top_p {
        params.insert("topP".into(), json!(p));
    }
    if let Some(k) = config.top_k {
        params.insert("topK".into(), json!(k));
    }
    if let Some(stop) = &config.stop {
        params.insert("stopSequences".into(), json!(stop));
    }
    if config.frequency_penalty.is_some()
        || config.presence_penalty.is_some()
        || config.repetition_penalty.is_some()
    {
        tracing::debug!("dropping token-reuse penalties: no Gemini equivalent");
    }

    match &config.response_format {
        Some(ResponseFormat::JsonObject) => {
            params.insert("responseMimeType".into(), json!("application/json"));
        }
        Some(ResponseFormat::JsonSchema { schema }) => {
            params.insert("responseMimeType".into(), json!("application/json"));
            params.insert("responseJsonSchema".into(), schema.clone());
        }
        Some(ResponseFormat::Text) | None => {
            if let Some(mime) = &config.response_mime_type {
                params.insert("responseMimeType".into(), json!(mime));
            }
        }
    }

    if let Some(budget) = config.thinking_budget {
        let tokens = (budget * THINKING_BUDGET_TOKENS).round() as i64;
        params.insert(
            "thinkingConfig".into(),
            json!({ "thinkingBudget": tokens }),
        );
    }

    params
}

fn safety_settings(config: &GenerationConfig) -> Value {
    let settings: Vec<Value> = match &config.safety_settings {
        Some(map) => map
            .iter()
            .map(|(category, threshold)| json!({ "category": category, "threshold": threshold }))
            .collect(),
        None => SAFETY_CATEGORIES
            .iter()
            .map(|category| {
                json!({ "category": category, "threshold": DEFAULT_SAFETY_THRESHOLD })
            })
            .collect(),
    };
    Value::Array(settings)
}
