//! Gemini `generateContent` response parsing.

use serde_json::Value;

use laksa_core::error::LlmError;
use laksa_core::types::{
    CodeExecutionResult, FinishReason, GroundingAttribution, GroundingMetadata, LlmResponse,
    ToolCall, Usage,
};

/// Map Gemini's error envelope and prompt feedback onto the taxonomy.
pub(crate) fn extract_error(body: &Value, status: u16, provider: &str) -> LlmError {
    if let Some(err) = envelope_error(body, status, provider) {
        return err;
    }
    LlmError::from_status(provider, status, body.to_string())
}

fn envelope_error(body: &Value, status: u16, provider: &str) -> Option<LlmError> {
    if let Some(reason) = body["promptFeedback"]["blockReason"].as_str() {
        return Some(LlmError::ContentFiltered {
            reason: reason.to_string(),
        });
    }

    let error = body.get("error")?;
    let code = error["code"].as_u64().unwrap_or(status as u64) as u16;
    let error_status = error["status"].as_str().unwrap_or("");
    let message = error["message"].as_str().unwrap_or("").to_string();

    if code == 429 || error_status == "RESOURCE_EXHAUSTED" {
        return Some(LlmError::RateLimited {
            provider: provider.to_string(),
            message,
            retry_after: None,
        });
    }
    if code == 400 || matches!(error_status, "INVALID_ARGUMENT" | "FAILED_PRECONDITION") {
        return Some(LlmError::BadRequest {
            status: Some(code),
            message,
        });
    }
    if matches!(code, 401 | 403) || error_status == "PERMISSION_DENIED" {
        return Some(LlmError::Auth {
            provider: provider.to_string(),
            status: code,
            message,
        });
    }
    Some(LlmError::from_status(provider, code, message))
}

fn map_finish_reason(reason: Option<&str>, has_tool_calls: bool) -> FinishReason {
    match reason {
        Some("STOP") => {
            if has_tool_calls {
                FinishReason::ToolCalls
            } else {
                FinishReason::Stop
            }
        }
        Some("MAX_TOKENS") => FinishReason::Length,
        Some("SAFETY") | Some("RECITATION") | Some("PROHIBITED_CONTENT") => {
            FinishReason::ContentFilter
        }
        _ if has_tool_calls => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    }
}

fn parse_usage(body: &Value) -> Usage {
    let meta = &body["usageMetadata"];
    Usage {
        prompt_tokens: meta["promptTokenCount"].as_u64().unwrap_or(0) as u32,
        completion_tokens: meta["candidatesTokenCount"].as_u64().unwrap_or(0) as u32,
        total_tokens: meta["totalTokenCount"].as_u64().unwrap_or(0) as u32,
    }
}

fn parse_grounding(candidate: &Value) -> Option<GroundingMetadata> {
    let grounding = candidate.get("groundingMetadata")?;

    let web_search_queries = grounding["webSearchQueries"].as_array().map(|queries| {
        queries
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    });

    let attributions = grounding["groundingChunks"]
        .as_array()
        .map(|chunks| {
            chunks
                .iter()
                .filter_map(|chunk| chunk.get("web"))
                .map(|web| GroundingAttribution {
                    title: web["title"].as_str().map(str::to_string),
                    uri: web["uri"].as_str().map(str::to_string),
                    snippet: web["snippet"].as_str().map(str::to_string),
                })
                .collect()
        })
        .unwrap_or_default();

    let search_entry_point = grounding["searchEntryPoint"]["renderedContent"]
        .as_str()
        .map(str::to_string);

    Some(GroundingMetadata {
        web_search_queries,
        attributions,
        search_entry_point,
    })
}

/// Walk `candidates[0].content.parts` into the canonical response.
pub(crate) fn parse_chat_response(body: &Value) -> Result<LlmResponse, LlmError> {
    if let Some(err) = envelope_error(body, 200, "gemini") {
        return Err(err);
    }

    let candidates = body["candidates"].as_array();
    let Some(candidate) = candidates.and_then(|c| c.first()) else {
        return Ok(LlmResponse {
            text: String::new(),
            tool_calls: Vec::new(),
            usage: parse_usage(body),
            finish_reason: FinishReason::Stop,
            raw: body.clone(),
            code_execution_results: Vec::new(),
            grounding: None,
            thought: None,
        });
    };

    let mut answer = String::new();
    let mut thoughts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();
    let mut code_results: Vec<CodeExecutionResult> = Vec::new();

    let empty = Vec::new();
    let parts = candidate["content"]["parts"].as_array().unwrap_or(&empty);
    for part in parts {
        if part["thought"].as_bool() == Some(true) {
            if let Some(text) = part["text"].as_str() {
                thoughts.push(text.to_string());
            }
        } else if let Some(text) = part["text"].as_str() {
            answer.push_str(text);
        } else if let Some(call) = part.get("functionCall") {
            let name = call["name"]
                .as_str()
                .ok_or_else(|| LlmError::Parse("functionCall without name".into()))?;
            let args = call.get("args").cloned().unwrap_or(Value::Null);
            // Gemini does not assign call ids; synthesize stable ones.
            let id = format!("call_gemini_{}", tool_calls.len());
            tool_calls.push(ToolCall::new(id, name, args));
        } else if let Some(code) = part.get("executableCode") {
            let language = code["language"].as_str().unwrap_or("PYTHON").to_string();
            let source = code["code"].as_str().unwrap_or("").to_string();
            answer.push_str(&format!("\n[generated code ({language})]\n{source}\n"));
            code_results.push(CodeExecutionResult::Code {
                language,
                code: source,
            });
        } else if let Some(result) = part.get("codeExecutionResult") {
            let outcome = result["outcome"].as_str().unwrap_or("OUTCOME_UNKNOWN");
            let output = result["output"].as_str().unwrap_or("").to_string();
            if outcome == "OUTCOME_OK" {
                answer.push_str(&format!("\n[execution output]\n{output}\n"));
            } else {
                answer.push_str(&format!("\n[execution failed ({outcome})]\n{output}\n"));
            }
            code_results.push(CodeExecutionResult::Outcome {
                outcome: outcome.to_string(),
                output,
            });
        }
    }

    let finish_reason =
        map_finish_reason(candidate["finishReason"].as_str(), !tool_calls.is_empty());

    Ok(LlmResponse {
        text: answer.trim().to_string(),
        usage: parse_usage(body),
        finish_reason,
        grounding: parse_grounding(candidate),
        raw: body.clone(),
        code_execution_results: code_results,
        thought: if thoughts.is_empty() {
            None
        } else {
            Some(thoughts.join("\n\n"))
        },
        tool_calls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use laksa_core::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn parses_text_with_thought_summary() {
        let body = json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "Let me work through this.", "thought": true},
                    {"text": "The answer is 42."},
                ]},
                "finishReason": "STOP",
            }],
            "usageMetadata": {"promptTokenCount": 8, "candidatesTokenCount": 6, "totalTokenCount": 14},
        });

        let parsed = parse_chat_response(&body).unwrap();
        assert_eq!(parsed.text, "The answer is 42.");
        assert_eq!(parsed.thought.as_deref(), Some("Let me work through this."));
        assert_eq!(parsed.finish_reason, FinishReason::Stop);
        assert_eq!(parsed.usage.total_tokens, 14);
    }

    #[test]
    fn function_calls_get_synthesized_ids() {
        let body = json!({
            "candidates": [{
                "content": {"parts": [
                    {"functionCall": {"name": "add", "args": {"a": 2, "b": 3}}},
                    {"functionCall": {"name": "mul", "args": {"a": 4, "b": 5}}},
                ]},
                "finishReason": "STOP",
            }],
        });

        let parsed = parse_chat_response(&body).unwrap();
        assert_eq!(parsed.finish_reason, FinishReason::ToolCalls);
        assert_eq!(parsed.tool_calls[0].id, "call_gemini_0");
        assert_eq!(parsed.tool_calls[1].id, "call_gemini_1");
        assert_eq!(parsed.tool_calls[1].arguments["b"], 5);
    }

    #[test]
    fn code_execution_parts_are_collected() {
        let body = json!({
            "candidates": [{
                "content": {"parts": [
                    {"executableCode": {"language": "PYTHON", "code": "print(6*7)"}},
                    {"codeExecutionResult": {"outcome": "OUTCOME_OK", "output": "42\n"}},
                    {"text": "It prints 42."},
                ]},
                "finishReason": "STOP",
            }],
        });

        let parsed = parse_chat_response(&body).unwrap();
        assert_eq!(parsed.code_execution_results.len(), 2);
        assert!(matches!(
            &parsed.code_execution_results[0],
            CodeExecutionResult::Code { language, .. } if language == "PYTHON"
        ));
        assert!(matches!(
            &parsed.code_execution_results[1],
            CodeExecutionResult::Outcome { outcome, output }
                if outcome == "OUTCOME_OK" && output == "42\n"
        ));
        assert!(parsed.text.contains("It prints 42."));
    }

    #[test]
    fn grounding_metadata_is_preserved() {
        let body = json!({
            "candidates": [{
                "content": {"parts": [{"text": "Grounded answer."}]},
                "finishReason": "STOP",
                "groundingMetadata": {
                    "webSearchQueries": ["rust llm gateway"],
                    "groundingChunks": [
                        {"web": {"title": "Example", "uri": "https://example.test", "snippet": "..."}}
                    ],
                    "searchEntryPoint": {"renderedContent": "<div>chip</div>"},
                },
            }],
        });

        let parsed = parse_chat_response(&body).unwrap();
        let grounding = parsed.grounding.unwrap();
        assert_eq!(
            grounding.web_search_queries.unwrap(),
            vec!["rust llm gateway"]
        );
        assert_eq!(grounding.attributions[0].title.as_deref(), Some("Example"));
        assert_eq!(
            grounding.search_entry_point.as_deref(),
            Some("<div>chip</div>")
        );
    }

    #[test]
    fn block_reason_is_content_filtered() {
        let body = json!({
            "promptFeedback": {"blockReason": "SAFETY"},
        });
        let err = parse_chat_response(&body).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContentFiltered);
    }

    #[test]
    fn resource_exhausted_maps_to_rate_limited() {
        let body = json!({
            "error": {"code": 429, "status": "RESOURCE_EXHAUSTED", "message": "quota"},
        });
        assert_eq!(
            extract_error(&body, 429, "gemini").kind(),
            ErrorKind::RateLimited
        );

        let body = json!({
            "error": {"code": 400, "status": "INVALID_ARGUMENT", "message": "bad field"},
        });
        assert_eq!(
            extract_error(&body, 400, "gemini").kind(),
            ErrorKind::BadRequest
        );
    }

    #[test]
    fn safety_finish_reason_maps_to_content_filter() {
        let body = json!({
            "candidates": [{
                "content": {"parts": [{"text": ""}]},
                "finishReason": "SAFETY",
            }],
        });
        let parsed = parse_chat_response(&body).unwrap();
        assert_eq!(parsed.finish_reason, FinishReason::ContentFilter);
    }
}
