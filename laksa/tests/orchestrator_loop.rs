//! Tool-loop behavior against a scripted model.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use laksa::orchestrator::{self, OrchestratorOptions};
use laksa::prelude::*;
use laksa::Usage;

/// A model that replays a fixed list of responses.
struct ScriptedModel {
    responses: Mutex<Vec<LlmResponse>>,
    seen_requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    fn new(responses: Vec<LlmResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            seen_requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.seen_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatCapability for ScriptedModel {
    async fn generate_with_cancel(
        &self,
        request: ChatRequest,
        _cancel: &CancelHandle,
    ) -> Result<LlmResponse, LlmError> {
        self.seen_requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(LlmError::Parse("script exhausted".into()));
        }
        Ok(responses.remove(0))
    }
}

fn text_response(text: &str) -> LlmResponse {
    LlmResponse {
        text: text.to_string(),
        tool_calls: Vec::new(),
        usage: Usage::default(),
        finish_reason: FinishReason::Stop,
        raw: Value::Null,
        code_execution_results: Vec::new(),
        grounding: None,
        thought: None,
    }
}

fn tool_call_response(calls: Vec<ToolCall>) -> LlmResponse {
    LlmResponse {
        finish_reason: FinishReason::ToolCalls,
        tool_calls: calls,
        ..text_response("")
    }
}

fn add_tool() -> ToolDefinition {
    ToolDefinition::new(
        "add",
        "Add two integers",
        json!({
            "a": {"type": "integer"},
            "b": {"type": "integer"},
        }),
    )
    .with_required(["a", "b"])
}

fn add_registry() -> ToolRegistry {
    let registry = ToolRegistry::new();
    registry.register(add_tool(), |args| async move {
        let a = args["a"].as_i64().ok_or_else(|| LlmError::BadRequest {
            status: None,
            message: "a must be an integer".into(),
        })?;
        let b = args["b"].as_i64().ok_or_else(|| LlmError::BadRequest {
            status: None,
            message: "b must be an integer".into(),
        })?;
        Ok((a + b).to_string())
    });
    registry
}

fn request_with_tools(prompt: &str, tools: Vec<ToolDefinition>) -> ChatRequest {
    ChatRequest::new(vec![ChatMessage::user(prompt)]).with_tools(tools)
}

#[tokio::test]
async fn two_round_tool_loop_produces_exact_history() {
    let model = ScriptedModel::new(vec![
        tool_call_response(vec![ToolCall::new("t1", "add", json!({"a": 2, "b": 3}))]),
        text_response("The sum is 5."),
    ]);
    let registry = add_registry();

    let outcome = orchestrator::generate_response(
        &model,
        request_with_tools("what is 2+3?", vec![add_tool()]),
        &registry,
        &OrchestratorOptions::default(),
        &CancelHandle::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.response.text, "The sum is 5.");
    assert_eq!(outcome.rounds, 1);

    // History is exactly [user, assistant(tool_calls), tool(t1, "5"),
    // assistant(text)].
    let messages = &outcome.messages;
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[1].role, MessageRole::Assistant);
    assert_eq!(messages[1].tool_calls()[0].id, "t1");
    assert_eq!(messages[2].role, MessageRole::Tool);
    assert_eq!(messages[2].tool_call_id.as_deref(), Some("t1"));
    assert_eq!(messages[2].text(), "5");
    assert_eq!(messages[3].role, MessageRole::Assistant);
    assert_eq!(messages[3].text(), "The sum is 5.");

    // The second model request saw the tool call and its result.
    let second = &model.requests()[1];
    assert_eq!(second.messages.len(), 3);
    assert_eq!(second.messages[2].text(), "5");
}

#[tokio::test]
async fn schema_violation_synthesizes_error_result_without_executing() {
    let model = ScriptedModel::new(vec![
        tool_call_response(vec![ToolCall::new("t1", "add", json!({"a": "two"}))]),
        text_response("Sorry, I could not compute that."),
    ]);

    // An executor that must not run: it panics on invocation.
    struct Exploding;
    #[async_trait]
    impl ToolExecutor for Exploding {
        async fn execute(&self, _name: &str, _arguments: Value) -> Result<String, LlmError> {
            panic!("executor must not be invoked for invalid arguments");
        }
    }

    let outcome = orchestrator::generate_response(
        &model,
        request_with_tools("add", vec![add_tool()]),
        &Exploding,
        &OrchestratorOptions::default(),
        &CancelHandle::new(),
    )
    .await
    .unwrap();

    let tool_msg = &outcome.messages[2];
    assert_eq!(tool_msg.role, MessageRole::Tool);
    let payload: Value = serde_json::from_str(&tool_msg.text()).unwrap();
    let error = payload["error"].as_str().unwrap();
    assert!(error.starts_with("schema validation failed:"), "{error}");
    // The loop continued to a terminal response.
    assert_eq!(outcome.response.text, "Sorry, I could not compute that.");
}

#[tokio::test]
async fn parallel_calls_inject_results_in_call_order() {
    let model = ScriptedModel::new(vec![
        tool_call_response(vec![
            ToolCall::new("slow", "delay", json!({"ms": 80, "label": "first"})),
            ToolCall::new("fast", "delay", json!({"ms": 1, "label": "second"})),
        ]),
        text_response("done"),
    ]);

    let delay_tool = ToolDefinition::new(
        "delay",
        "Sleep then echo",
        json!({
            "ms": {"type": "integer"},
            "label": {"type": "string"},
        }),
    );
    let registry = ToolRegistry::new();
    registry.register(delay_tool.clone(), |args| async move {
        let ms = args["ms"].as_u64().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(args["label"].as_str().unwrap_or("").to_string())
    });

    let outcome = orchestrator::generate_response(
        &model,
        request_with_tools("go", vec![delay_tool]),
        &registry,
        &OrchestratorOptions::default(),
        &CancelHandle::new(),
    )
    .await
    .unwrap();

    // The slow call finished last but its result is injected first.
    assert_eq!(outcome.messages[2].tool_call_id.as_deref(), Some("slow"));
    assert_eq!(outcome.messages[2].text(), "first");
    assert_eq!(outcome.messages[3].tool_call_id.as_deref(), Some("fast"));
    assert_eq!(outcome.messages[3].text(), "second");
}

#[tokio::test]
async fn loop_exhaustion_returns_last_response_by_default() {
    let endless: Vec<LlmResponse> = (0..8)
        .map(|i| {
            tool_call_response(vec![ToolCall::new(
                format!("t{i}"),
                "add",
                json!({"a": 1, "b": 1}),
            )])
        })
        .collect();
    let model = ScriptedModel::new(endless);
    let registry = add_registry();

    let outcome = orchestrator::generate_response(
        &model,
        request_with_tools("loop forever", vec![add_tool()]),
        &registry,
        &OrchestratorOptions {
            max_tool_rounds: 2,
            ..Default::default()
        },
        &CancelHandle::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.rounds, 3);
    assert_eq!(outcome.response.finish_reason, FinishReason::ToolCalls);
    assert!(!outcome.response.tool_calls.is_empty());
}

#[tokio::test]
async fn strict_loop_exhaustion_raises() {
    let endless: Vec<LlmResponse> = (0..4)
        .map(|i| {
            tool_call_response(vec![ToolCall::new(
                format!("t{i}"),
                "add",
                json!({"a": 1, "b": 1}),
            )])
        })
        .collect();
    let model = ScriptedModel::new(endless);
    let registry = add_registry();

    let err = orchestrator::generate_response(
        &model,
        request_with_tools("loop forever", vec![add_tool()]),
        &registry,
        &OrchestratorOptions {
            max_tool_rounds: 1,
            strict_loop: true,
            ..Default::default()
        },
        &CancelHandle::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, LlmError::ToolLoopExhausted { rounds: 2 }));
}

#[tokio::test]
async fn undeclared_tool_gets_error_result_not_abort() {
    let model = ScriptedModel::new(vec![
        tool_call_response(vec![ToolCall::new("t1", "ghost", json!({}))]),
        text_response("recovered"),
    ]);
    let registry = add_registry();

    let outcome = orchestrator::generate_response(
        &model,
        request_with_tools("call something odd", vec![add_tool()]),
        &registry,
        &OrchestratorOptions::default(),
        &CancelHandle::new(),
    )
    .await
    .unwrap();

    let payload: Value = serde_json::from_str(&outcome.messages[2].text()).unwrap();
    assert!(payload["error"].as_str().unwrap().contains("unknown tool"));
    assert_eq!(outcome.response.text, "recovered");
}

#[tokio::test]
async fn tool_failure_is_injected_unless_strict() {
    let failing = ToolRegistry::new();
    failing.register(add_tool(), |_| async {
        Err(LlmError::TransientNetwork("backend down".into()))
    });

    let model = ScriptedModel::new(vec![
        tool_call_response(vec![ToolCall::new("t1", "add", json!({"a": 1, "b": 2}))]),
        text_response("noted"),
    ]);
    let outcome = orchestrator::generate_response(
        &model,
        request_with_tools("add", vec![add_tool()]),
        &failing,
        &OrchestratorOptions::default(),
        &CancelHandle::new(),
    )
    .await
    .unwrap();
    let payload: Value = serde_json::from_str(&outcome.messages[2].text()).unwrap();
    assert!(payload["error"].as_str().unwrap().contains("backend down"));

    // Strict mode propagates instead.
    let model = ScriptedModel::new(vec![tool_call_response(vec![ToolCall::new(
        "t1",
        "add",
        json!({"a": 1, "b": 2}),
    )])]);
    let err = orchestrator::generate_response(
        &model,
        request_with_tools("add", vec![add_tool()]),
        &failing,
        &OrchestratorOptions {
            strict_tool_errors: true,
            ..Default::default()
        },
        &CancelHandle::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, LlmError::ToolExecutionFailed { .. }));
}

#[tokio::test]
async fn cancellation_stops_before_next_model_request() {
    let model = ScriptedModel::new(vec![text_response("never seen")]);
    let registry = add_registry();
    let cancel = CancelHandle::new();
    cancel.cancel();

    let err = orchestrator::generate_response(
        &model,
        ChatRequest::new(vec![ChatMessage::user("hi")]),
        &registry,
        &OrchestratorOptions::default(),
        &cancel,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, LlmError::Canceled));
    assert!(model.requests().is_empty());
}
