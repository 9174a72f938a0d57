//! Multi-turn tool-calling orchestration.
//!
//! The loop: ask the model, detect tool calls, validate arguments against
//! the declared schema, dispatch handlers concurrently, inject results in
//! call order, and re-ask until a terminal response or the round budget
//! runs out.

use futures::future::join_all;
use serde_json::{json, Value};

use laksa_core::cancel::CancelHandle;
use laksa_core::error::LlmError;
use laksa_core::traits::ChatCapability;
use laksa_core::types::{
    ChatMessage, ChatRequest, FinishReason, LlmResponse, ToolCall, ToolDefinition,
};

use crate::tools::ToolExecutor;

/// Tool-loop tuning.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Maximum tool rounds before the loop stops re-asking the model.
    pub max_tool_rounds: u32,
    /// On exhaustion, raise `ToolLoopExhausted` instead of returning the
    /// last tool-call-bearing response.
    pub strict_loop: bool,
    /// Propagate tool handler failures instead of injecting them as error
    /// results.
    pub strict_tool_errors: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            max_tool_rounds: 5,
            strict_loop: false,
            strict_tool_errors: false,
        }
    }
}

/// Final state of a tool loop.
#[derive(Debug)]
pub struct ToolLoopOutcome {
    /// The terminal response (or the last one, on round exhaustion).
    pub response: LlmResponse,
    /// Full conversation including tool calls and results.
    pub messages: Vec<ChatMessage>,
    /// Tool rounds performed.
    pub rounds: u32,
}

/// Drive a model through the tool-calling loop.
///
/// The request carries the initial messages, config, tool declarations,
/// and tool choice; the executor runs whatever the model asks for.
pub async fn generate_response<M: ChatCapability + ?Sized>(
    model: &M,
    request: ChatRequest,
    executor: &dyn ToolExecutor,
    options: &OrchestratorOptions,
    cancel: &CancelHandle,
) -> Result<ToolLoopOutcome, LlmError> {
    let ChatRequest {
        messages: mut history,
        config,
        tools,
        tool_choice,
    } = request;
    let tools = tools.unwrap_or_default();
    let mut rounds: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(LlmError::Canceled);
        }

        let mut request = ChatRequest::new(history.clone()).with_config(config.clone());
        if !tools.is_empty() {
            request = request.with_tools(tools.clone());
        }
        if let Some(choice) = &tool_choice {
            request = request.with_tool_choice(choice.clone());
        }

        let mut response = model.generate_with_cancel(request, cancel).await?;

        if response.tool_calls.is_empty() {
            history.push(ChatMessage::assistant(response.text.clone()));
            return Ok(ToolLoopOutcome {
                response,
                messages: history,
                rounds,
            });
        }

        // Replay the assistant turn exactly as issued, ids included.
        history.push(ChatMessage::assistant_tool_calls(
            Some(response.text.clone()),
            response.tool_calls.clone(),
        ));

        rounds += 1;
        if rounds > options.max_tool_rounds {
            tracing::warn!(
                rounds,
                max = options.max_tool_rounds,
                "tool loop budget exhausted"
            );
            if options.strict_loop {
                return Err(LlmError::ToolLoopExhausted { rounds });
            }
            response.finish_reason = FinishReason::ToolCalls;
            return Ok(ToolLoopOutcome {
                response,
                messages: history,
                rounds,
            });
        }

        tracing::debug!(
            round = rounds,
            calls = response.tool_calls.len(),
            "dispatching tool calls"
        );

        // All calls from one response run concurrently; results are
        // appended in call-index order regardless of completion order.
        let futures: Vec<_> = response
            .tool_calls
            .iter()
            .map(|call| run_tool_call(call, &tools, executor, options))
            .collect();
        let results = tokio::select! {
            _ = cancel.cancelled() => return Err(LlmError::Canceled),
            results = join_all(futures) => results,
        };

        for (call, result) in response.tool_calls.iter().zip(results) {
            history.push(ChatMessage::tool(call.id.clone(), result?));
        }
    }
}

/// Run one tool call end to end, folding recoverable problems into a
/// synthetic error result so the loop keeps going.
async fn run_tool_call(
    call: &ToolCall,
    tools: &[ToolDefinition],
    executor: &dyn ToolExecutor,
    options: &OrchestratorOptions,
) -> Result<String, LlmError> {
    let Some(definition) = tools.iter().find(|t| t.name == call.name) else {
        tracing::warn!(tool = %call.name, call_id = %call.id, "model invoked undeclared tool");
        return Ok(error_result(format!("unknown tool '{}'", call.name)));
    };

    if let Err(reason) = validate_arguments(&definition.schema(), &call.arguments) {
        tracing::debug!(tool = %call.name, call_id = %call.id, %reason, "rejecting tool arguments");
        return Ok(error_result(format!("schema validation failed: {reason}")));
    }

    match executor.execute(&call.name, call.arguments.clone()).await {
        Ok(output) => Ok(output),
        Err(err) if options.strict_tool_errors => Err(LlmError::ToolExecutionFailed {
            tool: call.name.clone(),
            call_id: call.id.clone(),
            message: err.to_string(),
        }),
        Err(err) => {
            tracing::warn!(tool = %call.name, call_id = %call.id, error = %err, "tool failed");
            Ok(error_result(err.to_string()))
        }
    }
}

fn error_result(message: String) -> String {
    json!({ "error": message }).to_string()
}

/// Validate call arguments against the tool's JSON schema. An uncompilable
/// schema passes validation; that is the tool author's bug, not the
/// model's.
fn validate_arguments(schema: &Value, arguments: &Value) -> Result<(), String> {
    let compiled = match jsonschema::JSONSchema::compile(schema) {
        Ok(compiled) => compiled,
        Err(err) => {
            tracing::warn!(error = %err, "invalid tool schema, skipping validation");
            return Ok(());
        }
    };
    if let Err(errors) = compiled.validate(arguments) {
        let mut reasons = Vec::new();
        for err in errors {
            reasons.push(format!("{err}"));
            if reasons.len() >= 3 {
                break;
            }
        }
        return Err(reasons.join("; "));
    }
    Ok(())
}
