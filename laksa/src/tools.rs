//! Tool registry and the executor contract.
//!
//! Handlers are plain values paired with their [`ToolDefinition`]; anything
//! implementing [`ToolExecutor`] plugs into the orchestrator, including
//! external tool hosts that dispatch elsewhere.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use laksa_core::error::LlmError;
use laksa_core::types::ToolDefinition;

/// Executes a named tool with validated JSON arguments.
///
/// The orchestrator never interprets the returned string beyond handing it
/// back to the model as a tool result.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, name: &str, arguments: Value) -> Result<String, LlmError>;
}

type ToolHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<String, LlmError>> + Send + Sync>;

/// A registry mapping tool names to definitions and handlers.
///
/// Registration replaces any previous entry under the same name. The
/// registry itself implements [`ToolExecutor`].
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, (ToolDefinition, ToolHandler)>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a tool definition.
    pub fn register<F, Fut>(&self, definition: ToolDefinition, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<String, LlmError>> + Send + 'static,
    {
        let name = definition.name.clone();
        let handler: ToolHandler = Arc::new(move |args| Box::pin(handler(args)));
        let mut tools = self.tools.write().expect("tool registry poisoned");
        if tools.insert(name.clone(), (definition, handler)).is_some() {
            tracing::warn!(tool = %name, "replacing registered tool");
        }
    }

    /// Look up a tool's definition by name.
    pub fn lookup(&self, name: &str) -> Option<ToolDefinition> {
        self.tools
            .read()
            .expect("tool registry poisoned")
            .get(name)
            .map(|(definition, _)| definition.clone())
    }

    /// Definitions of every registered tool, for building requests.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .tools
            .read()
            .expect("tool registry poisoned")
            .values()
            .map(|(definition, _)| definition.clone())
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    pub fn len(&self) -> usize {
        self.tools.read().expect("tool registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(&self, name: &str, arguments: Value) -> Result<String, LlmError> {
        let handler = {
            let tools = self.tools.read().expect("tool registry poisoned");
            tools.get(name).map(|(_, handler)| handler.clone())
        };
        match handler {
            Some(handler) => handler(arguments).await,
            None => Err(LlmError::ToolExecutionFailed {
                tool: name.to_string(),
                call_id: String::new(),
                message: "tool not registered".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

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

    #[tokio::test]
    async fn registered_handler_runs() {
        let registry = ToolRegistry::new();
        registry.register(add_tool(), |args| async move {
            let sum = args["a"].as_i64().unwrap_or(0) + args["b"].as_i64().unwrap_or(0);
            Ok(sum.to_string())
        });

        let result = registry
            .execute("add", json!({"a": 2, "b": 3}))
            .await
            .unwrap();
        assert_eq!(result, "5");
        assert!(registry.lookup("add").is_some());
        assert_eq!(registry.definitions().len(), 1);
    }

    #[tokio::test]
    async fn unknown_tool_is_an_execution_error() {
        let registry = ToolRegistry::new();
        let err = registry.execute("missing", json!({})).await.unwrap_err();
        assert!(matches!(err, LlmError::ToolExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn re_registration_replaces() {
        let registry = ToolRegistry::new();
        registry.register(add_tool(), |_| async { Ok("old".to_string()) });
        registry.register(add_tool(), |_| async { Ok("new".to_string()) });
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.execute("add", json!({})).await.unwrap(), "new");
    }
}
