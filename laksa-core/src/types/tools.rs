//! Tool definitions and model-emitted tool calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A function tool the model may invoke.
///
/// `parameters` is the `properties` map of a JSON-schema object;
/// [`ToolDefinition::schema`] composes the full object schema adapters emit
/// and the orchestrator validates against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    #[serde(default)]
    pub required: Vec<String>,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            required: Vec::new(),
        }
    }

    pub fn with_required<I, S>(mut self, required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required = required.into_iter().map(Into::into).collect();
        self
    }

    /// The full JSON schema for this tool's arguments.
    pub fn schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": self.parameters,
            "required": self.required,
        })
    }
}

/// A model-emitted request to invoke a declared tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// How the model should use the declared tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// Model decides (default).
    Auto,
    /// Model must not call any tool.
    None,
    /// Model must call at least one tool.
    Required,
    /// Model must call this specific tool.
    Tool { name: String },
}

impl Default for ToolChoice {
    fn default() -> Self {
        Self::Auto
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_composes_properties_and_required() {
        let def = ToolDefinition::new(
            "add",
            "Add two integers",
            json!({
                "a": {"type": "integer"},
                "b": {"type": "integer"},
            }),
        )
        .with_required(["a", "b"]);

        let schema = def.schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["a"]["type"], "integer");
        assert_eq!(schema["required"], json!(["a", "b"]));
    }
}
