//! Generation parameters.
//!
//! A single flat record covers every recognized option; each adapter
//! translates the subset its wire format supports and ignores the rest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LlmError;

/// Requested output shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    JsonObject,
    JsonSchema { schema: Value },
}

impl ResponseFormat {
    /// Whether this format requests structured JSON output.
    pub fn wants_json(&self) -> bool {
        matches!(self, Self::JsonObject | Self::JsonSchema { .. })
    }
}

/// Flat generation configuration.
///
/// `None` means "provider default". Model-level defaults and per-request
/// overrides combine through [`GenerationConfig::merge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
    pub frequency_penalty: Option<f64>,
    pub presence_penalty: Option<f64>,
    pub repetition_penalty: Option<f64>,
    pub stop: Option<Vec<String>>,
    pub response_format: Option<ResponseFormat>,
    /// Provider-specific alternative to `response_format` (Gemini).
    pub response_mime_type: Option<String>,
    pub enable_code_execution: Option<bool>,
    pub enable_grounding: Option<bool>,
    /// Reasoning-depth hint as a fraction (0.0 disables, 1.0 is maximal).
    pub thinking_budget: Option<f64>,
    /// Harm-category -> threshold.
    pub safety_settings: Option<BTreeMap<String, String>>,
}

impl GenerationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay `overrides` on top of `self`; `Some` fields win.
    pub fn merge(&self, overrides: &GenerationConfig) -> GenerationConfig {
        macro_rules! pick {
            ($field:ident) => {
                overrides.$field.clone().or_else(|| self.$field.clone())
            };
        }
        GenerationConfig {
            temperature: pick!(temperature),
            max_tokens: pick!(max_tokens),
            top_p: pick!(top_p),
            top_k: pick!(top_k),
            frequency_penalty: pick!(frequency_penalty),
            presence_penalty: pick!(presence_penalty),
            repetition_penalty: pick!(repetition_penalty),
            stop: pick!(stop),
            response_format: pick!(response_format),
            response_mime_type: pick!(response_mime_type),
            enable_code_execution: pick!(enable_code_execution),
            enable_grounding: pick!(enable_grounding),
            thinking_budget: pick!(thinking_budget),
            safety_settings: pick!(safety_settings),
        }
    }

    /// Validate ranges and reject ambiguous combinations.
    ///
    /// Setting a JSON `response_format` together with `response_mime_type`
    /// is ambiguous and rejected rather than silently preferring one.
    pub fn validate(&self) -> Result<(), LlmError> {
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(LlmError::BadRequest {
                    status: None,
                    message: format!("temperature {t} outside 0.0..=2.0"),
                });
            }
        }
        if let Some(p) = self.top_p {
            if !(0.0..=1.0).contains(&p) {
                return Err(LlmError::BadRequest {
                    status: None,
                    message: format!("top_p {p} outside 0.0..=1.0"),
                });
            }
        }
        if let Some(b) = self.thinking_budget {
            if !(0.0..=1.0).contains(&b) {
                return Err(LlmError::BadRequest {
                    status: None,
                    message: format!("thinking_budget {b} outside 0.0..=1.0"),
                });
            }
        }
        if self.response_mime_type.is_some()
            && self.response_format.as_ref().is_some_and(ResponseFormat::wants_json)
        {
            return Err(LlmError::BadRequest {
                status: None,
                message: "response_format and response_mime_type are mutually exclusive".into(),
            });
        }
        Ok(())
    }
}
