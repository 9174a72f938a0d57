//! Provider and model configuration.
//!
//! Config-file loading is deliberately external; these structs only define
//! the shape a loader deserializes into.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::params::GenerationConfig;

pub const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// One configured model under a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_name: String,
    #[serde(default)]
    pub is_embedding_model: bool,
    #[serde(default)]
    pub max_input_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ModelConfig {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            is_embedding_model: false,
            max_input_tokens: None,
            temperature: None,
            max_tokens: None,
        }
    }

    /// The model-level defaults expressed as a generation config.
    pub fn default_overrides(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            ..Default::default()
        }
    }
}

/// One configured provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    #[serde(default = "default_api_type")]
    pub api_type: String,
    #[serde(default)]
    pub api_base: Option<String>,
    /// Accepts a single key or a list in serialized form.
    #[serde(alias = "api_key", deserialize_with = "one_or_many")]
    pub api_keys: Vec<String>,
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default = "default_timeout", alias = "timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

fn default_api_type() -> String {
    "openai".to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(key) => vec![key],
        OneOrMany::Many(keys) => keys,
    })
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, api_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_type: api_type.into(),
            api_base: None,
            api_keys: Vec::new(),
            default_headers: BTreeMap::new(),
            proxy: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            models: Vec::new(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    pub fn with_api_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.api_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_models(mut self, models: Vec<ModelConfig>) -> Self {
        self.models = models;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn find_model(&self, model_name: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.model_name == model_name)
    }

    /// The explicit base URL, or the well-known default for the api type.
    pub fn resolved_api_base(&self) -> Result<String, LlmError> {
        if let Some(base) = &self.api_base {
            return Ok(base.trim_end_matches('/').to_string());
        }
        default_api_base(&self.api_type)
            .map(str::to_string)
            .ok_or_else(|| {
                LlmError::Config(format!(
                    "provider '{}' has no api_base and api type '{}' has no default",
                    self.name, self.api_type
                ))
            })
    }
}

/// Well-known default endpoints per api type.
pub fn default_api_base(api_type: &str) -> Option<&'static str> {
    match api_type {
        "openai" => Some("https://api.openai.com"),
        "deepseek" => Some("https://api.deepseek.com"),
        "zhipu" => Some("https://open.bigmodel.cn"),
        "gemini" => Some("https://generativelanguage.googleapis.com"),
        _ => None,
    }
}

/// Split a `provider/model` identifier.
///
/// Exactly one `/`; provider charset `[A-Za-z0-9_.-]`, model charset
/// `[A-Za-z0-9_.:-]`. Matching elsewhere is case-sensitive.
pub fn parse_model_id(id: &str) -> Result<(&str, &str), LlmError> {
    let invalid = || LlmError::Config(format!("invalid model identifier '{id}'"));

    let (provider, model) = id.split_once('/').ok_or_else(invalid)?;
    if provider.is_empty() || model.is_empty() || model.contains('/') {
        return Err(invalid());
    }
    let provider_ok = provider
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    let model_ok = model
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-'));
    if !provider_ok || !model_ok {
        return Err(invalid());
    }
    Ok((provider, model))
}
