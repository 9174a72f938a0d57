//! laksa
//!
//! A unified LLM gateway: heterogeneous provider APIs (OpenAI-compatible,
//! Google Gemini, Zhipu GLM, and anything registered as an adapter) behind
//! one request/response contract, with credential rotation, retries,
//! multimodal content marshalling, tool-calling orchestration, and cached
//! model handles.
//!
//! ```rust,no_run
//! use laksa::prelude::*;
//!
//! # async fn demo() -> Result<(), LlmError> {
//! let providers = vec![ProviderConfig::new("Acme", "openai")
//!     .with_api_keys(["sk-first", "sk-second"])
//!     .with_models(vec![ModelConfig::new("gpt-4.1-mini")])];
//! let registry = ModelRegistry::with_defaults(providers);
//!
//! let model = registry.get("Acme/gpt-4.1-mini")?;
//! let response = model
//!     .generate(ChatRequest::new(vec![ChatMessage::user("hello")]))
//!     .await?;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```
#![deny(unsafe_code)]

pub mod orchestrator;
pub mod tools;

pub use laksa_core::adapter;
pub use laksa_core::cancel::CancelHandle;
pub use laksa_core::capabilities;
pub use laksa_core::config::{ModelConfig, ProviderConfig};
pub use laksa_core::error::{ErrorKind, ErrorSummary, LlmError};
pub use laksa_core::keys::{CooldownConfig, CredentialStats, CredentialStatus, CredentialStore};
pub use laksa_core::params::{GenerationConfig, ResponseFormat};
pub use laksa_core::retry::RetryPolicy;
pub use laksa_core::traits::{ChatCapability, EmbeddingCapability};
pub use laksa_core::types::{
    ChatMessage, ChatRequest, ContentPart, FinishReason, LlmResponse, MediaSource, MessageRole,
    ToolCall, ToolChoice, ToolDefinition, Usage,
};
pub use laksa_protocol_gemini::GeminiAdapter;
pub use laksa_protocol_openai::{OpenAiCompatAdapter, ZhipuAdapter};
pub use laksa_registry::{
    ensure_default_adapters, Model, ModelDescriptor, ModelRegistry, RegistryOptions, RegistryStats,
};

/// Commonly used items in one import.
pub mod prelude {
    pub use crate::orchestrator::{self, OrchestratorOptions, ToolLoopOutcome};
    pub use crate::tools::{ToolExecutor, ToolRegistry};
    pub use crate::{
        CancelHandle, ChatCapability, ChatMessage, ChatRequest, ContentPart, EmbeddingCapability,
        FinishReason, GenerationConfig, LlmError, LlmResponse, MessageRole, ModelConfig,
        ModelRegistry, ProviderConfig, RegistryOptions, ToolCall, ToolChoice, ToolDefinition,
    };
}
