//! Adapter boundary between the canonical request shape and provider wire
//! formats, plus the process-wide adapter registry.
//!
//! New providers plug in by registering an adapter under their `api_type`;
//! nothing in the core dispatches on concrete provider names.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::config::{ModelConfig, ProviderConfig};
use crate::error::LlmError;
use crate::execution::{ProviderRequest, ProviderResponse};
use crate::keys::CredentialLease;
use crate::types::{ChatRequest, LlmResponse};

/// Capabilities an adapter can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Tools,
    Multimodal,
    Grounding,
    CodeExecution,
    Embeddings,
    Streaming,
    JsonMode,
}

/// Translator between the canonical request/response shapes and one
/// provider wire format.
///
/// Implementations are immutable after registration and shared behind an
/// `Arc`, so they need no interior locking.
pub trait ApiAdapter: Send + Sync + std::fmt::Debug {
    /// Identifier the registry indexes by (e.g. `"openai"`, `"gemini"`).
    fn api_type(&self) -> &'static str;

    fn supports(&self, feature: Feature) -> bool;

    fn build_chat_request(
        &self,
        request: &ChatRequest,
        credential: &CredentialLease,
        provider: &ProviderConfig,
        model: &ModelConfig,
    ) -> Result<ProviderRequest, LlmError>;

    fn parse_chat_response(&self, response: &ProviderResponse) -> Result<LlmResponse, LlmError>;

    fn build_embeddings_request(
        &self,
        texts: &[String],
        task_type: Option<&str>,
        credential: &CredentialLease,
        provider: &ProviderConfig,
        model: &ModelConfig,
    ) -> Result<ProviderRequest, LlmError>;

    fn parse_embeddings_response(
        &self,
        response: &ProviderResponse,
    ) -> Result<Vec<Vec<f32>>, LlmError>;

    /// Map a non-2xx response onto the error taxonomy. The default keys off
    /// the HTTP status; adapters override to read provider error envelopes.
    fn extract_error(&self, response: &ProviderResponse, provider: &str) -> LlmError {
        LlmError::from_status(provider, response.status, response.body.clone())
    }
}

type AdapterMap = HashMap<&'static str, Arc<dyn ApiAdapter>>;

fn registry() -> &'static RwLock<AdapterMap> {
    static REGISTRY: OnceLock<RwLock<AdapterMap>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register an adapter under its `api_type`. Idempotent: re-registering
/// replaces the previous instance.
pub fn register_adapter(adapter: Arc<dyn ApiAdapter>) {
    let api_type = adapter.api_type();
    let mut map = registry().write().expect("adapter registry poisoned");
    if map.insert(api_type, adapter).is_some() {
        tracing::debug!(api_type, "replaced adapter registration");
    } else {
        tracing::debug!(api_type, "registered adapter");
    }
}

/// Look up the adapter for an `api_type`.
pub fn adapter_for(api_type: &str) -> Result<Arc<dyn ApiAdapter>, LlmError> {
    let map = registry().read().expect("adapter registry poisoned");
    map.get(api_type).cloned().ok_or_else(|| {
        let mut known: Vec<&str> = map.keys().copied().collect();
        known.sort_unstable();
        LlmError::Config(format!(
            "unknown adapter for api type '{api_type}' (registered: {known:?})"
        ))
    })
}

/// Currently registered api types, sorted.
pub fn registered_api_types() -> Vec<&'static str> {
    let map = registry().read().expect("adapter registry poisoned");
    let mut types: Vec<&'static str> = map.keys().copied().collect();
    types.sort_unstable();
    types
}
