//! laksa-protocol-gemini
//!
//! The Gemini `generateContent` wire protocol: its own content schema,
//! function calling, provider-side code execution and web grounding, and
//! batch embeddings.
#![deny(unsafe_code)]

mod convert;
mod embedding;
mod request;
mod response;

use laksa_core::adapter::{ApiAdapter, Feature};
use laksa_core::config::{ModelConfig, ProviderConfig};
use laksa_core::error::LlmError;
use laksa_core::execution::{ProviderRequest, ProviderResponse};
use laksa_core::keys::CredentialLease;
use laksa_core::types::{ChatRequest, LlmResponse};

/// Adapter for the Gemini API.
#[derive(Debug, Default)]
pub struct GeminiAdapter;

impl GeminiAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ApiAdapter for GeminiAdapter {
    fn api_type(&self) -> &'static str {
        "gemini"
    }

    fn supports(&self, feature: Feature) -> bool {
        // Everything except response streaming.
        !matches!(feature, Feature::Streaming)
    }

    fn build_chat_request(
        &self,
        request: &ChatRequest,
        credential: &CredentialLease,
        provider: &ProviderConfig,
        model: &ModelConfig,
    ) -> Result<ProviderRequest, LlmError> {
        request::build_chat_request(request, credential, provider, model)
    }

    fn parse_chat_response(&self, response: &ProviderResponse) -> Result<LlmResponse, LlmError> {
        response::parse_chat_response(&response.json())
    }

    fn build_embeddings_request(
        &self,
        texts: &[String],
        task_type: Option<&str>,
        credential: &CredentialLease,
        provider: &ProviderConfig,
        model: &ModelConfig,
    ) -> Result<ProviderRequest, LlmError> {
        embedding::build_embeddings_request(texts, task_type, credential, provider, model)
    }

    fn parse_embeddings_response(
        &self,
        response: &ProviderResponse,
    ) -> Result<Vec<Vec<f32>>, LlmError> {
        embedding::parse_embeddings_response(&response.json())
    }

    fn extract_error(&self, response: &ProviderResponse, provider: &str) -> LlmError {
        response::extract_error(&response.json(), response.status, provider)
    }
}
