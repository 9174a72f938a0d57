//! The cached, ready-to-use model handle.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use laksa_core::adapter::{ApiAdapter, Feature};
use laksa_core::cancel::CancelHandle;
use laksa_core::capabilities::ModelCapabilities;
use laksa_core::config::{ModelConfig, ProviderConfig};
use laksa_core::error::LlmError;
use laksa_core::execution::{HttpTransport, RequestExecutor};
use laksa_core::keys::CredentialStore;
use laksa_core::params::GenerationConfig;
use laksa_core::retry::RetryPolicy;
use laksa_core::traits::{ChatCapability, EmbeddingCapability};
use laksa_core::types::{ChatRequest, LlmResponse};

/// A resolved `provider/model` pair bundled with everything needed to talk
/// to it: provider config, credential store, adapter, transport, and the
/// merged default generation config.
///
/// Handles are shared behind `Arc`; registry eviction only drops the
/// registry's reference, so in-flight requests keep working.
pub struct Model {
    pub(crate) provider: ProviderConfig,
    pub(crate) model: ModelConfig,
    pub(crate) store: Arc<CredentialStore>,
    pub(crate) adapter: Arc<dyn ApiAdapter>,
    pub(crate) transport: Arc<dyn HttpTransport>,
    pub(crate) defaults: GenerationConfig,
    pub(crate) policy: RetryPolicy,
    pub(crate) capabilities: ModelCapabilities,
}

impl Model {
    pub fn provider_name(&self) -> &str {
        &self.provider.name
    }

    pub fn model_name(&self) -> &str {
        &self.model.model_name
    }

    pub fn api_type(&self) -> &str {
        &self.provider.api_type
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.provider.name, self.model.model_name)
    }

    pub fn capabilities(&self) -> ModelCapabilities {
        self.capabilities
    }

    pub fn is_embedding_model(&self) -> bool {
        self.model.is_embedding_model || self.capabilities.is_embedding_model
    }

    pub fn credential_store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    fn executor(&self) -> RequestExecutor<'_> {
        RequestExecutor {
            policy: &self.policy,
            store: self.store.as_ref(),
            transport: self.transport.as_ref(),
            provider: &self.provider.name,
            model: &self.model.model_name,
            wait_for_cooldown: false,
        }
    }

    fn check_tools(&self, request: &ChatRequest) -> Result<(), LlmError> {
        let Some(tools) = &request.tools else {
            return Ok(());
        };
        if tools.is_empty() {
            return Ok(());
        }
        if !self.adapter.supports(Feature::Tools) {
            return Err(LlmError::UnsupportedFeature(format!(
                "adapter '{}' does not support tool calling",
                self.adapter.api_type()
            )));
        }
        if !self.capabilities.tool_calling {
            return Err(LlmError::UnsupportedFeature(format!(
                "model '{}' does not support tool calling",
                self.model.model_name
            )));
        }
        let mut seen = HashSet::new();
        for tool in tools {
            if !seen.insert(tool.name.as_str()) {
                return Err(LlmError::BadRequest {
                    status: None,
                    message: format!("duplicate tool name '{}'", tool.name),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ChatCapability for Model {
    async fn generate_with_cancel(
        &self,
        request: ChatRequest,
        cancel: &CancelHandle,
    ) -> Result<LlmResponse, LlmError> {
        let mut request = request;
        request.config = self.defaults.merge(&request.config);
        request.config.validate()?;
        self.check_tools(&request)?;

        tracing::info!(
            model = %self.full_name(),
            messages = request.messages.len(),
            tools = request.tools.as_ref().map(Vec::len).unwrap_or(0),
            "generating response"
        );

        self.executor()
            .execute(
                cancel,
                |lease| {
                    self.adapter
                        .build_chat_request(&request, lease, &self.provider, &self.model)
                },
                |response| self.adapter.parse_chat_response(response),
                |response| self.adapter.extract_error(response, &self.provider.name),
            )
            .await
    }
}

#[async_trait]
impl EmbeddingCapability for Model {
    async fn embed_with_cancel(
        &self,
        texts: &[String],
        task_type: Option<&str>,
        cancel: &CancelHandle,
    ) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if !self.adapter.supports(Feature::Embeddings) {
            return Err(LlmError::UnsupportedFeature(format!(
                "adapter '{}' does not support embeddings",
                self.adapter.api_type()
            )));
        }

        tracing::info!(
            model = %self.full_name(),
            texts = texts.len(),
            "generating embeddings"
        );

        self.executor()
            .execute(
                cancel,
                |lease| {
                    self.adapter.build_embeddings_request(
                        texts,
                        task_type,
                        lease,
                        &self.provider,
                        &self.model,
                    )
                },
                |response| self.adapter.parse_embeddings_response(response),
                |response| self.adapter.extract_error(response, &self.provider.name),
            )
            .await
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("provider", &self.provider.name)
            .field("model", &self.model.model_name)
            .field("api_type", &self.provider.api_type)
            .finish()
    }
}
