//! Capability traits implemented by model handles.
//!
//! The orchestrator is generic over [`ChatCapability`] so it can drive any
//! model handle (or a scripted stand-in under test) without knowing about
//! registries or transports.

use async_trait::async_trait;

use crate::cancel::CancelHandle;
use crate::error::LlmError;
use crate::types::{ChatRequest, LlmResponse};

/// One-round chat generation.
#[async_trait]
pub trait ChatCapability: Send + Sync {
    async fn generate(&self, request: ChatRequest) -> Result<LlmResponse, LlmError> {
        self.generate_with_cancel(request, &CancelHandle::new())
            .await
    }

    async fn generate_with_cancel(
        &self,
        request: ChatRequest,
        cancel: &CancelHandle,
    ) -> Result<LlmResponse, LlmError>;
}

/// Text embedding generation.
#[async_trait]
pub trait EmbeddingCapability: Send + Sync {
    async fn embed(
        &self,
        texts: &[String],
        task_type: Option<&str>,
    ) -> Result<Vec<Vec<f32>>, LlmError> {
        self.embed_with_cancel(texts, task_type, &CancelHandle::new())
            .await
    }

    async fn embed_with_cancel(
        &self,
        texts: &[String],
        task_type: Option<&str>,
        cancel: &CancelHandle,
    ) -> Result<Vec<Vec<f32>>, LlmError>;
}
