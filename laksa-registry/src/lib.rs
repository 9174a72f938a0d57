//! laksa-registry
//!
//! Resolves `provider/model` identifiers against configured providers and
//! hands out cached, ready-to-use [`Model`] handles.
#![deny(unsafe_code)]

mod model;
mod registry;

pub use model::Model;
pub use registry::{ModelDescriptor, ModelRegistry, RegistryOptions, RegistryStats};

use std::sync::Once;

/// Register the built-in adapters. Idempotent; the registry constructor
/// calls this, but embedders wiring their own dispatch may call it too.
pub fn ensure_default_adapters() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        use std::sync::Arc;

        use laksa_core::adapter::register_adapter;
        use laksa_protocol_gemini::GeminiAdapter;
        use laksa_protocol_openai::{OpenAiCompatAdapter, ZhipuAdapter};

        register_adapter(Arc::new(OpenAiCompatAdapter::openai()));
        register_adapter(Arc::new(OpenAiCompatAdapter::general()));
        register_adapter(Arc::new(ZhipuAdapter::new()));
        register_adapter(Arc::new(GeminiAdapter::new()));
    });
}
