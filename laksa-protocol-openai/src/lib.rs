//! laksa-protocol-openai
//!
//! The OpenAI-compatible chat/embeddings wire protocol, shared by the
//! official API, self-hosted compatible servers, and (with its own auth and
//! error envelope) Zhipu GLM.
#![deny(unsafe_code)]

mod chat;
mod zhipu;

pub use chat::OpenAiCompatAdapter;
pub use zhipu::ZhipuAdapter;
