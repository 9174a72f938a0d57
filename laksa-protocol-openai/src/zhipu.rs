//! Zhipu GLM deviation of the OpenAI-compatible protocol.
//!
//! Same wire format, three differences: its own base path, an HS256
//! JWT assembled from the `id.secret` API key instead of a plain bearer
//! token, and a numeric-code error envelope.

use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;

use laksa_core::adapter::{ApiAdapter, Feature};
use laksa_core::config::{ModelConfig, ProviderConfig};
use laksa_core::error::LlmError;
use laksa_core::execution::{ProviderRequest, ProviderResponse};
use laksa_core::keys::CredentialLease;
use laksa_core::types::{ChatRequest, LlmResponse};

use crate::chat::{self, OpenAiCompatAdapter};

type HmacSha256 = Hmac<Sha256>;

/// Signed token lifetime.
const TOKEN_TTL_MS: u64 = 3_600_000;

#[derive(Debug)]
pub struct ZhipuAdapter {
    inner: OpenAiCompatAdapter,
}

impl Default for ZhipuAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ZhipuAdapter {
    pub fn new() -> Self {
        Self {
            inner: OpenAiCompatAdapter::with_paths(
                "zhipu",
                "/api/paas/v4/chat/completions",
                "/api/paas/v4/embeddings",
            ),
        }
    }

    fn auth_headers(
        &self,
        credential: &CredentialLease,
        provider: &ProviderConfig,
    ) -> Result<Vec<(String, String)>, LlmError> {
        let now_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| LlmError::Config(format!("system clock before epoch: {e}")))?
            .as_millis() as u64;
        let token = sign_token(credential.expose(), now_ms)?;

        let mut headers = vec![
            ("content-type".to_string(), "application/json".to_string()),
            ("authorization".to_string(), format!("Bearer {token}")),
        ];
        for (name, value) in &provider.default_headers {
            headers.push((name.clone(), value.clone()));
        }
        Ok(headers)
    }
}

/// Build the Zhipu JWT for an `id.secret` API key at the given time.
///
/// Keys without the `id.secret` shape pass through untouched; some
/// compatible deployments accept the raw key.
fn sign_token(api_key: &str, now_ms: u64) -> Result<String, LlmError> {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;

    let Some((id, secret)) = api_key.split_once('.') else {
        tracing::debug!("zhipu api key has no id.secret shape, sending raw");
        return Ok(api_key.to_string());
    };

    let header = json!({ "alg": "HS256", "sign_type": "SIGN" });
    let claims = json!({
        "api_key": id,
        "exp": now_ms + TOKEN_TTL_MS,
        "timestamp": now_ms,
    });
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
    );

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| LlmError::Config(format!("invalid zhipu api key secret: {e}")))?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{signature}"))
}

/// Map Zhipu's numeric error codes onto the taxonomy.
fn zhipu_error(body: &Value, status: u16, provider: &str) -> LlmError {
    let error = &body["error"];
    let code = match &error["code"] {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    };
    let message = error["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());

    match code.as_str() {
        // Authentication family.
        "1000" | "1001" | "1002" | "1003" | "1004" => LlmError::Auth {
            provider: provider.to_string(),
            status,
            message,
        },
        // Balance exhausted and concurrency/rate limits rotate credentials.
        "1113" | "1302" | "1303" | "1305" => LlmError::RateLimited {
            provider: provider.to_string(),
            message,
            retry_after: None,
        },
        _ => chat::envelope_error(body, status, provider),
    }
}

impl ApiAdapter for ZhipuAdapter {
    fn api_type(&self) -> &'static str {
        "zhipu"
    }

    fn supports(&self, feature: Feature) -> bool {
        self.inner.supports(feature)
    }

    fn build_chat_request(
        &self,
        request: &ChatRequest,
        credential: &CredentialLease,
        provider: &ProviderConfig,
        model: &ModelConfig,
    ) -> Result<ProviderRequest, LlmError> {
        Ok(ProviderRequest {
            url: self.inner.chat_url(provider)?,
            headers: self.auth_headers(credential, provider)?,
            body: chat::build_chat_body(request, model)?,
        })
    }

    fn parse_chat_response(&self, response: &ProviderResponse) -> Result<LlmResponse, LlmError> {
        self.inner.parse_chat_response(response)
    }

    fn build_embeddings_request(
        &self,
        texts: &[String],
        _task_type: Option<&str>,
        credential: &CredentialLease,
        provider: &ProviderConfig,
        model: &ModelConfig,
    ) -> Result<ProviderRequest, LlmError> {
        Ok(ProviderRequest {
            url: self.inner.embeddings_url(provider)?,
            headers: self.auth_headers(credential, provider)?,
            body: json!({
                "model": model.model_name,
                "input": texts,
            }),
        })
    }

    fn parse_embeddings_response(
        &self,
        response: &ProviderResponse,
    ) -> Result<Vec<Vec<f32>>, LlmError> {
        self.inner.parse_embeddings_response(response)
    }

    fn extract_error(&self, response: &ProviderResponse, provider: &str) -> LlmError {
        zhipu_error(&response.json(), response.status, provider)
    }
}
