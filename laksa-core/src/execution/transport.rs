//! HTTP transport abstraction.
//!
//! Adapters produce a [`ProviderRequest`]; a transport turns it into a
//! [`ProviderResponse`] without interpreting either. The reqwest-backed
//! transport is the production implementation; tests inject their own to
//! script provider behavior without sockets.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::LlmError;

/// A fully built provider request: final URL, headers, JSON body.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
}

/// Raw provider response. Parsing is the adapter's job.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub status: u16,
    pub body: String,
}

impl ProviderResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON; non-JSON bodies become `Value::Null` so
    /// error extraction can fall back to the raw text.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

/// JSON-POST transport boundary.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute_json(&self, request: ProviderRequest) -> Result<ProviderResponse, LlmError>;
}

/// Production transport over a pooled `reqwest::Client`.
///
/// The client (timeout, proxy, keep-alive pool) is frozen at construction;
/// per-provider headers travel inside each [`ProviderRequest`].
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, proxy: Option<&str>) -> Result<Self, LlmError> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(proxy) = proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| LlmError::Config(format!("invalid proxy '{proxy}': {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| LlmError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute_json(&self, request: ProviderRequest) -> Result<ProviderResponse, LlmError> {
        let mut req = self.client.post(&request.url).json(&request.body);
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        let response = req.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(ProviderResponse { status, body })
    }
}

/// Shares one transport per `(timeout, proxy)` pair so providers with the
/// same network settings reuse a connection pool.
#[derive(Default)]
pub struct TransportPool {
    transports: Mutex<HashMap<(u64, Option<String>), Arc<ReqwestTransport>>>,
}

impl TransportPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &self,
        timeout: Duration,
        proxy: Option<&str>,
    ) -> Result<Arc<dyn HttpTransport>, LlmError> {
        let key = (timeout.as_secs(), proxy.map(str::to_string));
        let mut transports = self.transports.lock().expect("transport pool poisoned");
        if let Some(existing) = transports.get(&key) {
            return Ok(existing.clone());
        }
        tracing::debug!(timeout_secs = key.0, proxy = ?key.1, "creating HTTP transport");
        let transport = Arc::new(ReqwestTransport::new(timeout, proxy)?);
        transports.insert(key, transport.clone());
        Ok(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_reuses_by_timeout_and_proxy() {
        let pool = TransportPool::new();
        let a = pool.get(Duration::from_secs(30), None).unwrap();
        let b = pool.get(Duration::from_secs(30), None).unwrap();
        let c = pool.get(Duration::from_secs(60), None).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        drop(c);
        assert_eq!(pool.transports.lock().unwrap().len(), 2);
    }

    #[test]
    fn non_json_body_falls_back_to_null() {
        let response = ProviderResponse {
            status: 502,
            body: "Bad Gateway".into(),
        };
        assert!(response.json().is_null());
        assert!(!response.is_success());
    }
}
