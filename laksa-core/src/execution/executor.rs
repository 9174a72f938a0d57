//! The retry-driven request executor.
//!
//! Wraps one adapter+credential+HTTP attempt in the retry policy: classify
//! the failure, report it to the credential store, rotate or back off, and
//! try again until the attempt budget is spent.

use std::time::Instant;

use crate::cancel::CancelHandle;
use crate::error::{AttemptError, ErrorKind, LlmError, RetryClass};
use crate::execution::transport::{HttpTransport, ProviderRequest, ProviderResponse};
use crate::keys::{CredentialLease, CredentialStore, FailureKind};
use crate::logging::sanitize_body;
use crate::retry::RetryPolicy;

/// Executes provider calls for one model with retry and credential
/// rotation.
pub struct RequestExecutor<'a> {
    pub policy: &'a RetryPolicy,
    pub store: &'a CredentialStore,
    pub transport: &'a dyn HttpTransport,
    pub provider: &'a str,
    pub model: &'a str,
    /// Whether `acquire` may sleep for a cooling credential instead of
    /// failing fast.
    pub wait_for_cooldown: bool,
}

impl RequestExecutor<'_> {
    /// Run one logical request through the retry policy.
    ///
    /// `prepare` builds the wire request for a credential, `parse` consumes
    /// a 2xx response, and `extract` maps a non-2xx response onto the error
    /// taxonomy (typically the adapter's envelope reader).
    pub async fn execute<T, Prep, Parse, Extract>(
        &self,
        cancel: &CancelHandle,
        prepare: Prep,
        parse: Parse,
        extract: Extract,
    ) -> Result<T, LlmError>
    where
        Prep: Fn(&CredentialLease) -> Result<ProviderRequest, LlmError>,
        Parse: Fn(&ProviderResponse) -> Result<T, LlmError>,
        Extract: Fn(&ProviderResponse) -> LlmError,
    {
        let mut history: Vec<AttemptError> = Vec::new();
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(LlmError::Canceled);
            }

            let lease = tokio::select! {
                _ = cancel.cancelled() => return Err(LlmError::Canceled),
                lease = self.store.acquire(self.wait_for_cooldown) => lease?,
            };

            let request = prepare(&lease)?;
            tracing::debug!(
                provider = self.provider,
                model = self.model,
                attempt,
                url = %request.url,
                key = %lease.masked(),
                body = %sanitize_body(&request.body),
                "dispatching request"
            );

            let started = Instant::now();
            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    self.store.release(&lease);
                    return Err(LlmError::Canceled);
                }
                outcome = self.transport.execute_json(request) => outcome,
            };

            let error = match outcome {
                Ok(response) if response.is_success() => {
                    let parsed = parse(&response);
                    match parsed {
                        Ok(value) => {
                            self.store.report_success(&lease, started.elapsed());
                            tracing::debug!(
                                provider = self.provider,
                                model = self.model,
                                attempt,
                                latency_ms = started.elapsed().as_millis() as u64,
                                "request succeeded"
                            );
                            return Ok(value);
                        }
                        // A malformed 2xx body is not the credential's
                        // fault and is not recoverable by retrying.
                        Err(err) => return Err(err),
                    }
                }
                Ok(response) => extract(&response),
                Err(err) => err,
            };

            match error.retry_class() {
                RetryClass::Fatal => return Err(error),
                RetryClass::SameCredential => {
                    self.store
                        .report_failure(&lease, FailureKind::Transient, &error.to_string());
                }
                RetryClass::NewCredential => {
                    let kind = if error.kind() == ErrorKind::Auth {
                        FailureKind::Auth
                    } else {
                        FailureKind::RateLimit
                    };
                    self.store.report_failure(&lease, kind, &error.to_string());
                }
            }

            tracing::warn!(
                provider = self.provider,
                model = self.model,
                attempt,
                error = %error,
                "attempt failed"
            );
            history.push(AttemptError {
                attempt,
                kind: error.kind(),
                message: error.to_string(),
            });

            if attempt == max_attempts {
                return Err(LlmError::RequestFailed {
                    provider: self.provider.to_string(),
                    model: self.model.to_string(),
                    history,
                    last: Box::new(error),
                });
            }

            let backoff = self.policy.backoff_after(attempt);
            tokio::select! {
                _ = cancel.cancelled() => return Err(LlmError::Canceled),
                _ = tokio::time::sleep(backoff) => {}
            }
        }

        unreachable!("retry loop returns from within");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::CredentialStatus;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Transport scripted with a fixed response sequence.
    struct ScriptedTransport {
        responses: Mutex<Vec<ProviderResponse>>,
        calls: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<ProviderResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn execute_json(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, LlmError> {
            self.calls.lock().unwrap().push(request);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(LlmError::TransientNetwork("script exhausted".into()));
            }
            Ok(responses.remove(0))
        }
    }

    fn response(status: u16, body: &str) -> ProviderResponse {
        ProviderResponse {
            status,
            body: body.to_string(),
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new()
            .with_base_backoff(Duration::from_millis(1))
            .with_max_backoff(Duration::from_millis(2))
            .with_jitter(0.0)
    }

    fn request_for(lease: &CredentialLease) -> Result<ProviderRequest, LlmError> {
        Ok(ProviderRequest {
            url: "http://provider.test/v1".into(),
            headers: vec![("authorization".into(), format!("Bearer {}", lease.expose()))],
            body: serde_json::json!({}),
        })
    }

    #[tokio::test]
    async fn rate_limit_rotates_to_next_credential() {
        let store = CredentialStore::new("acme", ["key-a", "key-b"]);
        let transport = ScriptedTransport::new(vec![
            response(429, r#"{"error":{"message":"slow down"}}"#),
            response(200, r#"{"ok":true}"#),
        ]);
        let policy = fast_policy();
        let executor = RequestExecutor {
            policy: &policy,
            store: &store,
            transport: &transport,
            provider: "acme",
            model: "m1",
            wait_for_cooldown: false,
        };

        let body = executor
            .execute(
                &CancelHandle::new(),
                request_for,
                |resp| Ok(resp.json()),
                |resp| LlmError::from_status("acme", resp.status, resp.body.clone()),
            )
            .await
            .unwrap();

        assert_eq!(body["ok"], true);
        assert_eq!(transport.call_count(), 2);

        // First attempt used key-a and cooled it; the retry used key-b.
        let calls = transport.calls.lock().unwrap();
        assert!(calls[0].headers[0].1.contains("key-a"));
        assert!(calls[1].headers[0].1.contains("key-b"));
        let stats = store.stats();
        assert_eq!(stats[0].status, CredentialStatus::Cooling);
        assert_eq!(stats[1].status, CredentialStatus::Healthy);
        assert_eq!(stats[1].consecutive_failures, 0);
    }

    #[tokio::test]
    async fn attempt_count_matches_retryable_errors() {
        let store = CredentialStore::new("acme", ["key-a", "key-b", "key-c"]);
        let transport = ScriptedTransport::new(vec![
            response(500, "oops"),
            response(500, "oops"),
            response(500, "oops"),
            response(200, r#"{"never":"reached"}"#),
        ]);
        let policy = fast_policy();
        let executor = RequestExecutor {
            policy: &policy,
            store: &store,
            transport: &transport,
            provider: "acme",
            model: "m1",
            wait_for_cooldown: false,
        };

        let err = executor
            .execute(
                &CancelHandle::new(),
                request_for,
                |resp| Ok(resp.json()),
                |resp| LlmError::from_status("acme", resp.status, resp.body.clone()),
            )
            .await
            .unwrap_err();

        // max_attempts (3) < 1 + retryable errors, so exactly 3 HTTP calls.
        assert_eq!(transport.call_count(), 3);
        match err {
            LlmError::RequestFailed { history, last, .. } => {
                assert_eq!(history.len(), 3);
                assert_eq!(last.kind(), ErrorKind::Server);
            }
            other => panic!("expected RequestFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fatal_errors_do_not_retry() {
        let store = CredentialStore::new("acme", ["key-a"]);
        let transport = ScriptedTransport::new(vec![response(404, "no such model")]);
        let policy = fast_policy();
        let executor = RequestExecutor {
            policy: &policy,
            store: &store,
            transport: &transport,
            provider: "acme",
            model: "m1",
            wait_for_cooldown: false,
        };

        let err = executor
            .execute(
                &CancelHandle::new(),
                request_for,
                |resp| Ok(resp.json()),
                |resp| LlmError::from_status("acme", resp.status, resp.body.clone()),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(transport.call_count(), 1);
        // The credential is not punished for our own bad request.
        assert_eq!(store.stats()[0].failure_count, 0);
    }

    #[tokio::test]
    async fn auth_error_disables_and_rotates() {
        let store = CredentialStore::new("acme", ["key-x", "key-y"]);
        let transport = ScriptedTransport::new(vec![
            response(401, "bad key"),
            response(200, r#"{"ok":true}"#),
        ]);
        let policy = fast_policy();
        let executor = RequestExecutor {
            policy: &policy,
            store: &store,
            transport: &transport,
            provider: "acme",
            model: "m1",
            wait_for_cooldown: false,
        };

        executor
            .execute(
                &CancelHandle::new(),
                request_for,
                |resp| Ok(resp.json()),
                |resp| LlmError::from_status("acme", resp.status, resp.body.clone()),
            )
            .await
            .unwrap();

        assert_eq!(store.stats()[0].status, CredentialStatus::Disabled);
        assert_eq!(store.stats()[1].status, CredentialStatus::Healthy);
    }

    #[tokio::test]
    async fn cancellation_short_circuits() {
        let store = CredentialStore::new("acme", ["key-a"]);
        let transport = ScriptedTransport::new(vec![response(200, "{}")]);
        let policy = fast_policy();
        let executor = RequestExecutor {
            policy: &policy,
            store: &store,
            transport: &transport,
            provider: "acme",
            model: "m1",
            wait_for_cooldown: false,
        };

        let cancel = CancelHandle::new();
        cancel.cancel();
        let err = executor
            .execute(&cancel, request_for, |resp| Ok(resp.json()), |resp| {
                LlmError::from_status("acme", resp.status, resp.body.clone())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::Canceled));
        assert_eq!(transport.call_count(), 0);
    }
}
