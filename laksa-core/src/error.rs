//! Error taxonomy for the gateway.
//!
//! Every failure surfaced by the library is an [`LlmError`]. The retry
//! executor consults [`LlmError::retry_class`] to decide between retrying on
//! the same credential, rotating to a new one, or giving up; everything else
//! propagates to the caller unchanged.

use std::time::Duration;

use thiserror::Error;

/// Coarse error kind for presentation and stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    NoCredentials,
    Auth,
    RateLimited,
    TransientNetwork,
    Server,
    BadRequest,
    ContentFiltered,
    UnsupportedFeature,
    ToolExecutionFailed,
    ToolLoopExhausted,
    Parse,
    ModelNotFound,
    Canceled,
    RequestFailed,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Config => "config_error",
            Self::NoCredentials => "no_credentials_available",
            Self::Auth => "auth_error",
            Self::RateLimited => "rate_limited",
            Self::TransientNetwork => "transient_network",
            Self::Server => "server_error",
            Self::BadRequest => "bad_request",
            Self::ContentFiltered => "content_filtered",
            Self::UnsupportedFeature => "unsupported_feature",
            Self::ToolExecutionFailed => "tool_execution_failed",
            Self::ToolLoopExhausted => "tool_loop_exhausted",
            Self::Parse => "parse_error",
            Self::ModelNotFound => "model_not_found",
            Self::Canceled => "canceled",
            Self::RequestFailed => "request_failed",
        };
        f.write_str(name)
    }
}

/// How the retry executor should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Worth retrying without touching the credential (timeouts, 5xx).
    SameCredential,
    /// Retry, but rotate to a different credential first (auth, rate limits).
    NewCredential,
    /// Not recoverable by retrying.
    Fatal,
}

/// One failed attempt recorded by the retry executor.
#[derive(Debug, Clone)]
pub struct AttemptError {
    /// 1-based attempt number.
    pub attempt: u32,
    pub kind: ErrorKind,
    pub message: String,
}

/// Gateway error type.
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    /// Missing or invalid provider configuration, unparseable model id.
    #[error("configuration error: {0}")]
    Config(String),

    /// Every credential is disabled or cooling and the caller opted out of
    /// waiting.
    #[error("no credentials available for provider '{provider}'")]
    NoCredentialsAvailable { provider: String },

    /// 401/403 from the provider.
    #[error("authentication rejected by '{provider}' (status {status}): {message}")]
    Auth {
        provider: String,
        status: u16,
        message: String,
    },

    /// 429 or a provider-specific quota signal.
    #[error("rate limited by '{provider}': {message}")]
    RateLimited {
        provider: String,
        message: String,
        retry_after: Option<Duration>,
    },

    /// DNS failure, connect error, read timeout, socket reset.
    #[error("network error: {0}")]
    TransientNetwork(String),

    /// 5xx without a machine-readable retry hint.
    #[error("server error (status {status}): {message}")]
    Server { status: u16, message: String },

    /// 4xx that is neither auth nor rate, or invalid input on our side.
    #[error("bad request{}: {message}", fmt_status(.status))]
    BadRequest { status: Option<u16>, message: String },

    /// The provider refused on policy grounds.
    #[error("content filtered by provider: {reason}")]
    ContentFiltered { reason: String },

    /// Tools/multimodal requested on a model or adapter that cannot do it.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// A tool handler failed; carries the tool name and call id.
    #[error("tool '{tool}' (call {call_id}) failed: {message}")]
    ToolExecutionFailed {
        tool: String,
        call_id: String,
        message: String,
    },

    /// The tool-calling loop exceeded its round budget.
    #[error("tool loop exhausted after {rounds} round(s)")]
    ToolLoopExhausted { rounds: u32 },

    /// The provider response did not match the adapter's expected schema.
    #[error("failed to parse provider response: {0}")]
    Parse(String),

    /// Registry lookup failure.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// External cancellation.
    #[error("operation canceled")]
    Canceled,

    /// All retry attempts were spent; wraps the most recent classified error
    /// together with the full attempt history.
    #[error("request to '{provider}/{model}' failed after {attempts} attempt(s): {last}", attempts = .history.len())]
    RequestFailed {
        provider: String,
        model: String,
        history: Vec<AttemptError>,
        last: Box<LlmError>,
    },
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {code})"),
        None => String::new(),
    }
}

impl LlmError {
    /// Stable error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::NoCredentialsAvailable { .. } => ErrorKind::NoCredentials,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::TransientNetwork(_) => ErrorKind::TransientNetwork,
            Self::Server { .. } => ErrorKind::Server,
            Self::BadRequest { .. } => ErrorKind::BadRequest,
            Self::ContentFiltered { .. } => ErrorKind::ContentFiltered,
            Self::UnsupportedFeature(_) => ErrorKind::UnsupportedFeature,
            Self::ToolExecutionFailed { .. } => ErrorKind::ToolExecutionFailed,
            Self::ToolLoopExhausted { .. } => ErrorKind::ToolLoopExhausted,
            Self::Parse(_) => ErrorKind::Parse,
            Self::ModelNotFound(_) => ErrorKind::ModelNotFound,
            Self::Canceled => ErrorKind::Canceled,
            Self::RequestFailed { .. } => ErrorKind::RequestFailed,
        }
    }

    /// Retry classification used by the request executor.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::TransientNetwork(_) | Self::Server { .. } => RetryClass::SameCredential,
            Self::Auth { .. } | Self::RateLimited { .. } => RetryClass::NewCredential,
            _ => RetryClass::Fatal,
        }
    }

    /// Whether the retry executor would attempt recovery.
    pub fn is_retryable(&self) -> bool {
        self.retry_class() != RetryClass::Fatal
    }

    /// HTTP status carried by the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } | Self::Server { status, .. } => Some(*status),
            Self::BadRequest { status, .. } => *status,
            Self::RateLimited { .. } => Some(429),
            Self::RequestFailed { last, .. } => last.status_code(),
            _ => None,
        }
    }

    /// Provider name carried by the error, if any.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::NoCredentialsAvailable { provider }
            | Self::Auth { provider, .. }
            | Self::RateLimited { provider, .. }
            | Self::RequestFailed { provider, .. } => Some(provider),
            _ => None,
        }
    }

    /// Classify a non-2xx HTTP status into the taxonomy. Adapters refine the
    /// result with provider-specific error envelopes where they can.
    pub fn from_status(provider: &str, status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Auth {
                provider: provider.to_string(),
                status,
                message,
            },
            429 => Self::RateLimited {
                provider: provider.to_string(),
                message,
                retry_after: None,
            },
            // Providers that signal exhausted balance with 402/413 behave
            // like quota errors for rotation purposes.
            402 | 413 => Self::RateLimited {
                provider: provider.to_string(),
                message,
                retry_after: None,
            },
            500..=599 => Self::Server { status, message },
            _ => Self::BadRequest {
                status: Some(status),
                message,
            },
        }
    }

    /// Flatten into the user-visible surface.
    pub fn summary(&self, model: Option<&str>) -> ErrorSummary {
        let (attempt_count, inner): (Option<u32>, &LlmError) = match self {
            Self::RequestFailed { history, last, .. } => (Some(history.len() as u32), last),
            other => (None, other),
        };
        ErrorSummary {
            kind: inner.kind(),
            provider: self.provider().map(str::to_string),
            model: model.map(str::to_string),
            attempt_count,
            message: inner.to_string(),
            retryable: inner.is_retryable(),
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TransientNetwork(format!("request timed out: {err}"))
        } else if err.is_connect() {
            Self::TransientNetwork(format!("connect failed: {err}"))
        } else {
            Self::TransientNetwork(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Flat, user-facing view of an error.
#[derive(Debug, Clone)]
pub struct ErrorSummary {
    pub kind: ErrorKind,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub attempt_count: Option<u32>,
    pub message: String,
    pub retryable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        let err = LlmError::from_status("acme", 401, "bad key");
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert_eq!(err.retry_class(), RetryClass::NewCredential);

        let err = LlmError::from_status("acme", 429, "slow down");
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(err.status_code(), Some(429));

        let err = LlmError::from_status("acme", 503, "overloaded");
        assert_eq!(err.retry_class(), RetryClass::SameCredential);

        let err = LlmError::from_status("acme", 404, "no such route");
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(err.retry_class(), RetryClass::Fatal);
    }

    #[test]
    fn request_failed_summary_unwraps_last_error() {
        let last = LlmError::RateLimited {
            provider: "acme".into(),
            message: "quota".into(),
            retry_after: None,
        };
        let err = LlmError::RequestFailed {
            provider: "acme".into(),
            model: "m1".into(),
            history: vec![
                AttemptError {
                    attempt: 1,
                    kind: ErrorKind::Server,
                    message: "boom".into(),
                },
                AttemptError {
                    attempt: 2,
                    kind: ErrorKind::RateLimited,
                    message: "quota".into(),
                },
            ],
            last: Box::new(last),
        };

        let summary = err.summary(Some("m1"));
        assert_eq!(summary.kind, ErrorKind::RateLimited);
        assert_eq!(summary.attempt_count, Some(2));
        assert_eq!(summary.provider.as_deref(), Some("acme"));
        assert!(summary.retryable);
    }
}
