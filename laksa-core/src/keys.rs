//! Rotating credential store with health tracking.
//!
//! One store per provider. All state lives behind a single mutex that is
//! only held for the duration of a state mutation, never across I/O: when
//! every credential is cooling, `acquire` sleeps *outside* the lock and
//! re-checks afterwards.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};

use crate::error::LlmError;
use crate::logging::mask_key;

/// Health state of a single credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialStatus {
    Healthy,
    /// Temporarily banned until `cooldown_until`.
    Cooling,
    /// Permanently banned until an explicit `reset`.
    Disabled,
}

/// Failure category reported back into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 429 / quota: exponential cooldown.
    RateLimit,
    /// 401/403: disable outright.
    Auth,
    /// Network or 5xx: cool down after repeated failures.
    Transient,
}

/// Cooldown tuning, overridable per provider.
#[derive(Debug, Clone)]
pub struct CooldownConfig {
    /// Base cooldown for a rate limit; doubles per consecutive failure.
    pub rate_limit_base: Duration,
    /// Upper bound for any automatic cooldown.
    pub max_cooldown: Duration,
    /// Cooldown applied once transient failures reach the threshold.
    pub transient_cooldown: Duration,
    /// Consecutive transient failures tolerated before cooling.
    pub transient_threshold: u32,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            rate_limit_base: Duration::from_secs(60),
            max_cooldown: Duration::from_secs(600),
            transient_cooldown: Duration::from_secs(30),
            transient_threshold: 3,
        }
    }
}

#[derive(Debug)]
struct CredentialState {
    value: SecretString,
    status: CredentialStatus,
    cooldown_until: Option<Instant>,
    consecutive_failures: u32,
    success_count: u64,
    failure_count: u64,
    total_latency: Duration,
    last_used: Option<Instant>,
    last_error: Option<String>,
}

impl CredentialState {
    fn new(value: String) -> Self {
        Self {
            value: SecretString::new(value),
            status: CredentialStatus::Healthy,
            cooldown_until: None,
            consecutive_failures: 0,
            success_count: 0,
            failure_count: 0,
            total_latency: Duration::ZERO,
            last_used: None,
            last_error: None,
        }
    }

    /// Promote back to healthy if the cooldown deadline has passed.
    fn refresh(&mut self, now: Instant) {
        if self.status == CredentialStatus::Cooling {
            if let Some(deadline) = self.cooldown_until {
                if now >= deadline {
                    self.status = CredentialStatus::Healthy;
                    self.cooldown_until = None;
                }
            }
        }
    }
}

/// A credential handed out by [`CredentialStore::acquire`]. Reports refer
/// back to the originating slot by index.
#[derive(Debug, Clone)]
pub struct CredentialLease {
    index: usize,
    value: SecretString,
}

impl CredentialLease {
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    /// Masked form for logs.
    pub fn masked(&self) -> String {
        mask_key(self.value.expose_secret())
    }
}

/// Per-credential counters exposed by [`CredentialStore::stats`].
#[derive(Debug, Clone)]
pub struct CredentialStats {
    pub masked: String,
    pub status: CredentialStatus,
    pub success_count: u64,
    pub failure_count: u64,
    pub consecutive_failures: u32,
    pub cooldown_remaining: Option<Duration>,
    pub avg_latency: Option<Duration>,
    pub success_rate: f64,
    pub last_error: Option<String>,
}

struct Inner {
    creds: Vec<CredentialState>,
    /// Round-robin cursor: index of the next slot to consider.
    cursor: usize,
}

/// Thread-safe rotating pool of API credentials for one provider.
pub struct CredentialStore {
    provider: String,
    cooldowns: CooldownConfig,
    inner: Mutex<Inner>,
}

impl CredentialStore {
    pub fn new<I, S>(provider: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_cooldowns(provider, keys, CooldownConfig::default())
    }

    pub fn with_cooldowns<I, S>(
        provider: impl Into<String>,
        keys: I,
        cooldowns: CooldownConfig,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let creds = keys
            .into_iter()
            .map(|k| CredentialState::new(k.into()))
            .collect();
        Self {
            provider: provider.into(),
            cooldowns,
            inner: Mutex::new(Inner { creds, cursor: 0 }),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("credential store poisoned").creds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Next healthy credential, round-robin.
    ///
    /// With every credential healthy the rotation is strict. When none are
    /// healthy but some are cooling, waits for the earliest deadline if
    /// `wait` is set, otherwise fails fast. All-disabled always fails.
    pub async fn acquire(&self, wait: bool) -> Result<CredentialLease, LlmError> {
        loop {
            let deadline = match self.try_acquire()? {
                Ok(lease) => return Ok(lease),
                Err(deadline) => deadline,
            };
            if !wait {
                return Err(LlmError::NoCredentialsAvailable {
                    provider: self.provider.clone(),
                });
            }
            // Sleep outside the lock, then re-check; another task may have
            // taken the slot that wakes up first.
            let now = Instant::now();
            if deadline > now {
                tokio::time::sleep(deadline - now).await;
            }
        }
    }

    /// One locked pass: either a lease, or the earliest wake-up deadline.
    #[allow(clippy::type_complexity)]
    fn try_acquire(&self) -> Result<Result<CredentialLease, Instant>, LlmError> {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("credential store poisoned");
        if inner.creds.is_empty() {
            return Err(LlmError::NoCredentialsAvailable {
                provider: self.provider.clone(),
            });
        }

        for cred in inner.creds.iter_mut() {
            cred.refresh(now);
        }

        let len = inner.creds.len();
        let start = inner.cursor;
        for offset in 0..len {
            let idx = (start + offset) % len;
            if inner.creds[idx].status == CredentialStatus::Healthy {
                inner.cursor = idx + 1;
                let cred = &mut inner.creds[idx];
                cred.last_used = Some(now);
                tracing::debug!(
                    provider = %self.provider,
                    key = %mask_key(cred.value.expose_secret()),
                    "dispensing credential"
                );
                return Ok(Ok(CredentialLease {
                    index: idx,
                    value: cred.value.clone(),
                }));
            }
        }

        let earliest = inner
            .creds
            .iter()
            .filter(|c| c.status == CredentialStatus::Cooling)
            .filter_map(|c| c.cooldown_until)
            .min();
        match earliest {
            Some(deadline) => Ok(Err(deadline)),
            // Only disabled credentials remain.
            None => Err(LlmError::NoCredentialsAvailable {
                provider: self.provider.clone(),
            }),
        }
    }

    /// Record a successful call: failures reset, cooling cleared.
    pub fn report_success(&self, lease: &CredentialLease, latency: Duration) {
        let mut inner = self.inner.lock().expect("credential store poisoned");
        let Some(cred) = inner.creds.get_mut(lease.index) else {
            return;
        };
        cred.consecutive_failures = 0;
        cred.success_count += 1;
        cred.total_latency += latency;
        cred.last_error = None;
        if cred.status == CredentialStatus::Cooling {
            cred.status = CredentialStatus::Healthy;
            cred.cooldown_until = None;
        }
    }

    /// Record a failed call and apply the matching penalty.
    pub fn report_failure(&self, lease: &CredentialLease, kind: FailureKind, error: &str) {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("credential store poisoned");
        let Some(cred) = inner.creds.get_mut(lease.index) else {
            return;
        };
        cred.consecutive_failures += 1;
        cred.failure_count += 1;
        cred.last_error = Some(error.chars().take(256).collect());

        match kind {
            FailureKind::Auth => {
                cred.status = CredentialStatus::Disabled;
                cred.cooldown_until = None;
                tracing::warn!(
                    provider = %self.provider,
                    key = %mask_key(cred.value.expose_secret()),
                    "credential rejected by provider, disabling"
                );
            }
            FailureKind::RateLimit => {
                let exp = cred.consecutive_failures.saturating_sub(1).min(16);
                let cooldown = self
                    .cooldowns
                    .rate_limit_base
                    .saturating_mul(1u32 << exp)
                    .min(self.cooldowns.max_cooldown);
                cred.status = CredentialStatus::Cooling;
                cred.cooldown_until = Some(now + cooldown);
                tracing::warn!(
                    provider = %self.provider,
                    key = %mask_key(cred.value.expose_secret()),
                    cooldown_secs = cooldown.as_secs(),
                    "credential rate limited, cooling"
                );
            }
            FailureKind::Transient => {
                if cred.consecutive_failures >= self.cooldowns.transient_threshold {
                    cred.status = CredentialStatus::Cooling;
                    cred.cooldown_until = Some(now + self.cooldowns.transient_cooldown);
                    tracing::debug!(
                        provider = %self.provider,
                        key = %mask_key(cred.value.expose_secret()),
                        failures = cred.consecutive_failures,
                        "repeated transient failures, cooling credential"
                    );
                }
            }
        }
    }

    /// Neutral release: no success/failure accounting. Used when an
    /// operation is canceled mid-flight.
    pub fn release(&self, _lease: &CredentialLease) {}

    /// Clear cooling and disabled state for every credential.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("credential store poisoned");
        for cred in inner.creds.iter_mut() {
            cred.status = CredentialStatus::Healthy;
            cred.cooldown_until = None;
            cred.consecutive_failures = 0;
            cred.last_error = None;
        }
        tracing::info!(provider = %self.provider, "credential store reset");
    }

    /// Per-credential counters with derived rates.
    pub fn stats(&self) -> Vec<CredentialStats> {
        let now = Instant::now();
        let inner = self.inner.lock().expect("credential store poisoned");
        inner
            .creds
            .iter()
            .map(|cred| {
                let total = cred.success_count + cred.failure_count;
                CredentialStats {
                    masked: mask_key(cred.value.expose_secret()),
                    status: cred.status,
                    success_count: cred.success_count,
                    failure_count: cred.failure_count,
                    consecutive_failures: cred.consecutive_failures,
                    cooldown_remaining: cred
                        .cooldown_until
                        .and_then(|d| d.checked_duration_since(now)),
                    avg_latency: (cred.success_count > 0)
                        .then(|| cred.total_latency / cred.success_count as u32),
                    success_rate: if total > 0 {
                        cred.success_count as f64 / total as f64 * 100.0
                    } else {
                        100.0
                    },
                    last_error: cred.last_error.clone(),
                }
            })
            .collect()
    }

    #[cfg(test)]
    fn status_of(&self, index: usize) -> CredentialStatus {
        self.inner.lock().unwrap().creds[index].status
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("provider", &self.provider)
            .field("credentials", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(keys: &[&str]) -> CredentialStore {
        CredentialStore::new("acme", keys.iter().copied())
    }

    #[tokio::test]
    async fn strict_round_robin_while_healthy() {
        let store = store(&["key-aaaa", "key-bbbb", "key-cccc"]);
        let mut seen = Vec::new();
        for _ in 0..6 {
            let lease = store.acquire(false).await.unwrap();
            seen.push(lease.expose().to_string());
        }
        assert_eq!(seen[0], "key-aaaa");
        assert_eq!(seen[1], "key-bbbb");
        assert_eq!(seen[2], "key-cccc");
        assert_eq!(seen[3], "key-aaaa");
        assert_eq!(&seen[..3], &seen[3..]);
    }

    #[tokio::test]
    async fn auth_failure_disables_until_reset() {
        let store = store(&["key-x", "key-y"]);
        let lease = store.acquire(false).await.unwrap();
        assert_eq!(lease.expose(), "key-x");
        store.report_failure(&lease, FailureKind::Auth, "401 unauthorized");
        assert_eq!(store.status_of(0), CredentialStatus::Disabled);

        for _ in 0..4 {
            let lease = store.acquire(false).await.unwrap();
            assert_eq!(lease.expose(), "key-y");
        }

        store.reset();
        let lease = store.acquire(false).await.unwrap();
        assert_eq!(store.status_of(0), CredentialStatus::Healthy);
        drop(lease);
    }

    #[tokio::test]
    async fn rate_limit_cooldown_grows_and_caps() {
        let cooldowns = CooldownConfig {
            rate_limit_base: Duration::from_secs(60),
            max_cooldown: Duration::from_secs(600),
            ..Default::default()
        };
        let store = CredentialStore::with_cooldowns("acme", ["key-a"], cooldowns);

        let lease = store.acquire(false).await.unwrap();
        for _ in 0..8 {
            store.report_failure(&lease, FailureKind::RateLimit, "429");
        }
        let stats = store.stats();
        assert_eq!(stats[0].status, CredentialStatus::Cooling);
        let remaining = stats[0].cooldown_remaining.unwrap();
        assert!(remaining <= Duration::from_secs(600));
        assert!(remaining > Duration::from_secs(500));
    }

    #[tokio::test]
    async fn all_cooling_fails_fast_without_wait() {
        let store = store(&["key-a"]);
        let lease = store.acquire(false).await.unwrap();
        store.report_failure(&lease, FailureKind::RateLimit, "429");

        let err = store.acquire(false).await.unwrap_err();
        assert!(matches!(err, LlmError::NoCredentialsAvailable { .. }));
    }

    #[tokio::test]
    async fn waiting_acquire_wakes_after_cooldown() {
        // Real sleeps: cooldown deadlines are std Instants, which tokio's
        // paused clock does not advance.
        let cooldowns = CooldownConfig {
            rate_limit_base: Duration::from_millis(50),
            ..Default::default()
        };
        let store = CredentialStore::with_cooldowns("acme", ["key-a"], cooldowns);
        let lease = store.acquire(false).await.unwrap();
        store.report_failure(&lease, FailureKind::RateLimit, "429");

        let lease = store.acquire(true).await.unwrap();
        assert_eq!(lease.expose(), "key-a");
    }

    #[tokio::test]
    async fn transient_failures_cool_after_threshold() {
        let store = store(&["key-a", "key-b"]);
        let lease = store.acquire(false).await.unwrap();
        store.report_failure(&lease, FailureKind::Transient, "timeout");
        store.report_failure(&lease, FailureKind::Transient, "timeout");
        assert_eq!(store.status_of(0), CredentialStatus::Healthy);
        store.report_failure(&lease, FailureKind::Transient, "timeout");
        assert_eq!(store.status_of(0), CredentialStatus::Cooling);
    }

    #[tokio::test]
    async fn success_clears_failure_streak() {
        let store = store(&["key-a"]);
        let lease = store.acquire(false).await.unwrap();
        store.report_failure(&lease, FailureKind::Transient, "reset by peer");
        store.report_success(&lease, Duration::from_millis(120));

        let stats = store.stats();
        assert_eq!(stats[0].consecutive_failures, 0);
        assert_eq!(stats[0].success_count, 1);
        assert_eq!(stats[0].failure_count, 1);
        assert_eq!(stats[0].status, CredentialStatus::Healthy);
        assert!(stats[0].last_error.is_none());
    }

    #[tokio::test]
    async fn empty_store_reports_no_credentials() {
        let store = CredentialStore::new("acme", Vec::<String>::new());
        let err = store.acquire(true).await.unwrap_err();
        assert!(matches!(err, LlmError::NoCredentialsAvailable { .. }));
    }
}
