//! Provider/model resolution with a TTL+LRU handle cache.

use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lru::LruCache;

use laksa_core::adapter::adapter_for;
use laksa_core::capabilities::capabilities_for;
use laksa_core::config::{parse_model_id, ProviderConfig};
use laksa_core::error::LlmError;
use laksa_core::execution::TransportPool;
use laksa_core::keys::{CredentialStats, CredentialStore};
use laksa_core::retry::RetryPolicy;

use crate::model::Model;

/// Registry tuning.
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// How long a cached handle stays fresh.
    pub ttl: Duration,
    /// LRU capacity for cached handles.
    pub max_cache_size: usize,
    /// Retry policy applied to every handle built by this registry.
    pub retry_policy: RetryPolicy,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30 * 60),
            max_cache_size: 64,
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// Cache surface reported by [`ModelRegistry::stats`].
#[derive(Debug, Clone)]
pub struct RegistryStats {
    pub size: usize,
    pub capacity: usize,
    pub ttl: Duration,
    pub keys: Vec<String>,
}

/// One configured model, as listed by [`ModelRegistry::list_models`].
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    pub provider_name: String,
    pub model_name: String,
    pub full_name: String,
    pub api_type: String,
    pub is_embedding_model: bool,
}

struct CacheEntry {
    model: Arc<Model>,
    created_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

struct Inner {
    cache: LruCache<String, CacheEntry>,
    default_model: Option<String>,
}

/// Resolves `provider/model` identifiers to cached [`Model`] handles.
///
/// Credential stores are provider-scoped and live for the registry's whole
/// lifetime, so handle eviction never loses rotation state; two lookups of
/// the same key always share store identity.
pub struct ModelRegistry {
    providers: Vec<ProviderConfig>,
    stores: HashMap<String, Arc<CredentialStore>>,
    transports: TransportPool,
    options: RegistryOptions,
    inner: Mutex<Inner>,
}

impl ModelRegistry {
    pub fn new(providers: Vec<ProviderConfig>, options: RegistryOptions) -> Self {
        crate::ensure_default_adapters();

        let stores = providers
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    Arc::new(CredentialStore::new(&p.name, p.api_keys.clone())),
                )
            })
            .collect();

        let capacity = NonZeroUsize::new(options.max_cache_size.max(1))
            .expect("cache capacity is at least 1");
        Self {
            providers,
            stores,
            transports: TransportPool::new(),
            options,
            inner: Mutex::new(Inner {
                cache: LruCache::new(capacity),
                default_model: None,
            }),
        }
    }

    pub fn with_defaults(providers: Vec<ProviderConfig>) -> Self {
        Self::new(providers, RegistryOptions::default())
    }

    /// Resolve a `provider/model` identifier to a cached handle, building
    /// and inserting one on miss or TTL expiry.
    pub fn get(&self, id: &str) -> Result<Arc<Model>, LlmError> {
        let (provider_name, model_name) = parse_model_id(id)?;
        let key = format!("{provider_name}/{model_name}");

        {
            let mut inner = self.inner.lock().expect("registry poisoned");
            if let Some(entry) = inner.cache.get(&key) {
                if !entry.is_expired(self.options.ttl) {
                    return Ok(entry.model.clone());
                }
                tracing::debug!(key = %key, "cached model handle expired");
                inner.cache.pop(&key);
            }
        }

        // Build outside the lock; a racing build of the same key is
        // harmless, the later insert simply wins.
        let model = Arc::new(self.build_model(provider_name, model_name)?);

        let mut inner = self.inner.lock().expect("registry poisoned");
        if let Some(entry) = inner.cache.get(&key) {
            if !entry.is_expired(self.options.ttl) {
                return Ok(entry.model.clone());
            }
        }
        inner.cache.put(
            key.clone(),
            CacheEntry {
                model: model.clone(),
                created_at: Instant::now(),
            },
        );
        tracing::debug!(key = %key, "cached new model handle");
        Ok(model)
    }

    /// Resolve the configured default model.
    pub fn get_default(&self) -> Result<Arc<Model>, LlmError> {
        let default = self
            .default_model_name()
            .ok_or_else(|| LlmError::Config("no default model configured".into()))?;
        self.get(&default)
    }

    fn build_model(&self, provider_name: &str, model_name: &str) -> Result<Model, LlmError> {
        let provider = self
            .providers
            .iter()
            .find(|p| p.name == provider_name)
            .ok_or_else(|| LlmError::ModelNotFound(format!("{provider_name}/{model_name}")))?;
        let model_cfg = provider
            .find_model(model_name)
            .ok_or_else(|| LlmError::ModelNotFound(format!("{provider_name}/{model_name}")))?;

        let adapter = adapter_for(&provider.api_type)?;
        let transport = self.transports.get(
            Duration::from_secs(provider.timeout_secs),
            provider.proxy.as_deref(),
        )?;
        let store = self
            .stores
            .get(provider_name)
            .cloned()
            .expect("store exists for every configured provider");

        Ok(Model {
            defaults: model_cfg.default_overrides(),
            capabilities: capabilities_for(model_name),
            model: model_cfg.clone(),
            provider: provider.clone(),
            store,
            adapter,
            transport,
            policy: self.options.retry_policy.clone(),
        })
    }

    /// Drop every cached handle. In-flight requests holding an `Arc`
    /// continue unaffected.
    pub fn flush(&self) {
        let mut inner = self.inner.lock().expect("registry poisoned");
        inner.cache.clear();
        tracing::info!("model cache flushed");
    }

    pub fn stats(&self) -> RegistryStats {
        let inner = self.inner.lock().expect("registry poisoned");
        RegistryStats {
            size: inner.cache.len(),
            capacity: self.options.max_cache_size,
            ttl: self.options.ttl,
            keys: inner.cache.iter().map(|(k, _)| k.clone()).collect(),
        }
    }

    pub fn default_model_name(&self) -> Option<String> {
        self.inner
            .lock()
            .expect("registry poisoned")
            .default_model
            .clone()
    }

    /// Set (or clear) the process-wide default model. The identifier must
    /// refer to a configured model.
    pub fn set_default_model_name(&self, id: Option<String>) -> Result<(), LlmError> {
        if let Some(id) = &id {
            let (provider_name, model_name) = parse_model_id(id)?;
            let known = self
                .providers
                .iter()
                .any(|p| p.name == provider_name && p.find_model(model_name).is_some());
            if !known {
                return Err(LlmError::ModelNotFound(id.clone()));
            }
        }
        let mut inner = self.inner.lock().expect("registry poisoned");
        inner.default_model = id;
        Ok(())
    }

    /// All configured models.
    pub fn list_models(&self) -> Vec<ModelDescriptor> {
        self.providers
            .iter()
            .flat_map(|provider| {
                provider.models.iter().map(|model| ModelDescriptor {
                    provider_name: provider.name.clone(),
                    model_name: model.model_name.clone(),
                    full_name: format!("{}/{}", provider.name, model.model_name),
                    api_type: provider.api_type.clone(),
                    is_embedding_model: model.is_embedding_model
                        || capabilities_for(&model.model_name).is_embedding_model,
                })
            })
            .collect()
    }

    pub fn list_embedding_models(&self) -> Vec<ModelDescriptor> {
        self.list_models()
            .into_iter()
            .filter(|m| m.is_embedding_model)
            .collect()
    }

    /// Per-provider credential counters.
    pub fn credential_stats(&self) -> BTreeMap<String, Vec<CredentialStats>> {
        self.stores
            .iter()
            .map(|(name, store)| (name.clone(), store.stats()))
            .collect()
    }

    /// Clear cooling/disabled state for one provider's credentials.
    /// Returns false when the provider is unknown.
    pub fn reset_credentials(&self, provider: &str) -> bool {
        match self.stores.get(provider) {
            Some(store) => {
                store.reset();
                true
            }
            None => false,
        }
    }
}
