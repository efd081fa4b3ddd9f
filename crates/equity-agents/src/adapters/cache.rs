//! Caching layer for adapter responses to reduce upstream calls

use async_trait::async_trait;
use cached::{Cached, TimedCache};
use equity_core::{CapabilityAdapter, CapabilityError, CapabilityRequest, DataDomain};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Cache key for adapter requests
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub domain: DataDomain,
    pub subject: String,
    /// Request parameters as a JSON string
    pub params: String,
}

impl From<&CapabilityRequest> for CacheKey {
    fn from(request: &CapabilityRequest) -> Self {
        Self {
            domain: request.domain,
            subject: request.subject.identifier().to_string(),
            params: request.params.to_string(),
        }
    }
}

/// Adapter decorator that keeps successful responses for a fixed TTL
///
/// Failures are never cached.
pub struct CachedAdapter {
    inner: Arc<dyn CapabilityAdapter>,
    cache: Arc<RwLock<TimedCache<CacheKey, Value>>>,
}

impl CachedAdapter {
    pub fn new(inner: Arc<dyn CapabilityAdapter>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    /// Number of cached entries
    pub async fn len(&self) -> usize {
        self.cache.read().await.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every cached entry
    pub async fn clear(&self) {
        self.cache.write().await.cache_clear();
    }
}

#[async_trait]
impl CapabilityAdapter for CachedAdapter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn domain(&self) -> DataDomain {
        self.inner.domain()
    }

    async fn call(&self, request: CapabilityRequest) -> Result<Value, CapabilityError> {
        let key = CacheKey::from(&request);

        if let Some(value) = self.cache.write().await.cache_get(&key).cloned() {
            tracing::debug!(domain = %key.domain, subject = %key.subject, "Cache hit");
            return Ok(value);
        }
        tracing::debug!(domain = %key.domain, subject = %key.subject, "Cache miss");

        let value = self.inner.call(request).await?;
        let _ = self.cache.write().await.cache_set(key, value.clone());
        Ok(value)
    }
}
