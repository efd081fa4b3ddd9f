//! Client-side rate limiting per adapter

use async_trait::async_trait;
use equity_core::{CapabilityAdapter, CapabilityError, CapabilityRequest, DataDomain};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Adapter decorator that waits for rate-limit capacity before each call
pub struct ThrottledAdapter {
    inner: Arc<dyn CapabilityAdapter>,
    rate_limiter: SharedRateLimiter,
}

impl ThrottledAdapter {
    /// Allow at most `requests_per_second` calls, with bursts of the same size
    pub fn new(inner: Arc<dyn CapabilityAdapter>, requests_per_second: NonZeroU32) -> Self {
        let quota = Quota::per_second(requests_per_second);
        Self {
            inner,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }
}

#[async_trait]
impl CapabilityAdapter for ThrottledAdapter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn domain(&self) -> DataDomain {
        self.inner.domain()
    }

    async fn call(&self, request: CapabilityRequest) -> Result<Value, CapabilityError> {
        self.rate_limiter.until_ready().await;
        self.inner.call(request).await
    }
}
