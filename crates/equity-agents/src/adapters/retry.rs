//! Transport-level retries with exponential backoff
//!
//! These retries sit below the workflow: a request that eventually succeeds
//! here never shows up as a failed branch attempt.

use async_trait::async_trait;
use equity_core::{CapabilityAdapter, CapabilityError, CapabilityRequest, DataDomain};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Backoff before the second attempt
    pub initial_backoff: Duration,

    /// Upper bound for any single backoff
    pub max_backoff: Duration,

    /// Backoff multiplier (typically 2.0 for exponential backoff)
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// `retries` extra attempts after the first, starting at `initial_backoff`
    pub fn new(retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
            initial_backoff,
            ..Self::default()
        }
    }

    /// Create a policy with no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before attempt number `attempt` (1-based retry count)
    fn backoff_duration(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let factor = self.backoff_multiplier.powi(exponent).max(0.0);
        Duration::try_from_secs_f64(self.initial_backoff.as_secs_f64() * factor)
            .map_or(self.max_backoff, |backoff| backoff.min(self.max_backoff))
    }
}

/// Adapter decorator retrying transient failures (`Unavailable`, `Timeout`)
pub struct RetryingAdapter {
    inner: Arc<dyn CapabilityAdapter>,
    policy: RetryPolicy,
}

impl RetryingAdapter {
    pub fn new(inner: Arc<dyn CapabilityAdapter>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl CapabilityAdapter for RetryingAdapter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn domain(&self) -> DataDomain {
        self.inner.domain()
    }

    async fn call(&self, request: CapabilityRequest) -> Result<Value, CapabilityError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.inner.call(request.clone()).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(adapter = self.inner.name(), attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < attempts => {
                    let backoff = self.policy.backoff_duration(attempt);
                    warn!(
                        adapter = self.inner.name(),
                        attempt,
                        max_attempts = attempts,
                        ?backoff,
                        error = %err,
                        "Transient failure, retrying"
                    );
                    sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equity_core::{CapabilityErrorKind, Subject};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with `kind` for the first `failures` calls
    struct FlakyAdapter {
        failures: u32,
        kind: CapabilityErrorKind,
        calls: AtomicU32,
    }

    impl FlakyAdapter {
        fn new(failures: u32, kind: CapabilityErrorKind) -> Self {
            Self {
                failures,
                kind,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl CapabilityAdapter for FlakyAdapter {
        fn name(&self) -> &str {
            "flaky"
        }

        fn domain(&self) -> DataDomain {
            DataDomain::News
        }

        async fn call(&self, _request: CapabilityRequest) -> Result<Value, CapabilityError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(CapabilityError::new(self.kind, "upstream hiccup"))
            } else {
                Ok(json!({"articles": []}))
            }
        }
    }

    fn fast(retries: u32) -> RetryPolicy {
        RetryPolicy::new(retries, Duration::from_millis(1))
    }

    fn request() -> CapabilityRequest {
        CapabilityRequest::new(DataDomain::News, Subject::new("LREN3").unwrap())
    }

    #[test]
    fn test_backoff_calculation() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(300),
            backoff_multiplier: 2.0,
        };
        assert_eq!(policy.backoff_duration(0), Duration::ZERO);
        assert_eq!(policy.backoff_duration(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_duration(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_duration(3), Duration::from_millis(300));
        assert_eq!(policy.backoff_duration(u32::MAX), Duration::from_millis(300));
    }

    #[test]
    fn test_retry_count_saturates() {
        let policy = RetryPolicy::new(u32::MAX, Duration::from_millis(1));
        assert_eq!(policy.max_attempts, u32::MAX);
        assert_eq!(RetryPolicy::new(0, Duration::from_millis(1)).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let inner = Arc::new(FlakyAdapter::new(2, CapabilityErrorKind::Timeout));
        let adapter = RetryingAdapter::new(inner.clone(), fast(3));

        assert!(adapter.call(request()).await.is_ok());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let inner = Arc::new(FlakyAdapter::new(10, CapabilityErrorKind::Unavailable));
        let adapter = RetryingAdapter::new(inner.clone(), fast(2));

        let err = adapter.call(request()).await.unwrap_err();
        assert_eq!(err.kind, CapabilityErrorKind::Unavailable);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failures_are_not_retried() {
        let inner = Arc::new(FlakyAdapter::new(1, CapabilityErrorKind::MalformedData));
        let adapter = RetryingAdapter::new(inner.clone(), fast(3));

        assert!(adapter.call(request()).await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

        let no_retry = RetryingAdapter::new(
            Arc::new(FlakyAdapter::new(1, CapabilityErrorKind::Timeout)),
            RetryPolicy::no_retry(),
        );
        assert!(no_retry.call(request()).await.is_err());
    }
}
