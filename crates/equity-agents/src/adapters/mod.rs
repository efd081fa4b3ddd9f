//! Decorators around capability adapters
//!
//! Each decorator is itself a [`CapabilityAdapter`](equity_core::CapabilityAdapter)
//! for the same domain, so they stack:
//! `CachedAdapter(RetryingAdapter(ThrottledAdapter(inner)))` serves repeated
//! requests from memory, retries transient failures, and keeps every attempt
//! under the provider's rate limit.

pub mod cache;
pub mod retry;
pub mod throttle;

pub use cache::{CacheKey, CachedAdapter};
pub use retry::{RetryPolicy, RetryingAdapter};
pub use throttle::ThrottledAdapter;
