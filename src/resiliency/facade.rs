//! Shorthand constructors for the common policies.

use std::sync::Arc;
use std::time::Duration;

use super::{
    CircuitBreakerPolicy, FallbackPolicyBuilder, RetryPolicy, TimeoutPolicy, TransientFailure,
};

const TRANSIENT_RETRY_ATTEMPTS: u32 = 3;

/// Entry point for building policies.
///
/// ```rust
/// use shaper::resiliency::{Policy, ResiliencyPolicy};
/// use std::time::Duration;
///
/// let timeout = ResiliencyPolicy::timeout(Duration::from_secs(5));
/// let value = timeout.execute(|| Ok::<_, std::io::Error>(42)).unwrap();
/// assert_eq!(value, 42);
/// ```
pub struct ResiliencyPolicy;

impl ResiliencyPolicy {
    pub fn timeout(duration: Duration) -> TimeoutPolicy {
        TimeoutPolicy::new(duration)
    }

    /// A breaker opening after `failure_threshold` failures (at least 1)
    /// for `open_duration`.
    pub fn circuit_breaker(failure_threshold: u32, open_duration: Duration) -> CircuitBreakerPolicy {
        CircuitBreakerPolicy::new(failure_threshold, open_duration)
    }

    pub fn fallback<T: 'static, E: 'static>() -> FallbackPolicyBuilder<T, E> {
        FallbackPolicyBuilder::new()
    }

    /// Retry preset for transient backend failures: 3 attempts with a
    /// linear backoff of one second per failed attempt.
    pub fn handle_retry<E: TransientFailure + 'static>() -> RetryPolicy<E> {
        RetryPolicy::from_parts(
            Arc::new(|err: &E| err.is_transient()),
            TRANSIENT_RETRY_ATTEMPTS,
            Arc::new(|attempt: u32| Duration::from_secs(u64::from(attempt))),
        )
    }
}
