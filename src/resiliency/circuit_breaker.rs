//! Failure-counting circuit breaker.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{Policy, PolicyError};

/// Observable breaker state, derived from the failure count and the time
/// of the last failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through
    Closed,
    /// Calls are rejected for `retry_after`
    Open { retry_after: Duration },
    /// The open period elapsed; the next call is the probe
    HalfOpen,
}

#[derive(Debug, Default)]
struct BreakerState {
    failure_count: u32,
    last_failure: Option<Instant>,
}

/// Rejects calls for `open_duration` once `failure_threshold` consecutive
/// failures have been seen.
///
/// A success resets the count. After the open period the next call runs as
/// a probe; if it fails the circuit reopens for a full period.
///
/// ```rust
/// use shaper::resiliency::{CircuitBreakerPolicy, Policy, PolicyError};
/// use std::time::Duration;
///
/// let breaker = CircuitBreakerPolicy::new(2, Duration::from_secs(60));
/// for _ in 0..2 {
///     let _ = breaker.execute(|| Err::<(), _>("down"));
/// }
/// let rejected = breaker.execute(|| Ok::<_, &str>(()));
/// assert!(matches!(rejected, Err(PolicyError::CircuitOpen { .. })));
/// ```
#[derive(Debug)]
pub struct CircuitBreakerPolicy {
    failure_threshold: u32,
    open_duration: Duration,
    state: Mutex<BreakerState>,
}

impl CircuitBreakerPolicy {
    /// `failure_threshold` is clamped to at least 1.
    pub fn new(failure_threshold: u32, open_duration: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            open_duration,
            state: Mutex::new(BreakerState::default()),
        }
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn open_duration(&self) -> Duration {
        self.open_duration
    }

    pub fn failure_count(&self) -> u32 {
        self.state.lock().failure_count
    }

    pub fn state(&self) -> CircuitState {
        let state = self.state.lock();
        if state.failure_count < self.failure_threshold {
            return CircuitState::Closed;
        }
        match self.remaining_open(&state) {
            Some(retry_after) => CircuitState::Open { retry_after },
            None => CircuitState::HalfOpen,
        }
    }

    /// Closes the circuit and clears the failure count.
    pub fn reset(&self) {
        *self.state.lock() = BreakerState::default();
        debug!("circuit breaker reset");
    }

    fn remaining_open(&self, state: &BreakerState) -> Option<Duration> {
        let last = state.last_failure?;
        let elapsed = last.elapsed();
        if elapsed < self.open_duration {
            Some(self.open_duration - elapsed)
        } else {
            None
        }
    }

    fn admit<E>(&self) -> Result<(), PolicyError<E>> {
        let state = self.state.lock();
        if state.failure_count < self.failure_threshold {
            return Ok(());
        }
        match self.remaining_open(&state) {
            Some(retry_after) => {
                debug!(retry_after_ms = retry_after.as_millis() as u64, "circuit open, call rejected");
                Err(PolicyError::CircuitOpen { retry_after })
            }
            None => {
                debug!("circuit half-open, probing");
                Ok(())
            }
        }
    }

    fn record<T, E>(&self, result: Result<T, E>) -> Result<T, PolicyError<E>> {
        let mut state = self.state.lock();
        match result {
            Ok(value) => {
                if state.failure_count > 0 {
                    debug!(previous_failures = state.failure_count, "circuit closed after success");
                }
                state.failure_count = 0;
                state.last_failure = None;
                Ok(value)
            }
            Err(err) => {
                state.failure_count = state.failure_count.saturating_add(1);
                state.last_failure = Some(Instant::now());
                if state.failure_count >= self.failure_threshold {
                    warn!(
                        failures = state.failure_count,
                        open_ms = self.open_duration.as_millis() as u64,
                        "circuit opened"
                    );
                }
                Err(PolicyError::Inner(err))
            }
        }
    }
}

#[async_trait]
impl<T, E> Policy<T, E> for CircuitBreakerPolicy
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn execute<F>(&self, mut action: F) -> Result<T, PolicyError<E>>
    where
        F: FnMut() -> Result<T, E> + Send + 'static,
    {
        self.admit::<E>()?;
        self.record(action())
    }

    async fn execute_async<F, Fut>(&self, mut action: F) -> Result<T, PolicyError<E>>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.admit::<E>()?;
        let result = action().await;
        self.record(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fail(breaker: &CircuitBreakerPolicy) {
        let _ = breaker.execute(|| Err::<(), _>("fail"));
    }

    #[test]
    fn success_resets_count() {
        let breaker = CircuitBreakerPolicy::new(3, Duration::from_secs(60));
        fail(&breaker);
        fail(&breaker);
        assert_eq!(breaker.failure_count(), 2);

        breaker.execute(|| Ok::<_, &str>(())).unwrap();
        assert_eq!(breaker.failure_count(), 0);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn failing_probe_reopens() {
        let breaker = CircuitBreakerPolicy::new(1, Duration::from_millis(30));
        fail(&breaker);
        assert!(matches!(breaker.state(), CircuitState::Open { .. }));

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        fail(&breaker);
        assert!(matches!(breaker.state(), CircuitState::Open { .. }));
        let rejected = breaker.execute(|| Ok::<_, &str>(()));
        assert!(rejected.unwrap_err().is_circuit_open());
    }

    #[test]
    fn zero_threshold_is_clamped() {
        let breaker = CircuitBreakerPolicy::new(0, Duration::from_secs(1));
        assert_eq!(breaker.failure_threshold(), 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn reset_closes_circuit() {
        let breaker = CircuitBreakerPolicy::new(1, Duration::from_secs(60));
        fail(&breaker);
        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.execute(|| Ok::<_, &str>(1)).is_ok());
    }
}
