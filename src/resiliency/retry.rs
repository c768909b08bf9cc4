//! Retry with caller-supplied backoff.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{FailureKind, Policy, PolicyBuildError, PolicyError};

pub(crate) type Classifier<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;
pub(crate) type Backoff = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_DELAY: Duration = Duration::from_secs(2);

/// Re-runs an action while it fails with a handled error.
///
/// Attempts run `1..=max_attempts`. A handled failure before the last
/// attempt waits `backoff(attempt)` and tries again; the last failure, or
/// any unhandled one, is returned as [`PolicyError::Inner`].
///
/// ```rust
/// use shaper::resiliency::{Policy, RetryPolicy};
/// use std::io::{Error, ErrorKind};
/// use std::time::Duration;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let policy = RetryPolicy::<Error>::handle_kind(ErrorKind::ConnectionReset)
///     .wait_and_retry(3, |attempt| Duration::from_millis(attempt as u64))
///     .build()?;
///
/// let mut calls = 0;
/// let value = policy.execute(move || {
///     calls += 1;
///     if calls < 3 { Err(Error::from(ErrorKind::ConnectionReset)) } else { Ok(calls) }
/// })?;
/// assert_eq!(value, 3);
/// # Ok(())
/// # }
/// ```
pub struct RetryPolicy<E> {
    classifier: Classifier<E>,
    max_attempts: u32,
    backoff: Backoff,
}

impl<E: 'static> RetryPolicy<E> {
    /// Starts a builder that retries errors matching `predicate`.
    pub fn handle<P>(predicate: P) -> RetryPolicyBuilder<E>
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        RetryPolicyBuilder::new(Arc::new(predicate))
    }

    /// Starts a builder that retries errors of `kind`.
    pub fn handle_kind(kind: E::Kind) -> RetryPolicyBuilder<E>
    where
        E: FailureKind,
    {
        RetryPolicyBuilder::new(Arc::new(move |err: &E| err.kind() == kind))
    }

    pub(crate) fn from_parts(classifier: Classifier<E>, max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            classifier,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay applied after the failed `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        (self.backoff)(attempt)
    }

    /// Whether a failure should be retried after `attempt`.
    fn should_retry(&self, err: &E, attempt: u32) -> bool {
        if !(self.classifier)(err) {
            debug!(attempt, "failure not handled by retry policy");
            return false;
        }
        if attempt >= self.max_attempts {
            warn!(attempts = self.max_attempts, "retry attempts exhausted");
            return false;
        }
        true
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            classifier: self.classifier.clone(),
            max_attempts: self.max_attempts,
            backoff: self.backoff.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

#[async_trait]
impl<T, E> Policy<T, E> for RetryPolicy<E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn execute<F>(&self, mut action: F) -> Result<T, PolicyError<E>>
    where
        F: FnMut() -> Result<T, E> + Send + 'static,
    {
        let mut attempt = 1;
        loop {
            match action() {
                Ok(value) => return Ok(value),
                Err(err) if self.should_retry(&err, attempt) => {
                    let delay = self.delay_for(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, "operation failed, retrying");
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(PolicyError::Inner(err)),
            }
        }
    }

    async fn execute_async<F, Fut>(&self, mut action: F) -> Result<T, PolicyError<E>>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let mut attempt = 1;
        loop {
            match action().await {
                Ok(value) => return Ok(value),
                Err(err) if self.should_retry(&err, attempt) => {
                    let delay = self.delay_for(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, "async operation failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(PolicyError::Inner(err)),
            }
        }
    }
}

/// Builder returned by [`RetryPolicy::handle`] and
/// [`RetryPolicy::handle_kind`].
///
/// Without [`wait_and_retry`](Self::wait_and_retry) the policy makes 3
/// attempts two seconds apart.
pub struct RetryPolicyBuilder<E> {
    classifier: Classifier<E>,
    max_attempts: u32,
    backoff: Backoff,
}

impl<E: 'static> RetryPolicyBuilder<E> {
    fn new(classifier: Classifier<E>) -> Self {
        Self {
            classifier,
            max_attempts: DEFAULT_ATTEMPTS,
            backoff: Arc::new(|_: u32| DEFAULT_DELAY),
        }
    }

    /// Sets the total attempt count and the delay after each failed attempt.
    pub fn wait_and_retry<B>(mut self, attempts: u32, backoff: B) -> Self
    where
        B: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        self.max_attempts = attempts;
        self.backoff = Arc::new(backoff);
        self
    }

    pub fn build(self) -> Result<RetryPolicy<E>, PolicyBuildError> {
        if self.max_attempts == 0 {
            return Err(PolicyBuildError::InvalidAttempts(self.max_attempts));
        }
        Ok(RetryPolicy::from_parts(self.classifier, self.max_attempts, self.backoff))
    }
}
