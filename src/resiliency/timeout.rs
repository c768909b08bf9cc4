//! Deadline for a single call.

use std::future::Future;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::{Policy, PolicyError};

/// Fails a call that does not finish within `duration`.
///
/// The action is abandoned, not cancelled: it keeps running on its thread
/// or task and its eventual result is discarded.
///
/// ```rust
/// use shaper::resiliency::{Policy, TimeoutPolicy};
/// use std::time::Duration;
///
/// let policy = TimeoutPolicy::new(Duration::from_millis(20));
/// let slow = policy.execute(|| {
///     std::thread::sleep(Duration::from_millis(200));
///     Ok::<_, std::io::Error>(())
/// });
/// assert!(slow.unwrap_err().is_timeout());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TimeoutPolicy {
    duration: Duration,
}

impl TimeoutPolicy {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

#[async_trait]
impl<T, E> Policy<T, E> for TimeoutPolicy
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn execute<F>(&self, mut action: F) -> Result<T, PolicyError<E>>
    where
        F: FnMut() -> Result<T, E> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("shaper-timeout".to_string())
            .spawn(move || {
                // The receiver is gone once the deadline passed
                let _ = tx.send(action());
            })
            .map_err(|e| PolicyError::Aborted(e.to_string()))?;

        match rx.recv_timeout(self.duration) {
            Ok(result) => result.map_err(PolicyError::Inner),
            Err(RecvTimeoutError::Timeout) => {
                warn!(timeout_ms = self.duration.as_millis() as u64, "operation timed out");
                Err(PolicyError::TimedOut(self.duration))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(PolicyError::Aborted("action panicked before completing".to_string()))
            }
        }
    }

    async fn execute_async<F, Fut>(&self, mut action: F) -> Result<T, PolicyError<E>>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let task = tokio::spawn(action());
        match tokio::time::timeout(self.duration, task).await {
            Ok(Ok(result)) => result.map_err(PolicyError::Inner),
            Ok(Err(join_err)) => Err(PolicyError::Aborted(join_err.to_string())),
            Err(_) => {
                warn!(timeout_ms = self.duration.as_millis() as u64, "async operation timed out");
                Err(PolicyError::TimedOut(self.duration))
            }
        }
    }
}
