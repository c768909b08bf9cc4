//! Resiliency policies for fallible operations.
//!
//! Every policy wraps a sync or async action and reports failures through
//! [`PolicyError`]. Policies compose by nesting: the outer policy sees the
//! inner policy's `Result` as its action's result.
//!
//! ```rust
//! use shaper::resiliency::{Policy, PolicyError, ResiliencyPolicy, RetryPolicy};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let breaker = ResiliencyPolicy::circuit_breaker(5, Duration::from_secs(30));
//! let retry = RetryPolicy::handle(|e: &PolicyError<std::io::Error>| e.inner().is_some())
//!     .wait_and_retry(2, |_| Duration::from_millis(1))
//!     .build()?;
//!
//! let value = retry
//!     .execute(move || breaker.execute(|| Ok::<_, std::io::Error>(7)))
//!     .map_err(PolicyError::flatten)?;
//! assert_eq!(value, 7);
//! # Ok(())
//! # }
//! ```

use std::future::Future;

use async_trait::async_trait;

mod circuit_breaker;
mod error;
mod facade;
mod fallback;
mod retry;
mod timeout;

pub use circuit_breaker::{CircuitBreakerPolicy, CircuitState};
pub use error::{PolicyBuildError, PolicyError};
pub use facade::ResiliencyPolicy;
pub use fallback::{FallbackPolicy, FallbackPolicyBuilder};
pub use retry::{RetryPolicy, RetryPolicyBuilder};
pub use timeout::TimeoutPolicy;

/// A strategy wrapping fallible calls.
///
/// `T = ()` covers plain actions.
#[async_trait]
pub trait Policy<T, E>: Send + Sync
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Runs `action` under this policy on the calling thread.
    fn execute<F>(&self, action: F) -> Result<T, PolicyError<E>>
    where
        F: FnMut() -> Result<T, E> + Send + 'static;

    /// Runs the futures produced by `action` under this policy.
    async fn execute_async<F, Fut>(&self, action: F) -> Result<T, PolicyError<E>>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static;
}

/// Errors that classify themselves by kind, for
/// [`RetryPolicy::handle_kind`] and [`FallbackPolicyBuilder::handle_kind`].
pub trait FailureKind {
    type Kind: PartialEq + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

impl FailureKind for std::io::Error {
    type Kind = std::io::ErrorKind;

    fn kind(&self) -> Self::Kind {
        std::io::Error::kind(self)
    }
}

/// Errors that know whether retrying may help.
///
/// Used by [`ResiliencyPolicy::handle_retry`].
pub trait TransientFailure {
    fn is_transient(&self) -> bool;
}

impl TransientFailure for std::io::Error {
    fn is_transient(&self) -> bool {
        use std::io::ErrorKind::*;
        matches!(
            std::io::Error::kind(self),
            ConnectionRefused | ConnectionReset | ConnectionAborted | TimedOut | Interrupted | WouldBlock
        )
    }
}

impl<E: TransientFailure> TransientFailure for PolicyError<E> {
    fn is_transient(&self) -> bool {
        match self {
            PolicyError::Inner(err) => err.is_transient(),
            PolicyError::TimedOut(_) => true,
            PolicyError::CircuitOpen { .. } | PolicyError::Aborted(_) => false,
        }
    }
}
