//! Error types for policy execution and construction.

use std::time::Duration;

use thiserror::Error;

/// Failure of a policy-wrapped call.
///
/// `Inner` carries the action's own error untouched; the other variants
/// are raised by the policy itself.
#[derive(Debug, Error)]
pub enum PolicyError<E> {
    /// The wrapped action failed
    #[error("{0}")]
    Inner(E),
    /// The action did not finish within the timeout
    #[error("operation timed out after {0:?}")]
    TimedOut(Duration),
    /// The circuit breaker rejected the call without running it
    #[error("circuit breaker is open; retry after {retry_after:?}")]
    CircuitOpen { retry_after: Duration },
    /// The action panicked or could not be started
    #[error("operation aborted: {0}")]
    Aborted(String),
}

impl<E> PolicyError<E> {
    /// The action's own error, if that is what failed.
    pub fn into_inner(self) -> Option<E> {
        match self {
            PolicyError::Inner(err) => Some(err),
            _ => None,
        }
    }

    pub fn inner(&self) -> Option<&E> {
        match self {
            PolicyError::Inner(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PolicyError::TimedOut(_))
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, PolicyError::CircuitOpen { .. })
    }

    /// Maps the action's error, keeping policy failures as they are.
    pub fn map_inner<F, U>(self, f: F) -> PolicyError<U>
    where
        F: FnOnce(E) -> U,
    {
        match self {
            PolicyError::Inner(err) => PolicyError::Inner(f(err)),
            PolicyError::TimedOut(d) => PolicyError::TimedOut(d),
            PolicyError::CircuitOpen { retry_after } => PolicyError::CircuitOpen { retry_after },
            PolicyError::Aborted(msg) => PolicyError::Aborted(msg),
        }
    }
}

impl<E> PolicyError<PolicyError<E>> {
    /// Collapses the error of a policy that wrapped another policy.
    ///
    /// ```rust
    /// use shaper::resiliency::PolicyError;
    /// use std::time::Duration;
    ///
    /// let nested: PolicyError<PolicyError<std::io::Error>> =
    ///     PolicyError::Inner(PolicyError::TimedOut(Duration::from_secs(1)));
    /// assert!(nested.flatten().is_timeout());
    /// ```
    pub fn flatten(self) -> PolicyError<E> {
        match self {
            PolicyError::Inner(inner) => inner,
            PolicyError::TimedOut(d) => PolicyError::TimedOut(d),
            PolicyError::CircuitOpen { retry_after } => PolicyError::CircuitOpen { retry_after },
            PolicyError::Aborted(msg) => PolicyError::Aborted(msg),
        }
    }
}

/// Invalid policy builder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyBuildError {
    #[error("fallback policy needs a fallback or fallback_async action")]
    MissingFallback,
    #[error("retry policy needs at least one attempt, got {0}")]
    InvalidAttempts(u32),
}
