//! Substitute values for handled failures.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::retry::Classifier;
use super::{FailureKind, Policy, PolicyBuildError, PolicyError};

type SyncFallback<T> = Arc<dyn Fn() -> T + Send + Sync>;
type AsyncFallback<T> = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = T> + Send>> + Send + Sync>;

/// Returns a fallback value when the action fails with a handled error.
///
/// The async path prefers the async fallback and uses the sync one when
/// none was set. The sync path only uses the sync fallback; a policy built
/// with just an async fallback returns handled failures unchanged there.
pub struct FallbackPolicy<T, E> {
    predicate: Classifier<E>,
    fallback: Option<SyncFallback<T>>,
    fallback_async: Option<AsyncFallback<T>>,
}

impl<T, E> FallbackPolicy<T, E> {
    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn has_fallback_async(&self) -> bool {
        self.fallback_async.is_some()
    }
}

impl<T, E> Clone for FallbackPolicy<T, E> {
    fn clone(&self) -> Self {
        Self {
            predicate: self.predicate.clone(),
            fallback: self.fallback.clone(),
            fallback_async: self.fallback_async.clone(),
        }
    }
}

impl<T, E> fmt::Debug for FallbackPolicy<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackPolicy")
            .field("fallback", &self.fallback.is_some())
            .field("fallback_async", &self.fallback_async.is_some())
            .finish()
    }
}

#[async_trait]
impl<T, E> Policy<T, E> for FallbackPolicy<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn execute<F>(&self, mut action: F) -> Result<T, PolicyError<E>>
    where
        F: FnMut() -> Result<T, E> + Send + 'static,
    {
        match action() {
            Ok(value) => Ok(value),
            Err(err) if (self.predicate)(&err) => match &self.fallback {
                Some(fallback) => {
                    debug!("handled failure, using fallback");
                    Ok(fallback())
                }
                None => {
                    warn!("handled failure but no synchronous fallback is set");
                    Err(PolicyError::Inner(err))
                }
            },
            Err(err) => Err(PolicyError::Inner(err)),
        }
    }

    async fn execute_async<F, Fut>(&self, mut action: F) -> Result<T, PolicyError<E>>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let err = match action().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !(self.predicate)(&err) {
            return Err(PolicyError::Inner(err));
        }
        if let Some(fallback) = &self.fallback_async {
            debug!("handled failure, using async fallback");
            return Ok(fallback().await);
        }
        match &self.fallback {
            Some(fallback) => {
                debug!("handled failure, using fallback");
                Ok(fallback())
            }
            None => Err(PolicyError::Inner(err)),
        }
    }
}

/// Builds a [`FallbackPolicy`].
///
/// Without `handle`/`handle_kind` every failure is handled.
///
/// ```rust
/// use shaper::resiliency::{FallbackPolicyBuilder, Policy};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let policy = FallbackPolicyBuilder::new()
///     .handle(|e: &String| e.contains("offline"))
///     .fallback(|| "cached".to_string())
///     .build()?;
///
/// let value = policy.execute(|| Err("offline".to_string()))?;
/// assert_eq!(value, "cached");
/// # Ok(())
/// # }
/// ```
pub struct FallbackPolicyBuilder<T, E> {
    predicate: Option<Classifier<E>>,
    fallback: Option<SyncFallback<T>>,
    fallback_async: Option<AsyncFallback<T>>,
}

impl<T, E> FallbackPolicyBuilder<T, E>
where
    T: 'static,
    E: 'static,
{
    pub fn new() -> Self {
        Self {
            predicate: None,
            fallback: None,
            fallback_async: None,
        }
    }

    /// Handles errors matching `predicate`.
    pub fn handle<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Handles errors of `kind`.
    pub fn handle_kind(mut self, kind: E::Kind) -> Self
    where
        E: FailureKind,
    {
        self.predicate = Some(Arc::new(move |err: &E| err.kind() == kind));
        self
    }

    pub fn fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    pub fn fallback_async<F, Fut>(mut self, fallback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        self.fallback_async = Some(Arc::new(move || -> Pin<Box<dyn Future<Output = T> + Send>> {
            Box::pin(fallback())
        }));
        self
    }

    pub fn build(self) -> Result<FallbackPolicy<T, E>, PolicyBuildError> {
        if self.fallback.is_none() && self.fallback_async.is_none() {
            return Err(PolicyBuildError::MissingFallback);
        }
        Ok(FallbackPolicy {
            predicate: self.predicate.unwrap_or_else(|| Arc::new(|_: &E| true) as Classifier<E>),
            fallback: self.fallback,
            fallback_async: self.fallback_async,
        })
    }
}

impl<T: 'static, E: 'static> Default for FallbackPolicyBuilder<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_without_fallback_fails() {
        let result = FallbackPolicyBuilder::<u8, String>::new().build();
        assert_eq!(result.err(), Some(PolicyBuildError::MissingFallback));
    }

    #[test]
    fn unhandled_failure_propagates() {
        let policy = FallbackPolicyBuilder::new()
            .handle(|e: &String| e == "soft")
            .fallback(|| 0u8)
            .build()
            .unwrap();
        let err = policy.execute(|| Err("hard".to_string())).unwrap_err();
        assert_eq!(err.into_inner().as_deref(), Some("hard"));
    }

    #[tokio::test]
    async fn async_path_prefers_async_fallback() {
        let policy = FallbackPolicyBuilder::<u8, String>::new()
            .fallback(|| 1)
            .fallback_async(|| async { 2 })
            .build()
            .unwrap();
        let value = policy
            .execute_async(|| async { Err::<u8, _>("x".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, 2);
        assert_eq!(policy.execute(|| Err("x".to_string())).unwrap(), 1);
    }

    #[tokio::test]
    async fn async_path_uses_sync_fallback_when_alone() {
        let policy = FallbackPolicyBuilder::<u8, String>::new().fallback(|| 7).build().unwrap();
        let value = policy
            .execute_async(|| async { Err::<u8, _>("x".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
