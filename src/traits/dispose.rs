//! Disposal traits for resource cleanup.

/// Trait for synchronous resource disposal.
///
/// Implement this for services that need structured teardown (flushing
/// buffers, closing connections) and mark the registration with
/// [`ServiceCollection::add_disposal`](crate::ServiceCollection::add_disposal).
/// Scoped instances are disposed with their scope; singletons when the
/// root provider is disposed. Hooks run in LIFO order.
///
/// # Examples
///
/// ```
/// use shaper::{Dispose, ServiceCollection, Resolver, DiResult};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// struct UnitOfWork {
///     closed: Arc<AtomicBool>,
/// }
///
/// impl Dispose for UnitOfWork {
///     fn dispose(&self) {
///         self.closed.store(true, Ordering::SeqCst);
///     }
/// }
///
/// # fn main() -> DiResult<()> {
/// let closed = Arc::new(AtomicBool::new(false));
/// let flag = closed.clone();
///
/// let mut services = ServiceCollection::new();
/// services
///     .add_scoped_factory::<UnitOfWork, _>(move |_| Ok(UnitOfWork { closed: flag.clone() }))
///     .add_disposal::<UnitOfWork>();
///
/// let provider = services.build();
/// let scope = provider.create_scope();
/// scope.get_required::<UnitOfWork>()?;
/// scope.dispose();
/// assert!(closed.load(Ordering::SeqCst));
/// # Ok(())
/// # }
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self);
}

/// Trait for asynchronous resource disposal.
///
/// Async hooks run before sync hooks, and only through the `dispose_async`
/// entry points of [`Scope`](crate::Scope) and
/// [`ServiceProvider`](crate::ServiceProvider).
#[async_trait::async_trait]
pub trait AsyncDispose: Send + Sync + 'static {
    /// Perform asynchronous cleanup of resources.
    async fn dispose(&self);
}
