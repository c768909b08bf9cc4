//! Resolver traits for service resolution.

use std::any::Any;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::internal::BoxFutureUnit;
use crate::key::{key_of_trait, key_of_type, Key};
use crate::provider::ResolverContext;
use crate::traits::{AsyncDispose, Dispose, Injectable};

type AnyArc = Arc<dyn Any + Send + Sync>;

/// Core resolver trait for object-safe service resolution.
///
/// Handles the low-level mechanics: lifetime dispatch, cycle detection
/// and disposal tracking. Most code should use the generic [`Resolver`]
/// methods, which every `ResolverCore` gets for free.
pub trait ResolverCore: Send + Sync {
    /// Resolves a registered service.
    ///
    /// Fails with [`DiError::NotFound`] when `key` has no registration.
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc>;

    /// Whether `key` has a registration.
    fn is_registered(&self, key: &Key) -> bool;

    /// Resolves `key` if registered, otherwise builds a fresh instance
    /// with `construct` as if it were a self-registered transient.
    fn resolve_or_construct(
        &self,
        key: &Key,
        construct: &dyn Fn(&ResolverContext<'_>) -> DiResult<AnyArc>,
    ) -> DiResult<AnyArc>;

    /// Registers a synchronous disposal hook with the owning scope or root.
    fn push_sync_disposer(&self, f: Box<dyn FnOnce() + Send>);

    /// Registers an asynchronous disposal hook with the owning scope or root.
    fn push_async_disposer(&self, f: Box<dyn FnOnce() -> BoxFutureUnit + Send>);
}

/// High-level resolver interface with generic methods.
///
/// Implemented for every [`ResolverCore`], so `ServiceProvider`, `Scope`,
/// `ResolverContext` and `dyn ResolverCore` are interchangeable here.
///
/// # Examples
///
/// ```
/// use shaper::{ServiceCollection, Resolver, DiResult};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn prefix(&self) -> &str;
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn prefix(&self) -> &str { "console" }
/// }
///
/// # fn main() -> DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services.add_singleton_instance(42usize);
/// services.add_singleton_trait::<dyn Logger>(Arc::new(ConsoleLogger));
///
/// let provider = services.build();
/// assert_eq!(*provider.get_required::<usize>()?, 42);
/// assert_eq!(provider.get_required_trait::<dyn Logger>()?.prefix(), "console");
/// assert!(provider.get_service::<String>()?.is_none());
/// # Ok(())
/// # }
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves a concrete service, or `None` when it is not registered.
    ///
    /// Errors raised while building a registered service still propagate.
    fn get_service<T: Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        let key = key_of_type::<T>();
        if !self.is_registered(&key) {
            return Ok(None);
        }
        let any = self.resolve_any(&key)?;
        any.downcast::<T>()
            .map(Some)
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Resolves a concrete service, failing with [`DiError::NotFound`]
    /// when it is not registered.
    fn get_required<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.get_service::<T>()?
            .ok_or(DiError::NotFound(std::any::type_name::<T>()))
    }

    /// Resolves a trait object service, or `None` when it is not registered.
    fn get_service_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        let key = key_of_trait::<T>();
        if !self.is_registered(&key) {
            return Ok(None);
        }
        let any = self.resolve_any(&key)?;
        // Trait objects are stored as Arc<Arc<dyn Trait>>
        any.downcast::<Arc<T>>()
            .map(|boxed| Some((*boxed).clone()))
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Resolves a trait object service, failing with [`DiError::NotFound`]
    /// when it is not registered.
    fn get_required_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.get_service_trait::<T>()?
            .ok_or(DiError::NotFound(std::any::type_name::<T>()))
    }

    /// Resolves `T`, building it through [`Injectable::inject`] when it was
    /// never registered.
    ///
    /// Unregistered types are treated as self-registered transients, which
    /// lets leaf implementations be reached purely as dependencies.
    ///
    /// ```
    /// use shaper::{Injectable, ResolverContext, ServiceCollection, Resolver, DiResult};
    ///
    /// struct Clock;
    /// impl Injectable for Clock {
    ///     fn inject(_: &ResolverContext<'_>) -> DiResult<Self> { Ok(Clock) }
    /// }
    ///
    /// let provider = ServiceCollection::new().build();
    /// assert!(provider.resolve::<Clock>().is_ok());
    /// ```
    fn resolve<T: Injectable>(&self) -> DiResult<Arc<T>> {
        let key = key_of_type::<T>();
        let any = self.resolve_or_construct(&key, &|ctx| {
            let value: AnyArc = Arc::new(T::inject(ctx)?);
            Ok(value)
        })?;
        any.downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Registers `service` for synchronous disposal with the owning scope
    /// or root. Meant to be called from factories.
    fn register_disposer<T: Dispose>(&self, service: Arc<T>) {
        self.push_sync_disposer(Box::new(move || service.dispose()));
    }

    /// Registers `service` for asynchronous disposal with the owning scope
    /// or root.
    fn register_async_disposer<T: AsyncDispose>(&self, service: Arc<T>) {
        self.push_async_disposer(Box::new(move || -> BoxFutureUnit {
            Box::pin(async move { service.dispose().await })
        }));
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}
