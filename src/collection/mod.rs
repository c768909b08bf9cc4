//! Service collection module for dependency injection.
//!
//! This module contains the ServiceCollection type and related functionality
//! for registering services and building service providers.

use std::sync::Arc;

use tracing::warn;

use crate::descriptors::{ImplementationKind, ServiceDescriptor};
use crate::internal::{AsyncHook, BoxFutureUnit, SyncHook};
use crate::key::{key_of_trait, key_of_type, Key};
use crate::provider::ResolverContext;
use crate::registration::{AnyArc, Ctor, DisposeHook, Registration, Registry};
use crate::traits::{AsyncDispose, Dispose, Injectable};
use crate::{DiResult, Lifetime, ServiceProvider};

pub mod module_system;
pub use module_system::ServiceModule;

/// Accumulates service registrations and builds a [`ServiceProvider`].
///
/// Every registration method returns `&mut Self` so calls chain. Registering
/// the same service twice keeps the last registration.
///
/// # Examples
///
/// ```rust
/// use shaper::{Injectable, ResolverContext, ServiceCollection, Resolver, DiResult};
/// use std::sync::Arc;
///
/// struct Settings { greeting: String }
///
/// struct Greeter { settings: Arc<Settings> }
/// impl Injectable for Greeter {
///     fn inject(r: &ResolverContext<'_>) -> DiResult<Self> {
///         Ok(Greeter { settings: r.get_required::<Settings>()? })
///     }
/// }
///
/// # fn main() -> DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services
///     .add_singleton_instance(Settings { greeting: "hello".into() })
///     .add_transient::<Greeter>();
///
/// let provider = services.build();
/// assert_eq!(provider.get_required::<Greeter>()?.settings.greeting, "hello");
/// # Ok(())
/// # }
/// ```
pub struct ServiceCollection {
    registry: Registry,
    disposals: Vec<(Key, DisposeHook)>,
}

impl ServiceCollection {
    /// Creates a new empty service collection.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            disposals: Vec::new(),
        }
    }

    // ----- Injectable registrations -----

    /// Registers `T` as a transient built through [`Injectable::inject`].
    pub fn add_transient<T: Injectable>(&mut self) -> &mut Self {
        self.add_injectable::<T>(Lifetime::Transient)
    }

    /// Registers `T` as a scoped service built through [`Injectable::inject`].
    pub fn add_scoped<T: Injectable>(&mut self) -> &mut Self {
        self.add_injectable::<T>(Lifetime::Scoped)
    }

    /// Registers `T` as a lazily built singleton.
    pub fn add_singleton<T: Injectable>(&mut self) -> &mut Self {
        self.add_injectable::<T>(Lifetime::Singleton)
    }

    fn add_injectable<T: Injectable>(&mut self, lifetime: Lifetime) -> &mut Self {
        let ctor: Ctor = Arc::new(|r: &ResolverContext<'_>| -> DiResult<AnyArc> {
            Ok(Arc::new(T::inject(r)?))
        });
        self.registry.insert(
            key_of_type::<T>(),
            Registration::new(lifetime, ImplementationKind::Injectable, ctor),
        );
        self
    }

    // ----- Concrete type registrations -----

    /// Registers a pre-built singleton instance.
    ///
    /// The instance is materialised when the provider is built and shared
    /// by every resolution.
    ///
    /// ```rust
    /// # use shaper::ServiceCollection;
    /// struct Config { database_url: String }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton_instance(Config {
    ///     database_url: "postgres://localhost".to_string(),
    /// });
    /// ```
    pub fn add_singleton_instance<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        let arc: AnyArc = Arc::new(value);
        let ctor: Ctor = Arc::new(move |_: &ResolverContext<'_>| -> DiResult<AnyArc> { Ok(arc.clone()) });
        self.registry.insert(
            key_of_type::<T>(),
            Registration::new(Lifetime::Singleton, ImplementationKind::Instance, ctor),
        );
        self
    }

    /// Registers a singleton factory, run at most once on first request.
    ///
    /// ```rust
    /// # use shaper::{ServiceCollection, Resolver};
    /// # use std::sync::Arc;
    /// struct Database { url: String }
    /// struct UserService { db: Arc<Database> }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton_instance(Database { url: "postgres://localhost".to_string() });
    /// services.add_singleton_factory::<UserService, _>(|resolver| {
    ///     Ok(UserService { db: resolver.get_required::<Database>()? })
    /// });
    /// ```
    pub fn add_singleton_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Singleton, factory)
    }

    /// Registers a scoped factory that creates one instance per scope.
    pub fn add_scoped_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Scoped, factory)
    }

    /// Registers a transient factory that runs on every resolution.
    pub fn add_transient_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Transient, factory)
    }

    fn add_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        let ctor: Ctor = Arc::new(move |r: &ResolverContext<'_>| -> DiResult<AnyArc> {
            Ok(Arc::new(factory(r)?))
        });
        self.registry.insert(
            key_of_type::<T>(),
            Registration::new(lifetime, ImplementationKind::Factory, ctor),
        );
        self
    }

    // ----- Trait registrations -----

    /// Registers a singleton trait implementation.
    ///
    /// ```rust
    /// # use shaper::ServiceCollection;
    /// # use std::sync::Arc;
    /// trait Logger: Send + Sync {
    ///     fn log(&self, message: &str);
    /// }
    ///
    /// struct FileLogger;
    /// impl Logger for FileLogger {
    ///     fn log(&self, _message: &str) {}
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton_trait::<dyn Logger>(Arc::new(FileLogger));
    /// ```
    pub fn add_singleton_trait<T>(&mut self, value: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        // Trait objects are stored as Arc<Arc<dyn Trait>> in Any
        let any_arc: AnyArc = Arc::new(value);
        let ctor: Ctor = Arc::new(move |_: &ResolverContext<'_>| -> DiResult<AnyArc> { Ok(any_arc.clone()) });
        self.registry.insert(
            key_of_trait::<T>(),
            Registration::new(Lifetime::Singleton, ImplementationKind::Instance, ctor),
        );
        self
    }

    /// Registers a singleton trait factory.
    pub fn add_singleton_trait_factory<Trait, F>(&mut self, factory: F) -> &mut Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<Trait>> + Send + Sync + 'static,
    {
        self.add_trait_factory(Lifetime::Singleton, factory)
    }

    /// Registers a scoped trait factory.
    ///
    /// ```rust
    /// # use shaper::{Injectable, ResolverContext, ServiceCollection, DiResult};
    /// # use std::sync::Arc;
    /// trait RequestLog: Send + Sync {
    ///     fn record(&self, path: &str);
    /// }
    ///
    /// struct MemoryRequestLog;
    /// impl RequestLog for MemoryRequestLog {
    ///     fn record(&self, _path: &str) {}
    /// }
    /// impl Injectable for MemoryRequestLog {
    ///     fn inject(_: &ResolverContext<'_>) -> DiResult<Self> { Ok(MemoryRequestLog) }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_scoped_trait_factory::<dyn RequestLog, _>(|r| {
    ///     Ok(Arc::new(MemoryRequestLog::inject(r)?))
    /// });
    /// ```
    pub fn add_scoped_trait_factory<Trait, F>(&mut self, factory: F) -> &mut Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<Trait>> + Send + Sync + 'static,
    {
        self.add_trait_factory(Lifetime::Scoped, factory)
    }

    /// Registers a transient trait factory.
    pub fn add_transient_trait_factory<Trait, F>(&mut self, factory: F) -> &mut Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<Trait>> + Send + Sync + 'static,
    {
        self.add_trait_factory(Lifetime::Transient, factory)
    }

    fn add_trait_factory<Trait, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<Trait>> + Send + Sync + 'static,
    {
        let ctor: Ctor = Arc::new(move |r: &ResolverContext<'_>| -> DiResult<AnyArc> {
            Ok(Arc::new(factory(r)?))
        });
        self.registry.insert(
            key_of_trait::<Trait>(),
            Registration::new(lifetime, ImplementationKind::Factory, ctor),
        );
        self
    }

    // ----- Disposal capabilities -----

    /// Marks the registration for `T` as disposable.
    ///
    /// Every instance the container builds for `T` gets its
    /// [`Dispose::dispose`] called when the owning scope (or, for
    /// singletons, the root provider) is disposed. Transients are not
    /// tracked: the caller owns them, and the capability is ignored for a
    /// transient registration.
    pub fn add_disposal<T: Dispose>(&mut self) -> &mut Self {
        let hook = DisposeHook::Sync(Arc::new(|any: &AnyArc| -> Option<SyncHook> {
            let service = any.clone().downcast::<T>().ok()?;
            Some(Box::new(move || service.dispose()))
        }));
        self.disposals.push((key_of_type::<T>(), hook));
        self
    }

    /// Marks the registration for `T` as asynchronously disposable.
    pub fn add_async_disposal<T: AsyncDispose>(&mut self) -> &mut Self {
        let hook = DisposeHook::Async(Arc::new(|any: &AnyArc| -> Option<AsyncHook> {
            let service = any.clone().downcast::<T>().ok()?;
            Some(Box::new(move || -> BoxFutureUnit {
                Box::pin(async move { service.dispose().await })
            }))
        }));
        self.disposals.push((key_of_type::<T>(), hook));
        self
    }

    /// Marks the trait registration for `T` as disposable.
    pub fn add_trait_disposal<T: ?Sized + Dispose>(&mut self) -> &mut Self {
        let hook = DisposeHook::Sync(Arc::new(|any: &AnyArc| -> Option<SyncHook> {
            let service: Arc<T> = (*any.clone().downcast::<Arc<T>>().ok()?).clone();
            Some(Box::new(move || service.dispose()))
        }));
        self.disposals.push((key_of_trait::<T>(), hook));
        self
    }

    /// Marks the trait registration for `T` as asynchronously disposable.
    pub fn add_trait_async_disposal<T: ?Sized + AsyncDispose>(&mut self) -> &mut Self {
        let hook = DisposeHook::Async(Arc::new(|any: &AnyArc| -> Option<AsyncHook> {
            let service: Arc<T> = (*any.clone().downcast::<Arc<T>>().ok()?).clone();
            Some(Box::new(move || -> BoxFutureUnit {
                Box::pin(async move { service.dispose().await })
            }))
        }));
        self.disposals.push((key_of_trait::<T>(), hook));
        self
    }

    // ----- Introspection -----

    /// Whether a concrete service `T` is registered.
    pub fn contains<T: 'static>(&self) -> bool {
        self.registry.contains_key(&key_of_type::<T>())
    }

    /// Whether a trait service `T` is registered.
    pub fn contains_trait<T: ?Sized + 'static>(&self) -> bool {
        self.registry.contains_key(&key_of_trait::<T>())
    }

    /// Number of distinct registrations.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.len() == 0
    }

    /// Descriptors for every registration, in registration order.
    pub fn get_service_descriptors(&self) -> Vec<ServiceDescriptor> {
        self.registry
            .iter()
            .map(|(key, reg)| ServiceDescriptor {
                key: *key,
                lifetime: reg.lifetime,
                implementation: reg.implementation,
                disposable: reg.lifetime != Lifetime::Transient
                    && self.disposals.iter().any(|(k, _)| k == key),
            })
            .collect()
    }

    /// Builds the root service provider.
    ///
    /// Consumes the collection, attaches disposal capabilities, registers
    /// the [`ScopeFactory`](crate::ScopeFactory) and materialises instance
    /// singletons.
    ///
    /// ```
    /// use shaper::{ServiceCollection, Resolver, DiResult};
    ///
    /// # fn main() -> DiResult<()> {
    /// let mut collection = ServiceCollection::new();
    /// collection.add_singleton_instance(42usize);
    /// collection.add_transient_factory::<String, _>(|_| Ok("Hello".to_string()));
    ///
    /// let provider = collection.build();
    /// assert_eq!(*provider.get_required::<usize>()?, 42);
    /// assert_eq!(provider.get_required::<String>()?.as_str(), "Hello");
    /// # Ok(())
    /// # }
    /// ```
    pub fn build(mut self) -> ServiceProvider {
        for (key, hook) in std::mem::take(&mut self.disposals) {
            match self.registry.get_mut(&key) {
                Some(reg) if reg.lifetime == Lifetime::Transient => warn!(
                    service = key.display_name(),
                    "transient instances are not tracked, disposal capability ignored"
                ),
                Some(reg) => reg.disposers.push(hook),
                None => warn!(
                    service = key.display_name(),
                    "disposal capability added for a service that is not registered"
                ),
            }
        }
        ServiceProvider::from_registry(self.registry)
    }
}

impl Default for ServiceCollection {
    fn default() -> Self {
        Self::new()
    }
}
