//! Service provider module for dependency injection.
//!
//! This module contains the root `ServiceProvider`, per-unit-of-work
//! `Scope`s and the `ScopeFactory` the root registers for itself.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::descriptors::ImplementationKind;
use crate::internal::{with_cycle_guard, BoxFutureUnit, DisposeBag};
use crate::key::key_of_type;
use crate::registration::{AnyArc, Registration, Registry};
use crate::traits::ResolverCore;
use crate::{DiError, DiResult, Key, Lifetime};

pub mod context;
pub mod factory;
pub mod scope;

pub use context::ResolverContext;
pub use factory::ScopeFactory;
pub use scope::Scope;

/// Root service provider.
///
/// Resolves services according to their registered lifetimes and owns the
/// singleton instances, which it disposes in [`dispose`](Self::dispose).
/// Scoped services cannot be resolved here; open a [`Scope`] per unit of
/// work instead.
///
/// Cloning is cheap and every clone refers to the same container.
///
/// # Examples
///
/// ```
/// use shaper::{ServiceCollection, Resolver, DiResult};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// # fn main() -> DiResult<()> {
/// let mut collection = ServiceCollection::new();
/// collection.add_singleton_instance(Database { url: "postgres://localhost".to_string() });
/// collection.add_transient_factory::<UserService, _>(|resolver| {
///     Ok(UserService { db: resolver.get_required::<Database>()? })
/// });
///
/// let provider = collection.build();
/// let user_service = provider.get_required::<UserService>()?;
/// assert_eq!(user_service.db.url, "postgres://localhost");
/// # Ok(())
/// # }
/// ```
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
}

pub(crate) struct ProviderInner {
    pub(crate) registry: Registry,
    pub(crate) root_disposers: Mutex<DisposeBag>,
    pub(crate) disposed: AtomicBool,
}

impl ServiceProvider {
    /// Freezes `registry` into a root provider.
    ///
    /// Registers a [`ScopeFactory`] bound to this root unless one is
    /// already registered, then materialises instance singletons.
    pub(crate) fn from_registry(mut registry: Registry) -> Self {
        let factory_key = key_of_type::<ScopeFactory>();
        let self_register = !registry.contains_key(&factory_key);

        let inner = Arc::new_cyclic(|weak: &Weak<ProviderInner>| {
            if self_register {
                let factory: AnyArc = Arc::new(ScopeFactory::new(weak.clone()));
                registry.insert(
                    factory_key,
                    Registration::new(
                        Lifetime::Singleton,
                        ImplementationKind::Instance,
                        Arc::new(move |_: &ResolverContext<'_>| -> DiResult<AnyArc> {
                            Ok(factory.clone())
                        }),
                    ),
                );
            }
            registry.finalize();

            ProviderInner {
                registry,
                root_disposers: Mutex::new(DisposeBag::default()),
                disposed: AtomicBool::new(false),
            }
        });

        let provider = Self { inner };
        provider.materialize_instances();
        debug!(
            registrations = provider.inner.registry.len(),
            scoped_slots = provider.inner.registry.scoped_count,
            "service provider built"
        );
        provider
    }

    #[inline]
    pub(crate) fn inner(&self) -> &ProviderInner {
        &self.inner
    }

    fn materialize_instances(&self) {
        for (key, reg) in self.inner.registry.iter() {
            if reg.implementation != ImplementationKind::Instance {
                continue;
            }
            if let Err(err) = self.resolve_any(key) {
                warn!(service = key.display_name(), error = %err, "failed to materialise singleton instance");
            }
        }
    }

    /// Creates a new scope for resolving scoped services.
    ///
    /// The scope shares this provider's registrations and singletons and
    /// owns a fresh set of scoped instances.
    ///
    /// # Examples
    ///
    /// ```
    /// use shaper::{ServiceCollection, Resolver, DiResult};
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// struct RequestId(usize);
    ///
    /// # fn main() -> DiResult<()> {
    /// let counter = Arc::new(AtomicUsize::new(0));
    /// let c = counter.clone();
    /// let mut collection = ServiceCollection::new();
    /// collection.add_scoped_factory::<RequestId, _>(move |_| {
    ///     Ok(RequestId(c.fetch_add(1, Ordering::SeqCst)))
    /// });
    ///
    /// let provider = collection.build();
    /// let scope1 = provider.create_scope();
    /// let scope2 = provider.create_scope();
    ///
    /// let a = scope1.get_required::<RequestId>()?;
    /// let b = scope1.get_required::<RequestId>()?;
    /// let c = scope2.get_required::<RequestId>()?;
    /// assert!(Arc::ptr_eq(&a, &b));
    /// assert!(!Arc::ptr_eq(&a, &c));
    /// # Ok(())
    /// # }
    /// ```
    pub fn create_scope(&self) -> Scope {
        Scope::new(self.clone())
    }

    /// Disposes singleton instances in LIFO order and marks the provider
    /// disposed. Later resolutions fail with [`DiError::Disposed`].
    ///
    /// Only synchronous hooks run here; use
    /// [`dispose_async`](Self::dispose_async) when async hooks are
    /// registered. Calling it twice is a no-op.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut bag = std::mem::take(&mut *self.inner.root_disposers.lock());
        if bag.async_len() > 0 {
            warn!(
                pending = bag.async_len(),
                "async disposers skipped by synchronous dispose; call dispose_async"
            );
        }
        bag.run_all_sync_reverse();
        debug!("root provider disposed");
    }

    /// Runs async disposal hooks, then sync hooks, each in LIFO order.
    pub async fn dispose_async(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut bag = std::mem::take(&mut *self.inner.root_disposers.lock());
        bag.run_all_async_reverse().await;
        bag.run_all_sync_reverse();
        debug!("root provider disposed");
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_live(&self) -> DiResult<()> {
        if self.is_disposed() {
            Err(DiError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Singleton resolution through the registration's cell. The value is
    /// always built against the root so it cannot capture scoped services.
    pub(crate) fn resolve_singleton(&self, reg: &Registration) -> DiResult<AnyArc> {
        match &reg.singleton {
            Some(cell) => cell
                .get_or_try_init(|| reg.construct(&ResolverContext::new(self)))
                .cloned(),
            None => reg.construct(&ResolverContext::new(self)),
        }
    }

    fn resolve_any_impl(&self, key: &Key, reg: &Registration) -> DiResult<AnyArc> {
        match reg.lifetime {
            Lifetime::Singleton => self.resolve_singleton(reg),
            Lifetime::Scoped => {
                debug!(service = key.display_name(), "scoped service requested from root provider");
                Err(DiError::WrongLifetime("Cannot resolve scoped service from root provider"))
            }
            Lifetime::Transient => reg.construct(&ResolverContext::new(self)),
        }
    }

    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        let mut s = String::new();
        s.push_str("=== Service Provider Debug ===\n");
        for (k, r) in self.inner.registry.iter() {
            s.push_str(&format!("  {} ({:?}): {}\n", k.display_name(), r.implementation, r.lifetime));
        }
        s
    }
}

impl Clone for ServiceProvider {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("registrations", &self.inner.registry.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Drop for ServiceProvider {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 && !self.is_disposed() {
            if let Some(bag) = self.inner.root_disposers.try_lock() {
                if !bag.is_empty() {
                    warn!("service provider dropped with undisposed singletons; call dispose() first");
                }
            }
        }
    }
}

impl ResolverCore for ServiceProvider {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        self.ensure_live()?;
        let reg = self
            .inner
            .registry
            .get(key)
            .ok_or(DiError::NotFound(key.display_name()))?;
        with_cycle_guard(key.display_name(), || self.resolve_any_impl(key, reg))
    }

    fn is_registered(&self, key: &Key) -> bool {
        self.inner.registry.contains_key(key)
    }

    fn resolve_or_construct(
        &self,
        key: &Key,
        construct: &dyn Fn(&ResolverContext<'_>) -> DiResult<AnyArc>,
    ) -> DiResult<AnyArc> {
        if self.is_registered(key) {
            return self.resolve_any(key);
        }
        self.ensure_live()?;
        with_cycle_guard(key.display_name(), || construct(&ResolverContext::new(self)))
    }

    fn push_sync_disposer(&self, f: Box<dyn FnOnce() + Send>) {
        self.inner.root_disposers.lock().push_sync(f);
    }

    fn push_async_disposer(&self, f: Box<dyn FnOnce() -> BoxFutureUnit + Send>) {
        self.inner.root_disposers.lock().push_async(f);
    }
}
