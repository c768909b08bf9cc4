//! Scoped service resolution and lifecycle management.

use std::fmt;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{ResolverContext, ServiceProvider};
use crate::internal::{with_cycle_guard, BoxFutureUnit, DisposeBag};
use crate::registration::{AnyArc, Registration};
use crate::traits::ResolverCore;
use crate::{DiError, DiResult, Key, Lifetime};

/// Scoped service container bound to one unit of work.
///
/// A `Scope` resolves scoped services into its own slots while sharing
/// registrations and singletons with the root provider.
///
/// - **Singleton**: resolved and cached in the root provider
/// - **Scoped**: resolved and cached within this scope
/// - **Transient**: created fresh on every resolution
///
/// Ending the scope with [`dispose`](Self::dispose), or dropping it, runs
/// the disposal hooks of the instances it built in LIFO order.
///
/// # Examples
///
/// ```
/// use shaper::{ServiceCollection, Resolver, DiResult};
/// use std::sync::Arc;
///
/// struct DatabaseConnection(String);
/// struct UserService { db: Arc<DatabaseConnection> }
///
/// # fn main() -> DiResult<()> {
/// let mut collection = ServiceCollection::new();
/// collection.add_scoped_factory::<DatabaseConnection, _>(|_| {
///     Ok(DatabaseConnection("connection-123".to_string()))
/// });
/// collection.add_transient_factory::<UserService, _>(|resolver| {
///     Ok(UserService { db: resolver.get_required::<DatabaseConnection>()? })
/// });
///
/// let provider = collection.build();
/// let scope = provider.create_scope();
///
/// let user1 = scope.get_required::<UserService>()?;
/// let user2 = scope.get_required::<UserService>()?;
/// assert!(Arc::ptr_eq(&user1.db, &user2.db));
/// scope.dispose();
/// # Ok(())
/// # }
/// ```
pub struct Scope {
    root: ServiceProvider,
    scoped_cells: Box<[OnceCell<AnyArc>]>,
    disposers: Mutex<DisposeBag>,
    disposed: bool,
}

impl Scope {
    pub(crate) fn new(root: ServiceProvider) -> Self {
        let scoped_count = root.inner().registry.scoped_count;
        let scoped_cells: Box<[OnceCell<AnyArc>]> = (0..scoped_count)
            .map(|_| OnceCell::new())
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            root,
            scoped_cells,
            disposers: Mutex::new(DisposeBag::default()),
            disposed: false,
        }
    }

    /// The root provider this scope was created from.
    pub fn root(&self) -> &ServiceProvider {
        &self.root
    }

    /// Ends the scope, disposing the instances it built in LIFO order.
    ///
    /// Only synchronous hooks run; use [`dispose_async`](Self::dispose_async)
    /// when scoped services registered async disposal.
    pub fn dispose(mut self) {
        self.release();
    }

    /// Ends the scope, running async disposal hooks and then sync hooks.
    pub async fn dispose_async(mut self) {
        self.disposed = true;
        let mut bag = std::mem::take(self.disposers.get_mut());
        bag.run_all_async_reverse().await;
        bag.run_all_sync_reverse();
        self.scoped_cells = Vec::new().into_boxed_slice();
        debug!("scope disposed");
    }

    fn release(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        let mut bag = std::mem::take(self.disposers.get_mut());
        if bag.async_len() > 0 {
            warn!(
                pending = bag.async_len(),
                "async disposers skipped by synchronous scope disposal; call dispose_async"
            );
        }
        bag.run_all_sync_reverse();
        self.scoped_cells = Vec::new().into_boxed_slice();
        debug!("scope disposed");
    }

    fn resolve_scoped(&self, reg: &Registration) -> DiResult<AnyArc> {
        let cell = reg
            .scoped_slot
            .and_then(|slot| self.scoped_cells.get(slot))
            .ok_or(DiError::WrongLifetime("scoped service has no slot in this scope"))?;
        cell.get_or_try_init(|| reg.construct(&ResolverContext::new(self)))
            .cloned()
    }

    fn resolve_any_impl(&self, reg: &Registration) -> DiResult<AnyArc> {
        match reg.lifetime {
            // Singletons are built against the root provider
            Lifetime::Singleton => self.root.resolve_singleton(reg),
            Lifetime::Scoped => self.resolve_scoped(reg),
            Lifetime::Transient => reg.construct(&ResolverContext::new(self)),
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("scoped_slots", &self.scoped_cells.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.release();
    }
}

impl ResolverCore for Scope {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        self.root.ensure_live()?;
        let reg = self
            .root
            .inner()
            .registry
            .get(key)
            .ok_or(DiError::NotFound(key.display_name()))?;
        with_cycle_guard(key.display_name(), || self.resolve_any_impl(reg))
    }

    fn is_registered(&self, key: &Key) -> bool {
        self.root.is_registered(key)
    }

    fn resolve_or_construct(
        &self,
        key: &Key,
        construct: &dyn Fn(&ResolverContext<'_>) -> DiResult<AnyArc>,
    ) -> DiResult<AnyArc> {
        if self.is_registered(key) {
            return self.resolve_any(key);
        }
        self.root.ensure_live()?;
        with_cycle_guard(key.display_name(), || construct(&ResolverContext::new(self)))
    }

    fn push_sync_disposer(&self, f: Box<dyn FnOnce() + Send>) {
        self.disposers.lock().push_sync(f);
    }

    fn push_async_disposer(&self, f: Box<dyn FnOnce() -> BoxFutureUnit + Send>) {
        self.disposers.lock().push_async(f);
    }
}
