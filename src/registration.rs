//! Service registration types.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::descriptors::ImplementationKind;
use crate::error::DiResult;
use crate::internal::{AsyncHook, SyncHook};
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::traits::ResolverCore;

pub(crate) use crate::provider::ResolverContext;

// Type-erased Arc for storage
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

pub(crate) type Ctor = Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> DiResult<AnyArc> + Send + Sync>;

/// Produces the disposal hook for a freshly built instance.
///
/// The hook is handed to whichever bag owns the instance: the root for
/// singletons, the scope for scoped services. Transient registrations never
/// carry hooks.
#[derive(Clone)]
pub(crate) enum DisposeHook {
    Sync(Arc<dyn Fn(&AnyArc) -> Option<SyncHook> + Send + Sync>),
    Async(Arc<dyn Fn(&AnyArc) -> Option<AsyncHook> + Send + Sync>),
}

impl DisposeHook {
    fn attach(&self, value: &AnyArc, owner: &dyn ResolverCore) {
        match self {
            DisposeHook::Sync(make) => {
                if let Some(hook) = make(value) {
                    owner.push_sync_disposer(hook);
                }
            }
            DisposeHook::Async(make) => {
                if let Some(hook) = make(value) {
                    owner.push_async_disposer(hook);
                }
            }
        }
    }
}

/// Service registration with lifetime and constructor
pub(crate) struct Registration {
    pub(crate) lifetime: Lifetime,
    pub(crate) implementation: ImplementationKind,
    pub(crate) ctor: Ctor,
    /// Singleton cache; `get_or_try_init` runs the constructor at most once
    pub(crate) singleton: Option<OnceCell<AnyArc>>,
    /// Index into a scope's cell slice
    pub(crate) scoped_slot: Option<usize>,
    pub(crate) disposers: Vec<DisposeHook>,
}

impl Registration {
    pub(crate) fn new(lifetime: Lifetime, implementation: ImplementationKind, ctor: Ctor) -> Self {
        let singleton = match lifetime {
            Lifetime::Singleton => Some(OnceCell::new()),
            _ => None,
        };

        Self {
            lifetime,
            implementation,
            ctor,
            singleton,
            scoped_slot: None,
            disposers: Vec::new(),
        }
    }

    /// Builds a fresh instance and registers its disposal hooks with the
    /// resolver the context wraps.
    pub(crate) fn construct(&self, ctx: &ResolverContext<'_>) -> DiResult<AnyArc> {
        let value = (self.ctor)(ctx)?;
        for hook in &self.disposers {
            hook.attach(&value, ctx);
        }
        Ok(value)
    }
}

/// Service registry holding all registrations in registration order
pub(crate) struct Registry {
    entries: Vec<(Key, Registration)>,
    index: HashMap<Key, usize>,
    /// Total count of scoped registrations for slot allocation
    pub(crate) scoped_count: usize,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            scoped_count: 0,
        }
    }

    /// Inserts a registration. A later registration for the same key
    /// replaces the earlier one in place.
    pub(crate) fn insert(&mut self, key: Key, registration: Registration) {
        match self.index.get(&key) {
            Some(&pos) => {
                debug!(
                    service = key.display_name(),
                    previous = %self.entries[pos].1.lifetime,
                    lifetime = %registration.lifetime,
                    "replacing existing registration"
                );
                self.entries[pos] = (key, registration);
            }
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((key, registration));
            }
        }
    }

    #[inline(always)]
    pub(crate) fn get(&self, key: &Key) -> Option<&Registration> {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub(crate) fn get_mut(&mut self, key: &Key) -> Option<&mut Registration> {
        match self.index.get(key) {
            Some(&pos) => Some(&mut self.entries[pos].1),
            None => None,
        }
    }

    #[inline(always)]
    pub(crate) fn contains_key(&self, key: &Key) -> bool {
        self.index.contains_key(key)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&Key, &Registration)> {
        self.entries.iter().map(|(k, r)| (k, r))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Assigns scoped slot indices
    pub(crate) fn finalize(&mut self) {
        let mut next_scoped_slot = 0;
        for (_, reg) in &mut self.entries {
            if reg.lifetime == Lifetime::Scoped {
                reg.scoped_slot = Some(next_scoped_slot);
                next_scoped_slot += 1;
            }
        }
        self.scoped_count = next_scoped_slot;
    }
}
