//! Resolver context for dependency injection.
//!
//! This module contains the ResolverContext type which provides
//! the interface for factory functions to resolve dependencies.

use crate::error::DiResult;
use crate::internal::BoxFutureUnit;
use crate::key::Key;
use crate::registration::AnyArc;
use crate::traits::ResolverCore;

/// Context passed to factory functions and [`Injectable::inject`](crate::Injectable::inject).
///
/// Wraps the resolver that is building the service: the root provider for
/// singletons, the current scope for scoped and transient services. All
/// [`Resolver`](crate::Resolver) methods are available on it.
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
/// let mut services = ServiceCollection::new();
/// services.add_singleton_instance(Database {
///     url: "postgres://localhost".to_string(),
/// });
/// services.add_transient_factory::<UserService, _>(|resolver| {
///     Ok(UserService { db: resolver.get_required::<Database>()? })
/// });
/// ```
pub struct ResolverContext<'a> {
    resolver: &'a dyn ResolverCore,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(resolver: &'a dyn ResolverCore) -> Self {
        Self { resolver }
    }
}

impl<'a> ResolverCore for ResolverContext<'a> {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        self.resolver.resolve_any(key)
    }

    fn is_registered(&self, key: &Key) -> bool {
        self.resolver.is_registered(key)
    }

    fn resolve_or_construct(
        &self,
        key: &Key,
        construct: &dyn Fn(&ResolverContext<'_>) -> DiResult<AnyArc>,
    ) -> DiResult<AnyArc> {
        self.resolver.resolve_or_construct(key, construct)
    }

    fn push_sync_disposer(&self, f: Box<dyn FnOnce() + Send>) {
        self.resolver.push_sync_disposer(f);
    }

    fn push_async_disposer(&self, f: Box<dyn FnOnce() -> BoxFutureUnit + Send>) {
        self.resolver.push_async_disposer(f);
    }
}
