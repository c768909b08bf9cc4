//! Constructor contract for container-built types.

use crate::error::DiResult;
use crate::provider::ResolverContext;

/// A type the container knows how to build from its dependencies.
///
/// `inject` plays the role of the constructor taking every dependency:
/// resolve what you need through the context and assemble the value.
/// Types implementing it can be registered with
/// [`ServiceCollection::add_transient`](crate::ServiceCollection::add_transient),
/// `add_scoped` and `add_singleton`, or resolved unregistered with
/// [`Resolver::resolve`](crate::Resolver::resolve).
///
/// # Examples
///
/// ```
/// use shaper::{Injectable, ResolverContext, ServiceCollection, Resolver, DiResult};
/// use std::sync::Arc;
///
/// struct Database { url: String }
///
/// struct UserRepository { db: Arc<Database> }
///
/// impl Injectable for UserRepository {
///     fn inject(r: &ResolverContext<'_>) -> DiResult<Self> {
///         Ok(Self { db: r.get_required::<Database>()? })
///     }
/// }
///
/// # fn main() -> DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services
///     .add_singleton_instance(Database { url: "postgres://localhost".into() })
///     .add_scoped::<UserRepository>();
///
/// let provider = services.build();
/// let scope = provider.create_scope();
/// let repo = scope.get_required::<UserRepository>()?;
/// assert_eq!(repo.db.url, "postgres://localhost");
/// # Ok(())
/// # }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Builds the value, resolving dependencies through `resolver`.
    fn inject(resolver: &ResolverContext<'_>) -> DiResult<Self>;
}
