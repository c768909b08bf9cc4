//! Service lifetime definitions.

use std::fmt;

/// Service lifetimes controlling instance caching behavior
///
/// # Examples
///
/// ```rust
/// use shaper::{ServiceCollection, Resolver, DiResult};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct Repository { db: Arc<Database> }
/// struct RequestModel { id: u32 }
///
/// # fn main() -> DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services.add_singleton_instance(Database { url: "postgres://localhost".to_string() });
/// services.add_scoped_factory::<Repository, _>(|r| {
///     Ok(Repository { db: r.get_required::<Database>()? })
/// });
/// services.add_transient_factory::<RequestModel, _>(|_| Ok(RequestModel { id: 7 }));
///
/// let provider = services.build();
///
/// // Singleton: same instance across scopes
/// let db1 = provider.get_required::<Database>()?;
/// let scope1 = provider.create_scope();
/// let db2 = scope1.get_required::<Database>()?;
/// assert!(Arc::ptr_eq(&db1, &db2));
///
/// // Scoped: same within scope, different across scopes
/// let repo1a = scope1.get_required::<Repository>()?;
/// let repo1b = scope1.get_required::<Repository>()?;
/// assert!(Arc::ptr_eq(&repo1a, &repo1b));
/// let scope2 = provider.create_scope();
/// let repo2 = scope2.get_required::<Repository>()?;
/// assert!(!Arc::ptr_eq(&repo1a, &repo2));
///
/// // Transient: always different instances
/// let m1 = scope1.get_required::<RequestModel>()?;
/// let m2 = scope1.get_required::<RequestModel>()?;
/// assert!(!Arc::ptr_eq(&m1, &m2));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Single instance per root provider, shared by every scope.
    ///
    /// Created on first request (or at `build()` when registered by
    /// instance) and disposed only when the root provider is disposed.
    Singleton,
    /// Single instance per scope, created lazily on first resolution
    /// within that scope and disposed with it.
    Scoped,
    /// New instance per resolution, never cached.
    Transient,
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifetime::Singleton => "Singleton",
            Lifetime::Scoped => "Scoped",
            Lifetime::Transient => "Transient",
        };
        f.write_str(name)
    }
}
