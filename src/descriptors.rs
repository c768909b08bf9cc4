//! Service descriptors for introspection and diagnostics.

use crate::key::Key;
use crate::lifetime::Lifetime;

/// How a registration produces its instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImplementationKind {
    /// Built through [`Injectable::inject`](crate::Injectable::inject)
    Injectable,
    /// Built by a user-supplied factory closure
    Factory,
    /// A pre-built singleton instance
    Instance,
}

/// Immutable snapshot of one registration.
///
/// # Examples
///
/// ```rust
/// use shaper::{ImplementationKind, Lifetime, ServiceCollection};
///
/// struct Database { url: String }
/// struct Repository;
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton_instance(Database { url: "postgres://localhost".to_string() });
/// services.add_scoped_factory::<Repository, _>(|_| Ok(Repository));
///
/// let descriptors = services.get_service_descriptors();
/// assert_eq!(descriptors.len(), 2);
///
/// let db = descriptors.iter().find(|d| d.type_name().contains("Database")).unwrap();
/// assert_eq!(db.lifetime, Lifetime::Singleton);
/// assert_eq!(db.implementation, ImplementationKind::Instance);
/// ```
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    /// The service key (concrete type or trait)
    pub key: Key,
    /// Service lifetime
    pub lifetime: Lifetime,
    /// How the instance is produced
    pub implementation: ImplementationKind,
    /// Whether a disposal capability was attached
    pub disposable: bool,
}

impl ServiceDescriptor {
    /// Get the type/trait name
    pub fn type_name(&self) -> &'static str {
        self.key.display_name()
    }

    /// True when the registration holds a pre-built instance.
    pub fn is_instance(&self) -> bool {
        self.implementation == ImplementationKind::Instance
    }
}
