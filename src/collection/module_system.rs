//! Service module system for modular registration.
//!
//! Groups related registrations (for example everything a web front end
//! needs per request) behind one reusable unit.

use crate::{DiResult, ServiceCollection};

/// A module that can register services with a ServiceCollection.
///
/// # Example
///
/// ```rust
/// use shaper::{ServiceCollection, ServiceModule, DiResult, Resolver};
///
/// #[derive(Default)]
/// struct UserConfig;
///
/// struct UserService;
///
/// struct UserModule;
///
/// impl ServiceModule for UserModule {
///     fn register_services(self, services: &mut ServiceCollection) -> DiResult<()> {
///         services.add_singleton_instance(UserConfig::default());
///         services.add_scoped_factory::<UserService, _>(|r| {
///             r.get_required::<UserConfig>()?;
///             Ok(UserService)
///         });
///         Ok(())
///     }
/// }
///
/// # fn main() -> DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services.add_module(UserModule)?;
/// let provider = services.build();
/// # Ok(())
/// # }
/// ```
pub trait ServiceModule {
    /// Register this module's services with the ServiceCollection.
    fn register_services(self, services: &mut ServiceCollection) -> DiResult<()>;
}

impl ServiceCollection {
    /// Applies a [`ServiceModule`] to this collection.
    pub fn add_module<M: ServiceModule>(&mut self, module: M) -> DiResult<&mut Self> {
        module.register_services(self)?;
        Ok(self)
    }
}
