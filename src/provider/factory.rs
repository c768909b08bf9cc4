//! Scope factory registered by every root provider.

use std::fmt;
use std::sync::{Arc, Weak};

use super::{ProviderInner, Scope, ServiceProvider};
use crate::{DiError, DiResult};

/// Creates scopes bound to the root provider that registered it.
///
/// Every root provider registers one of these as a singleton at build
/// time, so request pipelines can open a scope from nothing more than a
/// resolver:
///
/// ```
/// use shaper::{ScopeFactory, ServiceCollection, Resolver, DiResult};
///
/// # fn main() -> DiResult<()> {
/// let provider = ServiceCollection::new().build();
/// let factory = provider.get_required::<ScopeFactory>()?;
/// let scope = factory.create_scope()?;
/// scope.dispose();
/// # Ok(())
/// # }
/// ```
///
/// The factory only holds a weak reference, so it does not keep the root
/// alive; once the root is dropped or disposed `create_scope` fails with
/// [`DiError::Disposed`].
pub struct ScopeFactory {
    root: Weak<ProviderInner>,
}

impl ScopeFactory {
    pub(crate) fn new(root: Weak<ProviderInner>) -> Self {
        Self { root }
    }

    /// Opens a new scope on the root provider.
    pub fn create_scope(&self) -> DiResult<Scope> {
        let inner: Arc<ProviderInner> = self.root.upgrade().ok_or(DiError::Disposed)?;
        let provider = ServiceProvider { inner };
        provider.ensure_live()?;
        Ok(provider.create_scope())
    }
}

impl fmt::Debug for ScopeFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeFactory")
            .field("root_alive", &(self.root.strong_count() > 0))
            .finish()
    }
}
