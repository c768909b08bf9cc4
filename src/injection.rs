//! Optional member injection for values the container did not build.
//!
//! Types opt in by implementing [`TryInject`] and naming each optional
//! member they want filled. A pass never fails: members whose service is
//! absent or fails to build keep their current value and are reported.

use std::cell::RefCell;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::traits::{Resolver, ResolverCore};

/// Outcome of one injection pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InjectionReport {
    /// Members that received a service
    pub injected: Vec<&'static str>,
    /// Members left untouched
    pub missing: Vec<&'static str>,
}

impl InjectionReport {
    /// True when every requested member was filled.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Handed to [`TryInject::try_inject`]; resolves members one at a time.
pub struct InjectionContext<'a> {
    resolver: &'a dyn ResolverCore,
    target: &'static str,
    report: RefCell<InjectionReport>,
}

impl<'a> InjectionContext<'a> {
    fn new(resolver: &'a dyn ResolverCore, target: &'static str) -> Self {
        Self {
            resolver,
            target,
            report: RefCell::new(InjectionReport::default()),
        }
    }

    /// Fills `slot` with the registered `T`, if any. Returns whether the
    /// member was injected.
    pub fn fill<T: Send + Sync + 'static>(&self, slot: &mut Option<Arc<T>>, member: &'static str) -> bool {
        let resolved = self.resolver.get_service::<T>();
        self.record(slot, resolved, member, std::any::type_name::<T>())
    }

    /// Fills `slot` with the registered trait service `T`, if any.
    pub fn fill_trait<T: ?Sized + Send + Sync + 'static>(
        &self,
        slot: &mut Option<Arc<T>>,
        member: &'static str,
    ) -> bool {
        let resolved = self.resolver.get_service_trait::<T>();
        self.record(slot, resolved, member, std::any::type_name::<T>())
    }

    fn record<T: ?Sized>(
        &self,
        slot: &mut Option<Arc<T>>,
        resolved: crate::DiResult<Option<Arc<T>>>,
        member: &'static str,
        service: &'static str,
    ) -> bool {
        let mut report = self.report.borrow_mut();
        match resolved {
            Ok(Some(value)) => {
                *slot = Some(value);
                report.injected.push(member);
                debug!(target_type = self.target, member, service, "injected optional member");
                true
            }
            Ok(None) => {
                report.missing.push(member);
                debug!(target_type = self.target, member, service, "optional member not registered");
                false
            }
            Err(err) => {
                report.missing.push(member);
                warn!(target_type = self.target, member, service, error = %err, "failed to resolve optional member");
                false
            }
        }
    }
}

/// Optional dependencies filled after construction.
///
/// ```rust
/// use shaper::{InjectionContext, PropertyInjector, ServiceCollection, TryInject};
/// use std::sync::Arc;
///
/// struct Clock;
/// struct Mailer;
///
/// #[derive(Default)]
/// struct Page {
///     clock: Option<Arc<Clock>>,
///     mailer: Option<Arc<Mailer>>,
/// }
///
/// impl TryInject for Page {
///     fn try_inject(&mut self, ctx: &InjectionContext<'_>) {
///         ctx.fill(&mut self.clock, "clock");
///         ctx.fill(&mut self.mailer, "mailer");
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton_instance(Clock);
/// let provider = services.build();
///
/// let mut page = Page::default();
/// let report = PropertyInjector::perform_injection(&mut page, Some(&provider));
/// assert!(page.clock.is_some());
/// assert!(page.mailer.is_none());
/// assert_eq!(report.missing, vec!["mailer"]);
/// ```
pub trait TryInject {
    fn try_inject(&mut self, ctx: &InjectionContext<'_>);
}

/// Runs optional injection passes.
pub struct PropertyInjector;

impl PropertyInjector {
    /// Fills the optional members of `target` from `resolver`.
    ///
    /// Without a resolver the pass is skipped and logged.
    pub fn perform_injection<T: TryInject + ?Sized>(
        target: &mut T,
        resolver: Option<&dyn ResolverCore>,
    ) -> InjectionReport {
        let target_type = std::any::type_name::<T>();
        let Some(resolver) = resolver else {
            warn!(target_type, "no resolver available, skipping optional injection");
            return InjectionReport::default();
        };

        let ctx = InjectionContext::new(resolver, target_type);
        target.try_inject(&ctx);
        let report = ctx.report.into_inner();
        debug!(
            target_type,
            injected = report.injected.len(),
            missing = report.missing.len(),
            "optional injection finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DiError, ServiceCollection};

    struct Audit;

    #[derive(Default)]
    struct Handler {
        audit: Option<Arc<Audit>>,
        broken: Option<Arc<String>>,
    }

    impl TryInject for Handler {
        fn try_inject(&mut self, ctx: &InjectionContext<'_>) {
            ctx.fill(&mut self.audit, "audit");
            ctx.fill(&mut self.broken, "broken");
        }
    }

    #[test]
    fn factory_errors_are_reported_not_raised() {
        let mut services = ServiceCollection::new();
        services.add_singleton_instance(Audit);
        services.add_transient_factory::<String, _>(|_| Err(DiError::factory("String", "boom")));
        let provider = services.build();

        let mut handler = Handler::default();
        let report = PropertyInjector::perform_injection(&mut handler, Some(&provider));

        assert!(handler.audit.is_some());
        assert!(handler.broken.is_none());
        assert_eq!(report.injected, vec!["audit"]);
        assert_eq!(report.missing, vec!["broken"]);
        assert!(!report.is_complete());
    }

    #[test]
    fn missing_resolver_skips_pass() {
        let mut handler = Handler::default();
        let report = PropertyInjector::perform_injection(&mut handler, None);
        assert_eq!(report, InjectionReport::default());
        assert!(handler.audit.is_none());
    }
}
