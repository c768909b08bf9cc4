/// Optional member injection tests

use shaper::{InjectionContext, PropertyInjector, ResolverCore, ServiceCollection, TryInject};
use std::sync::Arc;

trait Metrics: Send + Sync {
    fn name(&self) -> &'static str;
}

struct NoopMetrics;
impl Metrics for NoopMetrics {
    fn name(&self) -> &'static str {
        "noop"
    }
}

struct RequestContext {
    path: String,
}

struct Templates;

#[derive(Default)]
struct Controller {
    request: Option<Arc<RequestContext>>,
    metrics: Option<Arc<dyn Metrics>>,
    templates: Option<Arc<Templates>>,
}

impl TryInject for Controller {
    fn try_inject(&mut self, ctx: &InjectionContext<'_>) {
        ctx.fill(&mut self.request, "request");
        ctx.fill_trait(&mut self.metrics, "metrics");
        ctx.fill(&mut self.templates, "templates");
    }
}

fn services() -> ServiceCollection {
    let mut services = ServiceCollection::new();
    services.add_scoped_factory::<RequestContext, _>(|_| {
        Ok(RequestContext {
            path: "/orders".to_string(),
        })
    });
    services.add_singleton_trait::<dyn Metrics>(Arc::new(NoopMetrics));
    services
}

#[test]
fn test_fills_registered_members_from_scope() {
    let provider = services().build();
    let scope = provider.create_scope();

    let mut controller = Controller::default();
    let report = PropertyInjector::perform_injection(&mut controller, Some(&scope));

    assert_eq!(controller.request.as_ref().unwrap().path, "/orders");
    assert_eq!(controller.metrics.as_ref().unwrap().name(), "noop");
    assert!(controller.templates.is_none());

    assert_eq!(report.injected, vec!["request", "metrics"]);
    assert_eq!(report.missing, vec!["templates"]);
    assert!(!report.is_complete());
}

#[test]
fn test_scoped_member_from_root_is_left_empty() {
    let provider = services().build();

    let mut controller = Controller::default();
    let report = PropertyInjector::perform_injection(&mut controller, Some(&provider));

    // The root refuses scoped services; the pass carries on
    assert!(controller.request.is_none());
    assert!(controller.metrics.is_some());
    assert_eq!(report.missing, vec!["request", "templates"]);
}

#[test]
fn test_existing_values_survive_missing_services() {
    let provider = ServiceCollection::new().build();

    let mut controller = Controller {
        templates: Some(Arc::new(Templates)),
        ..Controller::default()
    };
    PropertyInjector::perform_injection(&mut controller, Some(&provider));

    assert!(controller.templates.is_some());
}

#[test]
fn test_complete_report() {
    let mut services = services();
    services.add_singleton_instance(Templates);
    let provider = services.build();
    let scope = provider.create_scope();

    let mut controller = Controller::default();
    let report = PropertyInjector::perform_injection(&mut controller, Some(&scope));
    assert!(report.is_complete());
    assert_eq!(report.injected.len(), 3);
}

#[test]
fn test_works_through_dyn_resolver() {
    let provider = services().build();
    let scope = provider.create_scope();
    let resolver: &dyn ResolverCore = &scope;

    let mut controller = Controller::default();
    let report = PropertyInjector::perform_injection(&mut controller, Some(resolver));
    assert_eq!(report.injected.len(), 2);

    let mut skipped = Controller::default();
    let report = PropertyInjector::perform_injection(&mut skipped, None);
    assert!(report.injected.is_empty() && report.missing.is_empty());
}
