//! A request pipeline: one scope per request, layered configuration and
//! policies around a flaky backend.
//!
//! Run with `RUST_LOG=debug cargo run --example request_pipeline` to see
//! the container and policy logs.

use async_trait::async_trait;
use shaper::config::{Configuration, ConfigurationExt, JsonConfiguration};
use shaper::connection::{ConnectionProvider, Connector};
use shaper::resiliency::{CircuitBreakerPolicy, Policy, PolicyError, RetryPolicy};
use shaper::{
    AsyncDispose, DiResult, Injectable, InjectionContext, PropertyInjector, Resolver, ResolverContext,
    ScopeFactory, ServiceCollection, TryInject,
};
use std::io::{Error, ErrorKind};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ===== Backend =====

/// In-memory "database" that fails every `flaky_every`-th call.
struct OrderStore {
    url: String,
    calls: AtomicU32,
    flaky_every: u32,
}

impl OrderStore {
    fn total_for(&self, customer: &str) -> Result<u32, Error> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.flaky_every > 0 && call % self.flaky_every == 0 {
            return Err(Error::new(ErrorKind::ConnectionReset, format!("{} reset", self.url)));
        }
        Ok(customer.len() as u32 * 10)
    }
}

struct MemoryConnector {
    flaky_every: u32,
}

impl Connector for MemoryConnector {
    type Connection = OrderStore;
    type Error = Error;

    fn connect(&self, connection_string: &str) -> Result<OrderStore, Error> {
        info!(url = connection_string, "opening connection");
        Ok(OrderStore {
            url: connection_string.to_string(),
            calls: AtomicU32::new(0),
            flaky_every: self.flaky_every,
        })
    }

    fn close(&self, connection: &OrderStore) {
        info!(url = %connection.url, calls = connection.calls.load(Ordering::SeqCst), "closing connection");
    }
}

// ===== Request services =====

struct RequestContext {
    id: u32,
    customer: String,
}

/// Collects per-request log lines and flushes them when the scope ends.
struct RequestLog {
    lines: Mutex<Vec<String>>,
}

#[async_trait]
impl AsyncDispose for RequestLog {
    async fn dispose(&self) {
        let lines = std::mem::take(&mut *self.lines.lock().unwrap_or_else(|e| e.into_inner()));
        tokio::time::sleep(Duration::from_millis(1)).await;
        info!(lines = lines.len(), "request log flushed");
    }
}

/// Optional collaborator, only registered in some deployments.
struct AuditTrail;

struct OrderService {
    context: Arc<RequestContext>,
    connections: Arc<ConnectionProvider<MemoryConnector>>,
    breaker: Arc<CircuitBreakerPolicy>,
    retry: Arc<RetryPolicy<PolicyError<Error>>>,
    log: Arc<RequestLog>,
}

impl Injectable for OrderService {
    fn inject(r: &ResolverContext<'_>) -> DiResult<Self> {
        Ok(OrderService {
            context: r.get_required::<RequestContext>()?,
            connections: r.get_required::<ConnectionProvider<MemoryConnector>>()?,
            breaker: r.get_required::<CircuitBreakerPolicy>()?,
            retry: r.get_required::<RetryPolicy<PolicyError<Error>>>()?,
            log: r.get_required::<RequestLog>()?,
        })
    }
}

/// Built by hand per request; optional members come from the scope.
#[derive(Default)]
struct ResponseWriter {
    audit: Option<Arc<AuditTrail>>,
    log: Option<Arc<RequestLog>>,
}

impl TryInject for ResponseWriter {
    fn try_inject(&mut self, ctx: &InjectionContext<'_>) {
        ctx.fill(&mut self.audit, "audit");
        ctx.fill(&mut self.log, "log");
    }
}

impl ResponseWriter {
    fn write(&self, line: String) {
        if self.audit.is_some() {
            info!(line = %line, "audited");
        }
        if let Some(log) = &self.log {
            log.lines.lock().unwrap_or_else(|e| e.into_inner()).push(line);
        }
    }
}

impl OrderService {
    fn order_total(&self) -> Result<u32, PolicyError<Error>> {
        let store = self
            .connections
            .default_connection()
            .map_err(|e| PolicyError::Aborted(e.to_string()))?;
        let breaker = self.breaker.clone();
        let customer = self.context.customer.clone();

        let total = self
            .retry
            .execute(move || {
                let store = store.clone();
                let customer = customer.clone();
                breaker.execute(move || store.total_for(&customer))
            })
            .map_err(PolicyError::flatten)?;

        self.log
            .lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(format!("customer {} queried", self.context.customer));
        Ok(total)
    }
}

// ===== Composition =====

fn build_services(config: JsonConfiguration) -> ServiceCollection {
    let retry_attempts = config.get_value::<u32>("Resiliency:RetryAttempts").max(1);
    let retry_delay = Duration::from_millis(config.get_value::<u64>("Resiliency:RetryDelayMs"));
    let breaker_threshold = config.get_value::<u32>("Resiliency:BreakerThreshold");
    let breaker_open = Duration::from_millis(config.get_value::<u64>("Resiliency:BreakerOpenMs"));
    let flaky_every = config.get_value::<u32>("AppSettings:FlakyEvery");

    let mut services = ServiceCollection::new();
    services
        .add_singleton_trait::<dyn Configuration>(Arc::new(config))
        .add_singleton_instance(MemoryConnector { flaky_every })
        .add_singleton_instance(CircuitBreakerPolicy::new(breaker_threshold, breaker_open))
        .add_singleton_factory::<RetryPolicy<PolicyError<Error>>, _>(move |_| {
            RetryPolicy::handle(|e: &PolicyError<Error>| e.inner().is_some())
                .wait_and_retry(retry_attempts, move |attempt| retry_delay * attempt)
                .build()
                .map_err(|e| shaper::DiError::factory("RetryPolicy", e))
        });

    let next_request = Arc::new(AtomicU32::new(0));
    services.add_scoped_factory::<RequestContext, _>(move |_| {
        let id = next_request.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(RequestContext {
            id,
            customer: format!("customer-{id}"),
        })
    });
    services.add_transient::<OrderService>();
    services
        .add_scoped::<ConnectionProvider<MemoryConnector>>()
        .add_disposal::<ConnectionProvider<MemoryConnector>>();
    services
        .add_scoped_factory::<RequestLog, _>(|_| {
            Ok(RequestLog {
                lines: Mutex::new(Vec::new()),
            })
        })
        .add_async_disposal::<RequestLog>();
    services
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = JsonConfiguration::load(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/config"))?;
    let site = config.get_value::<String>("AppSettings:SiteName");
    let requests = config.get_value::<u32>("AppSettings:Requests");
    info!(site = %site, environment = config.environment(), "starting");

    let provider = build_services(config).build();
    let scopes = provider.get_required::<ScopeFactory>()?;

    for _ in 0..requests {
        let scope = scopes.create_scope()?;
        let orders = scope.get_required::<OrderService>()?;

        let mut writer = ResponseWriter::default();
        let report = PropertyInjector::perform_injection(&mut writer, Some(&scope));
        if !report.is_complete() {
            info!(missing = ?report.missing, "running without optional services");
        }

        match orders.order_total() {
            Ok(total) => writer.write(format!("request {} total {}", orders.context.id, total)),
            Err(err) => warn!(request = orders.context.id, error = %err, "request failed"),
        }

        scope.dispose_async().await;
    }

    provider.dispose_async().await;
    info!("shut down");
    Ok(())
}
