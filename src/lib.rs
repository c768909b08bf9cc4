//! # shaper
//!
//! Request-scoped dependency injection, resiliency policies and layered JSON
//! configuration for service back ends.
//!
//! ## Features
//!
//! - **Lifetimes**: Singleton, Scoped and Transient services
//! - **Scopes**: one scope per unit of work, disposed LIFO when it ends
//! - **Trait services**: register and resolve `dyn Trait` implementations
//! - **Circular dependency detection**: reported as errors with the full path
//! - **Policies**: timeout, retry, circuit breaker and fallback, sync or async
//! - **Configuration**: `appsettings.json` layered with an environment file
//!
//! ## Quick Start
//!
//! ```rust
//! use shaper::{DiResult, Injectable, Resolver, ResolverContext, ServiceCollection};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! impl Injectable for UserService {
//!     fn inject(r: &ResolverContext<'_>) -> DiResult<Self> {
//!         Ok(UserService { db: r.get_required::<Database>()? })
//!     }
//! }
//!
//! # fn main() -> DiResult<()> {
//! let mut services = ServiceCollection::new();
//! services.add_singleton_instance(Database {
//!     connection_string: "postgres://localhost".to_string(),
//! });
//! services.add_transient::<UserService>();
//!
//! let provider = services.build();
//! let user_service = provider.get_required::<UserService>()?;
//! assert_eq!(user_service.db.connection_string, "postgres://localhost");
//! # Ok(())
//! # }
//! ```
//!
//! ## Service Lifetimes
//!
//! - **Singleton**: Created once and shared across the entire application
//! - **Scoped**: Created once per scope (one scope per request)
//! - **Transient**: Created fresh on every resolution
//!
//! ## Scoped Services
//!
//! ```rust
//! use shaper::{ScopeFactory, ServiceCollection, Resolver, DiResult};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! struct RequestId(usize);
//!
//! # fn main() -> DiResult<()> {
//! let counter = Arc::new(AtomicUsize::new(0));
//! let c = counter.clone();
//!
//! let mut services = ServiceCollection::new();
//! services.add_scoped_factory::<RequestId, _>(move |_| {
//!     Ok(RequestId(c.fetch_add(1, Ordering::SeqCst)))
//! });
//!
//! let provider = services.build();
//! let factory = provider.get_required::<ScopeFactory>()?;
//!
//! let request = factory.create_scope()?;
//! let id = request.get_required::<RequestId>()?;
//! assert_eq!(id.0, 0);
//! request.dispose();
//! # Ok(())
//! # }
//! ```
//!
//! ## Policies
//!
//! ```rust
//! use shaper::resiliency::{Policy, ResiliencyPolicy};
//! use std::time::Duration;
//!
//! let breaker = ResiliencyPolicy::circuit_breaker(3, Duration::from_secs(30));
//! let value = breaker.execute(|| Ok::<_, std::io::Error>("ok")).unwrap();
//! assert_eq!(value, "ok");
//! ```

// Module declarations
pub mod collection;
pub mod config;
pub mod connection;
pub mod descriptors;
pub mod error;
pub mod injection;
pub mod key;
pub mod lifetime;
pub mod provider;
pub mod resiliency;
pub mod traits;

// Internal modules
mod internal;
mod registration;

// Re-export core types
pub use collection::{ServiceCollection, ServiceModule};
pub use descriptors::{ImplementationKind, ServiceDescriptor};
pub use error::{DiError, DiResult};
pub use injection::{InjectionContext, InjectionReport, PropertyInjector, TryInject};
pub use key::{key_of_trait, key_of_type, Key};
pub use lifetime::Lifetime;
pub use provider::{ResolverContext, Scope, ScopeFactory, ServiceProvider};
pub use traits::{AsyncDispose, Dispose, Injectable, Resolver, ResolverCore};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_singleton_resolution() {
        let mut sc = ServiceCollection::new();
        sc.add_singleton_instance(42usize);

        let sp = sc.build();
        let a = sp.get_required::<usize>().unwrap();
        let b = sp.get_required::<usize>().unwrap();

        assert_eq!(*a, 42);
        assert!(Arc::ptr_eq(&a, &b)); // Same instance
    }

    #[test]
    fn test_transient_resolution() {
        let mut sc = ServiceCollection::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        sc.add_transient_factory::<String, _>(move |_| {
            let c = counter_clone.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("instance-{}", c))
        });

        let sp = sc.build();
        let a = sp.get_required::<String>().unwrap();
        let b = sp.get_required::<String>().unwrap();

        assert_eq!(a.as_str(), "instance-1");
        assert_eq!(b.as_str(), "instance-2");
        assert!(!Arc::ptr_eq(&a, &b)); // Different instances
    }

    #[test]
    fn test_scoped_resolution() {
        let mut sc = ServiceCollection::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        sc.add_scoped_factory::<String, _>(move |_| {
            let c = counter_clone.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("scoped-{}", c))
        });

        let sp = sc.build();

        // Same scope should have same instance
        let scope1 = sp.create_scope();
        let s1a = scope1.get_required::<String>().unwrap();
        let s1b = scope1.get_required::<String>().unwrap();
        assert!(Arc::ptr_eq(&s1a, &s1b));

        // Different scope should have different instance
        let scope2 = sp.create_scope();
        let s2 = scope2.get_required::<String>().unwrap();
        assert!(!Arc::ptr_eq(&s1a, &s2));

        // Root refuses scoped services
        assert!(matches!(sp.get_required::<String>(), Err(DiError::WrongLifetime(_))));
    }

    #[test]
    fn test_trait_resolution() {
        trait TestTrait: Send + Sync {
            fn get_value(&self) -> i32;
        }

        struct TestImpl {
            value: i32,
        }

        impl TestTrait for TestImpl {
            fn get_value(&self) -> i32 {
                self.value
            }
        }

        let mut sc = ServiceCollection::new();
        sc.add_singleton_trait::<dyn TestTrait>(Arc::new(TestImpl { value: 42 }));

        let sp = sc.build();
        let service = sp.get_required_trait::<dyn TestTrait>().unwrap();
        assert_eq!(service.get_value(), 42);
    }

    #[test]
    fn test_unregistered_is_none() {
        let sp = ServiceCollection::new().build();
        assert!(sp.get_service::<u64>().unwrap().is_none());
        assert!(matches!(sp.get_required::<u64>(), Err(DiError::NotFound(_))));
    }
}
