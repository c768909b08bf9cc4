//! Error types for the dependency injection container.

use thiserror::Error;

/// Dependency injection errors
///
/// Represents the various error conditions that can occur during service
/// resolution or container operations.
///
/// # Examples
///
/// ```rust
/// use shaper::{DiError, ServiceCollection, Resolver};
///
/// let provider = ServiceCollection::new().build();
/// match provider.get_required::<String>() {
///     Err(DiError::NotFound(type_name)) => {
///         assert_eq!(type_name, "alloc::string::String");
///     }
///     _ => unreachable!(),
/// }
/// ```
///
/// ```rust
/// use shaper::DiError;
///
/// let circular = DiError::Circular(vec!["ServiceA", "ServiceB", "ServiceA"]);
/// assert_eq!(circular.to_string(), "Circular dependency: ServiceA -> ServiceB -> ServiceA");
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// Service not registered
    #[error("Service not found: {0}")]
    NotFound(&'static str),
    /// Type downcast failed
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// Circular dependency detected (includes path)
    #[error("Circular dependency: {}", .0.join(" -> "))]
    Circular(Vec<&'static str>),
    /// Invalid lifetime resolution (e.g., scoped from root)
    #[error("Lifetime error: {0}")]
    WrongLifetime(&'static str),
    /// Maximum recursion depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
    /// The provider was disposed or dropped
    #[error("Service provider has been disposed")]
    Disposed,
    /// A user factory reported a failure of its own
    #[error("Factory for {service} failed: {message}")]
    Factory {
        service: &'static str,
        message: String,
    },
}

impl DiError {
    /// Wraps an arbitrary failure raised while building `service`.
    ///
    /// ```rust
    /// use shaper::DiError;
    ///
    /// let err = DiError::factory("Database", "connection refused");
    /// assert_eq!(err.to_string(), "Factory for Database failed: connection refused");
    /// ```
    pub fn factory(service: &'static str, cause: impl std::fmt::Display) -> Self {
        DiError::Factory {
            service,
            message: cause.to_string(),
        }
    }
}

/// Result type for DI operations
pub type DiResult<T> = Result<T, DiError>;
