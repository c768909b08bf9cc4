//! Core traits for the dependency injection container.

mod dispose;
mod injectable;
mod resolver;

pub use dispose::{AsyncDispose, Dispose};
pub use injectable::Injectable;
pub use resolver::{Resolver, ResolverCore};
