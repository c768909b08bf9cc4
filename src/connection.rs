//! Named connection cache backed by configuration.
//!
//! A [`ConnectionProvider`] opens at most one connection per connection
//! string name and closes them all when disposed. It is meant to be
//! registered scoped so every request gets its own set:
//!
//! ```rust
//! use shaper::config::{Configuration, JsonConfiguration};
//! use shaper::connection::{ConnectionProvider, Connector};
//! use shaper::{Resolver, ServiceCollection};
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! struct EchoConnector;
//! impl Connector for EchoConnector {
//!     type Connection = String;
//!     type Error = std::io::Error;
//!     fn connect(&self, connection_string: &str) -> Result<String, Self::Error> {
//!         Ok(connection_string.to_string())
//!     }
//! }
//!
//! let settings = HashMap::from([("ConnectionStrings:Main".to_string(), "mem://main".to_string())]);
//! let mut services = ServiceCollection::new();
//! services
//!     .add_singleton_trait::<dyn Configuration>(Arc::new(JsonConfiguration::from_settings(settings)))
//!     .add_singleton_instance(EchoConnector)
//!     .add_scoped::<ConnectionProvider<EchoConnector>>()
//!     .add_disposal::<ConnectionProvider<EchoConnector>>();
//!
//! let provider = services.build();
//! let scope = provider.create_scope();
//! let connections = scope.get_required::<ConnectionProvider<EchoConnector>>().unwrap();
//! assert_eq!(connections.get_connection("Main").unwrap().as_str(), "mem://main");
//! scope.dispose();
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Configuration;
use crate::provider::ResolverContext;
use crate::traits::{Dispose, Injectable, Resolver};
use crate::DiResult;

/// Connection string name used when callers do not pick one.
pub const DEFAULT_CONNECTION_NAME: &str = "Connection";

/// Opens connections from connection strings.
pub trait Connector: Send + Sync + 'static {
    type Connection: Send + Sync + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    fn connect(&self, connection_string: &str) -> Result<Self::Connection, Self::Error>;

    /// Called for each cached connection when the provider is disposed.
    fn close(&self, _connection: &Self::Connection) {}
}

#[derive(Debug, Error)]
pub enum ConnectionError<E: std::error::Error + 'static> {
    #[error("no connection string configured for `{0}`")]
    MissingConnectionString(String),
    #[error("failed to open connection `{name}`: {source}")]
    Connect {
        name: String,
        #[source]
        source: E,
    },
}

/// Caches one open connection per name.
pub struct ConnectionProvider<C: Connector> {
    configuration: Arc<dyn Configuration>,
    connector: Arc<C>,
    connections: Mutex<HashMap<String, Arc<C::Connection>>>,
}

impl<C: Connector> ConnectionProvider<C> {
    pub fn new(configuration: Arc<dyn Configuration>, connector: Arc<C>) -> Self {
        Self {
            configuration,
            connector,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached connection for `name`, opening it on first use.
    pub fn get_connection(&self, name: &str) -> Result<Arc<C::Connection>, ConnectionError<C::Error>> {
        let mut connections = self.connections.lock();
        if let Some(existing) = connections.get(name) {
            return Ok(existing.clone());
        }

        let connection_string = self
            .configuration
            .get_connection_string(name)
            .ok_or_else(|| ConnectionError::MissingConnectionString(name.to_string()))?;

        let connection = self
            .connector
            .connect(connection_string)
            .map(Arc::new)
            .map_err(|source| ConnectionError::Connect {
                name: name.to_string(),
                source,
            })?;

        debug!(name, "connection opened");
        connections.insert(name.to_string(), connection.clone());
        Ok(connection)
    }

    /// Connection for [`DEFAULT_CONNECTION_NAME`].
    pub fn default_connection(&self) -> Result<Arc<C::Connection>, ConnectionError<C::Error>> {
        self.get_connection(DEFAULT_CONNECTION_NAME)
    }

    pub fn open_count(&self) -> usize {
        self.connections.lock().len()
    }
}

impl<C: Connector> Injectable for ConnectionProvider<C> {
    fn inject(resolver: &ResolverContext<'_>) -> DiResult<Self> {
        Ok(Self::new(
            resolver.get_required_trait::<dyn Configuration>()?,
            resolver.get_required::<C>()?,
        ))
    }
}

impl<C: Connector> Dispose for ConnectionProvider<C> {
    fn dispose(&self) {
        let drained: Vec<_> = self.connections.lock().drain().collect();
        for (name, connection) in drained {
            self.connector.close(&connection);
            if Arc::strong_count(&connection) > 1 {
                warn!(name = %name, "connection closed while still referenced");
            }
        }
    }
}

impl<C: Connector> fmt::Debug for ConnectionProvider<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProvider")
            .field("open", &self.open_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JsonConfiguration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingConnector {
        opened: AtomicUsize,
        closed: AtomicUsize,
    }

    impl Connector for CountingConnector {
        type Connection = String;
        type Error = std::io::Error;

        fn connect(&self, connection_string: &str) -> Result<String, Self::Error> {
            if connection_string.is_empty() {
                return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty"));
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(connection_string.to_string())
        }

        fn close(&self, _connection: &String) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn provider() -> (Arc<CountingConnector>, ConnectionProvider<CountingConnector>) {
        let config = JsonConfiguration::from_settings(HashMap::from([
            ("ConnectionStrings:Connection".to_string(), "db://default".to_string()),
            ("ConnectionStrings:Broken".to_string(), String::new()),
        ]));
        let connector = Arc::new(CountingConnector::default());
        let provider = ConnectionProvider::new(Arc::new(config), connector.clone());
        (connector, provider)
    }

    #[test]
    fn caches_per_name_and_closes_on_dispose() {
        let (connector, provider) = provider();
        let a = provider.default_connection().unwrap();
        let b = provider.get_connection("Connection").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(connector.opened.load(Ordering::SeqCst), 1);

        drop((a, b));
        provider.dispose();
        assert_eq!(connector.closed.load(Ordering::SeqCst), 1);
        assert_eq!(provider.open_count(), 0);
    }

    #[test]
    fn reports_missing_and_failed_connections() {
        let (_, provider) = provider();
        assert!(matches!(
            provider.get_connection("Reporting"),
            Err(ConnectionError::MissingConnectionString(name)) if name == "Reporting"
        ));
        assert!(matches!(
            provider.get_connection("Broken"),
            Err(ConnectionError::Connect { .. })
        ));
        assert_eq!(provider.open_count(), 0);
    }
}
