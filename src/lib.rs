//! Connection registry: named database connection profiles, a default
//! connection, and namespace-based routing of callers to connections.

pub mod config;
pub mod context;
pub mod error;
pub mod manager;
#[cfg(feature = "mysql")]
pub mod mysql;
pub mod namespace;
pub mod store;
pub mod types;

pub use crate::config::{ConfigSource, RegistryConfig};
pub use crate::context::{NamespaceGuard, enter_namespace, scope_namespace, with_namespace};
pub use crate::error::{RegistryError, Result};
pub use crate::manager::DatabaseManager;
pub use crate::namespace::{NamespaceConnections, NamespaceResolver};
pub use crate::store::{ConnectionStore, ConnectionsConfig};
pub use crate::types::{
    ConnectionName, ConnectionProfile, Connections, DEFAULT_CONNECTION_NAME, NamespaceBinding,
};
