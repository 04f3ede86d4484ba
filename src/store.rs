use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{ConnectionProfile, Connections, DEFAULT_CONNECTION_NAME};

/// Named connection profile storage.
///
/// Implementations are plain in-memory maps; lookups never fail, a missing
/// name is reported as `None`.
pub trait ConnectionStore: Send + Sync {
    /// All registered profiles keyed by connection name. Iteration order is
    /// not meaningful.
    fn connections(&self) -> &Connections;

    fn has_connection(&self, name: &str) -> bool;

    fn default_connection_name(&self) -> &str;

    fn connection(&self, name: &str) -> Option<&ConnectionProfile>;

    /// Insert or silently replace the profile stored under `name`.
    fn add_connection(&mut self, profile: ConnectionProfile, name: &str);

    /// Set the default connection name. The name does not have to be
    /// registered yet.
    fn set_default(&mut self, name: &str);

    /// Remove a profile; removing an unknown name is a no-op.
    fn remove_connection(&mut self, name: &str);
}

/// Default [`ConnectionStore`] backed by a `HashMap`.
///
/// Deserialization goes through [`ConnectionsConfig::new`], so restored
/// stores drop empty names and fall back to the `"default"` default name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredConnections")]
pub struct ConnectionsConfig {
    connections: Connections,
    default_connection_name: String,
}

#[derive(Deserialize)]
struct StoredConnections {
    #[serde(default)]
    connections: Connections,
    #[serde(default = "default_connection_name")]
    default_connection_name: String,
}

impl From<StoredConnections> for ConnectionsConfig {
    fn from(stored: StoredConnections) -> Self {
        Self::new(stored.connections, stored.default_connection_name)
    }
}

fn default_connection_name() -> String {
    DEFAULT_CONNECTION_NAME.to_string()
}

impl Default for ConnectionsConfig {
    fn default() -> Self {
        Self::with_connections(Connections::new())
    }
}

impl ConnectionsConfig {
    /// Build a store from existing profiles. An empty default falls back to
    /// [`DEFAULT_CONNECTION_NAME`].
    pub fn new(connections: Connections, default: impl Into<String>) -> Self {
        let mut default = default.into();
        if default.is_empty() {
            default = default_connection_name();
        }
        let mut connections = connections;
        connections.retain(|name, _| !name.is_empty());
        Self {
            connections,
            default_connection_name: default,
        }
    }

    /// Store with the given profiles and the `"default"` default name.
    pub fn with_connections(connections: Connections) -> Self {
        Self::new(connections, DEFAULT_CONNECTION_NAME)
    }

    /// Add a profile under the `"default"` name.
    pub fn add_default_connection(&mut self, profile: ConnectionProfile) {
        self.add_connection(profile, DEFAULT_CONNECTION_NAME);
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl ConnectionStore for ConnectionsConfig {
    fn connections(&self) -> &Connections {
        &self.connections
    }

    fn has_connection(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }

    fn default_connection_name(&self) -> &str {
        &self.default_connection_name
    }

    fn connection(&self, name: &str) -> Option<&ConnectionProfile> {
        self.connections.get(name)
    }

    fn add_connection(&mut self, profile: ConnectionProfile, name: &str) {
        if name.is_empty() {
            debug!("ignoring connection profile with empty name");
            return;
        }
        let replaced = self.connections.insert(name.to_string(), profile).is_some();
        debug!(connection = name, replaced, "connection profile registered");
    }

    fn set_default(&mut self, name: &str) {
        debug!(connection = name, "default connection changed");
        self.default_connection_name = name.to_string();
    }

    fn remove_connection(&mut self, name: &str) {
        if self.connections.remove(name).is_some() {
            debug!(connection = name, "connection profile removed");
        }
    }
}
