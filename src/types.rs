use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Connection name used when none is configured.
pub const DEFAULT_CONNECTION_NAME: &str = "default";

pub type ConnectionName = String;
pub type Connections = HashMap<ConnectionName, ConnectionProfile>;

/// Opaque set of parameters needed to open a database connection
/// (driver, host, credentials, schema, charset, ...).
///
/// The registry never inspects the contents; it only stores and returns
/// profiles by name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionProfile(Map<String, Value>);

impl ConnectionProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chainable setter, mostly useful when building profiles in code.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value for `key`, if present and a JSON string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn driver(&self) -> Option<&str> {
        self.get_str("driver")
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for ConnectionProfile {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

impl TryFrom<Value> for ConnectionProfile {
    type Error = serde_json::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        serde_json::from_value(value)
    }
}

/// A namespace prefix routed to a connection name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceBinding {
    pub namespace: String,
    pub connection: ConnectionName,
}
