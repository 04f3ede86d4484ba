use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{RegistryError, Result};
use crate::namespace::NamespaceConnections;
use crate::store::{ConnectionStore, ConnectionsConfig};
use crate::types::{Connections, DEFAULT_CONNECTION_NAME};

/// Env var holding the path to a JSON registry configuration.
pub const CONFIG_PATH_ENV: &str = "CONN_REGISTRY_CONFIG";
/// Env var overriding the default connection name.
pub const DEFAULT_CONNECTION_ENV: &str = "CONN_REGISTRY_DEFAULT";
/// Env var overriding the namespace search depth.
pub const SEARCH_DEPTH_ENV: &str = "CONN_REGISTRY_SEARCH_DEPTH";

/// Registry configuration as found in a config file:
///
/// ```json
/// {
///   "default": "mysql",
///   "connections": { "mysql": { "driver": "mysql", "database": "app" } },
///   "namespaces": { "app::tenant": "mysql" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default)]
    pub connections: Connections,
    /// Namespace prefix to connection name.
    #[serde(default)]
    pub namespaces: BTreeMap<String, String>,
    /// Namespace separator; `"::"` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_depth: Option<usize>,
}

impl RegistryConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&raw)?;
        debug!(path = %path.display(), "registry config loaded");
        Ok(config)
    }

    /// Load configuration from environment variables:
    /// `CONN_REGISTRY_CONFIG` (path to a JSON file, required),
    /// `CONN_REGISTRY_DEFAULT` and `CONN_REGISTRY_SEARCH_DEPTH` (optional
    /// overrides).
    pub fn from_env() -> Result<Self> {
        let path = require_env(CONFIG_PATH_ENV)?;
        let mut config = Self::from_file(path)?;
        if let Some(default) = env::var(DEFAULT_CONNECTION_ENV).ok().filter(|v| !v.is_empty()) {
            config.default = Some(default);
        }
        if let Some(depth) = parse_env(SEARCH_DEPTH_ENV) {
            config.search_depth = Some(depth);
        }
        Ok(config)
    }

    /// Default connection name, `"default"` when unset or empty.
    pub fn default_connection_name(&self) -> &str {
        self.default
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_CONNECTION_NAME)
    }

    /// Split into the profile store and the namespace table.
    pub fn into_parts(self) -> (ConnectionsConfig, NamespaceConnections) {
        let default = self.default_connection_name().to_string();
        let store = ConnectionsConfig::new(self.connections, default);
        if !store.has_connection(store.default_connection_name()) {
            warn!(
                default = store.default_connection_name(),
                "default connection is not registered"
            );
        }

        let mut namespaces = NamespaceConnections::new();
        if let Some(separator) = self.separator {
            namespaces = namespaces.with_separator(separator);
        }
        if let Some(depth) = self.search_depth {
            namespaces = namespaces.with_search_depth(depth);
        }
        (store, namespaces.with_bindings(self.namespaces))
    }
}

/// Where the connection profiles come from at startup.
///
/// Application settings take priority over the root configuration file; with
/// neither, the registry starts empty with the `"default"` default name.
#[derive(Clone, Debug)]
pub enum ConfigSource {
    /// Profiles managed through application settings, default name stored
    /// separately.
    Settings {
        databases: Connections,
        default: Option<String>,
    },
    /// Database section of the root configuration.
    Root(RegistryConfig),
    Empty,
}

impl ConfigSource {
    pub fn select(
        settings: Option<(Connections, Option<String>)>,
        root: Option<RegistryConfig>,
    ) -> Self {
        match (settings, root) {
            (Some((databases, default)), _) => ConfigSource::Settings { databases, default },
            (None, Some(config)) => ConfigSource::Root(config),
            (None, None) => ConfigSource::Empty,
        }
    }

    pub fn into_config(self) -> RegistryConfig {
        match self {
            ConfigSource::Settings { databases, default } => RegistryConfig {
                default,
                connections: databases,
                ..RegistryConfig::default()
            },
            ConfigSource::Root(config) => config,
            ConfigSource::Empty => RegistryConfig::default(),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    env::var(key).map_err(|_| RegistryError::config(format!("missing env: {key}")))
}

fn parse_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
