use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, trace};

use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::namespace::{NamespaceConnections, NamespaceResolver};
use crate::store::{ConnectionStore, ConnectionsConfig};
use crate::types::{ConnectionProfile, Connections};

/// Connection registry facade.
///
/// Combines a [`ConnectionStore`] with an optional [`NamespaceResolver`] so
/// callers can ask for a connection either by its name or by a namespace, or
/// let the registry infer the namespace from the ambient frames in
/// [`crate::context`].
///
/// All methods take `&self`; share the manager with `Arc<DatabaseManager>`.
pub struct DatabaseManager {
    config: RwLock<Box<dyn ConnectionStore>>,
    namespaces: RwLock<Option<Box<dyn NamespaceResolver>>>,
    namespace_finder: AtomicBool,
}

impl DatabaseManager {
    pub fn new(
        config: impl ConnectionStore + 'static,
        namespaces: Option<Box<dyn NamespaceResolver>>,
    ) -> Self {
        Self {
            config: RwLock::new(Box::new(config)),
            namespaces: RwLock::new(namespaces),
            namespace_finder: AtomicBool::new(true),
        }
    }

    /// Manager with the given store and an empty namespace table.
    pub fn with_store(config: impl ConnectionStore + 'static) -> Self {
        Self::new(config, Some(Box::new(NamespaceConnections::new())))
    }

    /// Build the store and namespace table from a [`RegistryConfig`].
    pub fn from_config(config: RegistryConfig) -> Self {
        let (store, namespaces) = config.into_parts();
        debug!(
            connections = store.len(),
            namespaces = namespaces.len(),
            default = store.default_connection_name(),
            "connection registry created"
        );
        Self::new(store, Some(Box::new(namespaces)))
    }

    /// Replace the connection store wholesale.
    pub fn set_config(&self, config: impl ConnectionStore + 'static) {
        *self.config_mut() = Box::new(config);
        debug!("connection store replaced");
    }

    /// Replace the namespace resolver wholesale.
    pub fn set_namespaces_config(&self, resolver: impl NamespaceResolver + 'static) {
        *self.namespaces_mut() = Some(Box::new(resolver));
        debug!("namespace resolver replaced");
    }

    /// Run `f` against the installed namespace resolver, if any.
    ///
    /// `f` runs while the resolver's read lock is held: calling
    /// [`add_namespace_connection`](Self::add_namespace_connection) or
    /// [`set_namespaces_config`](Self::set_namespaces_config) on the same
    /// manager from inside `f` deadlocks.
    pub fn with_namespaces_config<T>(&self, f: impl FnOnce(&dyn NamespaceResolver) -> T) -> Option<T> {
        self.namespaces_ref().as_deref().map(|resolver| f(resolver))
    }

    pub fn has_namespaces_config(&self) -> bool {
        self.namespaces_ref().is_some()
    }

    // Connection store

    /// Snapshot of all registered profiles.
    pub fn connections(&self) -> Connections {
        self.config_ref().connections().clone()
    }

    pub fn has_connection(&self, name: &str) -> bool {
        self.config_ref().has_connection(name)
    }

    /// Profile for `name`. If namespace resolution is active and `name`
    /// matches a bound namespace, the bound connection is returned instead.
    pub fn connection(&self, name: &str) -> Option<ConnectionProfile> {
        let resolved = self.namespace_connection(name);
        let name = resolved.as_deref().unwrap_or(name);
        self.config_ref().connection(name).cloned()
    }

    /// Like [`connection`](Self::connection) but reports a missing profile as
    /// [`RegistryError::NotFound`].
    pub fn require_connection(&self, name: &str) -> Result<ConnectionProfile> {
        self.connection(name)
            .ok_or_else(|| RegistryError::NotFound(format!("connection not found: {name}")))
    }

    pub fn add_connection(&self, profile: ConnectionProfile, name: &str) {
        self.config_mut().add_connection(profile, name);
    }

    pub fn remove_connection(&self, name: &str) {
        self.config_mut().remove_connection(name);
    }

    pub fn default_connection_name(&self) -> String {
        self.config_ref().default_connection_name().to_string()
    }

    pub fn set_default(&self, name: &str) {
        self.config_mut().set_default(name);
    }

    // Map-style access, without namespace substitution.

    pub fn contains(&self, name: &str) -> bool {
        self.has_connection(name)
    }

    pub fn get(&self, name: &str) -> Option<ConnectionProfile> {
        self.config_ref().connection(name).cloned()
    }

    pub fn insert(&self, name: &str, profile: ConnectionProfile) {
        self.add_connection(profile, name);
    }

    pub fn remove(&self, name: &str) {
        self.remove_connection(name);
    }

    // Namespace resolution

    /// Bind a namespace prefix to a connection. Installs an empty
    /// [`NamespaceConnections`] table first if no resolver is configured.
    pub fn add_namespace_connection(&self, namespace: &str, connection_name: &str) {
        self.namespaces_mut()
            .get_or_insert_with(|| Box::new(NamespaceConnections::new()) as Box<dyn NamespaceResolver>)
            .add_namespace_connection(namespace, connection_name);
    }

    /// Bind every namespace of an application to `connection_name`.
    ///
    /// Fails with [`RegistryError::Config`] if the connection is not
    /// registered; nothing is bound in that case.
    pub fn bind_application<I, S>(
        &self,
        app_id: &str,
        connection_name: &str,
        namespaces: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !self.has_connection(connection_name) {
            return Err(RegistryError::config(format!(
                "Connection with name [{connection_name}] not found for Application {app_id}!"
            )));
        }
        let mut bound = 0usize;
        for namespace in namespaces {
            self.add_namespace_connection(namespace.as_ref(), connection_name);
            bound += 1;
        }
        debug!(app = app_id, connection = connection_name, bound, "application namespaces bound");
        Ok(())
    }

    /// Enable or disable namespace-based resolution.
    pub fn activate_namespace_finder(&self, enabled: bool) {
        self.namespace_finder.store(enabled, Ordering::Release);
        debug!(enabled, "namespace finder toggled");
    }

    pub fn is_active_namespace_finder(&self) -> bool {
        self.namespace_finder.load(Ordering::Acquire)
    }

    /// Connection bound to `namespace`. Always `None` while the finder is
    /// disabled; an empty connection name counts as no binding.
    pub fn namespace_connection(&self, namespace: &str) -> Option<String> {
        if !self.is_active_namespace_finder() {
            return None;
        }
        self.namespaces_ref()
            .as_deref()?
            .namespace_connection(namespace)
            .filter(|name| !name.is_empty())
    }

    /// Connection bound to the innermost ambient namespace frame. Always
    /// `None` while the finder is disabled.
    pub fn find_namespace_connection_name(&self) -> Option<String> {
        if !self.is_active_namespace_finder() {
            return None;
        }
        self.namespaces_ref()
            .as_deref()?
            .find_namespace_connection_name()
            .filter(|name| !name.is_empty())
    }

    /// The connection name that applies to the current call context: the
    /// ambient namespace binding if there is one, the default otherwise.
    pub fn resolved_connection_name(&self) -> String {
        match self.find_namespace_connection_name() {
            Some(name) => {
                trace!(connection = %name, "resolved connection from namespace");
                name
            }
            None => self.default_connection_name(),
        }
    }

    /// Profile for [`resolved_connection_name`](Self::resolved_connection_name).
    pub fn resolved_connection(&self) -> Option<ConnectionProfile> {
        let name = self.resolved_connection_name();
        self.config_ref().connection(&name).cloned()
    }

    // Poisoning is recovered: the guarded data is plain configuration.

    fn config_ref(&self) -> RwLockReadGuard<'_, Box<dyn ConnectionStore>> {
        self.config.read().unwrap_or_else(|e| e.into_inner())
    }

    fn config_mut(&self) -> RwLockWriteGuard<'_, Box<dyn ConnectionStore>> {
        self.config.write().unwrap_or_else(|e| e.into_inner())
    }

    fn namespaces_ref(&self) -> RwLockReadGuard<'_, Option<Box<dyn NamespaceResolver>>> {
        self.namespaces.read().unwrap_or_else(|e| e.into_inner())
    }

    fn namespaces_mut(&self) -> RwLockWriteGuard<'_, Option<Box<dyn NamespaceResolver>>> {
        self.namespaces.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for DatabaseManager {
    fn default() -> Self {
        Self::with_store(ConnectionsConfig::default())
    }
}

impl From<RegistryConfig> for DatabaseManager {
    fn from(config: RegistryConfig) -> Self {
        Self::from_config(config)
    }
}

/// Formats as [`DatabaseManager::resolved_connection_name`].
impl fmt::Display for DatabaseManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resolved_connection_name())
    }
}

impl fmt::Debug for DatabaseManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (default, connections) = {
            let config = self.config_ref();
            (config.default_connection_name().to_string(), config.connections().len())
        };
        f.debug_struct("DatabaseManager")
            .field("default", &default)
            .field("connections", &connections)
            .field("namespace_finder", &self.is_active_namespace_finder())
            .finish()
    }
}
