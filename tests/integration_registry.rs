//! End-to-end behavior of the registry built from a configuration, mirroring
//! how a host application wires it at startup.

use anyhow::Result;
use conn_registry::{
    ConfigSource, ConnectionsConfig, DatabaseManager, NamespaceConnections, RegistryError,
    namespace_scope, with_namespace,
};

mod common;
use common::{fixture_config, mysql_profile};

const ROOT: &str = module_path!();

fn app2() -> String {
    format!("{ROOT}::Models::App2")
}

#[test]
fn from_config_exposes_store_and_namespaces() -> Result<()> {
    let config = fixture_config(ROOT);
    let db = DatabaseManager::from_config(config.clone());

    assert_eq!(db.default_connection_name(), "mysql");
    assert_eq!(db.connections(), config.connections);
    assert!(db.has_connection("mysql"));
    assert_eq!(db.namespace_connection(&app2()).as_deref(), Some("app2"));
    assert_eq!(
        db.namespace_connection(&format!("{ROOT}::Models::App1::User")).as_deref(),
        Some("mysql_dev")
    );
    Ok(())
}

#[test]
fn namespace_lookup_returns_bound_profile() -> Result<()> {
    let db = DatabaseManager::from_config(fixture_config(ROOT));
    // The namespace string resolves to `app2`, not to a profile named after it.
    assert_eq!(db.connection(&app2()), Some(mysql_profile("app1")));
    assert_eq!(db.require_connection(&app2())?, mysql_profile("app1"));
    Ok(())
}

#[test]
fn empty_bindings_are_not_mappings() {
    let db = DatabaseManager::from_config(fixture_config(ROOT));
    assert!(db.namespace_connection(&format!("{ROOT}::NotExists::Two::X")).is_none());
    assert!(db.namespace_connection(&format!("{ROOT}::NotExists")).is_none());
    assert!(db.connection(&format!("{ROOT}::NotExists")).is_none());
}

#[test]
fn connection_crud() {
    let db = DatabaseManager::from_config(fixture_config(ROOT));
    assert_eq!(db.connection("new_connect"), Some(mysql_profile("new_connect")));

    db.add_connection(mysql_profile("my"), "new");
    assert_eq!(db.connection("new"), Some(mysql_profile("my")));

    db.set_default("new");
    assert_eq!(db.default_connection_name(), "new");

    db.remove_connection("new");
    assert!(!db.has_connection("new"));
    assert!(db.connection("new").is_none());
    // dangling default is allowed
    assert_eq!(db.default_connection_name(), "new");
}

#[test]
fn namespace_finder_follows_calling_module() {
    let db = DatabaseManager::from_config(fixture_config(ROOT));
    db.add_namespace_connection(ROOT, "new_connect");

    assert_eq!(db.namespace_connection(ROOT).as_deref(), Some("new_connect"));
    assert_eq!(db.connection(ROOT), Some(mysql_profile("new_connect")));

    let _scope = namespace_scope!();
    assert_eq!(db.to_string(), "new_connect");

    db.activate_namespace_finder(false);
    assert!(db.namespace_connection(ROOT).is_none());
    assert!(db.find_namespace_connection_name().is_none());
    assert_eq!(db.to_string(), db.default_connection_name());
    assert_eq!(db.to_string(), "mysql");

    db.activate_namespace_finder(true);
    assert_eq!(db.namespace_connection(&app2()).as_deref(), Some("app2"));
    // the more specific binding still wins over the root binding
    let nested = with_namespace(app2(), || db.to_string());
    assert_eq!(nested, "app2");
}

#[test]
fn settings_source_binds_applications() -> Result<()> {
    let mut databases = conn_registry::Connections::new();
    databases.insert("shop_db".into(), mysql_profile("shop"));
    let config =
        ConfigSource::select(Some((databases, Some("shop_db".into()))), None).into_config();
    let db = DatabaseManager::from_config(config);

    let err = db
        .bind_application("blog", "blog_db", ["blog::models"])
        .unwrap_err();
    assert!(matches!(err, RegistryError::Config(_)));

    db.bind_application("shop", "shop_db", ["shop::models", "shop::jobs"])?;
    let profile = with_namespace("shop::jobs::Nightly", || db.resolved_connection());
    assert_eq!(profile, Some(mysql_profile("shop")));
    Ok(())
}

#[test]
fn manager_without_namespace_table_uses_default() {
    let mut store = ConnectionsConfig::default();
    store.add_default_connection(mysql_profile("main"));
    let db = DatabaseManager::new(store, None);

    let _scope = namespace_scope!();
    assert!(db.find_namespace_connection_name().is_none());
    assert_eq!(db.to_string(), "default");
    assert_eq!(db.resolved_connection(), Some(mysql_profile("main")));

    db.set_namespaces_config(NamespaceConnections::from_pairs([(ROOT, "default")]));
    assert_eq!(db.find_namespace_connection_name().as_deref(), Some("default"));
}
