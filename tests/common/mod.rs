#![allow(dead_code)]

use conn_registry::{ConnectionProfile, RegistryConfig};
use serde_json::json;

/// MySQL profile shaped like the ones stored by the settings backend.
pub fn mysql_profile(database: &str) -> ConnectionProfile {
    ConnectionProfile::try_from(json!({
        "driver": "mysql",
        "database": database,
        "username": "root",
        "password": "toor",
        "charset": "utf8mb4",
        "collation": "utf8mb4_unicode_ci",
        "prefix": ""
    }))
    .expect("profile fixture is a JSON object")
}

/// Four connections with `mysql` as default, and namespace bindings under
/// `root` (pass `module_path!()` of the calling test).
pub fn fixture_config(root: &str) -> RegistryConfig {
    let value = json!({
        "default": "mysql",
        "connections": {
            "mysql": mysql_profile("database"),
            "mysql_dev": mysql_profile("database_dev"),
            "app2": mysql_profile("app1"),
            "new_connect": mysql_profile("new_connect")
        },
        "namespaces": {
            format!("{root}::NotExists::"): "",
            format!("{root}::NotExists::Two"): "",
            format!("{root}::Models::App1"): "mysql_dev",
            format!("{root}::Models::App2"): "app2"
        }
    });
    serde_json::from_value(value).expect("fixture config deserializes")
}
