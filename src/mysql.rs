//! Bridge from connection profiles to sqlx MySQL connect options.
//!
//! Only builds the options; opening and pooling connections stays with the
//! caller.

use serde_json::Value;
use sqlx::mysql::MySqlConnectOptions;

use crate::error::{RegistryError, Result};
use crate::types::ConnectionProfile;

const DEFAULT_PORT: u16 = 3306;

impl ConnectionProfile {
    /// Build [`MySqlConnectOptions`] from the usual profile keys:
    /// `host`, `port`, `unix_socket`, `username`, `password`, `database`,
    /// `charset` and `collation`. Unknown keys are ignored.
    ///
    /// Fails with [`RegistryError::InvalidInput`] if the profile names a
    /// driver other than MySQL/MariaDB or carries a malformed port.
    pub fn to_mysql_options(&self) -> Result<MySqlConnectOptions> {
        if let Some(driver) = self.driver() {
            if !matches!(driver, "mysql" | "mariadb") {
                return Err(RegistryError::invalid_input(format!(
                    "profile driver is not mysql: {driver}"
                )));
            }
        }

        let mut options = MySqlConnectOptions::new()
            .host(self.get_str("host").unwrap_or("127.0.0.1"))
            .port(self.port()?);
        if let Some(socket) = self.get_str("unix_socket") {
            options = options.socket(socket);
        }
        if let Some(user) = self.get_str("username") {
            options = options.username(user);
        }
        if let Some(password) = self.get_str("password").filter(|p| !p.is_empty()) {
            options = options.password(password);
        }
        if let Some(database) = self.get_str("database") {
            options = options.database(database);
        }
        if let Some(charset) = self.get_str("charset") {
            options = options.charset(charset);
        }
        if let Some(collation) = self.get_str("collation") {
            options = options.collation(collation);
        }
        Ok(options)
    }

    fn port(&self) -> Result<u16> {
        let invalid = || RegistryError::invalid_input("profile port must be an integer in 0..=65535");
        match self.get("port") {
            None | Some(Value::Null) => Ok(DEFAULT_PORT),
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|p| u16::try_from(p).ok())
                .ok_or_else(invalid),
            // Config files often quote the port.
            Some(Value::String(s)) => s.trim().parse().map_err(|_| invalid()),
            Some(_) => Err(invalid()),
        }
    }
}
