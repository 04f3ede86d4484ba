use thiserror::Error;

/// Common result type used across the crate.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Unified error enum surfaced by the fallible registry APIs.
///
/// Lookups never fail: a missing connection or namespace binding is reported
/// as `None`. Errors only come from configuration loading and wiring.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("config error: {0}")]
    Config(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RegistryError {
    pub fn config(msg: impl Into<String>) -> Self {
        RegistryError::Config(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        RegistryError::InvalidInput(msg.into())
    }
}
