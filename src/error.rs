//! Configuration error types.

use std::path::PathBuf;

/// Errors raised while building the flat namespace or reconciling it into a target.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration value: {key} ({type_name})")]
    MissingRequired {
        key: String,
        type_name: &'static str,
    },

    #[error("invalid value {value:?} for {key} ({type_name}): {reason}")]
    InvalidValue {
        key: String,
        type_name: &'static str,
        value: String,
        reason: String,
    },

    #[error("configuration file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON file {} must contain an object at the top level", path.display())]
    JsonNotObject { path: PathBuf },

    #[error("failed to parse TOML file {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse env file {}: {message}", path.display())]
    EnvFile { path: PathBuf, message: String },

    #[error("configuration resource failed: {0}")]
    Resource(String),
}

impl ConfigError {
    /// The flattened key this error refers to, when there is one.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::MissingRequired { key, .. } | Self::InvalidValue { key, .. } => Some(key),
            _ => None,
        }
    }
}

/// Result alias used throughout the crate.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Failure to coerce a single string token into a typed value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct CoerceError(pub String);

impl CoerceError {
    pub fn new(reason: impl std::fmt::Display) -> Self {
        Self(reason.to_string())
    }
}
