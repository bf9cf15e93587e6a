//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::duration::DurationError;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that reject the plugin configuration at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to parse fingerprint period {value:?}: {source}")]
    InvalidPeriod {
        value: String,
        #[source]
        source: DurationError,
    },

    #[error("fingerprint period {0:?} must be greater than zero")]
    NonPositivePeriod(String),
}
