//! Probe error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for probe operations.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors returned by the probes.
///
/// `NotFound` and `Malformed` mean the stack or device class is absent
/// as far as fingerprinting is concerned; see [`ProbeError::is_absent`].
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("not found at '{}'", .0.display())]
    NotFound(PathBuf),

    #[error("'{command}' failed to start: {source}")]
    Exec {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}")]
    Failed { command: String, status: String },

    #[error("{tool} output malformed")]
    Malformed { tool: String },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl ProbeError {
    /// True when the error only says the thing probed for isn't there.
    pub fn is_absent(&self) -> bool {
        matches!(self, ProbeError::NotFound(_) | ProbeError::Malformed { .. })
    }
}
