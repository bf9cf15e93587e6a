//! Fingerprint and reservation error types.

use thiserror::Error;

/// A fingerprint pass that could not be assembled.
///
/// Reported on the fingerprint stream; the loop carries on with the next
/// tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FingerprintError {
    #[error("duplicate device ID: {0}")]
    DuplicateDevice(String),

    #[error("fingerprint pass failed: {0}")]
    PassFailed(String),
}

/// Errors returned from [`crate::OnloadDevicePlugin::reserve`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReserveError {
    /// Every requested ID that is not in the current inventory.
    #[error("unknown device IDs: {}", .0.join(","))]
    UnknownDevices(Vec<String>),
}

pub type ReserveResult<T> = Result<T, ReserveError>;
