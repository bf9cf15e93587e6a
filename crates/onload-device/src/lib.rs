//! onload-device — Onload device plugin core.
//!
//! Discovers Onload/TCPDirect and the NICs and timekeeping devices they
//! can use, publishes them as device groups, and computes the device
//! nodes, mounts and environment a task needs for its reserved devices.
//!
//! # Architecture
//!
//! ```text
//! OnloadDevicePlugin
//!   ├── fingerprint() → background task, one pass per period
//!   │   ├── Fingerprinter::collect() → Probe (versions, NICs, PPS, PTP)
//!   │   ├── pseudo-device expansion + ignore filter
//!   │   ├── Inventory::replace() → changed?
//!   │   └── DeviceGroups → mpsc stream (only on change)
//!   └── reserve(ids) → Inventory::lookup() → ReservationSpec
//! ```
//!
//! The fingerprint task is the only inventory writer; reservations only
//! read it.

pub mod error;
pub mod fingerprint;
pub mod inventory;
pub mod plugin;
pub mod reserve;

pub use error::{FingerprintError, ReserveError, ReserveResult};
pub use fingerprint::{FingerprintData, FingerprintResponse, Fingerprinter};
pub use inventory::Inventory;
pub use plugin::{OnloadDevicePlugin, PLUGIN_NAME, PLUGIN_VERSION, PluginInfo};
pub use reserve::build_reservation;
