//! onload-core — types and configuration shared by the Onload device
//! plugin crates.
//!
//! Holds the device model published to the orchestrator (device types,
//! fingerprinted devices, device groups), the reservation spec handed to
//! task drivers, and the plugin configuration with its Go-style duration
//! strings.

pub mod config;
pub mod duration;
pub mod error;
pub mod types;

pub use config::PluginConfig;
pub use duration::{DurationError, parse_duration};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
