//! OnloadDevicePlugin — the device plugin facade.
//!
//! Owns the configuration, the inventory and the fingerprinter. The
//! orchestrator consumes [`OnloadDevicePlugin::fingerprint`] as a stream
//! and calls [`OnloadDevicePlugin::reserve`] before starting a task.

use std::sync::Arc;
use std::time::Duration;

use onload_core::{ConfigResult, PluginConfig, ReservationSpec};
use onload_probe::Probe;
use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::error::{ReserveError, ReserveResult};
use crate::fingerprint::{FingerprintResponse, Fingerprinter, run_fingerprint_loop};
use crate::inventory::Inventory;
use crate::reserve::build_reservation;

/// Name used for logging and to identify the plugin binary.
pub const PLUGIN_NAME: &str = "onload";

/// Lets the client identify newer versions of an installed plugin.
pub const PLUGIN_VERSION: &str = "v0.1.0";

/// Buffered fingerprint messages before the loop waits on the consumer.
const FINGERPRINT_CHANNEL_CAPACITY: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub name: &'static str,
    pub version: &'static str,
}

pub struct OnloadDevicePlugin {
    config: Arc<PluginConfig>,
    fingerprint_period: Duration,
    inventory: Inventory,
    fingerprinter: Arc<Fingerprinter>,
}

impl OnloadDevicePlugin {
    /// Validate `config` and build the plugin.
    ///
    /// A malformed `fingerprint_period` is rejected here, before any
    /// fingerprinting starts.
    pub fn new(config: PluginConfig, probe: Arc<dyn Probe>) -> ConfigResult<Self> {
        let fingerprint_period = config.fingerprint_period()?;
        info!(?config, "config set");

        let config = Arc::new(config);
        let inventory = Inventory::new();
        let fingerprinter = Arc::new(Fingerprinter::new(config.clone(), probe, inventory.clone()));

        Ok(Self {
            config,
            fingerprint_period,
            inventory,
            fingerprinter,
        })
    }

    pub fn plugin_info(&self) -> PluginInfo {
        PluginInfo {
            name: PLUGIN_NAME,
            version: PLUGIN_VERSION,
        }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn fingerprint_period(&self) -> Duration {
        self.fingerprint_period
    }

    /// Read access to the current inventory.
    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Start the fingerprint loop and return its stream.
    ///
    /// A message is sent only when the device set changes or a pass
    /// fails. The stream closes once `shutdown` is set to `true` (or its
    /// sender is dropped). Must be called within a tokio runtime.
    pub fn fingerprint(&self, shutdown: watch::Receiver<bool>) -> mpsc::Receiver<FingerprintResponse> {
        let (tx, rx) = mpsc::channel(FINGERPRINT_CHANNEL_CAPACITY);
        tokio::spawn(run_fingerprint_loop(
            self.fingerprinter.clone(),
            self.fingerprint_period,
            tx,
            shutdown,
        ));
        rx
    }

    /// Run a single fingerprint pass on the calling thread.
    pub fn fingerprint_once(&self) -> Option<FingerprintResponse> {
        self.fingerprinter.reconcile()
    }

    /// Resources a task needs to use `device_ids`.
    ///
    /// Every ID must be in the current inventory; otherwise all unknown
    /// IDs are returned together and nothing is reserved. This catches
    /// devices that disappeared after scheduling but before the
    /// orchestrator saw the updated fingerprint.
    pub fn reserve(&self, device_ids: &[String]) -> ReserveResult<ReservationSpec> {
        if device_ids.is_empty() {
            info!("no onload devices requested");
            return Ok(ReservationSpec::default());
        }

        let devices = self
            .inventory
            .lookup(device_ids)
            .map_err(ReserveError::UnknownDevices)?;
        Ok(build_reservation(&self.config, &devices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onload_core::ConfigError;
    use onload_probe::SystemProbe;

    #[test]
    fn invalid_period_rejected_at_construction() {
        let config = PluginConfig {
            fingerprint_period: "soon".to_string(),
            ..PluginConfig::default()
        };
        let err = OnloadDevicePlugin::new(config, Arc::new(SystemProbe::default()))
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::InvalidPeriod { .. }));
    }

    #[test]
    fn plugin_info_and_period() {
        let config = PluginConfig {
            fingerprint_period: "30s".to_string(),
            ..PluginConfig::default()
        };
        let plugin = OnloadDevicePlugin::new(config, Arc::new(SystemProbe::default())).unwrap();
        assert_eq!(plugin.fingerprint_period(), Duration::from_secs(30));
        assert_eq!(plugin.plugin_info().name, "onload");
        assert_eq!(plugin.plugin_info().version, "v0.1.0");
        assert!(plugin.inventory().is_empty());
    }

    #[test]
    fn empty_reservation_needs_no_inventory() {
        let plugin =
            OnloadDevicePlugin::new(PluginConfig::default(), Arc::new(SystemProbe::default())).unwrap();
        assert_eq!(plugin.reserve(&[]).unwrap(), ReservationSpec::default());
    }

    #[test]
    fn unknown_ids_rejected_on_empty_inventory() {
        let plugin =
            OnloadDevicePlugin::new(PluginConfig::default(), Arc::new(SystemProbe::default())).unwrap();
        let err = plugin.reserve(&["eth0-0".to_string()]).unwrap_err();
        assert_eq!(err.to_string(), "unknown device IDs: eth0-0");
    }
}
