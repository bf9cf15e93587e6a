//! Fingerprinting — turns probe results into device groups.
//!
//! A pass probes the host, expands every interface into pseudo-devices
//! (one per device type and sharing slot), drops ignored interfaces,
//! swaps the result into the [`Inventory`], and only when the set of
//! device IDs changed builds the device groups for the orchestrator.
//!
//! Device groups are keyed `"<vendor>/<device_type>/<model>"`, where the
//! model is the interface name, so a task can ask for `onload`,
//! `amd/onload` or `amd/onload/eth0`.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use onload_core::{
    ATTR_ONLOAD_VERSION, ATTR_ZF_VERSION, DEVICE_NAME_NONE, DeviceGroup, DeviceType,
    FingerprintedDevice, GroupDevice, PluginConfig, VENDOR_NONE, VENDOR_SFC, VENDOR_TIMEKEEPING,
    VENDOR_XDP,
};
use onload_probe::{DeviceInfo, Probe, ProbeError};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::error::FingerprintError;
use crate::inventory::Inventory;

/// One message on the fingerprint stream.
#[derive(Debug, Clone, PartialEq)]
pub enum FingerprintResponse {
    /// The full set of device groups after a change.
    Groups(Vec<DeviceGroup>),
    /// The pass could not be assembled.
    Error(FingerprintError),
}

/// Result of probing and expanding, before ignore filtering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FingerprintData {
    pub devices: Vec<FingerprintedDevice>,
    pub onload_version: Option<String>,
    pub zf_version: Option<String>,
}

/// Runs fingerprint passes against a [`Probe`] and owns inventory writes.
pub struct Fingerprinter {
    config: Arc<PluginConfig>,
    ignored: HashSet<String>,
    probe: Arc<dyn Probe>,
    inventory: Inventory,
}

impl Fingerprinter {
    pub fn new(config: Arc<PluginConfig>, probe: Arc<dyn Probe>, inventory: Inventory) -> Self {
        let ignored = config.ignored_interface_set();
        Self {
            config,
            ignored,
            probe,
            inventory,
        }
    }

    /// Probe the host and expand everything found into pseudo-devices.
    pub fn collect(&self) -> FingerprintData {
        let onload_version = self
            .probe
            .onload_version(Path::new(&self.config.host_onload_bin_path))
            .inspect_err(|e| log_probe_error("Onload", e))
            .ok();
        let zf_version = self
            .probe
            .zf_version(Path::new(&self.config.host_zf_bin_path))
            .inspect_err(|e| log_probe_error("TCPDirect", e))
            .ok();

        let device_types = eligible_device_types(onload_version.is_some(), zf_version.is_some());
        let mut devices = Vec::new();

        for (vendor, nic) in self.probe_nics() {
            // Ordinals continue across device types so IDs stay unique.
            let mut next_ordinal = 0;
            for device_type in &device_types {
                info!(device_type = %device_type, iface = %nic.interface, "fingerprinted NIC device");
                devices.extend(make_pseudo_devices(
                    self.config.num_pseudo_nic,
                    next_ordinal,
                    device_type,
                    vendor,
                    &nic,
                ));
                next_ordinal += self.config.num_pseudo_nic;
            }
        }

        if self.config.probe_pps {
            devices.extend(self.timekeeping_devices(
                DeviceType::Pps,
                self.probe.pps_devices(),
                self.config.num_pseudo_pps,
            ));
        }
        if self.config.probe_ptp {
            devices.extend(self.timekeeping_devices(
                DeviceType::Ptp,
                self.probe.ptp_devices(),
                self.config.num_pseudo_ptp,
            ));
        }

        FingerprintData {
            devices,
            onload_version,
            zf_version,
        }
    }

    /// Run one pass. Returns `None` when the device set is unchanged.
    ///
    /// IDs must be unique once ignored interfaces are dropped; otherwise
    /// the pass fails and the inventory is left as it was.
    pub fn reconcile(&self) -> Option<FingerprintResponse> {
        let data = self.collect();
        debug!(
            devices = data.devices.len(),
            onload = data.onload_version.as_deref().unwrap_or(""),
            zf = data.zf_version.as_deref().unwrap_or(""),
            "fingerprint results"
        );

        let devices = filter_ignored(data.devices, &self.ignored);
        if let Err(e) = ensure_unique_ids(&devices) {
            error!(error = %e, "failed to fingerprint onload devices");
            return Some(FingerprintResponse::Error(e));
        }
        if !self.inventory.replace(devices.clone()) {
            return None;
        }

        let groups = build_device_groups(
            &devices,
            data.onload_version.as_deref(),
            data.zf_version.as_deref(),
        );
        info!(groups = groups.len(), devices = devices.len(), "device set changed");
        Some(FingerprintResponse::Groups(groups))
    }

    /// NICs from every enabled probe, or the `none` pseudo-NIC.
    fn probe_nics(&self) -> Vec<(&'static str, DeviceInfo)> {
        let mut nics: Vec<(&'static str, DeviceInfo)> = Vec::new();

        if self.config.probe_sfc {
            match self.probe.sfc_nics() {
                Ok(found) => nics.extend(found.into_iter().map(|n| (VENDOR_SFC, n))),
                Err(e) => log_probe_error("SFC NICs", &e),
            }
        }
        if self.config.probe_xdp {
            match self.probe.xdp_nics() {
                Ok(found) => {
                    for nic in found {
                        if nics.iter().any(|(_, n)| n.interface == nic.interface) {
                            continue;
                        }
                        nics.push((VENDOR_XDP, nic));
                    }
                }
                Err(e) => log_probe_error("XDP NICs", &e),
            }
        }

        // Onload is usable without an accelerated NIC, so publish "none"
        // to keep plain `<device_type>` requests schedulable.
        if nics.is_empty() {
            nics.push((
                VENDOR_NONE,
                DeviceInfo {
                    interface: DEVICE_NAME_NONE.to_string(),
                    pci_bus_id: String::new(),
                },
            ));
        }
        nics
    }

    fn timekeeping_devices(
        &self,
        device_type: DeviceType,
        probed: Result<Vec<DeviceInfo>, ProbeError>,
        count: u32,
    ) -> Vec<FingerprintedDevice> {
        let found = match probed {
            Ok(found) => found,
            Err(e) => {
                log_probe_error(device_type.as_str(), &e);
                return Vec::new();
            }
        };

        let mut devices = Vec::new();
        for dev in &found {
            info!(device_type = %device_type, iface = %dev.interface, "fingerprinted timekeeping device");
            devices.extend(make_pseudo_devices(count, 0, &device_type, VENDOR_TIMEKEEPING, dev));
        }
        devices
    }
}

/// Device types that can be offered given which stacks are installed.
pub fn eligible_device_types(has_onload: bool, has_zf: bool) -> Vec<DeviceType> {
    match (has_onload, has_zf) {
        (true, true) => vec![DeviceType::Onload, DeviceType::Zf, DeviceType::OnloadZf],
        (true, false) => vec![DeviceType::Onload],
        (false, _) => Vec::new(),
    }
}

/// `count` pseudo-devices for non-exclusive access to one interface, with
/// IDs `"<interface>-<ordinal>"` starting at `first_ordinal`.
pub fn make_pseudo_devices(
    count: u32,
    first_ordinal: u32,
    device_type: &DeviceType,
    vendor: &str,
    info: &DeviceInfo,
) -> Vec<FingerprintedDevice> {
    (first_ordinal..first_ordinal + count)
        .map(|ordinal| FingerprintedDevice {
            id: format!("{}-{}", info.interface, ordinal),
            interface: info.interface.clone(),
            device_type: device_type.clone(),
            vendor: vendor.to_string(),
            model: info.interface.clone(),
            pci_bus_id: info.pci_bus_id.clone(),
        })
        .collect()
}

/// Drop devices whose physical interface is ignored.
pub fn filter_ignored(
    devices: Vec<FingerprintedDevice>,
    ignored: &HashSet<String>,
) -> Vec<FingerprintedDevice> {
    devices
        .into_iter()
        .filter(|d| !ignored.contains(&d.interface))
        .collect()
}

/// Group devices by [`FingerprintedDevice::group_key`], ordered by key.
///
/// Every group carries the Onload and TCPDirect versions, empty when the
/// stack was not found.
pub fn build_device_groups(
    devices: &[FingerprintedDevice],
    onload_version: Option<&str>,
    zf_version: Option<&str>,
) -> Vec<DeviceGroup> {
    let common_attributes = BTreeMap::from([
        (ATTR_ONLOAD_VERSION.to_string(), onload_version.unwrap_or_default().to_string()),
        (ATTR_ZF_VERSION.to_string(), zf_version.unwrap_or_default().to_string()),
    ]);

    let mut by_key: BTreeMap<String, Vec<&FingerprintedDevice>> = BTreeMap::new();
    for device in devices {
        by_key.entry(device.group_key()).or_default().push(device);
    }

    by_key
        .into_values()
        .filter_map(|members| {
            let first = members.first()?;
            Some(DeviceGroup {
                vendor: first.vendor.clone(),
                device_type: first.device_type.clone(),
                name: first.model.clone(),
                devices: members
                    .iter()
                    .map(|d| GroupDevice {
                        id: d.id.clone(),
                        // All fingerprinted devices are healthy for now.
                        healthy: true,
                        pci_bus_id: d.pci_bus_id.clone(),
                    })
                    .collect(),
                attributes: common_attributes.clone(),
            })
        })
        .collect()
}

fn ensure_unique_ids(devices: &[FingerprintedDevice]) -> Result<(), FingerprintError> {
    let mut seen = HashSet::with_capacity(devices.len());
    for device in devices {
        if !seen.insert(device.id.as_str()) {
            return Err(FingerprintError::DuplicateDevice(device.id.clone()));
        }
    }
    Ok(())
}

fn log_probe_error(what: &str, err: &ProbeError) {
    if err.is_absent() {
        info!(error = %err, "{what} not found");
    } else {
        warn!(error = %err, "issue probing {what}");
    }
}

/// The fingerprint loop: first pass immediately, then one per `period`.
///
/// Shutdown is only observed between passes. On shutdown, or when the
/// receiving side is dropped, the loop returns and drops `tx`, which
/// closes the stream.
pub(crate) async fn run_fingerprint_loop(
    fingerprinter: Arc<Fingerprinter>,
    period: Duration,
    tx: mpsc::Sender<FingerprintResponse>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(period_ms = period.as_millis() as u64, "fingerprint loop starting");
    let mut delay = Duration::ZERO;

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                // Value changed but shutdown not requested.
                continue;
            }
            _ = tokio::time::sleep(delay) => {}
        }
        delay = period;

        let pass = fingerprinter.clone();
        let outcome = match tokio::task::spawn_blocking(move || pass.reconcile()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "fingerprint pass aborted");
                Some(FingerprintResponse::Error(FingerprintError::PassFailed(e.to_string())))
            }
        };

        if *shutdown.borrow() {
            break;
        }
        if let Some(response) = outcome {
            if tx.send(response).await.is_err() {
                debug!("fingerprint consumer gone");
                break;
            }
        }
    }

    debug!("fingerprint loop shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use onload_probe::ProbeResult;

    #[derive(Default)]
    struct StaticProbe {
        onload: Option<&'static str>,
        zf: Option<&'static str>,
        sfc: Vec<DeviceInfo>,
        xdp: Vec<DeviceInfo>,
        pps: Vec<DeviceInfo>,
        ptp: Option<Vec<DeviceInfo>>,
    }

    impl Probe for StaticProbe {
        fn onload_version(&self, bin_dir: &Path) -> ProbeResult<String> {
            self.onload
                .map(str::to_string)
                .ok_or_else(|| ProbeError::NotFound(bin_dir.join("onload")))
        }
        fn zf_version(&self, bin_dir: &Path) -> ProbeResult<String> {
            self.zf
                .map(str::to_string)
                .ok_or_else(|| ProbeError::NotFound(bin_dir.join("zf_stackdump")))
        }
        fn sfc_nics(&self) -> ProbeResult<Vec<DeviceInfo>> {
            Ok(self.sfc.clone())
        }
        fn xdp_nics(&self) -> ProbeResult<Vec<DeviceInfo>> {
            Ok(self.xdp.clone())
        }
        fn pps_devices(&self) -> ProbeResult<Vec<DeviceInfo>> {
            Ok(self.pps.clone())
        }
        fn ptp_devices(&self) -> ProbeResult<Vec<DeviceInfo>> {
            self.ptp
                .clone()
                .ok_or_else(|| ProbeError::NotFound("/sys/class/ptp".into()))
        }
    }

    fn nic(iface: &str, pci: &str) -> DeviceInfo {
        DeviceInfo {
            interface: iface.to_string(),
            pci_bus_id: pci.to_string(),
        }
    }

    fn fingerprinter(config: PluginConfig, probe: StaticProbe) -> (Fingerprinter, Inventory) {
        let inventory = Inventory::new();
        let fp = Fingerprinter::new(Arc::new(config), Arc::new(probe), inventory.clone());
        (fp, inventory)
    }

    fn ids(devices: &[FingerprintedDevice]) -> Vec<&str> {
        devices.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn eligibility_needs_onload() {
        assert!(eligible_device_types(false, false).is_empty());
        assert!(eligible_device_types(false, true).is_empty());
        assert_eq!(eligible_device_types(true, false), vec![DeviceType::Onload]);
        assert_eq!(eligible_device_types(true, true).len(), 3);
    }

    #[test]
    fn pseudo_device_ids() {
        let devs = make_pseudo_devices(3, 2, &DeviceType::Zf, VENDOR_SFC, &nic("eth1", "0000:b1:00.1"));
        assert_eq!(ids(&devs), vec!["eth1-2", "eth1-3", "eth1-4"]);
        assert!(devs.iter().all(|d| d.model == "eth1" && d.interface == "eth1"));
        assert!(make_pseudo_devices(0, 0, &DeviceType::Zf, VENDOR_SFC, &nic("eth1", "")).is_empty());
    }

    #[test]
    fn ordinals_continue_across_device_types() {
        let config = PluginConfig {
            num_pseudo_nic: 2,
            ..PluginConfig::default()
        };
        let probe = StaticProbe {
            onload: Some("8.1.0"),
            zf: Some("8.1.0"),
            sfc: vec![nic("eth0", "0000:b1:00.0")],
            ..StaticProbe::default()
        };
        let (fp, _) = fingerprinter(config, probe);
        let data = fp.collect();

        assert_eq!(
            ids(&data.devices),
            vec!["eth0-0", "eth0-1", "eth0-2", "eth0-3", "eth0-4", "eth0-5"]
        );
        assert_eq!(data.devices[0].device_type, DeviceType::Onload);
        assert_eq!(data.devices[2].device_type, DeviceType::Zf);
        assert_eq!(data.devices[5].device_type, DeviceType::OnloadZf);
    }

    #[test]
    fn no_nic_publishes_none_device() {
        let probe = StaticProbe {
            onload: Some("7.1.0"),
            ..StaticProbe::default()
        };
        let (fp, _) = fingerprinter(PluginConfig::default(), probe);
        let data = fp.collect();

        assert_eq!(ids(&data.devices), vec!["none-0"]);
        assert_eq!(data.devices[0].vendor, VENDOR_NONE);
        assert!(data.devices[0].pci_bus_id.is_empty());
    }

    #[test]
    fn xdp_skips_interfaces_already_found_by_sfc() {
        let config = PluginConfig {
            probe_xdp: true,
            ..PluginConfig::default()
        };
        let probe = StaticProbe {
            onload: Some("8.1.0"),
            sfc: vec![nic("eth0", "0000:b1:00.0")],
            xdp: vec![nic("eth0", "0000:b1:00.0"), nic("eth2", "0000:04:00.0")],
            ..StaticProbe::default()
        };
        let (fp, _) = fingerprinter(config, probe);
        let data = fp.collect();

        let vendors: Vec<(&str, &str)> = data
            .devices
            .iter()
            .map(|d| (d.id.as_str(), d.vendor.as_str()))
            .collect();
        assert_eq!(vendors, vec![("eth0-0", VENDOR_SFC), ("eth2-0", VENDOR_XDP)]);
    }

    #[test]
    fn disabled_probes_are_not_consulted() {
        let config = PluginConfig {
            probe_sfc: false,
            ..PluginConfig::default()
        };
        let probe = StaticProbe {
            onload: Some("8.1.0"),
            sfc: vec![nic("eth0", "0000:b1:00.0")],
            pps: vec![nic("pps0", "")],
            ..StaticProbe::default()
        };
        let (fp, _) = fingerprinter(config, probe);
        assert_eq!(ids(&fp.collect().devices), vec!["none-0"]);
    }

    #[test]
    fn timekeeping_devices_are_independent_of_onload() {
        let config = PluginConfig {
            probe_pps: true,
            probe_ptp: true,
            num_pseudo_pps: 2,
            ..PluginConfig::default()
        };
        let probe = StaticProbe {
            pps: vec![nic("pps0", "")],
            ptp: None,
            ..StaticProbe::default()
        };
        let (fp, _) = fingerprinter(config, probe);
        let data = fp.collect();

        assert_eq!(ids(&data.devices), vec!["pps0-0", "pps0-1"]);
        assert!(data.devices.iter().all(|d| d.device_type == DeviceType::Pps));
        assert!(data.devices.iter().all(|d| d.vendor == VENDOR_TIMEKEEPING));
        assert_eq!(data.onload_version, None);
    }

    #[test]
    fn duplicate_ids_fail_the_pass() {
        let config = PluginConfig {
            probe_ptp: true,
            ..PluginConfig::default()
        };
        let probe = StaticProbe {
            onload: Some("8.1.0"),
            sfc: vec![nic("ptp0", "0000:b1:00.0")],
            ptp: Some(vec![nic("ptp0", "0000:b1:00.0")]),
            ..StaticProbe::default()
        };
        let (fp, inventory) = fingerprinter(config, probe);

        assert_eq!(
            fp.reconcile(),
            Some(FingerprintResponse::Error(FingerprintError::DuplicateDevice(
                "ptp0-0".to_string()
            )))
        );
        assert!(inventory.is_empty());
    }

    #[test]
    fn ignoring_a_clashing_interface_clears_the_duplicate() {
        let config = PluginConfig {
            probe_ptp: true,
            ignored_interfaces: vec!["ptp0".to_string()],
            ..PluginConfig::default()
        };
        let probe = StaticProbe {
            onload: Some("8.1.0"),
            sfc: vec![nic("eth0", "0000:b1:00.0"), nic("ptp0", "0000:b1:00.1")],
            ptp: Some(vec![nic("ptp0", "0000:b1:00.1")]),
            ..StaticProbe::default()
        };
        let (fp, inventory) = fingerprinter(config, probe);

        let groups = match fp.reconcile() {
            Some(FingerprintResponse::Groups(groups)) => groups,
            other => panic!("expected device groups, got {other:?}"),
        };
        let published: Vec<&str> = groups
            .iter()
            .flat_map(|g| g.devices.iter().map(|d| d.id.as_str()))
            .collect();
        assert_eq!(published, vec!["eth0-0"]);
        assert_eq!(inventory.len(), 1);
    }

    #[test]
    fn ignored_interfaces_filtered_by_physical_name() {
        let devices: Vec<_> = make_pseudo_devices(2, 0, &DeviceType::Onload, VENDOR_SFC, &nic("eth0", ""))
            .into_iter()
            .chain(make_pseudo_devices(1, 0, &DeviceType::Onload, VENDOR_SFC, &nic("eth1", "")))
            .collect();
        let ignored = HashSet::from(["eth0".to_string(), "eth0-1".to_string()]);
        assert_eq!(ids(&filter_ignored(devices, &ignored)), vec!["eth1-0"]);
    }

    #[test]
    fn groups_keyed_by_vendor_type_model() {
        let mut devices = make_pseudo_devices(2, 0, &DeviceType::Onload, VENDOR_SFC, &nic("eth1", ""));
        devices.extend(make_pseudo_devices(2, 0, &DeviceType::Onload, VENDOR_SFC, &nic("eth0", "")));
        devices.extend(make_pseudo_devices(1, 2, &DeviceType::Zf, VENDOR_SFC, &nic("eth0", "")));

        let groups = build_device_groups(&devices, Some("8.1.0"), None);
        let summary: Vec<(String, Vec<&str>)> = groups
            .iter()
            .map(|g| {
                (
                    format!("{}/{}/{}", g.vendor, g.device_type, g.name),
                    g.devices.iter().map(|d| d.id.as_str()).collect(),
                )
            })
            .collect();

        assert_eq!(
            summary,
            vec![
                ("amd/onload/eth0".to_string(), vec!["eth0-0", "eth0-1"]),
                ("amd/onload/eth1".to_string(), vec!["eth1-0", "eth1-1"]),
                ("amd/zf/eth0".to_string(), vec!["eth0-2"]),
            ]
        );
        assert_eq!(groups[0].attributes[ATTR_ONLOAD_VERSION], "8.1.0");
        assert_eq!(groups[0].attributes[ATTR_ZF_VERSION], "");
        assert!(groups.iter().flat_map(|g| &g.devices).all(|d| d.healthy));
    }

    #[test]
    fn no_groups_for_no_devices() {
        assert!(build_device_groups(&[], Some("8.1.0"), Some("8.1.0")).is_empty());
    }

    #[test]
    fn reconcile_reports_only_changes() {
        let probe = StaticProbe {
            onload: Some("7.1.0"),
            sfc: vec![nic("eth0", "0000:b1:00.0")],
            ..StaticProbe::default()
        };
        let (fp, inventory) = fingerprinter(PluginConfig::default(), probe);

        assert!(matches!(fp.reconcile(), Some(FingerprintResponse::Groups(_))));
        assert_eq!(inventory.len(), 1);
        assert_eq!(fp.reconcile(), None);
        assert_eq!(inventory.len(), 1);
    }
}
