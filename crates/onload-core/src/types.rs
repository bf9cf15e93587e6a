//! Shared types used across the Onload device plugin crates.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Vendor assigned to Solarflare NICs (Solarflare → Xilinx → AMD).
pub const VENDOR_SFC: &str = "amd";
/// Vendor assigned to NICs accelerated through AF_XDP.
pub const VENDOR_XDP: &str = "xdp";
/// Vendor of the `none` pseudo-device.
pub const VENDOR_NONE: &str = "none";
/// Vendor assigned to kernel PPS / PTP class devices.
pub const VENDOR_TIMEKEEPING: &str = "linux";

/// Interface name of the pseudo-device published when no NIC is found.
pub const DEVICE_NAME_NONE: &str = "none";

/// Group attribute carrying the Onload version.
pub const ATTR_ONLOAD_VERSION: &str = "onload_version";
/// Group attribute carrying the TCPDirect version.
pub const ATTR_ZF_VERSION: &str = "zf_version";

/// Cgroup permissions granted on every device node.
pub const CGROUP_PERMS: &str = "mrw";

/// Device type published to the orchestrator.
///
/// Workloads request devices as `<device_type>`, `<vendor>/<device_type>`
/// or `<vendor>/<device_type>/<model>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceType {
    /// Onload acceleration (`LD_PRELOAD` interception).
    Onload,
    /// TCPDirect only.
    Zf,
    /// Onload plus TCPDirect.
    OnloadZf,
    /// Pulse-per-second timekeeping device.
    Pps,
    /// PTP hardware clock.
    Ptp,
    /// Anything else; never produced by fingerprinting.
    Unrecognized(String),
}

/// Coarse classification of a [`DeviceType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFamily {
    Accelerated,
    Timekeeping,
    Unknown,
}

impl DeviceType {
    pub fn as_str(&self) -> &str {
        match self {
            DeviceType::Onload => "onload",
            DeviceType::Zf => "zf",
            DeviceType::OnloadZf => "onloadzf",
            DeviceType::Pps => "pps",
            DeviceType::Ptp => "ptp",
            DeviceType::Unrecognized(s) => s,
        }
    }

    pub fn family(&self) -> DeviceFamily {
        match self {
            DeviceType::Onload | DeviceType::Zf | DeviceType::OnloadZf => DeviceFamily::Accelerated,
            DeviceType::Pps | DeviceType::Ptp => DeviceFamily::Timekeeping,
            DeviceType::Unrecognized(_) => DeviceFamily::Unknown,
        }
    }

    /// Whether this type uses the TCPDirect libraries and binaries.
    pub fn uses_zf(&self) -> bool {
        matches!(self, DeviceType::Zf | DeviceType::OnloadZf)
    }
}

impl From<&str> for DeviceType {
    fn from(s: &str) -> Self {
        match s {
            "onload" => DeviceType::Onload,
            "zf" => DeviceType::Zf,
            "onloadzf" => DeviceType::OnloadZf,
            "pps" => DeviceType::Pps,
            "ptp" => DeviceType::Ptp,
            other => DeviceType::Unrecognized(other.to_string()),
        }
    }
}

impl From<String> for DeviceType {
    fn from(s: String) -> Self {
        DeviceType::from(s.as_str())
    }
}

impl From<DeviceType> for String {
    fn from(t: DeviceType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A device record produced by fingerprinting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintedDevice {
    /// Unique device ID, `"<interface>-<ordinal>"`.
    pub id: String,
    /// Physical interface (or device node) this pseudo-device maps to.
    pub interface: String,
    pub device_type: DeviceType,
    pub vendor: String,
    /// Hard to know the actual model, so this is the interface name.
    pub model: String,
    /// Empty for devices without a PCI location.
    pub pci_bus_id: String,
}

impl FingerprintedDevice {
    /// Device group key: `"<vendor>/<device_type>/<model>"`.
    pub fn group_key(&self) -> String {
        format!("{}/{}/{}", self.vendor, self.device_type, self.model)
    }
}

/// A single device as advertised inside a [`DeviceGroup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDevice {
    pub id: String,
    pub healthy: bool,
    /// Locality hint for NUMA-aware scheduling.
    pub pci_bus_id: String,
}

/// Devices that are interchangeable for scheduling purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceGroup {
    pub vendor: String,
    pub device_type: DeviceType,
    pub name: String,
    pub devices: Vec<GroupDevice>,
    pub attributes: BTreeMap<String, String>,
}

/// A device node to expose inside the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSpec {
    pub task_path: String,
    pub host_path: String,
    pub cgroup_perms: String,
}

/// A host file or directory bind-mounted into the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    pub task_path: String,
    pub host_path: String,
    pub read_only: bool,
}

/// Everything a task driver needs to hand reserved devices to a workload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationSpec {
    pub devices: Vec<DeviceSpec>,
    pub mounts: Vec<Mount>,
    pub envs: BTreeMap<String, String>,
}

impl ReservationSpec {
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty() && self.mounts.is_empty() && self.envs.is_empty()
    }
}
