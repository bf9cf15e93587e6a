//! Plugin configuration parser.
//!
//! Every key is optional; missing keys take the defaults below, which
//! match a stock Onload install on x86_64 Debian/Ubuntu.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;
use crate::error::{ConfigError, ConfigResult};

const DEFAULT_LIB_PATH: &str = "/usr/lib/x86_64-linux-gnu";
const DEFAULT_BIN_PATH: &str = "/usr/bin";
const DEFAULT_DEVICE_PATH: &str = "/dev";
const DEFAULT_PROFILE_DIR_PATH: &str = "/usr/libexec/onload/profiles";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Probe Solarflare NICs with `lshw`.
    pub probe_sfc: bool,
    /// Probe PCI NICs usable through AF_XDP.
    pub probe_xdp: bool,
    /// Probe `/sys/class/pps` devices.
    pub probe_pps: bool,
    /// Probe `/sys/class/ptp` devices.
    pub probe_ptp: bool,

    /// Pseudo-devices published per NIC and device type.
    pub num_pseudo_nic: u32,
    pub num_pseudo_pps: u32,
    pub num_pseudo_ptp: u32,

    /// Set `LD_PRELOAD` to `libonload.so` in the task.
    pub set_preload: bool,
    /// Mount the Onload binaries and profiles into the task.
    pub mount_onload: bool,
    /// Interfaces never exposed. Include `none` to suppress that pseudo-device.
    pub ignored_interfaces: Vec<String>,

    pub task_device_path: String,
    pub host_device_path: String,
    pub task_onload_lib_path: String,
    pub host_onload_lib_path: String,
    pub task_onload_bin_path: String,
    pub host_onload_bin_path: String,
    pub task_profile_dir_path: String,
    pub host_profile_dir_path: String,
    pub task_zf_bin_path: String,
    pub host_zf_bin_path: String,
    pub task_zf_lib_path: String,
    pub host_zf_lib_path: String,

    /// Period between fingerprint passes, e.g. `"1m"` or `"30s"`.
    pub fingerprint_period: String,

    /// Root of the sysfs tree used for XDP and timekeeping enumeration.
    pub sysfs_root: PathBuf,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            probe_sfc: true,
            probe_xdp: false,
            probe_pps: false,
            probe_ptp: false,
            num_pseudo_nic: 1,
            num_pseudo_pps: 1,
            num_pseudo_ptp: 1,
            set_preload: true,
            mount_onload: false,
            ignored_interfaces: Vec::new(),
            task_device_path: DEFAULT_DEVICE_PATH.to_string(),
            host_device_path: DEFAULT_DEVICE_PATH.to_string(),
            task_onload_lib_path: DEFAULT_LIB_PATH.to_string(),
            host_onload_lib_path: DEFAULT_LIB_PATH.to_string(),
            task_onload_bin_path: DEFAULT_BIN_PATH.to_string(),
            host_onload_bin_path: DEFAULT_BIN_PATH.to_string(),
            task_profile_dir_path: DEFAULT_PROFILE_DIR_PATH.to_string(),
            host_profile_dir_path: DEFAULT_PROFILE_DIR_PATH.to_string(),
            task_zf_bin_path: DEFAULT_BIN_PATH.to_string(),
            host_zf_bin_path: DEFAULT_BIN_PATH.to_string(),
            task_zf_lib_path: DEFAULT_LIB_PATH.to_string(),
            host_zf_lib_path: DEFAULT_LIB_PATH.to_string(),
            fingerprint_period: "1m".to_string(),
            sysfs_root: PathBuf::from("/sys"),
        }
    }
}

impl PluginConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Parse `fingerprint_period`. Malformed or zero periods are rejected.
    pub fn fingerprint_period(&self) -> ConfigResult<Duration> {
        let period = parse_duration(&self.fingerprint_period).map_err(|source| {
            ConfigError::InvalidPeriod {
                value: self.fingerprint_period.clone(),
                source,
            }
        })?;
        if period.is_zero() {
            return Err(ConfigError::NonPositivePeriod(self.fingerprint_period.clone()));
        }
        Ok(period)
    }

    pub fn ignored_interface_set(&self) -> HashSet<String> {
        self.ignored_interfaces.iter().cloned().collect()
    }
}
