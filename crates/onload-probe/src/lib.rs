//! onload-probe — discovery of Onload, TCPDirect and the hardware they
//! accelerate.
//!
//! Probes never treat absence as fatal: a missing stack or device class
//! comes back as [`ProbeError::NotFound`], and callers decide what that
//! means for fingerprinting.
//!
//! # Probes
//!
//! ```text
//! Probe (trait)
//!   ├── onload_version(bin_dir)  → `onload --version`
//!   ├── zf_version(bin_dir)      → `zf_stackdump version`
//!   ├── sfc_nics()               → `lshw -businfo -class network`
//!   ├── xdp_nics()               → <sysfs>/class/net/*/device
//!   ├── pps_devices()            → <sysfs>/class/pps/*
//!   └── ptp_devices()            → <sysfs>/class/ptp/*
//! ```

mod command;
pub mod error;
pub mod nic;
mod sysfs;
pub mod timekeeping;
pub mod version;

use std::path::{Path, PathBuf};

pub use error::{ProbeError, ProbeResult};
pub use nic::parse_lshw_output;
pub use version::{parse_onload_version, parse_zf_version};

/// An interface or device node found by a probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub interface: String,
    /// Empty when the device has no PCI location.
    pub pci_bus_id: String,
}

/// Queries the host for accelerated stacks and devices.
///
/// Implementations are blocking; the fingerprint loop runs them off the
/// async runtime.
pub trait Probe: Send + Sync {
    fn onload_version(&self, bin_dir: &Path) -> ProbeResult<String>;
    fn zf_version(&self, bin_dir: &Path) -> ProbeResult<String>;
    fn sfc_nics(&self) -> ProbeResult<Vec<DeviceInfo>>;
    fn xdp_nics(&self) -> ProbeResult<Vec<DeviceInfo>>;
    fn pps_devices(&self) -> ProbeResult<Vec<DeviceInfo>>;
    fn ptp_devices(&self) -> ProbeResult<Vec<DeviceInfo>>;
}

/// [`Probe`] backed by the real system tools and sysfs.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    sysfs_root: PathBuf,
}

impl SystemProbe {
    pub fn new(sysfs_root: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
        }
    }

    pub fn sysfs_root(&self) -> &Path {
        &self.sysfs_root
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new("/sys")
    }
}

impl Probe for SystemProbe {
    fn onload_version(&self, bin_dir: &Path) -> ProbeResult<String> {
        version::probe_onload_version(bin_dir)
    }

    fn zf_version(&self, bin_dir: &Path) -> ProbeResult<String> {
        version::probe_zf_version(bin_dir)
    }

    fn sfc_nics(&self) -> ProbeResult<Vec<DeviceInfo>> {
        nic::probe_sfc_nics()
    }

    fn xdp_nics(&self) -> ProbeResult<Vec<DeviceInfo>> {
        nic::probe_xdp_nics(&self.sysfs_root)
    }

    fn pps_devices(&self) -> ProbeResult<Vec<DeviceInfo>> {
        timekeeping::probe_pps_devices(&self.sysfs_root)
    }

    fn ptp_devices(&self) -> ProbeResult<Vec<DeviceInfo>> {
        timekeeping::probe_ptp_devices(&self.sysfs_root)
    }
}
