//! Timekeeping device enumeration: PPS sources and PTP hardware clocks.
//!
//! The device node for `<sysfs>/class/pps/pps0` is `/dev/pps0`, so the
//! class entry name doubles as the interface name.

use std::path::Path;

use crate::DeviceInfo;
use crate::error::ProbeResult;
use crate::sysfs;

pub fn probe_pps_devices(sysfs_root: &Path) -> ProbeResult<Vec<DeviceInfo>> {
    sysfs::class_devices(sysfs_root, "pps")
}

pub fn probe_ptp_devices(sysfs_root: &Path) -> ProbeResult<Vec<DeviceInfo>> {
    sysfs::class_devices(sysfs_root, "ptp")
}
