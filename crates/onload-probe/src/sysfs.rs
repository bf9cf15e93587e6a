//! sysfs enumeration helpers shared by the XDP and timekeeping probes.

use std::fs;
use std::path::Path;

use regex::Regex;

use crate::DeviceInfo;
use crate::error::{ProbeError, ProbeResult};

/// List the entries of `<sysfs_root>/class/<class>` in name order.
///
/// A missing class directory means the kernel exposes no such devices
/// and is reported as [`ProbeError::NotFound`].
pub(crate) fn class_entries(sysfs_root: &Path, class: &str) -> ProbeResult<Vec<String>> {
    let dir = sysfs_root.join("class").join(class);
    if !dir.is_dir() {
        return Err(ProbeError::NotFound(dir));
    }
    let entries = fs::read_dir(&dir).map_err(|source| ProbeError::Io {
        path: dir.clone(),
        source,
    })?;

    let mut names: Vec<String> = entries
        .flatten()
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    Ok(names)
}

/// PCI address of the device behind `<class_dir>/<name>/device`, if the
/// link resolves to a PCI function such as `0000:b1:00.0`.
pub(crate) fn pci_bus_id(sysfs_root: &Path, class: &str, name: &str) -> Option<String> {
    let link = sysfs_root.join("class").join(class).join(name).join("device");
    let target = fs::canonicalize(link).ok()?;
    let leaf = target.file_name()?.to_string_lossy().into_owned();
    let re = Regex::new(r"^[0-9a-f]{4}:[0-9a-f]{2}:[0-9a-f]{2}\.[0-7]$").ok()?;
    re.is_match(&leaf).then_some(leaf)
}

/// Every entry of a class, with its PCI address when it has one.
pub(crate) fn class_devices(sysfs_root: &Path, class: &str) -> ProbeResult<Vec<DeviceInfo>> {
    Ok(class_entries(sysfs_root, class)?
        .into_iter()
        .map(|name| DeviceInfo {
            pci_bus_id: pci_bus_id(sysfs_root, class, &name).unwrap_or_default(),
            interface: name,
        })
        .collect())
}
