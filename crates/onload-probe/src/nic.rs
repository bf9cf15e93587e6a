//! Accelerated NIC enumeration.
//!
//! Solarflare NICs are found through `lshw -businfo -class network`:
//!
//! ```text
//! Bus info          Device     Class          Description
//! =======================================================
//! pci@0000:04:00.0  eth2       network        NetXtreme BCM5720 Gigabit Ethernet PCIe
//! pci@0000:31:00.0             network        BCM57412 NetXtreme-E 10Gb RDMA Ethernet Controller
//! pci@0000:b1:00.0  eth0       network        SFC9220 10/40G Ethernet Controller
//! pci@0000:b1:00.1  eth1       network        SFC9220 10/40G Ethernet Controller
//! ```
//!
//! AF_XDP-capable NICs are any network interface backed by a PCI function
//! in sysfs.

use std::path::Path;

use regex::Regex;
use tracing::debug;

use crate::DeviceInfo;
use crate::command::run;
use crate::error::ProbeResult;
use crate::sysfs;

/// Description marker of Solarflare controllers in `lshw` output.
pub const SFC_MARKER: &str = "SFC";

/// Run `lshw` and return the Solarflare interfaces on this node.
pub fn probe_sfc_nics() -> ProbeResult<Vec<DeviceInfo>> {
    let output = run(Path::new("lshw"), &["-businfo", "-class", "network"])?;
    // lshw prints warnings (e.g. "you should run this program as super-user")
    // on stderr; only stdout carries the table.
    parse_lshw_output(&String::from_utf8_lossy(&output.stdout), SFC_MARKER)
}

/// Extract `(interface, bus)` pairs from `lshw -businfo` output.
///
/// Only `network` class lines whose description contains `marker` and
/// that have an interface name match. Interface names are assumed to be
/// lowercase letters and digits. Other lines are skipped.
pub fn parse_lshw_output(output: &str, marker: &str) -> ProbeResult<Vec<DeviceInfo>> {
    let re = Regex::new(&format!(
        r"^pci@([a-f0-9:.]+) +([a-z0-9]+) +network +.*{}",
        regex::escape(marker)
    ))?;

    let nics: Vec<DeviceInfo> = output
        .lines()
        .filter_map(|line| re.captures(line))
        .map(|caps| DeviceInfo {
            interface: caps[2].to_string(),
            pci_bus_id: caps[1].to_string(),
        })
        .collect();

    debug!(count = nics.len(), marker, "parsed lshw network devices");
    Ok(nics)
}

/// Network interfaces under `<sysfs_root>/class/net` backed by a PCI device.
///
/// Virtual interfaces (`lo`, bridges, veths) have no PCI `device` link and
/// are skipped.
pub fn probe_xdp_nics(sysfs_root: &Path) -> ProbeResult<Vec<DeviceInfo>> {
    let nics: Vec<DeviceInfo> = sysfs::class_entries(sysfs_root, "net")?
        .into_iter()
        .filter_map(|name| {
            sysfs::pci_bus_id(sysfs_root, "net", &name).map(|pci_bus_id| DeviceInfo {
                interface: name,
                pci_bus_id,
            })
        })
        .collect();

    debug!(count = nics.len(), "enumerated PCI network interfaces");
    Ok(nics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysfs::testing::add_class_device;

    const LSHW_SAMPLE: &str = "\
Bus info          Device     Class          Description
=======================================================
pci@0000:04:00.0  eth2       network        NetXtreme BCM5720 Gigabit Ethernet PCIe
pci@0000:04:00.1  eth3       network        NetXtreme BCM5720 Gigabit Ethernet PCIe
pci@0000:31:00.0             network        BCM57412 NetXtreme-E 10Gb RDMA Ethernet Controller
pci@0000:98:00.1  eth5       network        BCM57412 NetXtreme-E 10Gb RDMA Ethernet Controller
pci@0000:b1:00.0  eth0       network        SFC9220 10/40G Ethernet Controller
pci@0000:b1:00.1  eth1       network        SFC9220 10/40G Ethernet Controller
";

    #[test]
    fn lshw_sfc_lines_extracted() {
        let nics = parse_lshw_output(LSHW_SAMPLE, SFC_MARKER).unwrap();
        assert_eq!(
            nics,
            vec![
                DeviceInfo {
                    interface: "eth0".to_string(),
                    pci_bus_id: "0000:b1:00.0".to_string(),
                },
                DeviceInfo {
                    interface: "eth1".to_string(),
                    pci_bus_id: "0000:b1:00.1".to_string(),
                },
            ]
        );
    }

    #[test]
    fn lshw_unnamed_sfc_function_skipped() {
        let out = "pci@0000:b1:00.0                network        SFC9220 10/40G Ethernet Controller\n";
        assert!(parse_lshw_output(out, SFC_MARKER).unwrap().is_empty());
    }

    #[test]
    fn lshw_other_classes_skipped() {
        let out = "pci@0000:b1:00.0  eth0       storage        SFC imaginary disk\n";
        assert!(parse_lshw_output(out, SFC_MARKER).unwrap().is_empty());
    }

    #[test]
    fn lshw_empty_output() {
        assert!(parse_lshw_output("", SFC_MARKER).unwrap().is_empty());
    }

    #[test]
    fn xdp_nics_require_pci_device() {
        let root = tempfile::tempdir().unwrap();
        add_class_device(root.path(), "net", "lo", None);
        add_class_device(root.path(), "net", "eth0", Some("0000:b1:00.0"));
        add_class_device(root.path(), "net", "ens1f0", Some("0000:31:00.0"));

        let nics = probe_xdp_nics(root.path()).unwrap();
        let names: Vec<&str> = nics.iter().map(|n| n.interface.as_str()).collect();
        assert_eq!(names, vec!["ens1f0", "eth0"]);
        assert_eq!(nics[1].pci_bus_id, "0000:b1:00.0");
    }
}
