//! Reservations — what a task needs mounted to use its devices.
//!
//! Every path is a configured task-side or host-side directory joined
//! with a fixed file name; nothing on the host is resolved or copied.

use std::collections::HashSet;
use std::path::Path;

use onload_core::{
    CGROUP_PERMS, DeviceFamily, DeviceSpec, DeviceType, FingerprintedDevice, Mount, PluginConfig,
    ReservationSpec,
};
use tracing::{info, warn};

/// Device nodes required by Onload.
const ONLOAD_DEVICE_FILES: &[&str] = &["onload", "onload_epoll", "sfc_char"];

/// Shared libraries required by Onload. `libpcap` and `libdbus` are for
/// `onload_stackdump`.
const ONLOAD_LIBRARY_FILES: &[&str] = &[
    "libonload.so",
    "libonload_ext.so",
    "libpcap.so.0.8",
    "libdbus-1.so.3",
];

/// Binaries mounted when the task runs `onload` as a wrapper script
/// rather than relying on `LD_PRELOAD`.
const ONLOAD_BINARY_FILES: &[&str] = &["onload", "onload_stackdump"];

/// Dependencies of the `onload` script, mounted at the same path.
const ONLOAD_DEPEND_FILES: &[&str] = &["/sbin/lsmod"];

/// Library injected through `LD_PRELOAD`.
const ONLOAD_PRELOAD_FILE: &str = "libonload.so";

const ZF_DEVICE_FILES: &[&str] = &["sfc_char"];
const ZF_LIBRARY_FILES: &[&str] = &["libonload_zf.so"];
const ZF_BINARY_FILES: &[&str] = &["zf_stackdump", "zf_debug"];

pub const PRELOAD_ENV: &str = "LD_PRELOAD";

/// Build the reservation for already-validated devices.
///
/// Entries shared by several devices appear once, in first-seen order.
pub fn build_reservation(config: &PluginConfig, devices: &[FingerprintedDevice]) -> ReservationSpec {
    let mut builder = ReservationBuilder::new(config);
    for device in devices {
        match device.device_type.family() {
            DeviceFamily::Accelerated => {
                info!(device_id = %device.id, device_type = %device.device_type, "reserving onload device");
                builder.onload_device(&device.device_type);
            }
            DeviceFamily::Timekeeping => {
                info!(device_id = %device.id, device_type = %device.device_type, "reserving timekeeping device");
                builder.timekeeping_device(&device.interface);
            }
            DeviceFamily::Unknown => {
                warn!(device_id = %device.id, device_type = %device.device_type, "reserving a device type not known");
            }
        }
    }
    builder.finish()
}

struct ReservationBuilder<'a> {
    config: &'a PluginConfig,
    spec: ReservationSpec,
    device_paths: HashSet<String>,
    mount_paths: HashSet<String>,
}

impl<'a> ReservationBuilder<'a> {
    fn new(config: &'a PluginConfig) -> Self {
        Self {
            config,
            spec: ReservationSpec::default(),
            device_paths: HashSet::new(),
            mount_paths: HashSet::new(),
        }
    }

    fn finish(self) -> ReservationSpec {
        self.spec
    }

    fn onload_device(&mut self, device_type: &DeviceType) {
        let c = self.config;

        let device_files = if *device_type == DeviceType::Zf {
            ZF_DEVICE_FILES
        } else {
            ONLOAD_DEVICE_FILES
        };
        self.device_nodes(&c.task_device_path, &c.host_device_path, device_files);

        self.files(&c.task_onload_lib_path, &c.host_onload_lib_path, ONLOAD_LIBRARY_FILES);
        if device_type.uses_zf() {
            self.files(&c.task_zf_lib_path, &c.host_zf_lib_path, ZF_LIBRARY_FILES);
        }

        if c.mount_onload {
            if both_set(&c.task_onload_bin_path, &c.host_onload_bin_path) {
                self.files(&c.task_onload_bin_path, &c.host_onload_bin_path, ONLOAD_BINARY_FILES);
                for dep in ONLOAD_DEPEND_FILES {
                    self.mount(dep.to_string(), dep.to_string());
                }
            }
            if both_set(&c.task_profile_dir_path, &c.host_profile_dir_path) {
                self.mount(c.task_profile_dir_path.clone(), c.host_profile_dir_path.clone());
            }
            if device_type.uses_zf() {
                self.files(&c.task_zf_bin_path, &c.host_zf_bin_path, ZF_BINARY_FILES);
            }
        }

        // TCPDirect alone does not go through the LD_PRELOAD interposer.
        if c.set_preload && *device_type != DeviceType::Zf && !c.task_onload_lib_path.is_empty() {
            self.spec.envs.insert(
                PRELOAD_ENV.to_string(),
                join(&c.task_onload_lib_path, ONLOAD_PRELOAD_FILE),
            );
        }
    }

    fn timekeeping_device(&mut self, interface: &str) {
        let c = self.config;
        self.device_nodes(&c.task_device_path, &c.host_device_path, &[interface]);
    }

    fn device_nodes(&mut self, task_dir: &str, host_dir: &str, names: &[&str]) {
        if !both_set(task_dir, host_dir) {
            return;
        }
        for name in names {
            let task_path = join(task_dir, name);
            if !self.device_paths.insert(task_path.clone()) {
                continue;
            }
            self.spec.devices.push(DeviceSpec {
                task_path,
                host_path: join(host_dir, name),
                cgroup_perms: CGROUP_PERMS.to_string(),
            });
        }
    }

    fn files(&mut self, task_dir: &str, host_dir: &str, names: &[&str]) {
        if !both_set(task_dir, host_dir) {
            return;
        }
        for name in names {
            self.mount(join(task_dir, name), join(host_dir, name));
        }
    }

    fn mount(&mut self, task_path: String, host_path: String) {
        if !self.mount_paths.insert(task_path.clone()) {
            return;
        }
        self.spec.mounts.push(Mount {
            task_path,
            host_path,
            read_only: true,
        });
    }
}

fn both_set(task: &str, host: &str) -> bool {
    !task.is_empty() && !host.is_empty()
}

fn join(dir: &str, name: &str) -> String {
    Path::new(dir).join(name).to_string_lossy().into_owned()
}
