//! Device inventory — the canonical map of fingerprinted devices.
//!
//! The fingerprint loop is the only writer and swaps the whole map on
//! every pass. Reservations read it concurrently and copy out the records
//! they need; the live map is never handed out by reference.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use onload_core::FingerprintedDevice;
use tracing::debug;

type DeviceMap = HashMap<String, FingerprintedDevice>;

#[derive(Debug, Clone, Default)]
pub struct Inventory {
    devices: Arc<RwLock<DeviceMap>>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current device map.
    pub fn snapshot(&self) -> DeviceMap {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Replace the inventory with `devices` and report whether the set of
    /// device IDs changed.
    ///
    /// Only ID membership counts: a device whose fields changed under the
    /// same ID is stored but does not count as a change. `devices` must
    /// not repeat an ID.
    pub fn replace(&self, devices: Vec<FingerprintedDevice>) -> bool {
        let next: DeviceMap = devices.into_iter().map(|d| (d.id.clone(), d)).collect();

        let mut current = self.write();
        let added = next.keys().filter(|id| !current.contains_key(*id)).count();
        let removed = current.keys().filter(|id| !next.contains_key(*id)).count();
        *current = next;

        debug!(added, removed, total = current.len(), "inventory replaced");
        added > 0 || removed > 0
    }

    /// Look up every ID in `ids`, in order.
    ///
    /// Fails with all unknown IDs when any of them is missing.
    pub fn lookup(&self, ids: &[String]) -> Result<Vec<FingerprintedDevice>, Vec<String>> {
        let current = self.read();
        let mut found = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for id in ids {
            match current.get(id) {
                Some(device) => found.push(device.clone()),
                None => missing.push(id.clone()),
            }
        }

        if missing.is_empty() { Ok(found) } else { Err(missing) }
    }

    fn read(&self) -> RwLockReadGuard<'_, DeviceMap> {
        self.devices.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DeviceMap> {
        self.devices.write().unwrap_or_else(PoisonError::into_inner)
    }
}
