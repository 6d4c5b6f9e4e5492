//! Devices keyed by hardware address.

use super::{Device, DeviceInfo};
use crate::types::HwAddr;
use std::collections::BTreeMap;
use tracing::warn;

/// The devices found by one scan.
///
/// Keyed by hardware address, so a device answering on two addresses is kept
/// once (the later answer wins).
#[derive(Debug, Default)]
pub struct DeviceCollection {
    devices: BTreeMap<HwAddr, Box<dyn Device>>,
}

impl DeviceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a device, returning the one it replaced.
    pub fn insert(&mut self, device: Box<dyn Device>) -> Option<Box<dyn Device>> {
        let key = device.hw_addr();
        let replaced = self.devices.insert(key, device);
        if let Some(previous) = &replaced {
            warn!(
                hw_addr = %key,
                previous = %previous.address(),
                "duplicate hardware address, keeping latest answer"
            );
        }
        replaced
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, hw_addr: &HwAddr) -> Option<&dyn Device> {
        self.devices.get(hw_addr).map(|device| device.as_ref())
    }

    /// Devices in hardware-address order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Device> + '_ {
        self.devices.values().map(|device| device.as_ref())
    }

    pub fn infos(&self) -> Vec<DeviceInfo> {
        self.iter().map(|device| device.info()).collect()
    }

    pub fn remove(&mut self, hw_addr: &HwAddr) -> Option<Box<dyn Device>> {
        self.devices.remove(hw_addr)
    }

    /// Remove and return every device, leaving the collection empty.
    pub fn take_all(&mut self) -> Vec<Box<dyn Device>> {
        std::mem::take(&mut self.devices).into_values().collect()
    }
}

impl FromIterator<Box<dyn Device>> for DeviceCollection {
    fn from_iter<I: IntoIterator<Item = Box<dyn Device>>>(iter: I) -> Self {
        let mut collection = Self::new();
        for device in iter {
            collection.insert(device);
        }
        collection
    }
}

impl Extend<Box<dyn Device>> for DeviceCollection {
    fn extend<I: IntoIterator<Item = Box<dyn Device>>>(&mut self, iter: I) {
        for device in iter {
            self.insert(device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDevice;

    #[test]
    fn test_keyed_by_hw_addr() {
        let mut devices = DeviceCollection::new();
        assert!(devices
            .insert(Box::new(FakeDevice::new("a", "SHSW-1", "AA:00:00:00:00:01")))
            .is_none());
        assert!(devices
            .insert(Box::new(FakeDevice::new("b", "SHSW-1", "aa0000000001")))
            .is_some());
        assert_eq!(devices.len(), 1);

        let key: HwAddr = "AA:00:00:00:00:01".parse().unwrap();
        assert_eq!(devices.get(&key).unwrap().name(), "b");
    }

    #[test]
    fn test_iteration_is_ordered() {
        let devices: DeviceCollection = vec![
            Box::new(FakeDevice::new("second", "M", "AA:00:00:00:00:02")) as Box<dyn Device>,
            Box::new(FakeDevice::new("first", "M", "AA:00:00:00:00:01")),
        ]
        .into_iter()
        .collect();

        let names: Vec<&str> = devices.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_take_all_empties() {
        let mut devices: DeviceCollection =
            std::iter::once(Box::new(FakeDevice::new("a", "M", "AA:00:00:00:00:01")) as Box<dyn Device>)
                .collect();
        let taken = devices.take_all();
        assert_eq!(taken.len(), 1);
        assert!(devices.is_empty());
    }
}
