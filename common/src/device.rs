use std::{cmp::Ordering, collections::BTreeSet};

use serde::Serialize;

use crate::{
    config::DeviceEntry,
    error::WolError,
    magic_packet::{parse_mac, MacAddress},
};

/// A wake target. Identity is the MAC; the name is only a label.
#[derive(Debug, Clone, Serialize)]
pub struct Device {
    pub name: String,
    pub mac: MacAddress,
}

impl Device {
    pub fn new(name: impl Into<String>, mac: MacAddress) -> Self {
        Self {
            name: name.into(),
            mac,
        }
    }

    /// Trims the name and falls back to the canonical MAC text when it is blank.
    pub fn labelled(name: &str, mac: MacAddress) -> Self {
        let name = name.trim();
        if name.is_empty() {
            Self::new(mac.to_string(), mac)
        } else {
            Self::new(name, mac)
        }
    }

    pub fn from_entry(entry: &DeviceEntry) -> Result<Self, WolError> {
        let mac = parse_mac(entry.mac.trim())?;
        Ok(Self::labelled(&entry.name, mac))
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.mac == other.mac
    }
}

impl Eq for Device {}

impl PartialOrd for Device {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Device {
    fn cmp(&self, other: &Self) -> Ordering {
        self.mac.cmp(&other.mac)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
    known: BTreeSet<MacAddress>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from configuration entries. Entries with a bad MAC
    /// are handed back instead of aborting the load.
    pub fn load(entries: &[DeviceEntry]) -> (Self, Vec<WolError>) {
        let mut registry = Self::new();
        let mut rejected = Vec::new();

        for entry in entries {
            match Device::from_entry(entry) {
                Ok(device) => {
                    registry.add(device);
                }
                Err(err) => rejected.push(err),
            }
        }

        (registry, rejected)
    }

    /// Returns `false` when a device with the same MAC is already known.
    pub fn add(&mut self, device: Device) -> bool {
        if !self.known.insert(device.mac) {
            return false;
        }
        self.devices.push(device);
        true
    }

    pub fn all(&self) -> &[Device] {
        &self.devices
    }

    pub fn count(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, mac: &MacAddress) -> Option<&Device> {
        if !self.known.contains(mac) {
            return None;
        }
        self.devices.iter().find(|device| device.mac == *mac)
    }

    pub fn page(&self, index: usize, page_size: usize) -> &[Device] {
        let start = index.saturating_mul(page_size).min(self.devices.len());
        let end = start.saturating_add(page_size).min(self.devices.len());
        &self.devices[start..end]
    }
}
