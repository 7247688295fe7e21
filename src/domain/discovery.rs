use crate::domain::models::{DiscoveredDevice, PeerId};

/// Peers seen during the current scan.
///
/// No duplicates by id; kept in ascending signal-strength order. A repeated
/// advertisement for a known id is ignored, including its new signal strength.
#[derive(Debug, Clone, Default)]
pub struct DeviceList {
    devices: Vec<DiscoveredDevice>,
}

impl DeviceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the id was already known.
    pub fn insert(&mut self, device: DiscoveredDevice) -> bool {
        if self.contains(&device.id) {
            return false;
        }
        self.devices.push(device);
        self.devices.sort_by_key(|d| d.signal_strength);
        true
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.devices.iter().any(|d| &d.id == id)
    }

    pub fn get(&self, id: &PeerId) -> Option<&DiscoveredDevice> {
        self.devices.iter().find(|d| &d.id == id)
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }

    pub fn as_slice(&self) -> &[DiscoveredDevice] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
