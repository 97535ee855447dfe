use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::transport::{StateDelta, IMAGE_SLOTS};

/// Cached state for one device, mirroring what the dashboard shows.
#[derive(Debug, Clone, Default)]
pub struct DeviceView {
    /// File path (under `/files/`) of the latest frame per camera slot.
    pub images: [Option<String>; IMAGE_SLOTS],
    /// Server-formatted timestamp of the device's last packet.
    pub last_updated: Option<String>,
    /// When this client last applied a delta for the device.
    pub last_seen: Option<DateTime<Utc>>,
}

/// What a single `apply` changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaSummary {
    pub devices_touched: Vec<String>,
    pub reload: bool,
    pub new_event: bool,
}

/// Headless stand-in for the dashboard DOM: per-device image slots and
/// timestamps, updated incrementally. Fields absent from a delta are left
/// exactly as they are.
#[derive(Debug, Default)]
pub struct FleetView {
    devices: BTreeMap<String, DeviceView>,
    resync_count: u64,
    event_count: u64,
}

impl FleetView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device(&self, id: &str) -> Option<&DeviceView> {
        self.devices.get(id)
    }

    pub fn devices(&self) -> impl Iterator<Item = (&str, &DeviceView)> {
        self.devices.iter().map(|(id, d)| (id.as_str(), d))
    }

    /// How many times the server forced a full resync.
    pub fn resync_count(&self) -> u64 {
        self.resync_count
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Merge a delta into the view. The reload signal wins over any other
    /// field in the same delta: the whole cache is discarded.
    pub fn apply(&mut self, delta: &StateDelta) -> DeltaSummary {
        let mut summary = DeltaSummary::default();

        for (id, fields) in delta.nodes() {
            let changed_slot = (0..IMAGE_SLOTS).any(|cam| fields.image_slot(cam).is_some());
            if !changed_slot && fields.last_updated().is_none() {
                continue;
            }

            let device = self.devices.entry(id.to_string()).or_default();
            for cam in 0..IMAGE_SLOTS {
                if let Some(path) = fields.image_slot(cam) {
                    device.images[cam] = Some(path.to_string());
                }
            }
            if let Some(stamp) = fields.last_updated() {
                device.last_updated = Some(stamp.to_string());
            }
            device.last_seen = Some(Utc::now());
            summary.devices_touched.push(id.to_string());
        }

        if delta.has_new_event() {
            self.event_count += 1;
            summary.new_event = true;
        }

        if delta.reload_requested() {
            self.reset();
            summary.reload = true;
        }

        summary
    }

    /// Drop everything cached; subsequent deltas rebuild the view.
    pub fn reset(&mut self) {
        self.devices.clear();
        self.resync_count += 1;
    }
}
