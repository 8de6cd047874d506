use crate::fixtures::FixtureFile;
use crate::service::command::{apply_command, DeviceCommand};
use crate::service::device::Device;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

/// The error conditions that the registry reports to its callers.
/// Everything else about a command is absorbed by fallback behavior.
#[derive(Debug, thiserror::Error)]
pub enum MockError {
    #[error("failed to load fixtures from {path}: {reason}")]
    Load { path: String, reason: String },
    #[error("failed to save fixtures to {path}: {reason}")]
    Save { path: String, reason: String },
    #[error("device {0} not found")]
    NotFound(String),
    #[error("invalid body: {0}")]
    MalformedRequest(String),
}

struct Entry {
    device: Device,
    /// Bumped each time the entry is replaced
    version: u64,
}

/// A copy of a device together with the position and version
/// of the entry it came from.
#[derive(Clone, Debug)]
pub struct DeviceHandle {
    pub index: usize,
    pub version: u64,
    pub device: Device,
}

impl std::ops::Deref for DeviceHandle {
    type Target = Device;

    fn deref(&self) -> &Device {
        &self.device
    }
}

/// The in-memory device registry.
/// A single lock guards the whole collection; request volume
/// is test-scale so there is no point in anything finer grained.
#[derive(Default)]
pub struct State {
    devices: Mutex<Vec<Entry>>,
}

pub type StateHandle = Arc<State>;

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(devices: Vec<Device>) -> Self {
        let state = Self::new();
        state.replace_all(devices);
        state
    }

    fn replace_all(&self, devices: Vec<Device>) {
        *self.devices.lock() = devices
            .into_iter()
            .map(|device| Entry { device, version: 0 })
            .collect();
    }

    /// Load the device catalog from a fixture file.
    /// On failure the registry is left empty and the error is
    /// returned so that the caller can decide how loudly to complain.
    pub fn load(&self, path: &Path) -> Result<usize, MockError> {
        match FixtureFile::load(path) {
            Ok(fixture) => {
                let count = fixture.data.len();
                self.replace_all(fixture.data);
                Ok(count)
            }
            Err(err) => {
                self.replace_all(vec![]);
                Err(err)
            }
        }
    }

    /// Write the current catalog back out in the fixture format
    pub fn save(&self, path: &Path) -> Result<(), MockError> {
        let devices = self.devices.lock();
        let data: Vec<&Device> = devices.iter().map(|entry| &entry.device).collect();
        FixtureFile::save(path, &data)
    }

    pub fn len(&self) -> usize {
        self.devices.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.lock().is_empty()
    }

    /// Find the first device, in catalog order, that can be
    /// addressed by `key`.
    pub fn find_by_key(&self, key: &str) -> Option<DeviceHandle> {
        let devices = self.devices.lock();
        devices
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.device.matches_key(key))
            .map(|(index, entry)| DeviceHandle {
                index,
                version: entry.version,
                device: entry.device.clone(),
            })
    }

    pub fn resolve_device(&self, key: &str) -> Result<Device, MockError> {
        self.find_by_key(key)
            .map(|handle| handle.device)
            .ok_or_else(|| MockError::NotFound(key.to_string()))
    }

    /// Replace the device referenced by `handle` with `device`.
    /// If the entry was replaced or moved since the handle was
    /// obtained, nothing is written and false is returned.
    pub fn update(&self, handle: &DeviceHandle, device: Device) -> bool {
        let mut devices = self.devices.lock();
        match devices.get_mut(handle.index) {
            Some(entry)
                if entry.version == handle.version
                    && entry.device.device_id == handle.device.device_id =>
            {
                entry.device = device;
                entry.version += 1;
                true
            }
            _ => {
                log::warn!(
                    "discarding stale update to {} at index {}",
                    handle.device,
                    handle.index
                );
                false
            }
        }
    }

    /// Returns a copy of every device, in catalog order
    pub fn snapshot(&self) -> Vec<Device> {
        self.snapshot_with(|_| {})
    }

    /// Returns a copy of every device with `transform` applied to
    /// each copy; the stored devices are not affected.
    pub fn snapshot_with<F: FnMut(&mut Device)>(&self, mut transform: F) -> Vec<Device> {
        let devices = self.devices.lock();
        devices
            .iter()
            .map(|entry| {
                let mut device = entry.device.clone();
                transform(&mut device);
                device
            })
            .collect()
    }

    /// Resolve `key`, apply `command` to the device and commit the
    /// result, all while holding the registry lock so that concurrent
    /// commands against the same device cannot lose updates.
    /// Returns the updated device.
    pub fn apply_command(&self, key: &str, command: &str) -> Result<Device, MockError> {
        let parsed = DeviceCommand::parse(command);
        let mut devices = self.devices.lock();
        let entry = devices
            .iter_mut()
            .find(|entry| entry.device.matches_key(key))
            .ok_or_else(|| MockError::NotFound(key.to_string()))?;

        entry.device.latest_data = apply_command(&entry.device.latest_data, &parsed);
        entry.version += 1;
        log::info!("applied {parsed:?} to {}", entry.device);

        Ok(entry.device.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::service::device::OpaqueDoc;

    fn device(id: i64, device_id: &str, name: &str, display_name: &str) -> Device {
        Device {
            id,
            device_id: device_id.to_string(),
            name: name.to_string(),
            display_name: display_name.to_string(),
            connection_type: "mqtt".to_string(),
            ..Device::default()
        }
    }

    fn sample_state() -> State {
        let mut heater = device(1, "AA:00", "heater", "Heater");
        heater.latest_data.full_data =
            Some(OpaqueDoc::from_json_text(r#"{"power":1,"mode":2}"#).unwrap());
        State::with_devices(vec![
            heater,
            device(2, "BB:00", "fan", "Bedroom Fan"),
            device(3, "CC:00", "dehumidifier", "Basement"),
        ])
    }

    fn full_data(device: &Device) -> serde_json::Value {
        serde_json::from_str(device.latest_data.full_data.as_ref().unwrap().as_str()).unwrap()
    }

    #[test]
    fn find_by_any_key() {
        let state = sample_state();
        for device in state.snapshot() {
            for key in [
                device.device_id.clone(),
                device.id.to_string(),
                device.name.clone(),
                device.display_name.clone(),
            ] {
                let found = state.find_by_key(&key).unwrap();
                assert_eq!(found.device, device, "{key}");
            }
        }
    }

    #[test]
    fn find_unknown_key() {
        let state = sample_state();
        assert!(state.find_by_key("DD:00").is_none());
        assert!(state.find_by_key("4").is_none());
        assert!(matches!(
            state.resolve_device("nope"),
            Err(MockError::NotFound(key)) if key == "nope"
        ));
    }

    #[test]
    fn first_match_wins() {
        // The name of the second device collides with the numeric
        // id of the third.
        let state = State::with_devices(vec![
            device(7, "AA", "a", "A"),
            device(8, "BB", "9", "B"),
            device(9, "CC", "c", "C"),
        ]);
        assert_eq!(state.find_by_key("9").unwrap().device_id, "BB");
        assert_eq!(state.find_by_key("9").unwrap().index, 1);
    }

    #[test]
    fn apply_command_mutates_in_place() {
        let state = sample_state();
        let updated = state.apply_command("Heater", "tune set mode 3").unwrap();
        assert_eq!(full_data(&updated), serde_json::json!({"power": 1, "mode": 3}));

        let stored = state.resolve_device("AA:00").unwrap();
        assert_eq!(stored, updated);
    }

    #[test]
    fn apply_command_unknown_device_does_not_mutate() {
        let state = sample_state();
        let before = state.snapshot();
        assert!(matches!(
            state.apply_command("ZZ:99", "tune set power 1"),
            Err(MockError::NotFound(_))
        ));
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn update_and_stale_handle() {
        let state = sample_state();
        let handle = state.find_by_key("fan").unwrap();
        let stale = handle.clone();

        let mut device = handle.device.clone();
        device.online = true;
        assert!(state.update(&handle, device));
        assert!(state.resolve_device("fan").unwrap().online);

        // The entry has moved on since `stale` was taken
        let mut device = stale.device.clone();
        device.owner = "someone".to_string();
        assert!(!state.update(&stale, device));
        assert_eq!(state.resolve_device("fan").unwrap().owner, "");
    }

    #[test]
    fn update_after_reload_is_discarded() {
        let state = sample_state();
        let handle = state.find_by_key("Basement").unwrap();
        state.replace_all(vec![device(5, "EE:00", "other", "Other")]);
        assert!(!state.update(&handle, handle.device.clone()));
        assert_eq!(state.len(), 1);
        assert_eq!(state.snapshot()[0].device_id, "EE:00");
    }

    #[test]
    fn snapshot_transform_is_copy_on_read() {
        let state = sample_state();
        let degraded = state.snapshot_with(Device::simulate_tcp_only);
        assert_eq!(degraded.len(), 3);
        for device in &degraded {
            assert!(device.latest_data.full_data.is_none());
            assert_eq!(device.connection_type, "tcp");
        }

        let stored = state.resolve_device("heater").unwrap();
        assert_eq!(stored.connection_type, "mqtt");
        assert_eq!(full_data(&stored), serde_json::json!({"power": 1, "mode": 2}));
    }

    #[test]
    fn concurrent_commands_are_not_lost() {
        let state = Arc::new(sample_state());
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let state = state.clone();
                std::thread::spawn(move || {
                    state
                        .apply_command("CC:00", &format!("tune set key{i} {i}"))
                        .unwrap();
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let stored = state.resolve_device("CC:00").unwrap();
        let map = full_data(&stored);
        for i in 0..8 {
            assert_eq!(map[format!("key{i}")], serde_json::json!(i));
        }
    }
}
