use crate::service::device::Device;
use crate::service::state::MockError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;

pub const DEFAULT_FIXTURES_PATH: &str = "./fixtures/devices.json";

/// The on-disk catalog format; the same shape as the body of
/// the `/smarthome/sensors` response.
#[derive(Deserialize, Debug, Default)]
pub struct FixtureFile {
    #[serde(default)]
    pub data: Vec<Device>,
    // `issues` is accepted but not used for anything
}

#[derive(Serialize)]
struct FixtureFileOut<'a> {
    data: &'a [&'a Device],
    issues: Vec<JsonValue>,
}

impl FixtureFile {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, MockError> {
        let load_error = |reason: String| MockError::Load {
            path: path.display().to_string(),
            reason,
        };
        let text =
            std::fs::read_to_string(path).map_err(|err| load_error(format!("{err:#}")))?;
        Self::parse(&text).map_err(|err| load_error(format!("{err:#}")))
    }

    pub fn save(path: &Path, devices: &[&Device]) -> Result<(), MockError> {
        let save_error = |reason: String| MockError::Save {
            path: path.display().to_string(),
            reason,
        };
        let out = FixtureFileOut {
            data: devices,
            issues: vec![],
        };
        let text =
            serde_json::to_string_pretty(&out).map_err(|err| save_error(format!("{err:#}")))?;
        std::fs::write(path, text).map_err(|err| save_error(format!("{err:#}")))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::service::state::State;

    const DEVICES: &str = include_str!("../fixtures/devices.json");

    #[test]
    fn bundled_fixtures_parse() {
        let fixture = FixtureFile::parse(DEVICES).unwrap();
        assert!(!fixture.data.is_empty());
        for device in &fixture.data {
            assert!(!device.device_id.is_empty(), "{device}");
        }
    }

    #[test]
    fn missing_data_is_empty() {
        let fixture = FixtureFile::parse(r#"{"issues": [{"anything": true}]}"#).unwrap();
        assert!(fixture.data.is_empty());
    }

    #[test]
    fn load_missing_file_leaves_registry_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = State::with_devices(FixtureFile::parse(DEVICES).unwrap().data);
        assert!(!state.is_empty());

        let err = state.load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, MockError::Load { .. }), "{err:#}");
        assert!(state.is_empty());
    }

    #[test]
    fn load_garbage_leaves_registry_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");
        std::fs::write(&path, "{not json").unwrap();

        let state = State::new();
        assert!(matches!(state.load(&path), Err(MockError::Load { .. })));
        assert!(state.is_empty());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");

        let state = State::new();
        let count = state
            .load(Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/devices.json")))
            .unwrap();
        let first = state.snapshot()[0].device_id.clone();
        state.apply_command(&first, "tune set power 00").unwrap();
        state.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("{\n  \"data\": ["));
        let value: JsonValue = serde_json::from_str(&text).unwrap();
        assert_eq!(value["issues"], serde_json::json!([]));

        let reloaded = State::new();
        assert_eq!(reloaded.load(&path).unwrap(), count);
        assert_eq!(reloaded.snapshot(), state.snapshot());
    }
}
