use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// The connection type reported for every device when the listing
/// is asked to simulate the degraded, TCP-only mode.
pub const DEGRADED_CONNECTION_TYPE: &str = "tcp";

/// A JSON sub-document that we carry around without interpreting it.
/// The original text is preserved and re-emitted as-is.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpaqueDoc(Box<RawValue>);

impl OpaqueDoc {
    pub fn from_json_text<S: Into<String>>(text: S) -> serde_json::Result<Self> {
        RawValue::from_string(text.into()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.get()
    }
}

impl PartialEq for OpaqueDoc {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for OpaqueDoc {}

/// One simulated sensor or appliance, as served by
/// `/smarthome/sensors`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Device {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub display_name: String,
    pub owner: String,
    /// MAC-like identifier used by the commands endpoint
    pub device_id: String,
    pub sensor_type_id: i64,
    pub online: bool,
    pub connection_update_date: String,
    pub connection_type: String,
    pub sensor_type: Option<OpaqueDoc>,
    pub space: Option<OpaqueDoc>,
    pub latest_data: LatestData,
}

/// The most recent state snapshot for a device.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct LatestData {
    pub device_id: Option<String>,
    pub plugin_name: Option<String>,
    pub plugin_uid: Option<String>,
    pub data: Option<OpaqueDoc>,
    /// `None` is serialized as `null` and means the device is only
    /// reachable over TCP; an empty object is a different state.
    pub full_data: Option<OpaqueDoc>,
    pub scores: Option<OpaqueDoc>,
    pub labels: Option<OpaqueDoc>,
    pub latest: String,
}

impl Device {
    /// Returns true if `key` is any of the identifiers by which this
    /// device may be addressed: the device id, the numeric id,
    /// the internal name or the display name.
    pub fn matches_key(&self, key: &str) -> bool {
        self.device_id == key
            || self.id.to_string() == key
            || self.name == key
            || self.display_name == key
    }

    /// Make this copy look like a device that is only reachable
    /// via the degraded TCP path: no fullData at all.
    pub fn simulate_tcp_only(&mut self) {
        self.latest_data.full_data = None;
        self.connection_type = DEGRADED_CONNECTION_TYPE.to_string();
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            fmt,
            "{} ({} #{} {})",
            self.display_name, self.device_id, self.id, self.kind
        )
    }
}
