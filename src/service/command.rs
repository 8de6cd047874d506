//! Translates the free-form command strings accepted by the
//! `/sensor/{deviceMac}/commands` endpoint into changes to a
//! device's `latestData.fullData` document.
//!
//! Exactly one grammar is understood: `tune set <key> <value>`.
//! Anything else is recorded verbatim under `last_command` so that
//! a test can still observe that the command arrived.

use crate::service::device::{LatestData, OpaqueDoc};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value as JsonValue};

/// The key used to record commands that don't follow the
/// `tune set` grammar.
pub const LAST_COMMAND_KEY: &str = "last_command";

/// Command keys that the consuming client knows about.
/// Parsing accepts the command vocabulary; `as_ref` yields the
/// field name that the client reads back from fullData.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, strum_macros::EnumString, strum_macros::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum KnownKey {
    Power,
    Sp,
    #[strum(to_string = "heatin", serialize = "heating")]
    Heatin,
    Mode,
    Night,
    Sleep,
    Fan,
    Dry,
    Lock,
    Laundr,
    Timer,
}

/// Map an external command key to the internal field name.
/// Keys we don't recognize are passed through unchanged.
pub fn normalize_key(key: &str) -> String {
    match key.parse::<KnownKey>() {
        Ok(known) => known.as_ref().to_string(),
        Err(_) => key.to_string(),
    }
}

/// A command value after type coercion
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandValue {
    Integer(i64),
    Text(String),
}

impl CommandValue {
    /// Base 10 integers, with an optional sign, become `Integer`;
    /// everything else (including "1.5", "true" and " 1") stays text.
    pub fn coerce(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(i) => Self::Integer(i),
            Err(_) => Self::Text(raw.to_string()),
        }
    }
}

impl From<CommandValue> for JsonValue {
    fn from(value: CommandValue) -> JsonValue {
        match value {
            CommandValue::Integer(i) => i.into(),
            CommandValue::Text(s) => s.into(),
        }
    }
}

/// The result of parsing a command string
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceCommand {
    /// `tune set <key> <value...>`
    TuneSet { key: String, value: String },
    /// Anything else; carries the original string
    Unrecognized(String),
}

impl DeviceCommand {
    pub fn parse(command: &str) -> Self {
        let parts: Vec<&str> = command.split_whitespace().collect();
        match parts.as_slice() {
            ["tune", "set", key, value @ ..] if !value.is_empty() => Self::TuneSet {
                key: key.to_string(),
                value: value.join(" "),
            },
            _ => Self::Unrecognized(command.to_string()),
        }
    }

    /// The field name and value that this command writes into fullData
    pub fn field_update(&self) -> (String, JsonValue) {
        match self {
            Self::TuneSet { key, value } => {
                (normalize_key(key), CommandValue::coerce(value).into())
            }
            Self::Unrecognized(raw) => (LAST_COMMAND_KEY.to_string(), raw.clone().into()),
        }
    }
}

/// Decode an existing fullData document.
/// A missing, null, non-object or otherwise unparseable document
/// yields an empty map; the mock deliberately never fails here.
fn full_data_map(full_data: Option<&OpaqueDoc>) -> Map<String, JsonValue> {
    let Some(doc) = full_data else {
        return Map::new();
    };
    match serde_json::from_str::<Map<String, JsonValue>>(doc.as_str()) {
        Ok(map) => map,
        Err(err) => {
            log::debug!("discarding unparseable fullData {}: {err:#}", doc.as_str());
            Map::new()
        }
    }
}

pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Apply `command` to `latest`, returning the updated LatestData.
/// `now` becomes the new `latest` timestamp regardless of the
/// command form.
pub fn apply_command_at(
    latest: &LatestData,
    command: &DeviceCommand,
    now: DateTime<Utc>,
) -> LatestData {
    let mut map = full_data_map(latest.full_data.as_ref());
    let (key, value) = command.field_update();
    map.insert(key, value);

    let mut result = latest.clone();
    // On an encoding failure the previous document is left in place
    match serde_json::to_string(&map).and_then(OpaqueDoc::from_json_text) {
        Ok(doc) => {
            result.full_data.replace(doc);
        }
        Err(err) => log::error!("failed to encode fullData {map:?}: {err:#}"),
    }
    result.latest = format_timestamp(now);
    result
}

pub fn apply_command(latest: &LatestData, command: &DeviceCommand) -> LatestData {
    apply_command_at(latest, command, Utc::now())
}
