//! Canonical data model for one device telemetry sample.
//!
//! Every field a device may report is optional on the wire; a field that is
//! missing or unparseable stays `None` end to end so the database receives
//! NULL rather than a fabricated zero. The two boolean flags carry wire
//! defaults (`is_connected` true, `is_alarm` false) and accept both JSON
//! booleans and the 0/1 integers the firmware emits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ---

/// Normalized telemetry record produced by the wire-format parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    // ---
    pub raw_value: Option<i32>,
    pub rms_value: Option<f64>,
    pub threshold_value: Option<f64>,
    /// Occupancy indicator: 0 = unoccupied, 1 = occupied, None = unknown.
    pub state: Option<i16>,
    pub movement_count: Option<i32>,
    #[serde(default = "default_connected", deserialize_with = "connected_flag")]
    pub is_connected: bool,
    #[serde(default, deserialize_with = "alarm_flag")]
    pub is_alarm: bool,
    /// Arrival timestamp stamped by the ingestion coordinator, never by the
    /// parser; not part of either wire format.
    #[serde(skip)]
    pub received_at: Option<DateTime<Utc>>,
}

impl Default for DeviceRecord {
    fn default() -> Self {
        // ---
        DeviceRecord {
            raw_value: None,
            rms_value: None,
            threshold_value: None,
            state: None,
            movement_count: None,
            is_connected: true,
            is_alarm: false,
            received_at: None,
        }
    }
}

// ---

fn default_connected() -> bool {
    true
}

/// Wire representation of a boolean flag: firmware sends 0/1, the record's
/// own re-serialization sends true/false. Both must decode.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireFlag {
    Bool(bool),
    Int(i64),
}

impl WireFlag {
    fn as_bool(&self) -> bool {
        match *self {
            WireFlag::Bool(b) => b,
            WireFlag::Int(n) => n != 0,
        }
    }
}

fn connected_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    // null counts as "not reported" and falls back to the wire default
    let flag = Option::<WireFlag>::deserialize(deserializer)?;
    Ok(flag.map_or(true, |f| f.as_bool()))
}

fn alarm_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let flag = Option::<WireFlag>::deserialize(deserializer)?;
    Ok(flag.map_or(false, |f| f.as_bool()))
}

// ---

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn missing_fields_take_wire_defaults() {
        // ---
        let record: DeviceRecord = serde_json::from_str("{}").unwrap();

        assert_eq!(record.raw_value, None);
        assert_eq!(record.rms_value, None);
        assert_eq!(record.threshold_value, None);
        assert_eq!(record.state, None);
        assert_eq!(record.movement_count, None);
        assert!(record.is_connected);
        assert!(!record.is_alarm);
        assert_eq!(record.received_at, None);
    }

    #[test]
    fn flags_accept_integer_and_boolean_forms() {
        // ---
        let from_ints: DeviceRecord =
            serde_json::from_str(r#"{"is_connected": 0, "is_alarm": 1}"#).unwrap();
        assert!(!from_ints.is_connected);
        assert!(from_ints.is_alarm);

        let from_bools: DeviceRecord =
            serde_json::from_str(r#"{"is_connected": false, "is_alarm": true}"#).unwrap();
        assert!(!from_bools.is_connected);
        assert!(from_bools.is_alarm);
    }

    #[test]
    fn serialization_round_trips() {
        // ---
        let record = DeviceRecord {
            raw_value: Some(3000),
            rms_value: Some(1800.5),
            threshold_value: Some(2000.0),
            state: Some(1),
            movement_count: Some(5),
            is_connected: true,
            is_alarm: false,
            received_at: None,
        };

        let json = serde_json::to_string(&record).unwrap();
        let reparsed: DeviceRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(reparsed, record);
    }
}
