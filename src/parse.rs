//! Wire-format parser for device telemetry payloads.
//!
//! Devices publish in one of two formats, tried in order:
//! 1. A JSON object using the canonical field names (`raw_value`,
//!    `rms_value`, ...). A subset of fields is permitted.
//! 2. A delimited ASCII line of `KEY:VALUE` tokens, e.g.
//!    `RAW:1024, RMS:23.45, TH:25.0, STATE:1, MOVE:15, CONNECTED:1, ALARM:0`.
//!    Keys are case-insensitive; `N/A` marks a value the device could not
//!    produce.
//!
//! Tolerance is per field, not per message: one unparseable token degrades
//! to an absent field while the rest of the message goes through. Only a
//! payload with no interpretable structure at all is rejected.

use std::str::FromStr;

use thiserror::Error;

use crate::record::DeviceRecord;

// ---

/// A payload that matches neither wire format.
///
/// Field-level coercion failures are deliberately not represented here; they
/// degrade to an absent field inside a successful parse.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid JSON object: {0}")]
    Json(String),
    #[error("no recognized fields in payload")]
    NoRecognizedFields,
    #[error("payload is not valid UTF-8")]
    Encoding,
}

/// Parse a raw payload into a [`DeviceRecord`].
///
/// A payload whose first non-whitespace byte is `{` must be a valid JSON
/// object; anything else is treated as the delimited key-value format.
pub fn parse(payload: &[u8]) -> Result<DeviceRecord, ParseError> {
    // ---
    let text = std::str::from_utf8(payload).map_err(|_| ParseError::Encoding)?;

    let trimmed = text.trim_start();
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed).map_err(|e| ParseError::Json(e.to_string()));
    }

    parse_delimited(text)
}

// ---

/// Parse the delimited `KEY:VALUE` format.
///
/// Unrecognized keys are skipped so newer firmware can add fields without
/// breaking older receivers. At least one recognized key is required.
fn parse_delimited(text: &str) -> Result<DeviceRecord, ParseError> {
    // ---
    let mut record = DeviceRecord::default();
    let mut recognized = 0usize;

    for token in text.split(", ") {
        let Some((key, value)) = token.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        match key.as_str() {
            "raw" => record.raw_value = coerce(value),
            "rms" => record.rms_value = coerce(value),
            "th" => record.threshold_value = coerce(value),
            "state" => record.state = coerce(value),
            "move" => record.movement_count = coerce(value),
            // Flags keep their wire defaults when the token is N/A or garbage
            "connected" => record.is_connected = coerce::<i64>(value).map_or(true, |n| n != 0),
            "alarm" => record.is_alarm = coerce::<i64>(value).map_or(false, |n| n != 0),
            _ => continue,
        }
        recognized += 1;
    }

    if recognized == 0 {
        return Err(ParseError::NoRecognizedFields);
    }
    Ok(record)
}

/// Best-effort numeric coercion with sentinel-absence semantics.
///
/// `N/A` and unparseable literals both yield `None`; all field parsing goes
/// through here so absence means the same thing everywhere.
fn coerce<T: FromStr>(value: &str) -> Option<T> {
    // ---
    if value == "N/A" {
        return None;
    }
    value.parse().ok()
}

// ---

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn parses_full_delimited_payload() {
        // ---
        let record =
            parse(b"RAW:3000, RMS:1800.50, TH:2000.00, STATE:1, MOVE:5, CONNECTED:1, ALARM:0")
                .unwrap();

        assert_eq!(record.raw_value, Some(3000));
        assert_eq!(record.rms_value, Some(1800.50));
        assert_eq!(record.threshold_value, Some(2000.00));
        assert_eq!(record.state, Some(1));
        assert_eq!(record.movement_count, Some(5));
        assert!(record.is_connected);
        assert!(!record.is_alarm);
    }

    #[test]
    fn na_sentinel_means_absent_regardless_of_other_tokens() {
        // ---
        let record = parse(b"RAW:N/A, RMS:1800.50, TH:garbage, ALARM:1").unwrap();

        assert_eq!(record.raw_value, None);
        assert_eq!(record.rms_value, Some(1800.50));
        assert_eq!(record.threshold_value, None);
        assert!(record.is_alarm);
    }

    #[test]
    fn bad_token_degrades_to_absent_field_only() {
        // ---
        let record = parse(b"RAW:abc, MOVE:15").unwrap();

        assert_eq!(record.raw_value, None);
        assert_eq!(record.movement_count, Some(15));
    }

    #[test]
    fn flags_default_when_token_is_malformed() {
        // ---
        let record = parse(b"CONNECTED:maybe, ALARM:N/A, RAW:10").unwrap();

        assert!(record.is_connected);
        assert!(!record.is_alarm);
    }

    #[test]
    fn keys_are_case_insensitive() {
        // ---
        let record = parse(b"raw:42, Move:3").unwrap();

        assert_eq!(record.raw_value, Some(42));
        assert_eq!(record.movement_count, Some(3));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        // ---
        let record = parse(b"RAW:42, BATTERY:97").unwrap();

        assert_eq!(record.raw_value, Some(42));
    }

    #[test]
    fn json_payload_decodes_directly() {
        // ---
        let record = parse(br#" {"raw_value": 1024, "state": 0, "is_alarm": 1}"#).unwrap();

        assert_eq!(record.raw_value, Some(1024));
        assert_eq!(record.state, Some(0));
        assert!(record.is_alarm);
        assert!(record.is_connected);
    }

    #[test]
    fn broken_json_is_malformed() {
        // ---
        assert!(matches!(parse(b"{not json"), Err(ParseError::Json(_))));
    }

    #[test]
    fn garbage_payload_is_malformed() {
        // ---
        assert_eq!(parse(b"garbage data"), Err(ParseError::NoRecognizedFields));
    }

    #[test]
    fn only_unknown_keys_is_malformed() {
        // ---
        assert_eq!(
            parse(b"FOO:1, BAR:N/A"),
            Err(ParseError::NoRecognizedFields)
        );
    }

    #[test]
    fn non_utf8_payload_is_malformed() {
        // ---
        assert_eq!(parse(&[0xff, 0xfe, 0x00]), Err(ParseError::Encoding));
    }

    #[test]
    fn reparsing_own_serialization_yields_same_record() {
        // ---
        let original =
            parse(b"RAW:3000, RMS:1800.50, TH:N/A, STATE:1, MOVE:5, CONNECTED:1, ALARM:1")
                .unwrap();

        let json = serde_json::to_string(&original).unwrap();
        let reparsed = parse(json.as_bytes()).unwrap();

        assert_eq!(reparsed, original);
    }
}
