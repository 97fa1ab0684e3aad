//! Device identity resolution from MQTT topic strings.
//!
//! Rules are ordered; the first one that applies wins:
//! 1. `sleep_blanket/{device_id}/data` anywhere in the topic, where the
//!    device segment is a single non-empty path segment.
//! 2. A topic containing `device/sleep_blanket` maps to the shared
//!    `GENERAL_DEVICE` identity.
//! 3. A topic containing `sensors/sleep_monitor` maps to `MONITOR_SENSOR`.
//!
//! Rules 2 and 3 intentionally use substring containment rather than exact
//! path matching, mirroring the deployed receivers; tests pin this down so
//! it cannot change by accident.

// ---

/// Catch-all identity for the legacy `device/sleep_blanket` topic.
pub const GENERAL_DEVICE: &str = "GENERAL_DEVICE";

/// Catch-all identity for the legacy `sensors/sleep_monitor` topic.
pub const MONITOR_SENSOR: &str = "MONITOR_SENSOR";

const DATA_TOPIC_PREFIX: &str = "sleep_blanket/";
const DATA_TOPIC_SUFFIX: &str = "/data";

/// Extract the device id from a topic, or `None` when no rule applies.
///
/// An unresolvable topic is an expected condition (brokers carry unrelated
/// traffic); the caller logs and drops the message.
pub fn resolve(topic: &str) -> Option<String> {
    // ---
    // Try every occurrence of the prefix so that a slash-bearing candidate
    // segment does not shadow a valid later match.
    for (start, _) in topic.match_indices(DATA_TOPIC_PREFIX) {
        let rest = &topic[start + DATA_TOPIC_PREFIX.len()..];
        if let Some(end) = rest.find(DATA_TOPIC_SUFFIX) {
            let segment = &rest[..end];
            if !segment.is_empty() && !segment.contains('/') {
                return Some(segment.to_string());
            }
        }
    }

    if topic.contains("device/sleep_blanket") {
        return Some(GENERAL_DEVICE.to_string());
    }

    if topic.contains("sensors/sleep_monitor") {
        return Some(MONITOR_SENSOR.to_string());
    }

    None
}

// ---
