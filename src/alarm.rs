//! Device alarm policy evaluation.
//!
//! A record flagged `is_alarm` does not automatically reach an operator:
//! policy can disable device alarms entirely, ignore specific devices, and
//! enforce a per-device cooldown between raised alarms. The evaluator owns
//! the per-device cooldown state; the check and the timestamp update happen
//! in one critical section so two near-simultaneous alarms for the same
//! device cannot both pass.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

// ---

/// Severity floor carried by the alarm policy.
///
/// The wire formats carry no per-message level today, so this is validated
/// configuration surface rather than a decision input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlarmLevel {
    Low,
    Medium,
    High,
}

impl FromStr for AlarmLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(AlarmLevel::Low),
            "medium" => Ok(AlarmLevel::Medium),
            "high" => Ok(AlarmLevel::High),
            other => Err(anyhow!("unknown alarm level '{other}' (expected low/medium/high)")),
        }
    }
}

/// Static alarm policy, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AlarmPolicy {
    // ---
    /// Master switch for device-originated alarms.
    pub enable_device_alarm: bool,

    /// Devices whose alarms are dropped outright (e.g. known-flaky units).
    pub ignored_devices: HashSet<String>,

    /// When true, raised alarms are logged but not printed to the operator
    /// console.
    pub silent_mode: bool,

    /// Minimum interval between two raised alarms for the same device.
    pub device_alarm_cooldown: Duration,

    /// Minimum severity an alarm must carry to be considered.
    pub min_alarm_level: AlarmLevel,
}

impl Default for AlarmPolicy {
    fn default() -> Self {
        // ---
        AlarmPolicy {
            enable_device_alarm: true,
            ignored_devices: HashSet::new(),
            silent_mode: true,
            device_alarm_cooldown: Duration::seconds(60),
            min_alarm_level: AlarmLevel::Medium,
        }
    }
}

// ---

/// Outcome of evaluating one alarm-flagged record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmDecision {
    Raised,
    Suppressed(SuppressReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    PolicyDisabled,
    DeviceIgnored,
    Cooldown,
}

/// Per-device mutable alarm state, created lazily on the first
/// alarm-eligible message and kept for the life of the process.
#[derive(Debug, Default)]
struct DeviceAlarmState {
    last_alarm_time: Option<DateTime<Utc>>,
}

// ---

/// Policy evaluator plus the per-device cooldown table it guards.
pub struct AlarmMonitor {
    policy: AlarmPolicy,
    states: Mutex<HashMap<String, DeviceAlarmState>>,
}

impl AlarmMonitor {
    pub fn new(policy: AlarmPolicy) -> Self {
        // ---
        AlarmMonitor {
            policy,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &AlarmPolicy {
        &self.policy
    }

    /// Decide whether an alarm-flagged record from `device_id` is raised.
    ///
    /// Callers invoke this only for records with `is_alarm` set; the normal
    /// telemetry path never reaches the evaluator. On `Raised` the device's
    /// cooldown clock restarts at `now`.
    pub fn check(&self, device_id: &str, now: DateTime<Utc>) -> AlarmDecision {
        // ---
        if !self.policy.enable_device_alarm {
            return AlarmDecision::Suppressed(SuppressReason::PolicyDisabled);
        }

        if self.policy.ignored_devices.contains(device_id) {
            return AlarmDecision::Suppressed(SuppressReason::DeviceIgnored);
        }

        // Check-then-set under one lock: the cooldown comparison and the
        // timestamp update must not interleave between two evaluations for
        // the same device.
        let mut states = self.states.lock();
        let state = states.entry(device_id.to_string()).or_default();

        if let Some(last) = state.last_alarm_time {
            if now - last < self.policy.device_alarm_cooldown {
                return AlarmDecision::Suppressed(SuppressReason::Cooldown);
            }
        }

        state.last_alarm_time = Some(now);
        AlarmDecision::Raised
    }
}

// ---

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn policy_with_cooldown(secs: i64) -> AlarmPolicy {
        // ---
        AlarmPolicy {
            device_alarm_cooldown: Duration::seconds(secs),
            ..AlarmPolicy::default()
        }
    }

    #[test]
    fn first_alarm_is_raised() {
        // ---
        let monitor = AlarmMonitor::new(policy_with_cooldown(60));
        assert_eq!(monitor.check("SB001", at(0)), AlarmDecision::Raised);
    }

    #[test]
    fn cooldown_suppresses_then_releases() {
        // ---
        let monitor = AlarmMonitor::new(policy_with_cooldown(60));

        assert_eq!(monitor.check("SB001", at(0)), AlarmDecision::Raised);
        assert_eq!(
            monitor.check("SB001", at(30)),
            AlarmDecision::Suppressed(SuppressReason::Cooldown)
        );
        assert_eq!(monitor.check("SB001", at(61)), AlarmDecision::Raised);
    }

    #[test]
    fn suppressed_alarm_does_not_restart_the_cooldown() {
        // ---
        let monitor = AlarmMonitor::new(policy_with_cooldown(60));

        assert_eq!(monitor.check("SB001", at(0)), AlarmDecision::Raised);
        assert_eq!(
            monitor.check("SB001", at(59)),
            AlarmDecision::Suppressed(SuppressReason::Cooldown)
        );
        // 60s after the *raised* alarm, not the suppressed attempt
        assert_eq!(monitor.check("SB001", at(60)), AlarmDecision::Raised);
    }

    #[test]
    fn cooldowns_are_tracked_per_device() {
        // ---
        let monitor = AlarmMonitor::new(policy_with_cooldown(60));

        assert_eq!(monitor.check("SB001", at(0)), AlarmDecision::Raised);
        assert_eq!(monitor.check("SB002", at(1)), AlarmDecision::Raised);
    }

    #[test]
    fn ignored_device_never_raises() {
        // ---
        let mut policy = policy_with_cooldown(60);
        policy.ignored_devices.insert("SB067".to_string());
        let monitor = AlarmMonitor::new(policy);

        for secs in [0, 120, 600] {
            assert_eq!(
                monitor.check("SB067", at(secs)),
                AlarmDecision::Suppressed(SuppressReason::DeviceIgnored)
            );
        }
    }

    #[test]
    fn disabled_policy_suppresses_everything() {
        // ---
        let policy = AlarmPolicy {
            enable_device_alarm: false,
            ..AlarmPolicy::default()
        };
        let monitor = AlarmMonitor::new(policy);

        assert_eq!(
            monitor.check("SB001", at(0)),
            AlarmDecision::Suppressed(SuppressReason::PolicyDisabled)
        );
    }

    #[test]
    fn alarm_levels_parse_and_order() {
        // ---
        assert_eq!("LOW".parse::<AlarmLevel>().unwrap(), AlarmLevel::Low);
        assert_eq!("medium".parse::<AlarmLevel>().unwrap(), AlarmLevel::Medium);
        assert!("critical".parse::<AlarmLevel>().is_err());
        assert!(AlarmLevel::Low < AlarmLevel::Medium);
        assert!(AlarmLevel::Medium < AlarmLevel::High);
    }
}
