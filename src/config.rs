//! Configuration loader for the `sleepflow` ingestion service.
//!
//! This module centralizes all runtime configuration values and their
//! defaults, loading from environment variables (with optional `.env` file
//! support provided by the caller). The alarm policy and the MQTT transport
//! settings live here too, so nothing else in the codebase reads `env::var`.

use std::collections::HashSet;
use std::env;

use anyhow::{anyhow, Result};
use chrono::Duration;

use crate::alarm::{AlarmLevel, AlarmPolicy};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse an optional boolean environment variable with a default value.
macro_rules! parse_env_bool {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| match v.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Ok(true),
                "0" | "false" | "no" => Ok(false),
                _ => Err(anyhow!("Invalid {}: expected a boolean", $var_name)),
            })
            .transpose()?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

// ---

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent
/// configuration snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// MQTT transport settings.
    pub mqtt: MqttConfig,

    /// Device alarm policy.
    pub alarm: AlarmPolicy,
}

/// MQTT broker connection settings.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    // ---
    pub broker_host: String,
    pub broker_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keepalive_secs: u64,
    pub client_id: String,
}

// ---

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string
/// - `MQTT_BROKER_HOST` – MQTT broker hostname or IP
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `MQTT_BROKER_PORT` – broker port (default: 1883)
/// - `MQTT_USERNAME` / `MQTT_PASSWORD` – broker credentials (default: none)
/// - `MQTT_KEEPALIVE_SECS` – keepalive interval (default: 60)
/// - `MQTT_CLIENT_ID` – client identifier (default: `sleepflow-receiver`)
/// - `ALARM_ENABLED` – master switch for device alarms (default: true)
/// - `ALARM_SILENT_MODE` – suppress console alarm output (default: true)
/// - `ALARM_COOLDOWN_SECS` – per-device alarm cooldown (default: 60)
/// - `ALARM_IGNORED_DEVICES` – comma-separated device ids (default: empty)
/// - `ALARM_MIN_LEVEL` – low/medium/high (default: medium)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = require_env!("DATABASE_URL");
    let db_pool_max = parse_env_u32!("DB_POOL_MAX", 5);

    let mqtt = MqttConfig {
        broker_host: require_env!("MQTT_BROKER_HOST"),
        broker_port: parse_env_u32!("MQTT_BROKER_PORT", 1883)
            .try_into()
            .map_err(|_| anyhow!("Invalid MQTT_BROKER_PORT: out of range"))?,
        username: env::var("MQTT_USERNAME").ok(),
        password: env::var("MQTT_PASSWORD").ok(),
        keepalive_secs: parse_env_u32!("MQTT_KEEPALIVE_SECS", 60) as u64,
        client_id: env::var("MQTT_CLIENT_ID").unwrap_or_else(|_| "sleepflow-receiver".into()),
    };

    let ignored_devices: HashSet<String> = env::var("ALARM_IGNORED_DEVICES")
        .ok()
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let alarm = AlarmPolicy {
        enable_device_alarm: parse_env_bool!("ALARM_ENABLED", true),
        ignored_devices,
        silent_mode: parse_env_bool!("ALARM_SILENT_MODE", true),
        device_alarm_cooldown: Duration::seconds(parse_env_u32!("ALARM_COOLDOWN_SECS", 60) as i64),
        min_alarm_level: env::var("ALARM_MIN_LEVEL")
            .unwrap_or_else(|_| "medium".into())
            .parse::<AlarmLevel>()?,
    };

    Ok(Config {
        db_url,
        db_pool_max,
        mqtt,
        alarm,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks sensitive information like database passwords while showing
    /// all configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        // Mask the password in the database URL for security
        let masked_db_url = if let Some(at_pos) = self.db_url.rfind('@') {
            if let Some(colon_pos) = self.db_url[..at_pos].rfind(':') {
                format!(
                    "{}:****{}",
                    &self.db_url[..colon_pos],
                    &self.db_url[at_pos..]
                )
            } else {
                self.db_url.clone()
            }
        } else {
            self.db_url.clone()
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL        : {}", masked_db_url);
        tracing::info!("  DB_POOL_MAX         : {}", self.db_pool_max);
        tracing::info!(
            "  MQTT_BROKER         : {}:{}",
            self.mqtt.broker_host,
            self.mqtt.broker_port
        );
        tracing::info!("  MQTT_CLIENT_ID      : {}", self.mqtt.client_id);
        tracing::info!("  MQTT_KEEPALIVE_SECS : {}", self.mqtt.keepalive_secs);
        tracing::info!("  ALARM_ENABLED       : {}", self.alarm.enable_device_alarm);
        tracing::info!("  ALARM_SILENT_MODE   : {}", self.alarm.silent_mode);
        tracing::info!(
            "  ALARM_COOLDOWN_SECS : {}",
            self.alarm.device_alarm_cooldown.num_seconds()
        );
        tracing::info!("  ALARM_IGNORED       : {:?}", self.alarm.ignored_devices);
        tracing::info!("  ALARM_MIN_LEVEL     : {:?}", self.alarm.min_alarm_level);
    }
}
