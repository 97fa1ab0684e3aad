//! Windowed statistics endpoint.
//!
//! `GET /api/stats` aggregates the last N hours of telemetry (default 24),
//! optionally for a single device: record count, online rate, alarm count,
//! occupancy rate, and average movement.

use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::get, Json,
    Router,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::error;

use crate::Config;

// ---

const DEFAULT_WINDOW_HOURS: u32 = 24;

pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new().route("/api/stats", get(handler))
}

#[derive(Debug, Deserialize)]
struct StatsQuery {
    device_id: Option<String>,
    hours: Option<u32>,
}

#[derive(Debug, sqlx::FromRow)]
struct StatsRow {
    // ---
    total_records: i64,
    online_rate: Option<f64>,
    alarm_count: i64,
    occupancy_rate: Option<f64>,
    avg_movement: Option<f64>,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    // ---
    total_records: i64,
    online_rate: Option<f64>,
    alarm_count: i64,
    occupancy_rate: Option<f64>,
    avg_movement: Option<f64>,
    time_range_hours: u32,
}

async fn handler(
    Query(params): Query<StatsQuery>,
    State((pool, _config)): State<(PgPool, Config)>,
) -> impl IntoResponse {
    // ---
    let hours = params.hours.unwrap_or(DEFAULT_WINDOW_HOURS).max(1);
    let window_start = Utc::now() - Duration::hours(hours as i64);

    let result = sqlx::query_as::<_, StatsRow>(
        r#"
        SELECT COUNT(*) AS total_records,
               (AVG(CASE WHEN is_connected THEN 1.0 ELSE 0.0 END) * 100)::float8 AS online_rate,
               COUNT(*) FILTER (WHERE is_alarm) AS alarm_count,
               (AVG(CASE WHEN state = 1 THEN 1.0 ELSE 0.0 END) * 100)::float8 AS occupancy_rate,
               AVG(movement_count)::float8 AS avg_movement
        FROM device_data
        WHERE ($1::text IS NULL OR device_id = $1)
          AND timestamp >= $2
        "#,
    )
    .bind(params.device_id.as_deref())
    .bind(window_start)
    .fetch_one(&pool)
    .await;

    match result {
        Ok(row) => (
            StatusCode::OK,
            Json(StatsResponse {
                total_records: row.total_records,
                online_rate: row.online_rate,
                alarm_count: row.alarm_count,
                occupancy_rate: row.occupancy_rate,
                avg_movement: row.avg_movement,
                time_range_hours: hours,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to compute stats: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to compute stats"),
            )
                .into_response()
        }
    }
}
