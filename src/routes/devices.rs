//! Device inventory endpoint.
//!
//! `GET /api/devices` returns one rollup row per device seen by the
//! ingestion pipeline: how many records it has produced, when it last
//! reported, and how often it reported as connected.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::error;

use crate::Config;

// ---

pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new().route("/api/devices", get(handler))
}

/// Per-device rollup served by `/api/devices`.
#[derive(Debug, Serialize, sqlx::FromRow)]
struct DeviceSummary {
    // ---
    device_id: String,
    total_records: i64,
    last_update: Option<DateTime<Utc>>,
    /// Share of records reporting `is_connected`, as a percentage.
    online_rate: Option<f64>,
}

async fn handler(State((pool, _config)): State<(PgPool, Config)>) -> impl IntoResponse {
    // ---
    let result = sqlx::query_as::<_, DeviceSummary>(
        r#"
        SELECT device_id,
               COUNT(*) AS total_records,
               MAX(timestamp) AS last_update,
               (AVG(CASE WHEN is_connected THEN 1.0 ELSE 0.0 END) * 100)::float8 AS online_rate
        FROM device_data
        GROUP BY device_id
        ORDER BY last_update DESC
        "#,
    )
    .fetch_all(&pool)
    .await;

    match result {
        Ok(devices) => (StatusCode::OK, Json(devices)).into_response(),
        Err(e) => {
            error!("Failed to list devices: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to list devices"),
            )
                .into_response()
        }
    }
}
