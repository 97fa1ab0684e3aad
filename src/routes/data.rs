//! Telemetry query endpoints.
//!
//! - `GET /api/data/latest`: newest records, optionally for one device.
//! - `GET /api/data/history`: paginated history with an optional device
//!   and time-range filter, plus pagination metadata in the response.
//!
//! Both endpoints read the `device_data` table the ingestion pipeline
//! writes; NULL columns pass through as JSON null so downstream consumers
//! can tell "absent" from zero.

use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::get, Json,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::error;

use crate::Config;

// ---

const LATEST_DEFAULT_LIMIT: u32 = 10;
const LATEST_MAX_LIMIT: u32 = 200;
const HISTORY_DEFAULT_PER_PAGE: u32 = 20;
const HISTORY_MAX_PER_PAGE: u32 = 100;

pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new()
        .route("/api/data/latest", get(latest))
        .route("/api/data/history", get(history))
}

/// One persisted telemetry row, serialized as stored.
#[derive(Debug, Serialize, sqlx::FromRow)]
struct DeviceDataRow {
    // ---
    id: i64,
    device_id: String,
    raw_value: Option<i32>,
    rms_value: Option<f64>,
    threshold_value: Option<f64>,
    state: Option<i16>,
    movement_count: Option<i32>,
    is_connected: bool,
    is_alarm: bool,
    timestamp: DateTime<Utc>,
}

// ---

#[derive(Debug, Deserialize)]
struct LatestQuery {
    device_id: Option<String>,
    limit: Option<u32>,
}

async fn latest(
    Query(params): Query<LatestQuery>,
    State((pool, _config)): State<(PgPool, Config)>,
) -> impl IntoResponse {
    // ---
    let limit = params
        .limit
        .unwrap_or(LATEST_DEFAULT_LIMIT)
        .min(LATEST_MAX_LIMIT) as i64;

    let result = sqlx::query_as::<_, DeviceDataRow>(
        r#"
        SELECT * FROM device_data
        WHERE ($1::text IS NULL OR device_id = $1)
        ORDER BY timestamp DESC
        LIMIT $2
        "#,
    )
    .bind(params.device_id.as_deref())
    .bind(limit)
    .fetch_all(&pool)
    .await;

    match result {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(e) => {
            error!("Failed to fetch latest data: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to fetch latest data"),
            )
                .into_response()
        }
    }
}

// ---

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    device_id: Option<String>,
    /// RFC 3339 timestamps, e.g. `2025-03-21T00:00:00Z`.
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    page: Option<u32>,
    per_page: Option<u32>,
}

#[derive(Debug, Serialize)]
struct Pagination {
    page: u32,
    per_page: u32,
    total_count: i64,
    total_pages: i64,
    has_next: bool,
    has_prev: bool,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    data: Vec<DeviceDataRow>,
    pagination: Pagination,
}

async fn history(
    Query(params): Query<HistoryQuery>,
    State((pool, _config)): State<(PgPool, Config)>,
) -> impl IntoResponse {
    // ---
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params
        .per_page
        .unwrap_or(HISTORY_DEFAULT_PER_PAGE)
        .clamp(1, HISTORY_MAX_PER_PAGE);
    let offset = (page as i64 - 1) * per_page as i64;

    let total_count: i64 = match sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM device_data
        WHERE ($1::text IS NULL OR device_id = $1)
          AND ($2::timestamptz IS NULL OR timestamp >= $2)
          AND ($3::timestamptz IS NULL OR timestamp <= $3)
        "#,
    )
    .bind(params.device_id.as_deref())
    .bind(params.start_time)
    .bind(params.end_time)
    .fetch_one(&pool)
    .await
    {
        Ok(count) => count,
        Err(e) => {
            error!("Failed to count history: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to fetch history"),
            )
                .into_response();
        }
    };

    let result = sqlx::query_as::<_, DeviceDataRow>(
        r#"
        SELECT * FROM device_data
        WHERE ($1::text IS NULL OR device_id = $1)
          AND ($2::timestamptz IS NULL OR timestamp >= $2)
          AND ($3::timestamptz IS NULL OR timestamp <= $3)
        ORDER BY timestamp DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(params.device_id.as_deref())
    .bind(params.start_time)
    .bind(params.end_time)
    .bind(per_page as i64)
    .bind(offset)
    .fetch_all(&pool)
    .await;

    match result {
        Ok(data) => {
            let total_pages = (total_count + per_page as i64 - 1) / per_page as i64;
            let pagination = Pagination {
                page,
                per_page,
                total_count,
                total_pages,
                has_next: (page as i64) < total_pages,
                has_prev: page > 1,
            };
            (StatusCode::OK, Json(HistoryResponse { data, pagination })).into_response()
        }
        Err(e) => {
            error!("Failed to fetch history: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to fetch history"),
            )
                .into_response()
        }
    }
}
