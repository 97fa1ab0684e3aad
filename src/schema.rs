//! Database schema management for `sleepflow`.
//!
//! Ensures required tables and indexes exist before ingesting messages.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `device_data` table for normalized telemetry and the
/// `alarm_records` table for raised alarms. Safe to call on every startup;
/// no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Core table for normalized telemetry served by /api/data/*
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS device_data (
            id              BIGSERIAL PRIMARY KEY,
            device_id       TEXT             NOT NULL,
            raw_value       INTEGER,
            rms_value       DOUBLE PRECISION,
            threshold_value DOUBLE PRECISION,
            state           SMALLINT,
            movement_count  INTEGER,
            is_connected    BOOLEAN          NOT NULL DEFAULT TRUE,
            is_alarm        BOOLEAN          NOT NULL DEFAULT FALSE,
            timestamp       TIMESTAMPTZ      NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Raised (non-suppressed) device alarms
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS alarm_records (
            id          BIGSERIAL PRIMARY KEY,
            device_id   TEXT        NOT NULL,
            alarm_type  TEXT        NOT NULL,
            alarm_level TEXT        NOT NULL,
            message     TEXT,
            timestamp   TIMESTAMPTZ NOT NULL DEFAULT now(),
            resolved    BOOLEAN     NOT NULL DEFAULT FALSE
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Basic indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_device_data_device_id
            ON device_data (device_id);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_device_data_timestamp
            ON device_data (timestamp);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_device_data_device_timestamp
            ON device_data (device_id, timestamp);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_alarm_records_device_id
            ON alarm_records (device_id);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
