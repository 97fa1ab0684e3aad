//! Storage sink boundary for the ingestion pipeline.
//!
//! The coordinator only knows this trait; the PostgreSQL implementation is
//! the production sink and an in-memory one backs the pipeline tests. The
//! sink owns its own failure discipline; the coordinator treats any error
//! as terminal for that one message and never retries.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::record::DeviceRecord;

// ---

#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persist one canonical record for `device_id`.
    async fn insert_record(&self, device_id: &str, record: &DeviceRecord) -> Result<()>;

    /// Persist one raised-alarm entry for `device_id`.
    async fn insert_alarm(
        &self,
        device_id: &str,
        message: &str,
        raised_at: DateTime<Utc>,
    ) -> Result<()>;
}

// ---

/// Production sink writing to the `device_data` and `alarm_records` tables.
#[derive(Clone)]
pub struct PgRecordSink {
    pool: PgPool,
}

impl PgRecordSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordSink for PgRecordSink {
    async fn insert_record(&self, device_id: &str, record: &DeviceRecord) -> Result<()> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO device_data (
                device_id, raw_value, rms_value, threshold_value,
                state, movement_count, is_connected, is_alarm, timestamp
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(device_id)
        .bind(record.raw_value)
        .bind(record.rms_value)
        .bind(record.threshold_value)
        .bind(record.state)
        .bind(record.movement_count)
        .bind(record.is_connected)
        .bind(record.is_alarm)
        .bind(record.received_at.unwrap_or_else(Utc::now))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_alarm(
        &self,
        device_id: &str,
        message: &str,
        raised_at: DateTime<Utc>,
    ) -> Result<()> {
        // ---
        // The wire formats carry no severity, so device-originated alarms
        // are recorded at a fixed level.
        sqlx::query(
            r#"
            INSERT INTO alarm_records (device_id, alarm_type, alarm_level, message, timestamp)
            VALUES ($1, 'device_alarm', 'HIGH', $2, $3)
            "#,
        )
        .bind(device_id)
        .bind(message)
        .bind(raised_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ---

/// In-memory sink for exercising the coordinator without a database.
#[cfg(test)]
pub mod memory {
    // ---
    use std::sync::atomic::{AtomicBool, Ordering};

    use anyhow::anyhow;
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct MemorySink {
        pub records: Mutex<Vec<(String, DeviceRecord)>>,
        pub alarms: Mutex<Vec<(String, DateTime<Utc>)>>,
        fail_records: AtomicBool,
    }

    impl MemorySink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make subsequent `insert_record` calls fail, simulating a sick
        /// database. Alarm writes keep working.
        pub fn fail_records(&self, fail: bool) {
            self.fail_records.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl RecordSink for MemorySink {
        async fn insert_record(&self, device_id: &str, record: &DeviceRecord) -> Result<()> {
            if self.fail_records.load(Ordering::SeqCst) {
                return Err(anyhow!("simulated storage failure"));
            }
            self.records
                .lock()
                .push((device_id.to_string(), record.clone()));
            Ok(())
        }

        async fn insert_alarm(
            &self,
            device_id: &str,
            _message: &str,
            raised_at: DateTime<Utc>,
        ) -> Result<()> {
            self.alarms.lock().push((device_id.to_string(), raised_at));
            Ok(())
        }
    }
}
