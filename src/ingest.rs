//! Ingestion coordinator: the per-message pipeline.
//!
//! For every raw `(topic, payload)` pair delivered by the transport this
//! module resolves the device, parses the payload, stamps the arrival time,
//! hands the record to the storage sink, and runs alarm policy. Every step
//! is fault-tolerant in isolation: a bad message is logged and counted,
//! never allowed to take down the subscription loop. The running counters
//! are reported once a minute by an independent read-only task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::alarm::{AlarmDecision, AlarmMonitor, AlarmPolicy};
use crate::sink::RecordSink;
use crate::{parse, topic};

// ---

/// How often the counter summary is logged.
const STATS_REPORT_INTERVAL: StdDuration = StdDuration::from_secs(60);

/// Longest payload fragment reproduced in log lines.
const PAYLOAD_PREVIEW_LEN: usize = 120;

// ---

/// Process-wide ingestion counters.
///
/// Written by the coordinator on every message, read by the periodic
/// reporter and by the final shutdown summary.
pub struct IngestStats {
    // ---
    total_received: AtomicU64,
    total_processed: AtomicU64,
    total_errors: AtomicU64,
    start_time: DateTime<Utc>,
    last_message_time: Mutex<Option<DateTime<Utc>>>,
}

impl IngestStats {
    fn new() -> Self {
        // ---
        IngestStats {
            total_received: AtomicU64::new(0),
            total_processed: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            start_time: Utc::now(),
            last_message_time: Mutex::new(None),
        }
    }

    fn message_received(&self, at: DateTime<Utc>) {
        self.total_received.fetch_add(1, Ordering::Relaxed);
        *self.last_message_time.lock() = Some(at);
    }

    fn record_processed(&self) {
        self.total_processed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_received(&self) -> u64 {
        self.total_received.load(Ordering::Relaxed)
    }

    pub fn total_processed(&self) -> u64 {
        self.total_processed.load(Ordering::Relaxed)
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }

    pub fn last_message_time(&self) -> Option<DateTime<Utc>> {
        *self.last_message_time.lock()
    }

    /// Log the uptime and counter summary.
    pub fn log_summary(&self) {
        // ---
        let uptime = Utc::now() - self.start_time;
        info!(
            uptime = %format_uptime(uptime.num_seconds()),
            received = self.total_received(),
            processed = self.total_processed(),
            errors = self.total_errors(),
            last_message = ?self.last_message_time(),
            "ingestion stats"
        );
    }
}

/// Render an uptime in seconds as `H:MM:SS`.
fn format_uptime(total_secs: i64) -> String {
    // ---
    let secs = total_secs.max(0);
    format!(
        "{}:{:02}:{:02}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

// ---

/// Orchestrates the per-message pipeline against an injected sink.
pub struct Ingestor {
    sink: Arc<dyn RecordSink>,
    alarms: AlarmMonitor,
    stats: Arc<IngestStats>,
}

impl Ingestor {
    pub fn new(sink: Arc<dyn RecordSink>, policy: AlarmPolicy) -> Self {
        // ---
        Ingestor {
            sink,
            alarms: AlarmMonitor::new(policy),
            stats: Arc::new(IngestStats::new()),
        }
    }

    /// Handle to the counters, for the reporter and the shutdown summary.
    pub fn stats(&self) -> Arc<IngestStats> {
        Arc::clone(&self.stats)
    }

    /// Process one raw message. Never returns an error: any failure is
    /// logged, counted, and contained to this message.
    pub async fn on_message(&self, topic_str: &str, payload: &[u8], received_at: DateTime<Utc>) {
        // ---
        self.stats.message_received(received_at);

        let Some(device_id) = topic::resolve(topic_str) else {
            // Expected on brokers carrying unrelated traffic; not an error
            warn!(topic = topic_str, "no device id for topic, dropping message");
            return;
        };

        let mut record = match parse::parse(payload) {
            Ok(record) => record,
            Err(e) => {
                self.stats.record_error();
                warn!(
                    topic = topic_str,
                    %device_id,
                    payload = %payload_preview(payload),
                    error = %e,
                    "malformed payload, dropping message"
                );
                return;
            }
        };

        // Arrival time is authoritative here, never taken from the payload
        record.received_at = Some(received_at);

        match self.sink.insert_record(&device_id, &record).await {
            Ok(()) => {
                self.stats.record_processed();
                debug!(%device_id, "record stored");
            }
            Err(e) => {
                // At-most-once into storage: count it and move on
                self.stats.record_error();
                error!(%device_id, error = %e, "failed to store record");
            }
        }

        // Alarm handling does not depend on storage success
        if record.is_alarm {
            self.handle_alarm(&device_id, received_at).await;
        }
    }

    async fn handle_alarm(&self, device_id: &str, now: DateTime<Utc>) {
        // ---
        match self.alarms.check(device_id, now) {
            AlarmDecision::Raised => {
                let message = format!("device {device_id} triggered an alarm");
                warn!(device_id, "device alarm raised");

                if !self.alarms.policy().silent_mode {
                    println!("ALARM: {message}");
                }

                if let Err(e) = self.sink.insert_alarm(device_id, &message, now).await {
                    error!(device_id, error = %e, "failed to record alarm");
                }
            }
            AlarmDecision::Suppressed(reason) => {
                debug!(device_id, ?reason, "device alarm suppressed");
            }
        }
    }
}

// ---

/// Spawn the periodic counter reporter.
///
/// Reads the shared stats once a minute until the shutdown signal flips;
/// never touches the message path.
pub fn spawn_stats_reporter(
    stats: Arc<IngestStats>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    // ---
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(STATS_REPORT_INTERVAL);
        // the first tick completes immediately; skip it
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => stats.log_summary(),
                _ = shutdown.changed() => break,
            }
        }
    })
}

/// Truncate a payload for log output.
fn payload_preview(payload: &[u8]) -> String {
    // ---
    let text = String::from_utf8_lossy(payload);
    if text.chars().count() <= PAYLOAD_PREVIEW_LEN {
        text.into_owned()
    } else {
        let mut preview: String = text.chars().take(PAYLOAD_PREVIEW_LEN).collect();
        preview.push_str("...");
        preview
    }
}

// ---
