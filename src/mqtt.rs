//! MQTT transport adapter.
//!
//! Owns the broker connection and feeds every published message into the
//! ingestion coordinator. The loop never gives up on its own: connection
//! errors are logged and retried after a short pause, and subscriptions are
//! re-established on every (re)connect. Only the shutdown signal ends it,
//! after which the in-flight message (handling is serialized in this task)
//! has already completed.

use std::time::Duration;

use chrono::Utc;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::MqttConfig;
use crate::ingest::Ingestor;

// ---

/// Topic filters the receiver subscribes to: wildcard per-device channels
/// plus the two legacy fixed topics.
const SUBSCRIBE_TOPICS: [&str; 5] = [
    "sleep_blanket/+/data",
    "sleep_blanket/+/status",
    "sleep_blanket/+/alarm",
    "device/sleep_blanket",
    "sensors/sleep_monitor",
];

const EVENT_CHANNEL_CAPACITY: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

// ---

/// Run the subscription loop until the shutdown signal flips.
pub async fn run(cfg: MqttConfig, ingestor: Ingestor, mut shutdown: watch::Receiver<bool>) {
    // ---
    let mut options = MqttOptions::new(
        cfg.client_id.as_str(),
        cfg.broker_host.as_str(),
        cfg.broker_port,
    );
    options.set_keep_alive(Duration::from_secs(cfg.keepalive_secs));
    if let (Some(user), Some(pass)) = (&cfg.username, &cfg.password) {
        options.set_credentials(user, pass);
    }

    let (client, mut eventloop) = AsyncClient::new(options, EVENT_CHANNEL_CAPACITY);

    info!(
        broker = %cfg.broker_host,
        port = cfg.broker_port,
        "starting MQTT ingestion loop"
    );

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("shutdown signal received, stopping MQTT loop");
                break;
            }
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!(broker = %cfg.broker_host, "connected to MQTT broker");
                    subscribe_all(&client).await;
                }
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    ingestor
                        .on_message(&publish.topic, &publish.payload, Utc::now())
                        .await;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "MQTT connection error, retrying");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    if let Err(e) = client.disconnect().await {
        warn!(error = %e, "MQTT disconnect failed");
    }
}

// ---

/// Subscribe to every configured topic filter.
///
/// Called on each ConnAck so a broker reconnect restores the full set.
async fn subscribe_all(client: &AsyncClient) {
    // ---
    for topic in SUBSCRIBE_TOPICS {
        match client.subscribe(topic, QoS::AtLeastOnce).await {
            Ok(()) => info!(topic, "subscribed"),
            Err(e) => error!(topic, error = %e, "subscribe failed"),
        }
    }
}
