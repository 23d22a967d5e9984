//! Shoutbox demo entry point.
//!
//! Starts several participants on one in-memory store, lets each shout a
//! line to the others, logs what every participant receives, then shuts
//! them all down and checks that the store is empty again.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use storage_messenger::MessengerError;
use storage_messenger::config::{LogFormat, MessengerConfig};
use storage_messenger::hub::{Hub, listener};
use storage_messenger::store::{MemoryStore, SharedStore};
use storage_messenger::transport::TransportOptions;

const SHOUT_EVENT: &str = "shout";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = MessengerConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    if let Err(err) = run(&config).await {
        tracing::error!(code = err.error_code(), error = %err, "shoutbox failed");
        return Err(err.into());
    }

    Ok(())
}

async fn run(config: &MessengerConfig) -> Result<(), MessengerError> {
    tracing::info!(
        participants = config.shoutbox_participants,
        ttl_ms = config.transport.ttl.as_millis(),
        heartbeat_ms = config.transport.heartbeat_interval.as_millis(),
        "starting shoutbox"
    );

    let store = match config.store_quota_bytes {
        Some(limit) => MemoryStore::with_quota(limit),
        None => MemoryStore::new(),
    };

    // One hub per participant, each on its own store handle
    let mut hubs = Vec::with_capacity(config.shoutbox_participants);
    for _ in 0..config.shoutbox_participants {
        let handle: Arc<dyn SharedStore> = Arc::new(store.connect());
        let options = TransportOptions::default().with_config(config.transport);
        let hub = Hub::create_with(handle, options)?;

        let me = hub.target_id().clone();
        hub.on(
            SHOUT_EVENT,
            listener(move |params| {
                tracing::info!(participant = %me, %params, "received shout");
            }),
        );
        hubs.push(hub);
    }

    for hub in &hubs {
        let text = format!("hello from {}", hub.target_id());
        let recipients = hub.trigger(SHOUT_EVENT, &text)?;
        tracing::info!(participant = %hub.target_id(), recipients, "shouted");
    }

    // Give the change feeds and a couple of heartbeats time to run
    tokio::time::sleep(config.transport.heartbeat_interval * 2 + Duration::from_millis(50)).await;

    for hub in &hubs {
        hub.destroy();
    }
    tracing::info!(entries_left = store.len(), "shoutbox finished");

    Ok(())
}
