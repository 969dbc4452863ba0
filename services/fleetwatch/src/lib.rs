//! Fleetwatch - fleet monitoring client
//!
//! Maintains a live picture of a fleet of monitored servers over a
//! persistent JSON stream, derives traffic-light health status for each
//! server, and reconciles against the downtime ledger.

pub mod client;
pub mod config;
pub mod connection;
pub mod downtime;
pub mod error;
pub mod events;
pub mod frames;
pub mod io;
pub mod status;
pub mod store;
pub mod subscription;
pub mod types;

pub use client::MonitorClient;
pub use config::{load_config, Config};
pub use downtime::{DowntimeClient, DowntimeFilter, DowntimeQuery, DowntimeSelector};
pub use error::{FleetError, Result};
pub use events::FleetEvent;
pub use status::{derive_status, format_uptime, HealthStatus};
pub use types::{DowntimeEvent, ServerRecord};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::io::ReqwestHttpClient;

/// Run the monitoring service with the given configuration
///
/// Subscribes to the configured server set, logs health transitions from
/// the event stream, polls the downtime ledger at a fixed interval, and
/// tears down cleanly on ctrl-c.
pub async fn run(config: Config) -> Result<()> {
    let cancel = CancellationToken::new();

    let client = Arc::new(MonitorClient::new(
        config.stream.clone(),
        config.api.auth_token.clone(),
    ));
    let mut events = client.subscribe_events();

    if config.watch.servers.is_empty() {
        tracing::warn!("No servers configured to watch");
    } else {
        client
            .subscribe_to_servers(config.watch.servers.clone())
            .await?;
        tracing::info!("Watching {} server(s)", config.watch.servers.len());
    }

    // Shutdown handler
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for ctrl-c");
        tracing::info!("Shutdown signal received");
        cancel_for_signal.cancel();
    });

    // Periodic ledger reconciliation
    let downtime = DowntimeClient::new(
        config.api.base_url.clone(),
        Arc::new(ReqwestHttpClient::new(config.api.auth_token.clone())),
    );
    let poll_interval = Duration::from_secs(config.watch.downtime_poll_interval_seconds);
    let cancel_for_poll = cancel.clone();
    let poll_handle = tokio::spawn(async move {
        poll_ledger_loop(downtime, poll_interval, cancel_for_poll).await;
    });

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(FleetEvent::StatusChanged { id, previous, current }) => {
                    let previous = previous
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    tracing::info!("Server '{}' status: {} -> {}", id, previous, current);
                }
                Ok(FleetEvent::ConnectionLost { reason }) => {
                    tracing::warn!("Stream lost, fleet view is stale: {}", reason);
                }
                Ok(FleetEvent::Reconnected) => {
                    tracing::info!("Stream reconnected");
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event stream lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = cancel.cancelled() => break,
        }
    }

    let _ = poll_handle.await;
    client.disconnect().await?;
    tracing::info!("Fleetwatch stopped");

    Ok(())
}

async fn poll_ledger_loop(client: DowntimeClient, interval: Duration, cancel: CancellationToken) {
    loop {
        match client
            .query(&DowntimeQuery::new(DowntimeFilter::ServersDown))
            .await
        {
            Ok(events) if !events.is_empty() => {
                tracing::info!("{} server outage(s) ongoing", events.len());
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Downtime ledger query failed: {}", e);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => {
                tracing::debug!("Ledger polling cancelled");
                break;
            }
        }
    }
}
