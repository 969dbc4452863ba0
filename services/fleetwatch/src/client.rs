//! Client facade for the monitoring backend

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::config::StreamConfig;
use crate::connection::{
    establish, spawn_resubscribe_task, ConnectionConfig, ConnectionState, SharedConnectionState,
};
use crate::error::Result;
use crate::events::FleetEvent;
use crate::frames::ControlFrame;
use crate::io::{ConnectionFactory, TcpConnectionFactory};
use crate::status::HealthStatus;
use crate::store::StateHandle;
use crate::subscription::Subscription;
use crate::types::ServerRecord;

/// Client for the monitoring backend.
///
/// Owns the stream connection, the subscription registry, and the fleet
/// state store. Construct one per process and hand it to every view; tests
/// instantiate isolated instances with a mock connection factory.
pub struct MonitorClient {
    config: StreamConfig,
    shared: SharedConnectionState,
}

impl MonitorClient {
    /// Create a new client with the given configuration
    ///
    /// Uses the default TCP connection factory for production use.
    pub fn new(config: StreamConfig, auth_token: Option<String>) -> Self {
        Self::with_connection_factory(config, auth_token, Arc::new(TcpConnectionFactory::new()))
    }

    /// Create a new client with a custom connection factory
    pub fn with_connection_factory(
        config: StreamConfig,
        auth_token: Option<String>,
        connection_factory: Arc<dyn ConnectionFactory>,
    ) -> Self {
        let auto_reconnect_enabled = config.reconnect.enabled;
        Self {
            shared: SharedConnectionState::with_factory(
                auto_reconnect_enabled,
                connection_factory,
                auth_token,
            ),
            config,
        }
    }

    fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            host: self.config.host.clone(),
            port: self.config.port,
            connection_timeout_seconds: self.config.connection_timeout_seconds,
            reconnect: self.config.reconnect.clone(),
        }
    }

    /// Connect to the monitoring backend. No-op when already connected.
    pub async fn connect(&self) -> Result<()> {
        if self.shared.is_connected().await {
            debug!("Already connected, ignoring connect()");
            return Ok(());
        }

        // A fresh explicit connect supersedes any scheduled retry
        self.shared.cancel_retries().await;

        establish(&self.connection_config(), &self.shared).await
    }

    /// Tear down the connection, cancel every pending timer, and clear the
    /// fleet map. Consumers must treat the cleared map as unknown, not as
    /// all healthy.
    pub async fn disconnect(&self) -> Result<()> {
        debug!("Disconnecting from the monitoring backend");

        self.shared.cancel_retries().await;

        {
            let mut handle = self.shared.reader_handle.lock().await;
            if let Some(h) = handle.take() {
                h.abort();
            }
        }
        {
            let mut writer = self.shared.writer.lock().await;
            if let Some(mut w) = writer.take() {
                let _ = w.shutdown().await;
            }
        }
        {
            let mut state = self.shared.state.write().await;
            *state = ConnectionState::default();
        }
        {
            self.shared.store.write().await.clear();
        }

        debug!("Disconnected");
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.shared.is_connected().await
    }

    pub async fn is_reconnecting(&self) -> bool {
        self.shared.is_reconnecting().await
    }

    /// Check if auto-reconnect is currently enabled
    pub fn is_auto_reconnect_enabled(&self) -> bool {
        self.shared.is_auto_reconnect_enabled()
    }

    /// Enable or disable auto-reconnect
    pub fn set_auto_reconnect_enabled(&self, enabled: bool) {
        self.shared.set_auto_reconnect_enabled(enabled);
    }

    /// Subscribe to fleet events
    pub fn subscribe_events(&self) -> broadcast::Receiver<FleetEvent> {
        self.shared.event_sender.subscribe()
    }

    /// Shared handle to the fleet state store
    pub fn store(&self) -> StateHandle {
        Arc::clone(&self.shared.store)
    }

    /// Declare interest in the main section of a set of servers.
    ///
    /// Each call fully replaces the previous subscription. When the
    /// connection is not open yet the call connects and retries the send
    /// after a short delay instead of failing.
    pub async fn subscribe_to_servers(&self, server_ids: Vec<String>) -> Result<()> {
        self.apply_subscription(Subscription::fleet(server_ids))
            .await
    }

    /// Request every section for one server, addressed by its (url, port)
    /// pair. Callable repeatedly to force a resync after a mutating action.
    pub async fn subscribe_to_specific_server(&self, url: &str, port: u16) -> Result<()> {
        self.apply_subscription(Subscription::detail(url, port))
            .await
    }

    async fn apply_subscription(&self, subscription: Subscription) -> Result<()> {
        self.shared.registry.replace(subscription).await;

        // A pending retry would only resend what we are about to send
        {
            let mut handle = self.shared.resubscribe_handle.lock().await;
            if let Some(h) = handle.take() {
                h.abort();
            }
        }

        if !self.shared.is_connected().await {
            if let Err(e) = self.connect().await {
                debug!("Connect for subscription failed, retrying shortly: {}", e);
            }
        }

        if self.shared.is_connected().await {
            self.shared.send_current_subscription().await?;
            return Ok(());
        }

        // Best-effort convergence: send once the link comes up
        let handle = spawn_resubscribe_task(self.connection_config(), self.shared.clone());
        {
            let mut handle_guard = self.shared.resubscribe_handle.lock().await;
            *handle_guard = Some(handle);
        }
        Ok(())
    }

    /// Declare no further interest. The control frame goes out best-effort
    /// and the fleet map is cleared immediately, optimistically.
    pub async fn unsubscribe(&self) -> Result<()> {
        self.shared.registry.clear().await;

        {
            let mut handle = self.shared.resubscribe_handle.lock().await;
            if let Some(h) = handle.take() {
                h.abort();
            }
        }

        if self.shared.is_connected().await {
            if let Err(e) = self.shared.send_frame(&ControlFrame::Unsubscribe).await {
                debug!("Unsubscribe send failed: {}", e);
            }
        }

        self.shared.store.write().await.clear();
        let _ = self.shared.event_sender.send(FleetEvent::Unsubscribed);
        Ok(())
    }

    /// Derived status for a server currently in the store; None when unknown
    pub async fn get_server_status(&self, id: &str) -> Option<HealthStatus> {
        self.shared.store.read().await.status_of(id)
    }

    /// Record lookup by the (url, port) pair; None when the server is not
    /// subscribed or not yet reported
    pub async fn get_server_by_url_port(&self, url: &str, port: u16) -> Option<ServerRecord> {
        self.shared
            .store
            .read()
            .await
            .get_by_url_port(url, port)
            .cloned()
    }
}
