//! Connection management for the monitoring stream
//!
//! This module handles stream establishment, the reader task that applies
//! inbound frames to the store, debounced reconnection, and replay of the
//! buffered subscription intent after a reconnect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex, Notify, RwLock};
use tracing::{debug, info, warn};

use crate::config::ReconnectConfig;
use crate::error::{FleetError, Result};
use crate::events::FleetEvent;
use crate::frames::{ControlFrame, StreamFrame};
#[cfg(test)]
use crate::io::TcpConnectionFactory;
use crate::io::{ConnectionFactory, LineReader, MessageWriter};
use crate::store::{new_state_handle, StateHandle};
use crate::subscription::SubscriptionRegistry;

/// Internal connection state
#[derive(Debug, Clone, Default)]
pub(crate) struct ConnectionState {
    pub connected: bool,
    pub reconnecting: bool,
}

/// Shared state for connection management
///
/// Holds all the Arc-wrapped state shared between the client facade, the
/// reader task, and the retry tasks.
#[derive(Clone)]
pub(crate) struct SharedConnectionState {
    pub state: Arc<RwLock<ConnectionState>>,
    pub writer: Arc<Mutex<Option<Box<dyn MessageWriter>>>>,
    pub store: StateHandle,
    pub registry: SubscriptionRegistry,
    pub event_sender: broadcast::Sender<FleetEvent>,
    pub reader_handle: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
    pub reconnect_handle: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
    pub resubscribe_handle: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
    pub auto_reconnect_enabled: Arc<AtomicBool>,
    pub stop_retries: Arc<Notify>,
    pub connection_factory: Arc<dyn ConnectionFactory>,
    pub auth_token: Option<String>,
}

impl SharedConnectionState {
    /// Create a new shared connection state with a TCP factory (test only)
    #[cfg(test)]
    pub fn new(auto_reconnect_enabled: bool) -> Self {
        Self::with_factory(
            auto_reconnect_enabled,
            Arc::new(TcpConnectionFactory::new()),
            None,
        )
    }

    /// Create a new shared connection state with a custom connection factory
    pub fn with_factory(
        auto_reconnect_enabled: bool,
        connection_factory: Arc<dyn ConnectionFactory>,
        auth_token: Option<String>,
    ) -> Self {
        let (event_sender, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(ConnectionState::default())),
            writer: Arc::new(Mutex::new(None)),
            store: new_state_handle(),
            registry: SubscriptionRegistry::new(),
            event_sender,
            reader_handle: Arc::new(Mutex::new(None)),
            reconnect_handle: Arc::new(Mutex::new(None)),
            resubscribe_handle: Arc::new(Mutex::new(None)),
            auto_reconnect_enabled: Arc::new(AtomicBool::new(auto_reconnect_enabled)),
            stop_retries: Arc::new(Notify::new()),
            connection_factory,
            auth_token,
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.connected
    }

    pub async fn is_reconnecting(&self) -> bool {
        self.state.read().await.reconnecting
    }

    pub fn is_auto_reconnect_enabled(&self) -> bool {
        self.auto_reconnect_enabled.load(Ordering::SeqCst)
    }

    pub fn set_auto_reconnect_enabled(&self, enabled: bool) {
        debug!("Setting auto-reconnect enabled: {}", enabled);
        self.auto_reconnect_enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.stop_retries.notify_waiters();
        }
    }

    /// Serialize and send a control frame over the current writer
    pub async fn send_frame(&self, frame: &ControlFrame) -> Result<()> {
        let json = serde_json::to_string(frame)?;
        let mut writer_guard = self.writer.lock().await;
        match writer_guard.as_mut() {
            Some(writer) => writer.write_message(&json).await,
            None => Err(FleetError::NotConnected),
        }
    }

    /// Send the current desired subscription, if there is one.
    /// Returns whether a frame actually went out.
    pub async fn send_current_subscription(&self) -> Result<bool> {
        let Some(frame) = self.registry.subscribe_frame(self.auth_token.as_deref()).await else {
            return Ok(false);
        };
        let servers = match &frame {
            ControlFrame::Subscribe { payload } => payload.servers.len(),
            ControlFrame::Unsubscribe => 0,
        };
        self.send_frame(&frame).await?;
        let _ = self.event_sender.send(FleetEvent::Subscribed { servers });
        Ok(true)
    }

    /// Cancel any scheduled reconnect or resubscribe
    pub async fn cancel_retries(&self) {
        self.stop_retries.notify_waiters();
        if let Some(h) = self.reconnect_handle.lock().await.take() {
            h.abort();
        }
        if let Some(h) = self.resubscribe_handle.lock().await.take() {
            h.abort();
        }
    }
}

/// Configuration for connection attempts
#[derive(Clone)]
pub(crate) struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub connection_timeout_seconds: u64,
    pub reconnect: ReconnectConfig,
}

impl ConnectionConfig {
    fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Open the stream and start the reader task.
///
/// No-op when already connected; that check is what debounces concurrent
/// connection attempts from the facade and the retry tasks.
pub(crate) async fn establish(
    config: &ConnectionConfig,
    shared: &SharedConnectionState,
) -> Result<()> {
    if shared.is_connected().await {
        return Ok(());
    }

    let timeout = Duration::from_secs(config.connection_timeout_seconds);
    let pair = shared
        .connection_factory
        .connect(&config.addr(), timeout)
        .await?;

    {
        let mut writer_guard = shared.writer.lock().await;
        *writer_guard = Some(pair.writer);
    }
    {
        let mut state = shared.state.write().await;
        state.connected = true;
        state.reconnecting = false;
    }

    let reader_handle = spawn_reader_task(pair.reader, config.clone(), shared.clone());
    {
        let mut handle_guard = shared.reader_handle.lock().await;
        *handle_guard = Some(reader_handle);
    }

    debug!("Connected to {}; reader task started", config.addr());
    Ok(())
}

/// Spawn the reader task that applies inbound frames to the store
pub(crate) fn spawn_reader_task(
    mut reader: Box<dyn LineReader>,
    config: ConnectionConfig,
    shared: SharedConnectionState,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let disconnect_reason;

        loop {
            match reader.read_line().await {
                Ok(None) => {
                    debug!("Stream closed by remote");
                    disconnect_reason = "Connection closed by remote".to_string();
                    break;
                }
                Ok(Some(line)) => {
                    if line.is_empty() {
                        continue;
                    }

                    match serde_json::from_str::<StreamFrame>(&line) {
                        Ok(StreamFrame::Snapshot { data }) => {
                            let servers = data.servers.len();
                            let changes = {
                                let mut store = shared.store.write().await;
                                store.apply_snapshot(data.servers, Utc::now())
                            };
                            debug!("Applied snapshot with {} servers", servers);
                            let _ = shared
                                .event_sender
                                .send(FleetEvent::SnapshotApplied { servers });
                            for change in changes {
                                let _ = shared.event_sender.send(FleetEvent::StatusChanged {
                                    id: change.id,
                                    previous: change.previous,
                                    current: change.current,
                                });
                            }
                        }
                        Ok(StreamFrame::Unrecognized) => {
                            debug!("Ignoring unrecognized frame: {}", line);
                        }
                        Err(e) => {
                            debug!("Dropping malformed frame: {} ({})", line, e);
                        }
                    }
                }
                Err(e) => {
                    debug!("Error reading from stream: {}", e);
                    disconnect_reason = format!("Read error: {}", e);
                    break;
                }
            }
        }

        // Connection lost - update state and notify
        {
            let mut state_guard = shared.state.write().await;
            state_guard.connected = false;
        }

        warn!("Monitoring stream lost: {}", disconnect_reason);
        let _ = shared.event_sender.send(FleetEvent::ConnectionLost {
            reason: disconnect_reason,
        });

        // Close the writer
        {
            let mut writer_guard = shared.writer.lock().await;
            if let Some(mut w) = writer_guard.take() {
                let _ = w.shutdown().await;
            }
        }

        // Schedule exactly one reconnect if enabled
        if shared.auto_reconnect_enabled.load(Ordering::SeqCst) {
            debug!("Auto-reconnect enabled, starting reconnection task");
            let reconnect_task = spawn_reconnect_task(config, shared.clone());
            let mut handle = shared.reconnect_handle.lock().await;
            *handle = Some(reconnect_task);
        }
    })
}

/// Spawn a reconnection task.
///
/// One attempt runs per interval, with the wait first so a lost connection
/// is retried after the configured delay rather than immediately. The task
/// is cancelled through `stop_retries` or aborted on teardown.
pub(crate) fn spawn_reconnect_task(
    config: ConnectionConfig,
    shared: SharedConnectionState,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        {
            let mut state_guard = shared.state.write().await;
            state_guard.reconnecting = true;
        }

        let interval = Duration::from_secs(config.reconnect.interval_seconds);
        let max_retries = config.reconnect.max_retries;
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            if !shared.auto_reconnect_enabled.load(Ordering::SeqCst) {
                debug!("Auto-reconnect disabled, stopping reconnection attempts");
                let _ = shared.event_sender.send(FleetEvent::ReconnectFailed {
                    reason: "Auto-reconnect disabled".to_string(),
                });
                break;
            }

            if let Some(max) = max_retries {
                if attempt > max {
                    warn!("Reconnection failed: max retries ({}) exceeded", max);
                    let _ = shared.event_sender.send(FleetEvent::ReconnectFailed {
                        reason: format!("Max retries ({}) exceeded", max),
                    });
                    break;
                }
            }

            info!(
                "Reconnecting to {} (attempt {}/{})",
                config.addr(),
                attempt,
                max_retries.map_or("∞".to_string(), |m| m.to_string())
            );
            let _ = shared.event_sender.send(FleetEvent::Reconnecting {
                attempt,
                max_attempts: max_retries,
            });

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shared.stop_retries.notified() => {
                    debug!("Reconnection cancelled");
                    let _ = shared.event_sender.send(FleetEvent::ReconnectFailed {
                        reason: "Reconnection cancelled".to_string(),
                    });
                    break;
                }
            }

            match establish(&config, &shared).await {
                Ok(()) => {
                    info!("Reconnected to the monitoring backend");
                    let _ = shared.event_sender.send(FleetEvent::Reconnected);

                    // Replay the buffered subscription intent
                    match shared.send_current_subscription().await {
                        Ok(true) => debug!("Subscription replayed after reconnect"),
                        Ok(false) => {}
                        Err(e) => warn!("Failed to replay subscription: {}", e),
                    }
                    return;
                }
                Err(e) => {
                    debug!("Reconnect attempt {} failed: {}", attempt, e);
                }
            }
        }

        // Reconnection over without success - update state
        {
            let mut state_guard = shared.state.write().await;
            state_guard.reconnecting = false;
        }
    })
}

/// Spawn the best-effort convergence loop for a subscription made while the
/// connection is down: wait a beat, bring the link up if needed, and send
/// whatever the desired intent is at that point (the last call wins).
pub(crate) fn spawn_resubscribe_task(
    config: ConnectionConfig,
    shared: SharedConnectionState,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let delay = Duration::from_secs(config.reconnect.resubscribe_delay_seconds);

        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shared.stop_retries.notified() => {
                    debug!("Subscription retry cancelled");
                    return;
                }
            }

            if shared.registry.desired().await.is_none() {
                return;
            }

            if !shared.is_connected().await {
                if let Err(e) = establish(&config, &shared).await {
                    debug!("Connect for pending subscription failed: {}", e);
                    continue;
                }
            }

            match shared.send_current_subscription().await {
                Ok(_) => {
                    debug!("Pending subscription sent");
                    return;
                }
                Err(e) => {
                    debug!("Pending subscription send failed: {}", e);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_state_default() {
        let state = ConnectionState::default();
        assert!(!state.connected);
        assert!(!state.reconnecting);
    }

    #[test]
    fn shared_state_auto_reconnect_flag() {
        let shared = SharedConnectionState::new(true);
        assert!(shared.is_auto_reconnect_enabled());

        shared.set_auto_reconnect_enabled(false);
        assert!(!shared.is_auto_reconnect_enabled());

        shared.set_auto_reconnect_enabled(true);
        assert!(shared.is_auto_reconnect_enabled());
    }

    #[tokio::test]
    async fn shared_state_initial_values() {
        let shared = SharedConnectionState::new(true);
        assert!(!shared.is_connected().await);
        assert!(!shared.is_reconnecting().await);
        assert!(shared.store.read().await.is_empty());
        assert!(shared.registry.desired().await.is_none());
    }

    #[tokio::test]
    async fn send_frame_without_writer_is_not_connected() {
        let shared = SharedConnectionState::new(false);
        let err = shared.send_frame(&ControlFrame::Unsubscribe).await;
        assert!(matches!(err, Err(FleetError::NotConnected)));
    }

    #[tokio::test]
    async fn send_current_subscription_without_intent_is_noop() {
        let shared = SharedConnectionState::new(false);
        let sent = shared.send_current_subscription().await.unwrap();
        assert!(!sent);
    }
}
