//! Events broadcast to consumers of the fleet view
//!
//! Views hold a broadcast receiver and re-render on store mutation
//! notifications; connection lifecycle events carry the degraded flag.

use crate::status::HealthStatus;

/// Notification fanned out to every subscribed consumer
#[derive(Debug, Clone)]
pub enum FleetEvent {
    /// A snapshot frame was applied to the store
    SnapshotApplied { servers: usize },

    /// A server's derived status changed
    StatusChanged {
        id: String,
        /// None when the server was not known before
        previous: Option<HealthStatus>,
        current: HealthStatus,
    },

    /// A subscribe frame went out for this many servers
    Subscribed { servers: usize },

    /// Interest was dropped and the store cleared
    Unsubscribed,

    /// The stream went down; the fleet view is stale from here on
    ConnectionLost { reason: String },

    /// A reconnect attempt is about to run
    Reconnecting {
        attempt: u32,
        max_attempts: Option<u32>,
    },

    /// The stream is back up
    Reconnected,

    /// Reconnection gave up or was cancelled
    ReconnectFailed { reason: String },
}
