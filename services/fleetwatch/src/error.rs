//! Error types for the fleetwatch client

/// Errors that can occur while monitoring the fleet
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("Not connected to the monitoring backend")]
    NotConnected,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to send message: {0}")]
    SendError(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Ledger request rejected: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for fleetwatch operations
pub type Result<T> = std::result::Result<T, FleetError>;
