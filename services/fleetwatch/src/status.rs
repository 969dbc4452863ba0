//! Health status derivation
//!
//! The one place status is computed. Every consumer goes through
//! [`derive_status`]; the precedence order is a contract with the views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{MainSection, ServerRecord};

/// Backend response code for a reachable server
const STATUS_OK: u16 = 200;

/// Shown when no duration or timestamp can be derived
const PLACEHOLDER: &str = "—";

/// Traffic-light health of a monitored server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Green,
    Yellow,
    Red,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Green => write!(f, "green"),
            HealthStatus::Yellow => write!(f, "yellow"),
            HealthStatus::Red => write!(f, "red"),
        }
    }
}

/// Reduce a server record to its traffic-light status.
///
/// Precedence, first match wins:
/// 1. red when the server is unreachable (`!ok` or a non-200 status),
/// 2. yellow when reachable but degraded (a recorded error time, or any
///    enabled camera with a problem stream),
/// 3. green otherwise.
///
/// A record without a `main` section is red: unknown is never healthy.
pub fn derive_status(record: &ServerRecord) -> HealthStatus {
    match record.sections.main.as_ref() {
        Some(main) => derive_status_from_main(main),
        None => HealthStatus::Red,
    }
}

/// Status from the main section alone; see [`derive_status`]
pub fn derive_status_from_main(main: &MainSection) -> HealthStatus {
    if !main.ok || main.status != STATUS_OK {
        return HealthStatus::Red;
    }
    if main.last_error_time.is_some() || main.enabled_with_problem_stream > 0 {
        return HealthStatus::Yellow;
    }
    HealthStatus::Green
}

/// Format the uptime cell for a server.
///
/// Red servers show elapsed downtime as a negative duration since the later
/// of the caller-supplied override (typically the ledger's `down_at`) and the
/// record's last error time. Other servers show the backend-reported uptime
/// string verbatim. A missing or future timestamp renders the placeholder.
pub fn format_uptime(
    record: &ServerRecord,
    down_since: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> String {
    let main = record.sections.main.as_ref();

    if derive_status(record) != HealthStatus::Red {
        return main
            .and_then(|m| m.uptime.clone())
            .unwrap_or_else(|| PLACEHOLDER.to_string());
    }

    let last_error = main.and_then(|m| m.last_error_time);
    let since = match (down_since, last_error) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };
    let Some(since) = since else {
        return PLACEHOLDER.to_string();
    };

    let elapsed = now.signed_duration_since(since);
    if elapsed < chrono::Duration::zero() {
        return PLACEHOLDER.to_string();
    }

    let minutes = elapsed.num_minutes();
    format!("-{}ч {}м", minutes / 60, minutes % 60)
}
