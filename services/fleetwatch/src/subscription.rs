//! Subscription registry: the client's current desired subscription
//!
//! Each change fully replaces the previous intent; the registry never diffs
//! or merges. The backend reconciles overlapping intents from one client.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::frames::{ControlFrame, Section, SubscribePayload};

/// The full replacement set of servers and sections the client wants pushed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub servers: Vec<String>,
    pub sections: Vec<Section>,
}

impl Subscription {
    /// Fleet-wide interest: the main section for a list of server ids
    pub fn fleet(servers: Vec<String>) -> Self {
        Self {
            servers,
            sections: vec![Section::Main],
        }
    }

    /// Detail interest: every section for one server, addressed by the
    /// stable (url, port) pair
    pub fn detail(url: &str, port: u16) -> Self {
        Self {
            servers: vec![format!("{}:{}", url, port)],
            sections: Section::all(),
        }
    }

    /// Control frame carrying this intent
    pub fn to_frame(&self, token: Option<&str>) -> ControlFrame {
        ControlFrame::Subscribe {
            payload: SubscribePayload {
                servers: self.servers.clone(),
                sections: self.sections.clone(),
                token: token.map(str::to_string),
            },
        }
    }
}

/// Tracks the desired subscription across connects and reconnects
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    desired: Arc<Mutex<Option<Subscription>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the desired subscription; the last call wins
    pub async fn replace(&self, subscription: Subscription) {
        *self.desired.lock().await = Some(subscription);
    }

    /// Drop all interest
    pub async fn clear(&self) {
        *self.desired.lock().await = None;
    }

    pub async fn desired(&self) -> Option<Subscription> {
        self.desired.lock().await.clone()
    }

    /// Subscribe frame for the current intent, if there is one
    pub async fn subscribe_frame(&self, token: Option<&str>) -> Option<ControlFrame> {
        self.desired.lock().await.as_ref().map(|s| s.to_frame(token))
    }
}
