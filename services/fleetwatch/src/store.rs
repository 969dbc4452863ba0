//! Fleet state store: the authoritative in-memory map of monitored servers
//!
//! The store is the only writer; everything else reads derived snapshots
//! through the shared handle. Snapshot frames replace the map at server
//! granularity (full resync), while sections merge at record granularity:
//! a section absent from an incoming record keeps its previous value.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::status::{derive_status, HealthStatus};
use crate::types::ServerRecord;

/// A server whose derived status changed when a snapshot was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub id: String,
    /// None when the server was not in the store before
    pub previous: Option<HealthStatus>,
    pub current: HealthStatus,
}

/// In-memory fleet state
#[derive(Debug, Default)]
pub struct FleetState {
    servers: HashMap<String, ServerRecord>,
}

impl FleetState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a snapshot frame.
    ///
    /// Servers absent from the snapshot are dropped. For servers already
    /// known, sections absent from the incoming record are carried forward
    /// from the previous one, and `updated_at` is stamped with `now`.
    /// Returns the derived status changes for interested consumers.
    pub fn apply_snapshot(
        &mut self,
        incoming: Vec<ServerRecord>,
        now: DateTime<Utc>,
    ) -> Vec<StatusChange> {
        let mut previous = std::mem::take(&mut self.servers);
        let mut changes = Vec::new();

        for mut record in incoming {
            let prior = previous.remove(&record.id);
            let prior_status = prior.as_ref().map(derive_status);

            if let Some(prior) = prior {
                let mut sections = prior.sections;
                sections.merge_from(record.sections);
                record.sections = sections;
            }
            record.updated_at = Some(now);

            let current = derive_status(&record);
            if prior_status != Some(current) {
                changes.push(StatusChange {
                    id: record.id.clone(),
                    previous: prior_status,
                    current,
                });
            }
            self.servers.insert(record.id.clone(), record);
        }

        changes
    }

    /// Drop everything. A cleared map reads as unknown, not as all healthy.
    pub fn clear(&mut self) {
        self.servers.clear();
    }

    pub fn get(&self, id: &str) -> Option<&ServerRecord> {
        self.servers.get(id)
    }

    /// Linear lookup by the (url, port) pair of the main section.
    /// Absence means the server is not subscribed or not yet reported.
    pub fn get_by_url_port(&self, url: &str, port: u16) -> Option<&ServerRecord> {
        self.servers.values().find(|record| {
            record
                .sections
                .main
                .as_ref()
                .is_some_and(|main| main.url == url && main.port == port)
        })
    }

    /// Derived status for a server currently in the store
    pub fn status_of(&self, id: &str) -> Option<HealthStatus> {
        self.servers.get(id).map(derive_status)
    }

    pub fn records(&self) -> impl Iterator<Item = &ServerRecord> {
        self.servers.values()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

/// Shared handle to the process-wide fleet state
pub type StateHandle = Arc<RwLock<FleetState>>;

pub fn new_state_handle() -> StateHandle {
    Arc::new(RwLock::new(FleetState::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, body: &str) -> ServerRecord {
        serde_json::from_str(&format!(r#"{{"id": "{}", "sections": {}}}"#, id, body)).unwrap()
    }

    fn healthy(id: &str, url: &str, port: u16) -> ServerRecord {
        record(
            id,
            &format!(
                r#"{{"main": {{"ok": true, "status": 200, "url": "{}", "port": {}}}}}"#,
                url, port
            ),
        )
    }

    fn now() -> DateTime<Utc> {
        "2024-01-01T00:00:00Z".parse().unwrap()
    }

    #[test]
    fn snapshot_populates_and_stamps_updated_at() {
        let mut state = FleetState::new();
        let changes = state.apply_snapshot(vec![healthy("srv1", "a", 1)], now());

        assert_eq!(state.len(), 1);
        assert_eq!(state.get("srv1").unwrap().updated_at, Some(now()));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].previous, None);
        assert_eq!(changes[0].current, HealthStatus::Green);
    }

    #[test]
    fn server_absent_from_newer_snapshot_is_dropped() {
        let mut state = FleetState::new();
        state.apply_snapshot(vec![healthy("srv1", "a", 1), healthy("srv2", "b", 2)], now());
        assert_eq!(state.len(), 2);

        state.apply_snapshot(vec![healthy("srv1", "a", 1)], now());
        assert_eq!(state.len(), 1);
        assert!(state.get("srv2").is_none());
    }

    #[test]
    fn section_absent_from_newer_record_is_carried_forward() {
        let mut state = FleetState::new();
        state.apply_snapshot(
            vec![record(
                "srv1",
                r#"{
                    "main": {"ok": true, "status": 200, "url": "a", "port": 1},
                    "camerasName": {"1": {"name": "Gate", "enabled": true}}
                }"#,
            )],
            now(),
        );

        // Next snapshot only refreshes main
        state.apply_snapshot(
            vec![record(
                "srv1",
                r#"{"main": {"ok": false, "status": 500, "url": "a", "port": 1}}"#,
            )],
            now(),
        );

        let srv = state.get("srv1").unwrap();
        assert!(!srv.sections.main.as_ref().unwrap().ok);
        let cameras = srv.sections.cameras_name.as_ref().unwrap();
        assert_eq!(cameras["1"].name, "Gate");
    }

    #[test]
    fn section_present_in_newer_record_replaces_wholly() {
        let mut state = FleetState::new();
        state.apply_snapshot(
            vec![record(
                "srv1",
                r#"{
                    "main": {"ok": true, "status": 200, "url": "a", "port": 1},
                    "camerasName": {"1": {"name": "Gate", "enabled": true}}
                }"#,
            )],
            now(),
        );

        state.apply_snapshot(
            vec![record(
                "srv1",
                r#"{
                    "main": {"ok": true, "status": 200, "url": "a", "port": 1},
                    "camerasName": {"2": {"name": "Dock", "enabled": false}}
                }"#,
            )],
            now(),
        );

        let cameras = state
            .get("srv1")
            .unwrap()
            .sections
            .cameras_name
            .as_ref()
            .unwrap();
        assert!(cameras.get("1").is_none());
        assert_eq!(cameras["2"].name, "Dock");
    }

    #[test]
    fn status_change_reported_once_per_transition() {
        let mut state = FleetState::new();
        state.apply_snapshot(vec![healthy("srv1", "a", 1)], now());

        // Same status again: no change reported
        let changes = state.apply_snapshot(vec![healthy("srv1", "a", 1)], now());
        assert!(changes.is_empty());

        // Flip to red
        let changes = state.apply_snapshot(
            vec![record(
                "srv1",
                r#"{"main": {"ok": false, "status": 500, "url": "a", "port": 1}}"#,
            )],
            now(),
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].previous, Some(HealthStatus::Green));
        assert_eq!(changes[0].current, HealthStatus::Red);
    }

    #[test]
    fn get_by_url_port_finds_match() {
        let mut state = FleetState::new();
        state.apply_snapshot(vec![healthy("srv1", "a", 1), healthy("srv2", "b", 2)], now());

        let found = state.get_by_url_port("b", 2).unwrap();
        assert_eq!(found.id, "srv2");
    }

    #[test]
    fn get_by_url_port_absent_is_none() {
        let mut state = FleetState::new();
        state.apply_snapshot(vec![healthy("srv1", "a", 1)], now());

        assert!(state.get_by_url_port("a", 2).is_none());
        assert!(state.get_by_url_port("nope", 1).is_none());

        // A record without a main section never matches
        state.apply_snapshot(vec![record("srv3", "{}")], now());
        assert!(state.get_by_url_port("", 0).is_none());
    }

    #[test]
    fn clear_empties_the_map() {
        let mut state = FleetState::new();
        state.apply_snapshot(vec![healthy("srv1", "a", 1)], now());
        assert!(!state.is_empty());

        state.clear();
        assert!(state.is_empty());
        assert!(state.status_of("srv1").is_none());
    }
}
