//! Data model for server monitoring records and downtime events

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One monitored server as reported by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRecord {
    /// Opaque identifier, stable across reconnects
    pub id: String,
    #[serde(default)]
    pub sections: Sections,
    /// When any section was last refreshed; set locally by the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ServerRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sections: Sections::default(),
            updated_at: None,
        }
    }
}

/// Per-server data sections. A section the backend did not send is `None`
/// and keeps its previously known value when merged into the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sections {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<MainSection>,
    #[serde(
        rename = "camerasName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cameras_name: Option<HashMap<String, CameraName>>,
    #[serde(
        rename = "mediaState",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub media_state: Option<HashMap<String, MediaState>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<UserEntry>>,
}

impl Sections {
    /// Merge newer sections into self. Sections present in `newer` replace
    /// the current value; absent sections are carried forward.
    pub fn merge_from(&mut self, newer: Sections) {
        if newer.main.is_some() {
            self.main = newer.main;
        }
        if newer.cameras_name.is_some() {
            self.cameras_name = newer.cameras_name;
        }
        if newer.media_state.is_some() {
            self.media_state = newer.media_state;
        }
        if newer.users.is_some() {
            self.users = newer.users;
        }
    }
}

/// Liveness flags and camera counters for a server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MainSection {
    pub ok: bool,
    /// Backend response code; 200 means reachable
    pub status: u16,
    #[serde(default)]
    pub last_error_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_cameras: u32,
    #[serde(default)]
    pub enabled_cameras: u32,
    #[serde(default)]
    pub enabled_with_problem_stream: u32,
    #[serde(default)]
    pub enabled_all_streams_ok: u32,
    /// Formatted duration string reported by the server itself
    #[serde(default)]
    pub uptime: Option<String>,
    pub url: String,
    pub port: u16,
    #[serde(default)]
    pub name: Option<String>,
}

/// Camera display name and enablement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraName {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
}

/// Per-camera stream state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<StreamState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video2: Option<StreamState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<StreamState>,
}

/// One media substream
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamState {
    #[serde(default)]
    pub datarate: Option<f64>,
    #[serde(default)]
    pub framerate: Option<f64>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// One entry of the server's user list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntry {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One downtime incident interval from the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DowntimeEvent {
    pub id: i64,
    pub url: String,
    pub port: u16,
    /// None = server-level outage; Some(camera id) = camera-level
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub down_at: DateTime<Utc>,
    /// None while the outage is still ongoing
    #[serde(default)]
    pub up_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl DowntimeEvent {
    /// An incident without a recovery timestamp is still ongoing
    pub fn is_ongoing(&self) -> bool {
        self.up_at.is_none()
    }

    pub fn is_server_level(&self) -> bool {
        self.kind.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_record_with_all_sections() {
        let json = r#"{
            "id": "srv1",
            "sections": {
                "main": {
                    "ok": true,
                    "status": 200,
                    "lastErrorTime": null,
                    "totalCameras": 8,
                    "enabledCameras": 6,
                    "enabledWithProblemStream": 0,
                    "enabledAllStreamsOk": 6,
                    "uptime": "3d 4h",
                    "url": "cam01.example",
                    "port": 8080,
                    "name": "Warehouse"
                },
                "camerasName": {
                    "1": {"name": "Gate", "enabled": true}
                },
                "mediaState": {
                    "1": {"video": {"datarate": 512.5, "framerate": 25.0, "active": true}}
                },
                "users": [{"name": "admin", "description": "operator"}]
            }
        }"#;

        let record: ServerRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "srv1");
        let main = record.sections.main.as_ref().unwrap();
        assert!(main.ok);
        assert_eq!(main.status, 200);
        assert_eq!(main.total_cameras, 8);
        assert_eq!(main.uptime.as_deref(), Some("3d 4h"));
        assert_eq!(main.port, 8080);
        let cameras = record.sections.cameras_name.as_ref().unwrap();
        assert_eq!(cameras["1"].name, "Gate");
        let media = record.sections.media_state.as_ref().unwrap();
        assert_eq!(media["1"].video.as_ref().unwrap().framerate, Some(25.0));
        assert_eq!(record.sections.users.as_ref().unwrap()[0].name, "admin");
    }

    #[test]
    fn parse_record_with_missing_sections() {
        let json = r#"{"id": "srv2", "sections": {}}"#;
        let record: ServerRecord = serde_json::from_str(json).unwrap();
        assert!(record.sections.main.is_none());
        assert!(record.sections.cameras_name.is_none());
        assert!(record.sections.media_state.is_none());
        assert!(record.sections.users.is_none());
    }

    #[test]
    fn merge_replaces_present_sections_only() {
        let mut base: Sections = serde_json::from_str(
            r#"{
                "main": {"ok": true, "status": 200, "url": "a", "port": 1},
                "users": [{"name": "admin"}]
            }"#,
        )
        .unwrap();
        let newer: Sections = serde_json::from_str(
            r#"{"main": {"ok": false, "status": 500, "url": "a", "port": 1}}"#,
        )
        .unwrap();

        base.merge_from(newer);

        assert!(!base.main.as_ref().unwrap().ok);
        assert_eq!(base.main.as_ref().unwrap().status, 500);
        // users was absent from the newer sections and is carried forward
        assert_eq!(base.users.as_ref().unwrap()[0].name, "admin");
    }

    #[test]
    fn parse_ongoing_downtime_event() {
        let json = r#"{
            "id": 7,
            "url": "cam01.example",
            "port": 8080,
            "type": null,
            "down_at": "2024-01-01T00:00:00Z",
            "up_at": null,
            "comment": "power failure"
        }"#;

        let event: DowntimeEvent = serde_json::from_str(json).unwrap();
        assert!(event.is_ongoing());
        assert!(event.is_server_level());
        assert_eq!(event.comment.as_deref(), Some("power failure"));
    }

    #[test]
    fn parse_completed_camera_event() {
        let json = r#"{
            "id": 8,
            "url": "cam01.example",
            "port": 8080,
            "type": "3",
            "down_at": "2024-01-01T00:00:00Z",
            "up_at": "2024-01-01T02:00:00Z"
        }"#;

        let event: DowntimeEvent = serde_json::from_str(json).unwrap();
        assert!(!event.is_ongoing());
        assert!(!event.is_server_level());
        assert_eq!(event.kind.as_deref(), Some("3"));
    }
}
