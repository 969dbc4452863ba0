//! Stream protocol frames
//!
//! Control frames go client to server; stream frames come back. Both sides
//! are newline-delimited JSON with a `type` tag. Inbound frames with a tag
//! this client does not understand decode to [`StreamFrame::Unrecognized`]
//! and are dropped at the boundary.

use serde::{Deserialize, Serialize};

use crate::types::ServerRecord;

/// Data section a subscription can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Section {
    #[serde(rename = "main")]
    Main,
    #[serde(rename = "camerasName")]
    CamerasName,
    #[serde(rename = "mediaState")]
    MediaState,
    #[serde(rename = "users")]
    Users,
}

impl Section {
    /// Every section a detail view needs
    pub fn all() -> Vec<Section> {
        vec![
            Section::Main,
            Section::CamerasName,
            Section::MediaState,
            Section::Users,
        ]
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Section::Main => write!(f, "main"),
            Section::CamerasName => write!(f, "camerasName"),
            Section::MediaState => write!(f, "mediaState"),
            Section::Users => write!(f, "users"),
        }
    }
}

/// Client to server control frames
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlFrame {
    Subscribe { payload: SubscribePayload },
    Unsubscribe,
}

/// Full replacement of the desired subscription state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribePayload {
    pub servers: Vec<String>,
    pub sections: Vec<Section>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Server to client frames
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamFrame {
    /// Full resync of the fleet map
    Snapshot { data: SnapshotData },
    /// Any frame kind this client does not understand
    #[serde(other)]
    Unrecognized,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotData {
    #[serde(default)]
    pub servers: Vec<ServerRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_frame_wire_shape() {
        let frame = ControlFrame::Subscribe {
            payload: SubscribePayload {
                servers: vec!["srv1".to_string(), "srv2".to_string()],
                sections: vec![Section::Main],
                token: None,
            },
        };

        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(
            json,
            r#"{"type":"subscribe","payload":{"servers":["srv1","srv2"],"sections":["main"]}}"#
        );
    }

    #[test]
    fn subscribe_frame_carries_token_when_present() {
        let frame = ControlFrame::Subscribe {
            payload: SubscribePayload {
                servers: vec!["srv1".to_string()],
                sections: Section::all(),
                token: Some("secret".to_string()),
            },
        };

        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains(r#""token":"secret""#));
        assert!(json.contains(r#""sections":["main","camerasName","mediaState","users"]"#));
    }

    #[test]
    fn unsubscribe_frame_wire_shape() {
        let json = serde_json::to_string(&ControlFrame::Unsubscribe).unwrap();
        assert_eq!(json, r#"{"type":"unsubscribe"}"#);
    }

    #[test]
    fn parse_snapshot_frame() {
        let json = r#"{"type":"snapshot","data":{"servers":[{"id":"srv1","sections":{}}]}}"#;
        let frame: StreamFrame = serde_json::from_str(json).unwrap();
        match frame {
            StreamFrame::Snapshot { data } => {
                assert_eq!(data.servers.len(), 1);
                assert_eq!(data.servers[0].id, "srv1");
            }
            other => panic!("Expected snapshot, got {:?}", other),
        }
    }

    #[test]
    fn parse_empty_snapshot_frame() {
        let json = r#"{"type":"snapshot","data":{}}"#;
        let frame: StreamFrame = serde_json::from_str(json).unwrap();
        match frame {
            StreamFrame::Snapshot { data } => assert!(data.servers.is_empty()),
            other => panic!("Expected snapshot, got {:?}", other),
        }
    }

    #[test]
    fn unknown_frame_kind_is_unrecognized() {
        let json = r#"{"type":"heartbeat","data":{}}"#;
        let frame: StreamFrame = serde_json::from_str(json).unwrap();
        assert!(matches!(frame, StreamFrame::Unrecognized));
    }

    #[test]
    fn malformed_frame_is_an_error() {
        assert!(serde_json::from_str::<StreamFrame>("not json").is_err());
        assert!(serde_json::from_str::<StreamFrame>(r#"{"no_type":1}"#).is_err());
    }
}
