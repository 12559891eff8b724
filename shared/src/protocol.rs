//! Wire protocol types: newline-delimited JSON messages exchanged between
//! the coordinator and drone clients. See the per-struct docs for the
//! `type` tag each corresponds to on the wire.

use serde::{Deserialize, Serialize};

use crate::Coord;

/// A drone's operational state as tracked by the registry.
///
/// Not serialized directly — wire representations differ by message
/// (`HANDSHAKE` uses `"IDLE"|"ON_MISSION"`, `STATUS_UPDATE` uses
/// `"idle"|"busy"`) so each message payload carries its status as a raw
/// `String` and the session maps it onto this enum explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DroneStatus {
    Idle,
    OnMission,
    Disconnected,
}

/// A survivor's rescue status. Numeric values match
/// `original_source/headers/survivor.h` (`0=waiting, 1=being helped,
/// 2=rescued, 3=archived`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurvivorStatus {
    Waiting = 0,
    BeingHelped = 1,
    Rescued = 2,
    Archived = 3,
}

/// Parse the `HANDSHAKE.status` field (`"IDLE"|"ON_MISSION"`).
pub fn parse_handshake_status(s: &str) -> Option<DroneStatus> {
    match s {
        "IDLE" => Some(DroneStatus::Idle),
        "ON_MISSION" => Some(DroneStatus::OnMission),
        _ => None,
    }
}

/// Parse the `STATUS_UPDATE.status` field (`"idle"|"busy"`).
pub fn parse_status_update_status(s: &str) -> Option<DroneStatus> {
    match s {
        "idle" => Some(DroneStatus::Idle),
        "busy" => Some(DroneStatus::OnMission),
        _ => None,
    }
}

/// `HANDSHAKE` (client -> server).
#[derive(Debug, Clone, Deserialize)]
pub struct HandshakePayload {
    pub drone_id: i64,
    pub status: String,
    pub coord: Coord,
}

/// `STATUS_UPDATE` (client -> server). `battery` is accepted but ignored
/// by the core.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdatePayload {
    pub drone_id: i64,
    #[serde(default)]
    pub timestamp: i64,
    pub location: Coord,
    pub status: String,
    #[serde(default)]
    pub battery: i64,
}

/// `MISSION_COMPLETE` (client -> server). `target_location` is preferred
/// over the drone's stored target when reconciling (§4.6).
#[derive(Debug, Clone, Deserialize)]
pub struct MissionCompletePayload {
    pub drone_id: i64,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub details: String,
    pub target_location: Option<Coord>,
}

/// `HEARTBEAT_RESPONSE` (client -> server).
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatResponsePayload {
    pub drone_id: i64,
    #[serde(default)]
    pub timestamp: i64,
}

/// Every inbound message type the core recognizes. Deserializing into this
/// enum fails for both malformed JSON and unrecognized `type` values;
/// callers treat either as a protocol error and drop the frame (§4.4.5).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "HANDSHAKE")]
    Handshake(HandshakePayload),
    #[serde(rename = "STATUS_UPDATE")]
    StatusUpdate(StatusUpdatePayload),
    #[serde(rename = "MISSION_COMPLETE")]
    MissionComplete(MissionCompletePayload),
    #[serde(rename = "HEARTBEAT_RESPONSE")]
    HeartbeatResponse(HeartbeatResponsePayload),
}

/// `HANDSHAKE_ACK.config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeConfig {
    pub status_update_interval: u64,
    pub heartbeat_interval: u64,
}

/// Every outbound message type the core emits. Also `Deserialize` so test
/// clients (and any external collaborator written in Rust) can parse what
/// the coordinator sends without a second, parallel type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "HANDSHAKE_ACK")]
    HandshakeAck {
        session_id: String,
        config: HandshakeConfig,
    },
    #[serde(rename = "ASSIGN_MISSION")]
    AssignMission {
        mission_id: String,
        priority: String,
        target: Coord,
        expiry: u64,
    },
    #[serde(rename = "HEARTBEAT")]
    Heartbeat { timestamp: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_round_trip() {
        let json = r#"{"type":"HANDSHAKE","drone_id":1,"status":"IDLE","coord":{"x":0,"y":0}}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Handshake(h) => {
                assert_eq!(h.drone_id, 1);
                assert_eq!(parse_handshake_status(&h.status), Some(DroneStatus::Idle));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        let json = r#"{"type":"BOGUS","foo":1}"#;
        let result: Result<ClientMessage, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn mission_complete_target_location_is_optional() {
        let json = r#"{"type":"MISSION_COMPLETE","drone_id":1,"timestamp":1,"success":true,"details":""}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::MissionComplete(m) => assert!(m.target_location.is_none()),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn assign_mission_serializes_expected_shape() {
        let msg = ServerMessage::AssignMission {
            mission_id: "M1".into(),
            priority: "high".into(),
            target: Coord::new(3, 4),
            expiry: 1000,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"ASSIGN_MISSION""#));
        assert!(json.contains(r#""mission_id":"M1""#));
        assert!(json.contains(r#""target":{"x":3,"y":4}"#));
    }

    #[test]
    fn battery_field_is_optional_and_ignored() {
        let json = r#"{"type":"STATUS_UPDATE","drone_id":1,"timestamp":1,"location":{"x":1,"y":1},"status":"busy"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::StatusUpdate(s) => assert_eq!(s.battery, 0),
            _ => panic!("wrong variant"),
        }
    }
}
