//! Signaling wire protocol
//!
//! Every message is a JSON object:
//! `{"type": ..., "roomId": ..., "from": "host"|"phone", "payload": ...}`.
//! The relay never looks inside `payload`.

use crate::SignalingError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Peer role inside a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The display running the monitoring session
    Host,
    /// The remote camera
    Phone,
}

impl Role {
    pub fn opposite(self) -> Role {
        match self {
            Role::Host => Role::Phone,
            Role::Phone => Role::Host,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Host => f.write_str("host"),
            Role::Phone => f.write_str("phone"),
        }
    }
}

/// Message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    // Client to relay
    Join,
    Leave,
    // Forwarded verbatim between peers
    Offer,
    Answer,
    IceCandidate,
    // Relay to client
    PeerJoined,
    PeerLeft,
    Evicted,
    Error,
}

impl SignalKind {
    /// Negotiation messages the relay forwards to the opposite role
    pub fn is_relayable(&self) -> bool {
        matches!(self, SignalKind::Offer | SignalKind::Answer | SignalKind::IceCandidate)
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalKind::Join => "join",
            SignalKind::Leave => "leave",
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "ice-candidate",
            SignalKind::PeerJoined => "peer-joined",
            SignalKind::PeerLeft => "peer-left",
            SignalKind::Evicted => "evicted",
            SignalKind::Error => "error",
        };
        f.write_str(name)
    }
}

/// One signaling message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalMessage {
    #[serde(rename = "type")]
    pub kind: SignalKind,
    #[serde(rename = "roomId")]
    pub room_id: String,
    pub from: Role,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl SignalMessage {
    pub fn new(kind: SignalKind, room_id: impl Into<String>, from: Role, payload: Value) -> Self {
        Self {
            kind,
            room_id: room_id.into(),
            from,
            payload,
        }
    }

    /// Relay notice that `role` is now present in the room
    pub fn peer_joined(room_id: &str, role: Role) -> Self {
        Self::new(SignalKind::PeerJoined, room_id, role, Value::Null)
    }

    /// Relay notice that `role` left the room
    pub fn peer_left(room_id: &str, role: Role) -> Self {
        Self::new(SignalKind::PeerLeft, room_id, role, Value::Null)
    }

    /// Relay notice to a socket displaced by a newer join for `role`
    pub fn evicted(room_id: &str, role: Role) -> Self {
        Self::new(SignalKind::Evicted, room_id, role, Value::Null)
    }

    pub fn error(room_id: &str, role: Role, reason: &str) -> Self {
        Self::new(
            SignalKind::Error,
            room_id,
            role,
            serde_json::json!({ "reason": reason }),
        )
    }

    pub fn parse(text: &str) -> Result<Self, SignalingError> {
        serde_json::from_str(text).map_err(|e| SignalingError::Malformed(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, SignalingError> {
        serde_json::to_string(self).map_err(|e| SignalingError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_ice_candidate() {
        let text = r#"{"type":"ice-candidate","roomId":"r1","from":"phone","payload":{"candidate":"candidate:1 1 UDP 2122 192.168.1.4 5000 typ host","sdpMLineIndex":0}}"#;
        let msg = SignalMessage::parse(text).unwrap();
        assert_eq!(msg.kind, SignalKind::IceCandidate);
        assert_eq!(msg.room_id, "r1");
        assert_eq!(msg.from, Role::Phone);
        assert_eq!(msg.payload["sdpMLineIndex"], 0);
    }

    #[test]
    fn test_join_without_payload() {
        let msg = SignalMessage::parse(r#"{"type":"join","roomId":"r1","from":"host"}"#).unwrap();
        assert_eq!(msg.kind, SignalKind::Join);
        assert!(msg.payload.is_null());

        let out = serde_json::to_value(&msg).unwrap();
        assert_eq!(out, json!({"type": "join", "roomId": "r1", "from": "host"}));
    }

    #[test]
    fn test_payload_preserved_verbatim() {
        let payload = json!({"sdp": "v=0\r\no=- 46117 2 IN IP4 127.0.0.1\r\n", "type": "offer", "extra": [1, 2, {"x": null}]});
        let msg = SignalMessage::new(SignalKind::Offer, "r1", Role::Host, payload.clone());
        let parsed = SignalMessage::parse(&msg.to_json().unwrap()).unwrap();
        assert_eq!(parsed.payload, payload);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = SignalMessage::parse(r#"{"type":"media","roomId":"r1","from":"host"}"#);
        assert!(matches!(err, Err(SignalingError::Malformed(_))));
    }

    #[test]
    fn test_relayable_kinds() {
        assert!(SignalKind::Offer.is_relayable());
        assert!(SignalKind::IceCandidate.is_relayable());
        assert!(!SignalKind::Join.is_relayable());
        assert!(!SignalKind::PeerLeft.is_relayable());
        assert_eq!(Role::Host.opposite(), Role::Phone);
    }
}
