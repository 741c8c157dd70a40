//! Signaling Relay
//!
//! Pairs exactly one `host` and one `phone` peer inside a short-lived room
//! and forwards their negotiation messages (`offer`, `answer`,
//! `ice-candidate`) verbatim. Media never passes through the relay.

pub mod protocol;
pub mod relay;
pub mod room;

pub use protocol::{Role, SignalKind, SignalMessage};
pub use relay::{JoinOutcome, RelayConfig, RelayEvent, SignalingRelay};
pub use room::{PeerHandle, SignalingRoom};

use thiserror::Error;

/// Signaling error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalingError {
    #[error("Invalid room id: {0}")]
    InvalidRoomId(String),

    #[error("Room capacity reached ({0} rooms)")]
    Capacity(usize),

    #[error("Message type {0} cannot be relayed")]
    NotRelayable(String),

    #[error("Peer is not the {role} of room {room_id}")]
    NotMember { room_id: String, role: Role },

    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Relay state unavailable: {0}")]
    Internal(String),
}
