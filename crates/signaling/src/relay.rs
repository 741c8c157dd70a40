//! Relay Implementation
//!
//! The room map is owned by one relay instance behind a single lock, so
//! join/leave/relay are atomic with respect to each other no matter how many
//! socket tasks call in concurrently.

use crate::{PeerHandle, Role, SignalKind, SignalMessage, SignalingError, SignalingRoom};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Maximum concurrently open rooms
    pub max_rooms: usize,
    /// Maximum room id length
    pub max_room_id_len: usize,
    /// Lifecycle event buffer per subscriber
    pub event_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_rooms: 10_000,
            max_room_id_len: 128,
            event_capacity: 256,
        }
    }
}

/// Room lifecycle events for in-process subscribers (e.g. the frame source)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    PeerJoined { room_id: String, role: Role },
    PeerLeft { room_id: String, role: Role },
    RoomClosed { room_id: String },
}

/// Result of a join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Opposite role absent; the joiner waits
    Waiting,
    /// Both roles present and notified
    Paired,
}

/// Rendezvous relay owning its room map
pub struct SignalingRelay {
    config: RelayConfig,
    rooms: Mutex<HashMap<String, SignalingRoom>>,
    events: broadcast::Sender<RelayEvent>,
}

impl SignalingRelay {
    pub fn new(config: RelayConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        info!("Creating signaling relay (max rooms: {})", config.max_rooms);
        Self {
            config,
            rooms: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Allocate a fresh, unguessable room id
    pub fn create_room_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, SignalingRoom>>, SignalingError> {
        self.rooms
            .lock()
            .map_err(|e| SignalingError::Internal(e.to_string()))
    }

    fn publish(&self, event: RelayEvent) {
        // No subscribers is normal
        let _ = self.events.send(event);
    }

    fn validate_room_id(&self, room_id: &str) -> Result<(), SignalingError> {
        let valid = !room_id.is_empty()
            && room_id.len() <= self.config.max_room_id_len
            && room_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(())
        } else {
            Err(SignalingError::InvalidRoomId(room_id.to_string()))
        }
    }

    /// Put `peer` in `role`, creating the room on first reference.
    ///
    /// A previous occupant of the role is displaced and told so. When the
    /// opposite role is present both sides learn each other's role.
    pub fn join(&self, room_id: &str, role: Role, peer: PeerHandle) -> Result<JoinOutcome, SignalingError> {
        self.validate_room_id(room_id)?;
        let mut rooms = self.lock()?;

        if !rooms.contains_key(room_id) && rooms.len() >= self.config.max_rooms {
            warn!("Rejecting room {}: capacity reached", room_id);
            return Err(SignalingError::Capacity(self.config.max_rooms));
        }

        let room = rooms.entry(room_id.to_string()).or_insert_with(|| {
            debug!("Room {} created", room_id);
            SignalingRoom::default()
        });

        let joiner = peer.clone();
        if let Some(displaced) = room.assign(role, peer) {
            if displaced.id() != joiner.id() {
                info!("Room {}: {} replaced by a new connection", room_id, role);
                displaced.send(SignalMessage::evicted(room_id, role));
            }
        }

        let outcome = match room.occupant(role.opposite()) {
            Some(other) => {
                other.send(SignalMessage::peer_joined(room_id, role));
                joiner.send(SignalMessage::peer_joined(room_id, role.opposite()));
                JoinOutcome::Paired
            }
            None => JoinOutcome::Waiting,
        };

        let open = rooms.len();
        drop(rooms);

        metrics::gauge!("signaling_rooms_open").set(open as f64);
        info!("Room {}: {} joined ({:?})", room_id, role, outcome);
        self.publish(RelayEvent::PeerJoined {
            room_id: room_id.to_string(),
            role,
        });
        Ok(outcome)
    }

    /// Forward a negotiation message to the opposite role.
    ///
    /// Returns `Ok(false)` when nobody is there to receive it; the sender is
    /// not told, the room is simply not ready yet.
    pub fn relay(&self, room_id: &str, from: Role, message: SignalMessage) -> Result<bool, SignalingError> {
        if !message.kind.is_relayable() {
            return Err(SignalingError::NotRelayable(message.kind.to_string()));
        }

        let kind = message.kind;
        let rooms = self.lock()?;
        let target = rooms
            .get(room_id)
            .and_then(|room| room.occupant(from.opposite()));

        let delivered = match target {
            Some(peer) => peer.send(message),
            None => false,
        };

        if delivered {
            metrics::counter!("signaling_messages_forwarded_total").increment(1);
        } else {
            debug!("Room {}: {} from {} dropped, no peer", room_id, kind, from);
            metrics::counter!("signaling_messages_dropped_total").increment(1);
        }
        Ok(delivered)
    }

    /// Clear `role`, notify whoever remains, and delete the room once empty
    pub fn leave(&self, room_id: &str, role: Role) -> Result<(), SignalingError> {
        self.leave_if(room_id, role, |_| true)
    }

    /// Leave on socket close. Only clears the role if `peer_id` still holds
    /// it, so a displaced socket closing late cannot evict its replacement.
    pub fn disconnect(&self, room_id: &str, role: Role, peer_id: Uuid) -> Result<(), SignalingError> {
        self.leave_if(room_id, role, |occupant| occupant.id() == peer_id)
    }

    fn leave_if<F>(&self, room_id: &str, role: Role, holds: F) -> Result<(), SignalingError>
    where
        F: FnOnce(&PeerHandle) -> bool,
    {
        let mut rooms = self.lock()?;
        let Some(room) = rooms.get_mut(room_id) else {
            return Ok(());
        };

        if !room.occupant(role).is_some_and(holds) {
            return Ok(());
        }
        room.clear(role);

        if let Some(other) = room.occupant(role.opposite()) {
            other.send(SignalMessage::peer_left(room_id, role));
        }

        let closed = room.is_empty();
        if closed {
            rooms.remove(room_id);
        }
        let open = rooms.len();
        drop(rooms);

        metrics::gauge!("signaling_rooms_open").set(open as f64);
        info!("Room {}: {} left", room_id, role);
        self.publish(RelayEvent::PeerLeft {
            room_id: room_id.to_string(),
            role,
        });
        if closed {
            info!("Room {} closed", room_id);
            self.publish(RelayEvent::RoomClosed {
                room_id: room_id.to_string(),
            });
        }
        Ok(())
    }

    /// Route one message received from `peer`'s socket
    pub fn handle(&self, peer: &PeerHandle, message: SignalMessage) -> Result<(), SignalingError> {
        match message.kind {
            SignalKind::Join => self.join(&message.room_id, message.from, peer.clone()).map(|_| ()),
            SignalKind::Leave => self.disconnect(&message.room_id, message.from, peer.id()),
            kind if kind.is_relayable() => {
                if !self.is_occupant(&message.room_id, message.from, peer.id())? {
                    return Err(SignalingError::NotMember {
                        room_id: message.room_id.clone(),
                        role: message.from,
                    });
                }
                let room_id = message.room_id.clone();
                self.relay(&room_id, message.from, message).map(|_| ())
            }
            other => Err(SignalingError::NotRelayable(other.to_string())),
        }
    }

    fn is_occupant(&self, room_id: &str, role: Role, peer_id: Uuid) -> Result<bool, SignalingError> {
        let rooms = self.lock()?;
        Ok(rooms
            .get(room_id)
            .and_then(|room| room.occupant(role))
            .is_some_and(|occupant| occupant.id() == peer_id))
    }

    pub fn has_room(&self, room_id: &str) -> bool {
        self.rooms
            .lock()
            .map(|rooms| rooms.contains_key(room_id))
            .unwrap_or(false)
    }

    /// (host present, phone present), or None if the room does not exist
    pub fn occupancy(&self, room_id: &str) -> Option<(bool, bool)> {
        let rooms = self.rooms.lock().ok()?;
        rooms
            .get(room_id)
            .map(|room| (room.has(Role::Host), room.has(Role::Phone)))
    }

    pub fn room_count(&self) -> usize {
        self.rooms.lock().map(|rooms| rooms.len()).unwrap_or(0)
    }
}

impl Default for SignalingRelay {
    fn default() -> Self {
        Self::new(RelayConfig::default())
    }
}
