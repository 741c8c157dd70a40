//! Rooms and peer handles

use crate::{Role, SignalMessage};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Outbound side of one connected socket
#[derive(Debug, Clone)]
pub struct PeerHandle {
    id: Uuid,
    tx: mpsc::UnboundedSender<SignalMessage>,
}

impl PeerHandle {
    /// Create a handle and the receiver its socket task drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SignalMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queue a message for the socket; false if the socket is gone
    pub fn send(&self, message: SignalMessage) -> bool {
        match self.tx.send(message) {
            Ok(()) => true,
            Err(_) => {
                debug!("Peer {} no longer reading", self.id);
                false
            }
        }
    }
}

/// A rendezvous room with at most one socket per role
#[derive(Debug, Default)]
pub struct SignalingRoom {
    host: Option<PeerHandle>,
    phone: Option<PeerHandle>,
}

impl SignalingRoom {
    pub fn occupant(&self, role: Role) -> Option<&PeerHandle> {
        match role {
            Role::Host => self.host.as_ref(),
            Role::Phone => self.phone.as_ref(),
        }
    }

    /// Put `peer` in `role`, returning whoever held it before
    pub fn assign(&mut self, role: Role, peer: PeerHandle) -> Option<PeerHandle> {
        let slot = match role {
            Role::Host => &mut self.host,
            Role::Phone => &mut self.phone,
        };
        slot.replace(peer)
    }

    pub fn clear(&mut self, role: Role) -> Option<PeerHandle> {
        match role {
            Role::Host => self.host.take(),
            Role::Phone => self.phone.take(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.host.is_none() && self.phone.is_none()
    }

    pub fn has(&self, role: Role) -> bool {
        self.occupant(role).is_some()
    }
}
