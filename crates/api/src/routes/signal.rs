//! Signaling WebSocket
//!
//! One socket per peer. Text frames carry signaling messages; closing the
//! socket is an implicit leave for whatever role it held.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use signaling::{PeerHandle, Role, SignalKind, SignalMessage, SignalingRelay};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::SharedState;

/// Upgrade to a signaling socket
pub async fn signal_socket(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    let relay = state.read().await.relay.clone();
    ws.on_upgrade(move |socket| run_signal_socket(socket, relay))
}

/// Relay-side state of one signaling socket
pub struct SignalConnection {
    relay: Arc<SignalingRelay>,
    peer: PeerHandle,
    /// Room and role this socket currently holds
    membership: Option<(String, Role)>,
}

impl SignalConnection {
    pub fn new(relay: Arc<SignalingRelay>) -> (Self, mpsc::UnboundedReceiver<SignalMessage>) {
        let (peer, outbound) = PeerHandle::channel();
        (
            Self {
                relay,
                peer,
                membership: None,
            },
            outbound,
        )
    }

    pub fn membership(&self) -> Option<&(String, Role)> {
        self.membership.as_ref()
    }

    /// Handle one inbound text frame. Returns an error frame to send back, if any.
    pub fn on_text(&mut self, text: &str) -> Option<String> {
        let message = match SignalMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                debug!("Rejecting signaling frame: {}", e);
                return Some(error_frame(None, &e.to_string()));
            }
        };

        let kind = message.kind;
        let target = (message.room_id.clone(), message.from);

        if let Err(e) = self.relay.handle(&self.peer, message) {
            warn!("Signaling message {} rejected: {}", kind, e);
            return Some(error_frame(Some(&target), &e.to_string()));
        }

        match kind {
            SignalKind::Join => {
                if let Some(previous) = self.membership.replace(target.clone()) {
                    if previous != target {
                        self.release(&previous);
                    }
                }
            }
            SignalKind::Leave if self.membership.as_ref() == Some(&target) => {
                self.membership = None;
            }
            _ => {}
        }
        None
    }

    /// Serialize an outbound message. The bool is true when the socket
    /// should close after sending, i.e. it was displaced from the role it
    /// still holds. Eviction notices for an earlier membership are forwarded.
    pub fn on_outbound(&mut self, message: &SignalMessage) -> Option<(String, bool)> {
        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!("Dropping unserializable signaling message: {}", e);
                return None;
            }
        };
        let evicted = message.kind == SignalKind::Evicted
            && self
                .membership
                .as_ref()
                .is_some_and(|(room_id, role)| *room_id == message.room_id && *role == message.from);
        if evicted {
            self.membership = None;
        }
        Some((text, evicted))
    }

    /// Socket gone: leave the held role if this socket still holds it
    pub fn close(mut self) {
        if let Some(membership) = self.membership.take() {
            self.release(&membership);
        }
    }

    fn release(&self, (room_id, role): &(String, Role)) {
        if let Err(e) = self.relay.disconnect(room_id, *role, self.peer.id()) {
            warn!("Failed to release {} of room {}: {}", role, room_id, e);
        }
    }
}

fn error_frame(target: Option<&(String, Role)>, reason: &str) -> String {
    match target {
        Some((room_id, role)) => SignalMessage::error(room_id, *role, reason)
            .to_json()
            .unwrap_or_default(),
        None => serde_json::json!({ "type": "error", "payload": { "reason": reason } }).to_string(),
    }
}

async fn run_signal_socket(mut socket: WebSocket, relay: Arc<SignalingRelay>) {
    let (mut connection, mut outbound) = SignalConnection::new(relay);
    info!("Signaling socket connected");

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!("Signaling socket error: {}", e);
                        break;
                    }
                };
                if let Some(reply) = connection.on_text(&text) {
                    if socket.send(Message::Text(reply)).await.is_err() {
                        break;
                    }
                }
            }
            Some(message) = outbound.recv() => {
                let Some((text, close)) = connection.on_outbound(&message) else {
                    continue;
                };
                if socket.send(Message::Text(text)).await.is_err() || close {
                    break;
                }
            }
        }
    }

    connection.close();
    info!("Signaling socket closed");
}
