//! Frame source fed by a paired phone
//!
//! The media transport pushes decoded frames into the returned [`FrameFeed`].
//! The source watches relay lifecycle events for its room and reports itself
//! closed once the phone leaves, so the scheduler drops it. When the event
//! subscription lags, the room's occupancy is read back from the relay.

use signaling::{RelayEvent, Role, SignalingRelay};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};
use video_source::{frame_channel, FrameFeed, FrameSource, SourceError, SourceKind, VideoFrame, WatchFrameSource};

/// Latest-frame source bound to one signaling room
pub struct PeerFrameSource {
    room_id: String,
    frames: WatchFrameSource,
    relay: Weak<SignalingRelay>,
    events: broadcast::Receiver<RelayEvent>,
    closed: bool,
}

impl PeerFrameSource {
    /// Create the source and the feed the media transport writes into
    pub fn new(room_id: impl Into<String>, relay: &Arc<SignalingRelay>) -> (FrameFeed, Self) {
        let room_id = room_id.into();
        let (feed, frames) = frame_channel(SourceKind::Peer {
            room_id: room_id.clone(),
        });
        info!("Peer frame source bound to room {}", room_id);
        (
            feed,
            Self {
                room_id,
                frames,
                relay: Arc::downgrade(relay),
                events: relay.subscribe(),
                closed: false,
            },
        )
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    fn poll_events(&mut self) {
        let mut lagged = false;
        loop {
            match self.events.try_recv() {
                Ok(RelayEvent::PeerLeft { room_id, role: Role::Phone })
                | Ok(RelayEvent::RoomClosed { room_id })
                    if room_id == self.room_id =>
                {
                    info!("Phone left room {}, closing source", self.room_id);
                    self.closed = true;
                }
                Ok(_) => {}
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!("Peer source for {} skipped {} relay events", self.room_id, skipped);
                    lagged = true;
                }
                Err(TryRecvError::Closed) => {
                    warn!("Relay gone, closing peer source for {}", self.room_id);
                    self.closed = true;
                    break;
                }
            }
        }

        if lagged && !self.closed && !self.phone_present() {
            info!("Phone no longer in room {}, closing source", self.room_id);
            self.closed = true;
        }
    }

    fn phone_present(&self) -> bool {
        self.relay
            .upgrade()
            .and_then(|relay| relay.occupancy(&self.room_id))
            .is_some_and(|(_, phone)| phone)
    }
}

impl FrameSource for PeerFrameSource {
    fn kind(&self) -> &SourceKind {
        self.frames.kind()
    }

    fn latest_frame(&mut self) -> Result<Option<VideoFrame>, SourceError> {
        if !self.closed {
            self.poll_events();
        }
        if self.closed {
            return Err(SourceError::Closed(format!("phone left room {}", self.room_id)));
        }
        self.frames.latest_frame()
    }
}
