//! Latest-frame sources
//!
//! A [`FrameFeed`] is the writing half held by whatever decodes frames (a local
//! camera loop or a peer media channel). The matching [`WatchFrameSource`] is
//! handed to the scheduler. Only the newest frame is retained.

use crate::{SourceError, SourceKind, VideoFrame};
use tokio::sync::watch;
use tracing::debug;

/// Something the frame scheduler can poll once per display refresh
pub trait FrameSource: Send {
    /// Identifies the source in logs and lifecycle events
    fn kind(&self) -> &SourceKind;

    /// Latest decoded frame.
    ///
    /// `Ok(None)` means the source is not decoding yet and the tick should be
    /// skipped. `Err` means the source is gone for good.
    fn latest_frame(&mut self) -> Result<Option<VideoFrame>, SourceError>;
}

/// Create a connected feed/source pair
pub fn frame_channel(kind: SourceKind) -> (FrameFeed, WatchFrameSource) {
    let (tx, rx) = watch::channel(None);
    (
        FrameFeed {
            tx,
            kind: kind.clone(),
        },
        WatchFrameSource { rx, kind },
    )
}

/// Writing half of a frame channel
#[derive(Debug)]
pub struct FrameFeed {
    tx: watch::Sender<Option<VideoFrame>>,
    kind: SourceKind,
}

impl FrameFeed {
    /// Publish a frame, replacing whatever has not been read yet
    pub fn push(&self, frame: VideoFrame) -> Result<(), SourceError> {
        frame.validate()?;
        let replaced = self.tx.send_replace(Some(frame));
        if let Some(stale) = replaced {
            debug!("{}: dropped unread frame #{}", self.kind, stale.sequence);
        }
        Ok(())
    }

    /// Mark the source as not decoding (e.g. the camera is warming up again)
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    /// Whether the scheduler side still exists
    pub fn is_attached(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Reading half of a frame channel
#[derive(Debug)]
pub struct WatchFrameSource {
    rx: watch::Receiver<Option<VideoFrame>>,
    kind: SourceKind,
}

impl FrameSource for WatchFrameSource {
    fn kind(&self) -> &SourceKind {
        &self.kind
    }

    fn latest_frame(&mut self) -> Result<Option<VideoFrame>, SourceError> {
        if self.rx.has_changed().is_err() {
            return Err(SourceError::Closed(self.kind.to_string()));
        }
        Ok(self.rx.borrow_and_update().clone())
    }
}
