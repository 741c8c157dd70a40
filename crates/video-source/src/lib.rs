//! Video Source Library for Engagement Monitoring
//!
//! Provides decoded frames and "latest frame" sources:
//! - Local capture pushed in by the host application
//! - Peer-supplied capture arriving over a negotiated media channel
//!
//! Sources never queue frames. Readers always see the most recent frame and
//! anything older is dropped on the floor.

pub mod frame;
pub mod source;

pub use frame::VideoFrame;
pub use source::{frame_channel, FrameFeed, FrameSource, WatchFrameSource};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Video source error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Invalid frame: {0}")]
    Format(String),

    #[error("Source closed: {0}")]
    Closed(String),
}

/// Where frames come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Camera attached to the monitoring host
    Local,
    /// Camera on a paired phone, identified by its signaling room
    Peer { room_id: String },
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Local => write!(f, "local"),
            SourceKind::Peer { room_id } => write!(f, "peer:{}", room_id),
        }
    }
}
