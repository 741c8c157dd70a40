//! Monitoring Pipeline
//!
//! Runs one monitoring session per task:
//! frame -> subjects -> scores -> tick aggregate -> sample -> alert.
//!
//! Failures inside a tick never stop the session. A lost source leaves the
//! session idle until a new one is attached.

pub mod peer_source;
pub mod session;

pub use peer_source::PeerFrameSource;
pub use session::{MonitoringSession, SessionConfig, SessionEvent};

use alerting::AlertError;
use storage::StorageError;
use thiserror::Error;

/// Pipeline error types
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Alert configuration rejected: {0}")]
    Alert(#[from] AlertError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Session state unavailable: {0}")]
    State(String),
}
