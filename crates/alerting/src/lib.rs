//! Alerting System
//!
//! Turns engagement samples into alerts:
//! - Warning/critical severity mapping
//! - Per-session cooldown and hourly ceiling
//! - Delivery over independent channels (tone, vibration, visual, push)

mod channel;
mod config;
mod engine;
mod event;
mod push;

pub use channel::{AlertChannel, ChannelOutput, ToneChannel, VibrationChannel, VisualChannel, VisualIndicator};
pub use config::{AlertConfig, ChannelToggles};
pub use engine::{AlertEngine, AlertState, EngineState};
pub use event::{AlertEvent, ChannelKind, DeliveryReport, Severity};
pub use push::{MqttPushChannel, PushConfig, PushPayload, PushPriority};

use thiserror::Error;

/// Alert configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlertError {
    #[error("Invalid alert configuration: {0}")]
    InvalidConfig(String),
}

/// Delivery errors for a single channel
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    #[error("No listener attached")]
    NoListener,

    #[error("Channel unavailable: {0}")]
    Unavailable(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
