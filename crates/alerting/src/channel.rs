//! Alert delivery channels
//!
//! Each channel is injected into the engine and attempted independently.
//! Tone and vibration are rendered by whatever is listening on the output
//! broadcast (dashboard, paired phone); the visual indicator is a watched
//! state that survives until acknowledged.

use crate::{AlertEvent, ChannelError, ChannelKind, Severity};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

/// A delivery capability the engine can attempt
pub trait AlertChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// Try to deliver once. `Ok` means delivery is confirmed.
    fn attempt(&self, alert: &AlertEvent) -> Result<(), ChannelError>;

    /// Called when the session acknowledges the current alert
    fn clear(&self) {}
}

/// What listeners receive on the alert output stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum ChannelOutput {
    Tone {
        alert_id: Uuid,
        severity: Severity,
        frequency_hz: u32,
        duration_ms: u32,
    },
    Vibration {
        alert_id: Uuid,
        severity: Severity,
        /// Alternating on/off durations in milliseconds
        pattern_ms: Vec<u32>,
    },
    Visual(VisualIndicator),
}

/// On-screen alert flag
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VisualIndicator {
    pub active: bool,
    pub severity: Option<Severity>,
    pub alert_id: Option<Uuid>,
}

fn publish(
    outputs: &broadcast::Sender<ChannelOutput>,
    output: ChannelOutput,
) -> Result<(), ChannelError> {
    outputs
        .send(output)
        .map(|_| ())
        .map_err(|_| ChannelError::NoListener)
}

/// Audible tone, louder and longer for critical alerts
pub struct ToneChannel {
    outputs: broadcast::Sender<ChannelOutput>,
}

impl ToneChannel {
    pub fn new(outputs: broadcast::Sender<ChannelOutput>) -> Self {
        Self { outputs }
    }

    /// (frequency Hz, duration ms) for a severity
    pub fn tone_for(severity: Severity) -> (u32, u32) {
        match severity {
            Severity::Critical => (880, 800),
            Severity::Warning => (440, 300),
        }
    }
}

impl AlertChannel for ToneChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Tone
    }

    fn attempt(&self, alert: &AlertEvent) -> Result<(), ChannelError> {
        let (frequency_hz, duration_ms) = Self::tone_for(alert.severity);
        publish(
            &self.outputs,
            ChannelOutput::Tone {
                alert_id: alert.id,
                severity: alert.severity,
                frequency_hz,
                duration_ms,
            },
        )
    }
}

/// Device vibration pattern, longer for critical alerts
pub struct VibrationChannel {
    outputs: broadcast::Sender<ChannelOutput>,
}

impl VibrationChannel {
    pub fn new(outputs: broadcast::Sender<ChannelOutput>) -> Self {
        Self { outputs }
    }

    pub fn pattern_for(severity: Severity) -> Vec<u32> {
        match severity {
            Severity::Critical => vec![400, 100, 400, 100, 400],
            Severity::Warning => vec![200, 100, 200],
        }
    }
}

impl AlertChannel for VibrationChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Vibration
    }

    fn attempt(&self, alert: &AlertEvent) -> Result<(), ChannelError> {
        publish(
            &self.outputs,
            ChannelOutput::Vibration {
                alert_id: alert.id,
                severity: alert.severity,
                pattern_ms: Self::pattern_for(alert.severity),
            },
        )
    }
}

/// On-screen indicator. The watched state is the delivery; broadcasting is
/// best effort for live dashboards.
pub struct VisualChannel {
    state: watch::Sender<VisualIndicator>,
    outputs: broadcast::Sender<ChannelOutput>,
}

impl VisualChannel {
    pub fn new(outputs: broadcast::Sender<ChannelOutput>) -> Self {
        let (state, _) = watch::channel(VisualIndicator::default());
        Self { state, outputs }
    }

    pub fn subscribe(&self) -> watch::Receiver<VisualIndicator> {
        self.state.subscribe()
    }

    pub fn current(&self) -> VisualIndicator {
        self.state.borrow().clone()
    }

    fn set(&self, indicator: VisualIndicator) {
        self.state.send_replace(indicator.clone());
        let _ = self.outputs.send(ChannelOutput::Visual(indicator));
    }
}

impl AlertChannel for VisualChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Visual
    }

    fn attempt(&self, alert: &AlertEvent) -> Result<(), ChannelError> {
        self.set(VisualIndicator {
            active: true,
            severity: Some(alert.severity),
            alert_id: Some(alert.id),
        });
        Ok(())
    }

    fn clear(&self) {
        self.set(VisualIndicator::default());
    }
}
