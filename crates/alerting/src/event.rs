//! Alert events and delivery reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Alert severity. Critical wins when both boundaries are crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery channel kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Tone,
    Vibration,
    Visual,
    Push,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelKind::Tone => "tone",
            ChannelKind::Vibration => "vibration",
            ChannelKind::Visual => "visual",
            ChannelKind::Push => "push",
        };
        f.write_str(name)
    }
}

/// A raised alert. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: Uuid,
    pub session_id: String,
    pub severity: Severity,
    pub boredom_percentage: f32,
    pub average_score: f32,
    pub total_subjects: usize,
    pub message: String,
    pub channels_attempted: Vec<ChannelKind>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of dispatching one alert, tracked apart from the event itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub alert_id: Uuid,
    pub attempted: Vec<ChannelKind>,
    pub confirmed: Vec<ChannelKind>,
    pub failures: Vec<(ChannelKind, String)>,
}

impl DeliveryReport {
    pub fn new(alert_id: Uuid) -> Self {
        Self {
            alert_id,
            attempted: Vec::new(),
            confirmed: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// At least one channel confirmed delivery
    pub fn delivered(&self) -> bool {
        !self.confirmed.is_empty()
    }
}
