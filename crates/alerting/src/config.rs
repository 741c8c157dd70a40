//! Alert configuration

use crate::{AlertError, ChannelKind};
use serde::{Deserialize, Serialize};

/// Which delivery channels are enabled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelToggles {
    pub tone: bool,
    pub vibration: bool,
    pub visual: bool,
    pub push: bool,
}

impl Default for ChannelToggles {
    fn default() -> Self {
        Self {
            tone: true,
            vibration: true,
            visual: true,
            push: false,
        }
    }
}

impl ChannelToggles {
    pub fn is_enabled(&self, kind: ChannelKind) -> bool {
        match kind {
            ChannelKind::Tone => self.tone,
            ChannelKind::Vibration => self.vibration,
            ChannelKind::Visual => self.visual,
            ChannelKind::Push => self.push,
        }
    }
}

/// Alert configuration, owned by one monitoring session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Boredom percentage at which a warning is raised (default: 40)
    pub warning_boredom_percentage: f32,
    /// Boredom percentage at which a critical alert is raised (default: 60)
    pub critical_boredom_percentage: f32,
    /// Average engagement below which a warning is raised (default: 60)
    pub warning_average_score: f32,
    /// Average engagement below which a critical alert is raised (default: 40)
    pub critical_average_score: f32,
    /// Minimum time between two alerts (default: 30 seconds)
    pub cooldown_ms: u64,
    /// Maximum alerts per rolling hour before throttling
    pub max_alerts_per_hour: usize,
    pub channels: ChannelToggles,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            warning_boredom_percentage: 40.0,
            critical_boredom_percentage: 60.0,
            warning_average_score: 60.0,
            critical_average_score: 40.0,
            cooldown_ms: 30_000,
            max_alerts_per_hour: 30,
            channels: ChannelToggles::default(),
        }
    }
}

impl AlertConfig {
    /// Create strict config (alerts sooner and more often)
    pub fn strict() -> Self {
        Self {
            warning_boredom_percentage: 30.0,
            critical_boredom_percentage: 50.0,
            warning_average_score: 65.0,
            critical_average_score: 45.0,
            cooldown_ms: 15_000,
            ..Default::default()
        }
    }

    /// Create lenient config (fewer interruptions)
    pub fn lenient() -> Self {
        Self {
            warning_boredom_percentage: 50.0,
            critical_boredom_percentage: 75.0,
            warning_average_score: 50.0,
            critical_average_score: 30.0,
            cooldown_ms: 120_000,
            ..Default::default()
        }
    }

    /// Reject configurations the engine cannot act on consistently
    pub fn validate(&self) -> Result<(), AlertError> {
        let in_range = |v: f32| (0.0..=100.0).contains(&v);
        if ![
            self.warning_boredom_percentage,
            self.critical_boredom_percentage,
            self.warning_average_score,
            self.critical_average_score,
        ]
        .into_iter()
        .all(in_range)
        {
            return Err(AlertError::InvalidConfig(
                "thresholds must be within 0-100".to_string(),
            ));
        }
        if self.critical_boredom_percentage < self.warning_boredom_percentage {
            return Err(AlertError::InvalidConfig(format!(
                "critical boredom {} below warning boredom {}",
                self.critical_boredom_percentage, self.warning_boredom_percentage
            )));
        }
        if self.critical_average_score > self.warning_average_score {
            return Err(AlertError::InvalidConfig(format!(
                "critical average {} above warning average {}",
                self.critical_average_score, self.warning_average_score
            )));
        }
        if self.cooldown_ms == 0 {
            return Err(AlertError::InvalidConfig(
                "cooldown must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
