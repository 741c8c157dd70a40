//! Alert Engine Implementation

use crate::{
    AlertChannel, AlertConfig, AlertError, AlertEvent, ChannelKind, DeliveryReport, Severity,
};
use aggregation::EngagementSample;
use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const HOUR: Duration = Duration::from_secs(3600);

/// Engine state derived from the last alert time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No active cooldown
    Idle,
    /// An alert was raised recently
    Cooldown { remaining: Duration },
}

/// Per-session alert state
#[derive(Debug, Clone, Default)]
pub struct AlertState {
    /// Monotonic time of the last raised alert
    pub last_alert_at: Option<Instant>,
    /// Severity of the last raised alert
    pub current_severity: Option<Severity>,
    /// Id of the last raised alert
    pub current_alert_id: Option<Uuid>,
    /// Whether the last alert was acknowledged
    pub acknowledged: bool,
}

/// Threshold/cooldown decision process for one monitoring session
pub struct AlertEngine {
    session_id: String,
    config: AlertConfig,
    channels: Vec<Box<dyn AlertChannel>>,
    state: AlertState,
    /// Alerts raised in the current hour window
    hourly_count: usize,
    hour_start: Option<Instant>,
}

impl AlertEngine {
    /// Create a new engine; fails on an inconsistent configuration
    pub fn new(session_id: impl Into<String>, config: AlertConfig) -> Result<Self, AlertError> {
        config.validate()?;
        let session_id = session_id.into();
        info!("Creating alert engine for session {} with config: {:?}", session_id, config);
        Ok(Self {
            session_id,
            config,
            channels: Vec::new(),
            state: AlertState::default(),
            hourly_count: 0,
            hour_start: None,
        })
    }

    /// Register a delivery channel
    pub fn with_channel<C: AlertChannel + 'static>(mut self, channel: C) -> Self {
        self.channels.push(Box::new(channel));
        self
    }

    pub fn add_channel(&mut self, channel: Box<dyn AlertChannel>) {
        self.channels.push(channel);
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Swap thresholds mid-session. The cooldown in progress is kept.
    pub fn update_config(&mut self, config: AlertConfig) -> Result<(), AlertError> {
        config.validate()?;
        info!("Alert config updated for session {}", self.session_id);
        self.config = config;
        Ok(())
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    /// Idle or cooling down, as of `now`
    pub fn engine_state(&self, now: Instant) -> EngineState {
        let cooldown = Duration::from_millis(self.config.cooldown_ms);
        match self.state.last_alert_at {
            Some(last) => {
                let elapsed = now.saturating_duration_since(last);
                if elapsed >= cooldown {
                    EngineState::Idle
                } else {
                    EngineState::Cooldown {
                        remaining: cooldown - elapsed,
                    }
                }
            }
            None => EngineState::Idle,
        }
    }

    /// Map a sample to a severity, ignoring cooldown. Critical wins.
    pub fn severity_for(&self, sample: &EngagementSample) -> Option<Severity> {
        if sample.total_subjects == 0 {
            return None;
        }
        let c = &self.config;
        if sample.boredom_percentage >= c.critical_boredom_percentage
            || sample.average_engagement_score < c.critical_average_score
        {
            Some(Severity::Critical)
        } else if sample.boredom_percentage >= c.warning_boredom_percentage
            || sample.average_engagement_score < c.warning_average_score
        {
            Some(Severity::Warning)
        } else {
            None
        }
    }

    /// Decide whether this sample raises an alert, entering cooldown if so
    pub fn evaluate(&mut self, sample: &EngagementSample, now: Instant) -> Option<AlertEvent> {
        let severity = self.severity_for(sample)?;

        if let EngineState::Cooldown { remaining } = self.engine_state(now) {
            debug!(
                "Alert suppressed: in cooldown for another {}ms",
                remaining.as_millis()
            );
            return None;
        }

        // Reset hourly counter if needed
        match self.hour_start {
            Some(start) if now.saturating_duration_since(start) < HOUR => {}
            _ => {
                self.hour_start = Some(now);
                self.hourly_count = 0;
            }
        }
        if self.hourly_count >= self.config.max_alerts_per_hour {
            warn!("Alert throttled: max alerts per hour reached");
            return None;
        }

        let event = AlertEvent {
            id: Uuid::new_v4(),
            session_id: self.session_id.clone(),
            severity,
            boredom_percentage: sample.boredom_percentage,
            average_score: sample.average_engagement_score,
            total_subjects: sample.total_subjects,
            message: Self::message_for(severity, sample),
            channels_attempted: self.enabled_channels(),
            created_at: Utc::now(),
        };

        self.hourly_count += 1;
        self.state = AlertState {
            last_alert_at: Some(now),
            current_severity: Some(severity),
            current_alert_id: Some(event.id),
            acknowledged: false,
        };

        metrics::counter!("alerts_raised_total", "severity" => severity.as_str()).increment(1);
        info!(
            "Alert raised for session {}: {} ({:.0}% bored, avg {:.0})",
            self.session_id, severity, sample.boredom_percentage, sample.average_engagement_score
        );
        Some(event)
    }

    fn message_for(severity: Severity, sample: &EngagementSample) -> String {
        let lead = match severity {
            Severity::Critical => "Engagement critically low",
            Severity::Warning => "Engagement dropping",
        };
        format!(
            "{}: {:.0}% of {} subjects bored, average engagement {:.0}/100",
            lead, sample.boredom_percentage, sample.total_subjects, sample.average_engagement_score
        )
    }

    fn enabled_channels(&self) -> Vec<ChannelKind> {
        self.channels
            .iter()
            .map(|c| c.kind())
            .filter(|&k| self.config.channels.is_enabled(k))
            .collect()
    }

    /// Attempt every enabled channel once. Failures are isolated per channel.
    pub fn dispatch(&self, event: &AlertEvent) -> DeliveryReport {
        let mut report = DeliveryReport::new(event.id);

        for channel in &self.channels {
            let kind = channel.kind();
            if !self.config.channels.is_enabled(kind) {
                continue;
            }
            report.attempted.push(kind);

            match channel.attempt(event) {
                Ok(()) => report.confirmed.push(kind),
                Err(e) => {
                    error!("Alert {} delivery via {} failed: {}", event.id, kind, e);
                    metrics::counter!("alert_channel_failures_total", "channel" => kind.to_string())
                        .increment(1);
                    report.failures.push((kind, e.to_string()));
                }
            }
        }

        report
    }

    /// Acknowledge the current alert and clear persistent indicators
    pub fn acknowledge(&mut self, alert_id: Uuid) -> bool {
        if self.state.current_alert_id != Some(alert_id) {
            return false;
        }
        self.state.acknowledged = true;
        for channel in &self.channels {
            channel.clear();
        }
        info!("Alert acknowledged: {}", alert_id);
        true
    }

    /// Forget all alert state, e.g. when monitoring stops
    pub fn reset(&mut self) {
        self.state = AlertState::default();
        self.hourly_count = 0;
        self.hour_start = None;
        for channel in &self.channels {
            channel.clear();
        }
    }

    /// Get hourly alert count
    pub fn hourly_count(&self) -> usize {
        self.hourly_count
    }
}
