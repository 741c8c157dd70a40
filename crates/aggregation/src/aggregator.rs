//! Metrics aggregator

use crate::{EngagementSample, TickResult};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use engagement::ScoredSubject;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Aggregator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Wall-clock cadence of persisted samples (default: 5000)
    pub emit_interval_ms: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            emit_interval_ms: 5000,
        }
    }
}

/// Rolling per-session aggregate with throttled emission
#[derive(Debug)]
pub struct MetricsAggregator {
    emit_interval: Duration,
    current: TickResult,
    /// Whether any tick since the last emission saw at least one subject
    observed_since_emit: bool,
    last_emit_at: Instant,
    last_timestamp: Option<DateTime<Utc>>,
}

impl MetricsAggregator {
    /// Start aggregating; the first sample is due one interval after `started_at`
    pub fn new(config: &AggregatorConfig, started_at: Instant) -> Self {
        Self {
            emit_interval: Duration::from_millis(config.emit_interval_ms),
            current: TickResult::default(),
            observed_since_emit: false,
            last_emit_at: started_at,
            last_timestamp: None,
        }
    }

    /// Replace the rolling result with this tick's subjects
    pub fn on_tick(&mut self, subjects: &[ScoredSubject]) -> &TickResult {
        self.current = TickResult::from_scored(subjects);
        if !self.current.is_empty() {
            self.observed_since_emit = true;
        }
        &self.current
    }

    pub fn current(&self) -> &TickResult {
        &self.current
    }

    /// Emit the rolling result if the cadence has elapsed
    pub fn emit_if_due(&mut self, now: Instant) -> Option<EngagementSample> {
        self.emit_if_due_at(now, Utc::now())
    }

    /// Same as [`emit_if_due`](Self::emit_if_due) with an explicit wall clock
    pub fn emit_if_due_at(&mut self, now: Instant, wall: DateTime<Utc>) -> Option<EngagementSample> {
        if now.saturating_duration_since(self.last_emit_at) < self.emit_interval {
            return None;
        }
        self.last_emit_at = now;

        if !self.observed_since_emit {
            debug!("No subjects since last sample, skipping emission");
            return None;
        }
        self.observed_since_emit = false;

        let timestamp = match self.last_timestamp {
            Some(last) if wall <= last => last + ChronoDuration::milliseconds(1),
            _ => wall,
        };
        self.last_timestamp = Some(timestamp);

        metrics::counter!("aggregation_samples_emitted_total").increment(1);
        Some(EngagementSample::from_tick(&self.current, timestamp))
    }

    /// Discard the partial aggregate and restart the cadence
    pub fn reset(&mut self, now: Instant) {
        self.current = TickResult::default();
        self.observed_since_emit = false;
        self.last_emit_at = now;
    }
}
