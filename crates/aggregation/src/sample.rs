//! Tick results and persisted samples

use chrono::{DateTime, Utc};
use engagement::{Classification, ScoredSubject};
use serde::{Deserialize, Serialize};

/// Aggregate over all subjects of a single tick
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TickResult {
    pub total_subjects: usize,
    pub engaged_count: usize,
    pub neutral_count: usize,
    pub bored_count: usize,
    /// Share of subjects classified bored, 0-100
    pub boredom_percentage: f32,
    /// Mean engagement score, 0-100
    pub average_engagement_score: f32,
}

impl TickResult {
    pub fn from_scored(subjects: &[ScoredSubject]) -> Self {
        let mut result = TickResult {
            total_subjects: subjects.len(),
            ..Default::default()
        };

        if subjects.is_empty() {
            return result;
        }

        let mut score_sum = 0.0f32;
        for subject in subjects {
            score_sum += subject.engagement_score;
            match subject.classification {
                Classification::Engaged => result.engaged_count += 1,
                Classification::Neutral => result.neutral_count += 1,
                Classification::Bored => result.bored_count += 1,
            }
        }

        let total = subjects.len() as f32;
        result.boredom_percentage = result.bored_count as f32 / total * 100.0;
        result.average_engagement_score = score_sum / total;
        result
    }

    pub fn is_empty(&self) -> bool {
        self.total_subjects == 0
    }
}

/// Periodic sample handed to persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementSample {
    pub total_subjects: usize,
    pub engaged_count: usize,
    pub neutral_count: usize,
    pub bored_count: usize,
    pub boredom_percentage: f32,
    pub average_engagement_score: f32,
    pub timestamp: DateTime<Utc>,
}

impl EngagementSample {
    pub fn from_tick(tick: &TickResult, timestamp: DateTime<Utc>) -> Self {
        Self {
            total_subjects: tick.total_subjects,
            engaged_count: tick.engaged_count,
            neutral_count: tick.neutral_count,
            bored_count: tick.bored_count,
            boredom_percentage: tick.boredom_percentage,
            average_engagement_score: tick.average_engagement_score,
            timestamp,
        }
    }
}
