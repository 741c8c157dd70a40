//! Scoring configuration

use serde::{Deserialize, Serialize};

/// Engagement scoring configuration
///
/// All adjustments are additive. The total is clamped to `[0, 100]` once,
/// after every adjustment has been applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Starting score before adjustments
    pub base_score: f32,

    /// Mouth aspect ratio above which a subject is yawning
    pub yawn_mar_threshold: f32,
    pub yawn_penalty: f32,

    /// Head-pitch ratio below which a subject is looking down
    /// (chin-to-nose distance over face height; ~0.3 when facing forward)
    pub looking_forward_ratio: f32,
    pub looking_down_penalty: f32,

    /// Probability above which sad/angry/fearful/disgusted count as dominant
    pub negative_expression_threshold: f32,
    /// Penalty for each dominant negative expression
    pub negative_expression_penalty: f32,
    /// Neutral probability above which the face reads as passive
    pub neutral_dominance_threshold: f32,
    pub neutral_penalty: f32,
    /// Ceiling for the combined expression penalty
    pub expression_penalty_cap: f32,

    pub happy_threshold: f32,
    pub happy_bonus: f32,
    pub surprised_threshold: f32,
    pub surprised_bonus: f32,

    /// Scores at or above this are engaged
    pub engaged_min: f32,
    /// Scores below this are bored
    pub bored_below: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_score: 70.0,
            yawn_mar_threshold: 0.6,
            yawn_penalty: 25.0,
            looking_forward_ratio: 0.25,
            looking_down_penalty: 20.0,
            negative_expression_threshold: 0.5,
            negative_expression_penalty: 10.0,
            neutral_dominance_threshold: 0.7,
            neutral_penalty: 5.0,
            expression_penalty_cap: 20.0,
            happy_threshold: 0.5,
            happy_bonus: 15.0,
            surprised_threshold: 0.3,
            surprised_bonus: 10.0,
            engaged_min: 65.0,
            bored_below: 40.0,
        }
    }
}

impl ScoringConfig {
    /// Create strict config (penalizes sooner)
    pub fn strict() -> Self {
        Self {
            yawn_mar_threshold: 0.5,
            looking_forward_ratio: 0.28,
            neutral_dominance_threshold: 0.6,
            ..Default::default()
        }
    }

    /// Create lenient config (tolerates more head movement)
    pub fn lenient() -> Self {
        Self {
            yawn_mar_threshold: 0.7,
            looking_forward_ratio: 0.2,
            ..Default::default()
        }
    }
}
