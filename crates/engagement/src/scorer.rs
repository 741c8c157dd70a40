//! Engagement scorer

use crate::{ScoringConfig, SubjectObservation};
use serde::{Deserialize, Serialize};

/// Three-way engagement classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Engaged,
    Neutral,
    Bored,
}

/// Observation with its score attached. Lives for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSubject {
    pub observation: SubjectObservation,
    pub engagement_score: f32,
    pub classification: Classification,
}

/// Maps one observation to a score in `[0, 100]`
#[derive(Debug, Clone, Default)]
pub struct EngagementScorer {
    config: ScoringConfig,
}

impl EngagementScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Compute the clamped engagement score
    pub fn score(&self, observation: &SubjectObservation) -> f32 {
        let c = &self.config;
        let mut total = c.base_score;

        if observation.is_yawning {
            total -= c.yawn_penalty;
        }
        if observation.is_looking_down {
            total -= c.looking_down_penalty;
        }

        total -= self.expression_penalty(observation);
        total += self.expression_bonus(observation);

        total.clamp(0.0, 100.0)
    }

    fn expression_penalty(&self, observation: &SubjectObservation) -> f32 {
        let c = &self.config;
        let e = &observation.expressions;

        let dominant_negatives = [e.sad, e.angry, e.fearful, e.disgusted]
            .iter()
            .filter(|&&p| p > c.negative_expression_threshold)
            .count();

        let mut penalty = dominant_negatives as f32 * c.negative_expression_penalty;
        if e.neutral > c.neutral_dominance_threshold {
            penalty += c.neutral_penalty;
        }

        penalty.min(c.expression_penalty_cap)
    }

    fn expression_bonus(&self, observation: &SubjectObservation) -> f32 {
        let c = &self.config;
        let e = &observation.expressions;

        let mut bonus = 0.0;
        if e.happy > c.happy_threshold {
            bonus += c.happy_bonus;
        }
        if e.surprised > c.surprised_threshold {
            bonus += c.surprised_bonus;
        }
        bonus
    }

    /// Classify an already-clamped score
    pub fn classify(&self, score: f32) -> Classification {
        if score >= self.config.engaged_min {
            Classification::Engaged
        } else if score < self.config.bored_below {
            Classification::Bored
        } else {
            Classification::Neutral
        }
    }

    pub fn score_subject(&self, observation: SubjectObservation) -> ScoredSubject {
        let engagement_score = self.score(&observation);
        ScoredSubject {
            classification: self.classify(engagement_score),
            engagement_score,
            observation,
        }
    }

    /// Score every subject in a tick, preserving detection order
    pub fn score_all(&self, observations: Vec<SubjectObservation>) -> Vec<ScoredSubject> {
        observations
            .into_iter()
            .map(|o| self.score_subject(o))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Expressions, FaceBox};
    use proptest::prelude::*;

    fn observation(yawning: bool, looking_down: bool, expressions: Expressions) -> SubjectObservation {
        SubjectObservation {
            face: FaceBox::default(),
            mouth_aspect_ratio: if yawning { 0.8 } else { 0.1 },
            head_pitch_ratio: if looking_down { 0.1 } else { 0.3 },
            expressions,
            is_yawning: yawning,
            is_looking_down: looking_down,
        }
    }

    #[test]
    fn test_yawning_and_looking_down_is_bored() {
        let scorer = EngagementScorer::default();
        let scored = scorer.score_subject(observation(true, true, Expressions::neutral(0.65)));

        assert_eq!(scored.engagement_score, 25.0);
        assert_eq!(scored.classification, Classification::Bored);
    }

    #[test]
    fn test_strongly_neutral_adds_small_penalty() {
        let scorer = EngagementScorer::default();
        let score = scorer.score(&observation(true, true, Expressions::neutral(0.9)));
        assert_eq!(score, 20.0);
    }

    #[test]
    fn test_attentive_subject_is_engaged_at_base() {
        let scorer = EngagementScorer::default();
        let scored = scorer.score_subject(observation(false, false, Expressions::neutral(0.5)));
        assert_eq!(scored.engagement_score, 70.0);
        assert_eq!(scored.classification, Classification::Engaged);
    }

    #[test]
    fn test_positive_expressions_add_bonus() {
        let scorer = EngagementScorer::default();
        let expressions = Expressions {
            happy: 0.6,
            surprised: 0.35,
            ..Default::default()
        };
        assert_eq!(scorer.score(&observation(false, false, expressions)), 95.0);
    }

    #[test]
    fn test_expression_penalty_is_capped() {
        let scorer = EngagementScorer::default();
        let expressions = Expressions {
            sad: 0.6,
            angry: 0.6,
            fearful: 0.6,
            disgusted: 0.6,
            neutral: 0.8,
            ..Default::default()
        };
        let scored = scorer.score_subject(observation(false, false, expressions));
        assert_eq!(scored.engagement_score, 50.0);
        assert_eq!(scored.classification, Classification::Neutral);
    }

    #[test]
    fn test_classification_boundaries() {
        let scorer = EngagementScorer::default();
        assert_eq!(scorer.classify(65.0), Classification::Engaged);
        assert_eq!(scorer.classify(64.9), Classification::Neutral);
        assert_eq!(scorer.classify(40.0), Classification::Neutral);
        assert_eq!(scorer.classify(39.9), Classification::Bored);
    }

    #[test]
    fn test_clamping_applied_once_at_the_end() {
        // Penalties alone would go far below zero; the happy bonus must be
        // added before clamping, not after.
        let scorer = EngagementScorer::new(ScoringConfig {
            yawn_penalty: 80.0,
            looking_down_penalty: 80.0,
            happy_bonus: 100.0,
            ..Default::default()
        });
        let expressions = Expressions {
            happy: 0.9,
            ..Default::default()
        };
        assert_eq!(scorer.score(&observation(true, true, expressions)), 10.0);
    }

    #[test]
    fn test_clamps_at_both_ends() {
        let harsh = EngagementScorer::new(ScoringConfig {
            yawn_penalty: 90.0,
            looking_down_penalty: 90.0,
            ..Default::default()
        });
        assert_eq!(harsh.score(&observation(true, true, Expressions::neutral(0.9))), 0.0);

        let generous = EngagementScorer::new(ScoringConfig {
            happy_bonus: 60.0,
            surprised_bonus: 60.0,
            ..Default::default()
        });
        let expressions = Expressions {
            happy: 0.9,
            surprised: 0.9,
            ..Default::default()
        };
        assert_eq!(generous.score(&observation(false, false, expressions)), 100.0);
    }

    prop_compose! {
        fn arb_expressions()(
            neutral in 0.0f32..=1.0,
            happy in 0.0f32..=1.0,
            sad in 0.0f32..=1.0,
            angry in 0.0f32..=1.0,
            fearful in 0.0f32..=1.0,
            disgusted in 0.0f32..=1.0,
            surprised in 0.0f32..=1.0,
        ) -> Expressions {
            Expressions { neutral, happy, sad, angry, fearful, disgusted, surprised }
        }
    }

    prop_compose! {
        fn arb_observation()(
            yawning in any::<bool>(),
            looking_down in any::<bool>(),
            expressions in arb_expressions(),
        ) -> SubjectObservation {
            observation(yawning, looking_down, expressions)
        }
    }

    proptest! {
        #[test]
        fn prop_score_in_range(obs in arb_observation()) {
            let score = EngagementScorer::default().score(&obs);
            prop_assert!((0.0..=100.0).contains(&score));
        }

        #[test]
        fn prop_score_in_range_for_any_weights(
            obs in arb_observation(),
            base in 0.0f32..=100.0,
            penalty in 0.0f32..=200.0,
            bonus in 0.0f32..=200.0,
        ) {
            let scorer = EngagementScorer::new(ScoringConfig {
                base_score: base,
                yawn_penalty: penalty,
                looking_down_penalty: penalty,
                negative_expression_penalty: penalty,
                expression_penalty_cap: penalty,
                happy_bonus: bonus,
                surprised_bonus: bonus,
                ..Default::default()
            });
            let score = scorer.score(&obs);
            prop_assert!((0.0..=100.0).contains(&score));
        }

        #[test]
        fn prop_scoring_is_order_independent(
            subjects in proptest::collection::vec(arb_observation(), 0..8)
        ) {
            let scorer = EngagementScorer::default();
            let forward: Vec<f32> = scorer
                .score_all(subjects.clone())
                .iter()
                .map(|s| s.engagement_score)
                .collect();
            let mut backward: Vec<f32> = scorer
                .score_all(subjects.into_iter().rev().collect())
                .iter()
                .map(|s| s.engagement_score)
                .collect();
            backward.reverse();
            prop_assert_eq!(forward, backward);
        }
    }
}
