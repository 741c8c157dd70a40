//! Subject observations produced by the face model

use crate::{ExtractionError, ScoringConfig};
use serde::{Deserialize, Serialize};

/// Face bounding box in native frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// 2D landmark position in frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// The landmarks the geometric ratios are built from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub mouth_top: Point,
    pub mouth_bottom: Point,
    pub mouth_left: Point,
    pub mouth_right: Point,
    pub nose_tip: Point,
    pub chin: Point,
}

impl FaceLandmarks {
    /// Vertical mouth opening divided by mouth width
    pub fn mouth_aspect_ratio(&self) -> f32 {
        let width = self.mouth_left.distance(&self.mouth_right);
        if width <= f32::EPSILON {
            return 0.0;
        }
        self.mouth_top.distance(&self.mouth_bottom) / width
    }

    /// Chin-to-nose-tip distance normalized by face height.
    ///
    /// Tilting the head down foreshortens this distance, so smaller values
    /// mean a larger downward pitch.
    pub fn head_pitch_ratio(&self, face: &FaceBox) -> f32 {
        if face.height <= f32::EPSILON {
            return 0.0;
        }
        (self.chin.y - self.nose_tip.y).max(0.0) / face.height
    }
}

/// Expression probabilities from the face model (each in `[0, 1]`)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Expressions {
    pub neutral: f32,
    pub happy: f32,
    pub sad: f32,
    pub angry: f32,
    pub fearful: f32,
    pub disgusted: f32,
    pub surprised: f32,
}

impl Expressions {
    /// Face with a single dominant expression
    pub fn neutral(p: f32) -> Self {
        Self {
            neutral: p,
            ..Default::default()
        }
    }

    fn values(&self) -> [(&'static str, f32); 7] {
        [
            ("neutral", self.neutral),
            ("happy", self.happy),
            ("sad", self.sad),
            ("angry", self.angry),
            ("fearful", self.fearful),
            ("disgusted", self.disgusted),
            ("surprised", self.surprised),
        ]
    }
}

/// One detected face in one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectObservation {
    pub face: FaceBox,
    pub mouth_aspect_ratio: f32,
    pub head_pitch_ratio: f32,
    pub expressions: Expressions,
    pub is_yawning: bool,
    pub is_looking_down: bool,
}

impl SubjectObservation {
    /// Build an observation, deriving the yawning/looking-down flags from
    /// the configured thresholds
    pub fn from_measurements(
        face: FaceBox,
        mouth_aspect_ratio: f32,
        head_pitch_ratio: f32,
        expressions: Expressions,
        config: &ScoringConfig,
    ) -> Self {
        Self {
            face,
            mouth_aspect_ratio,
            head_pitch_ratio,
            expressions,
            is_yawning: mouth_aspect_ratio > config.yawn_mar_threshold,
            is_looking_down: head_pitch_ratio < config.looking_forward_ratio,
        }
    }

    /// Build an observation straight from landmarks
    pub fn from_landmarks(
        face: FaceBox,
        landmarks: &FaceLandmarks,
        expressions: Expressions,
        config: &ScoringConfig,
    ) -> Self {
        Self::from_measurements(
            face,
            landmarks.mouth_aspect_ratio(),
            landmarks.head_pitch_ratio(&face),
            expressions,
            config,
        )
    }

    /// Reject non-finite ratios and probabilities outside `[0, 1]`
    pub fn validate(&self, index: usize) -> Result<(), ExtractionError> {
        let malformed = |reason: String| ExtractionError::Malformed { index, reason };

        if !self.mouth_aspect_ratio.is_finite() || self.mouth_aspect_ratio < 0.0 {
            return Err(malformed(format!(
                "mouth aspect ratio {}",
                self.mouth_aspect_ratio
            )));
        }
        if !self.head_pitch_ratio.is_finite() {
            return Err(malformed(format!(
                "head pitch ratio {}",
                self.head_pitch_ratio
            )));
        }
        for (name, p) in self.expressions.values() {
            if !(0.0..=1.0).contains(&p) {
                return Err(malformed(format!("{} probability {}", name, p)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face() -> FaceBox {
        FaceBox {
            x: 100.0,
            y: 50.0,
            width: 200.0,
            height: 200.0,
        }
    }

    fn landmarks(mouth_open: f32, chin_to_nose: f32) -> FaceLandmarks {
        FaceLandmarks {
            mouth_top: Point::new(200.0, 180.0),
            mouth_bottom: Point::new(200.0, 180.0 + mouth_open),
            mouth_left: Point::new(170.0, 190.0),
            mouth_right: Point::new(230.0, 190.0),
            nose_tip: Point::new(200.0, 150.0),
            chin: Point::new(200.0, 150.0 + chin_to_nose),
        }
    }

    #[test]
    fn test_mouth_aspect_ratio() {
        let lm = landmarks(45.0, 60.0);
        assert!((lm.mouth_aspect_ratio() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_mouth_width() {
        let mut lm = landmarks(10.0, 60.0);
        lm.mouth_right = lm.mouth_left;
        assert_eq!(lm.mouth_aspect_ratio(), 0.0);
    }

    #[test]
    fn test_head_pitch_ratio() {
        let lm = landmarks(5.0, 60.0);
        assert!((lm.head_pitch_ratio(&face()) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_flags_derived_from_landmarks() {
        let config = ScoringConfig::default();

        let yawning_down = SubjectObservation::from_landmarks(
            face(),
            &landmarks(45.0, 30.0),
            Expressions::neutral(0.9),
            &config,
        );
        assert!(yawning_down.is_yawning);
        assert!(yawning_down.is_looking_down);

        let attentive = SubjectObservation::from_landmarks(
            face(),
            &landmarks(6.0, 64.0),
            Expressions::neutral(0.9),
            &config,
        );
        assert!(!attentive.is_yawning);
        assert!(!attentive.is_looking_down);
    }

    #[test]
    fn test_validate_rejects_bad_probabilities() {
        let config = ScoringConfig::default();
        let mut obs = SubjectObservation::from_measurements(
            face(),
            0.2,
            0.3,
            Expressions::neutral(0.8),
            &config,
        );
        assert!(obs.validate(0).is_ok());

        obs.expressions.happy = 1.5;
        assert!(matches!(
            obs.validate(2),
            Err(ExtractionError::Malformed { index: 2, .. })
        ));

        obs.expressions.happy = 0.1;
        obs.mouth_aspect_ratio = f32::NAN;
        assert!(obs.validate(0).is_err());
    }
}
