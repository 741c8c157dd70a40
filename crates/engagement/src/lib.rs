//! Engagement Scoring
//!
//! Turns the output of an external face model into per-subject engagement:
//! - Mouth aspect ratio (yawning)
//! - Head pitch (looking down)
//! - Expression probabilities (distress, passive neutral, positive affect)
//!
//! Scoring is a pure function of one observation. Nothing here keeps state
//! between ticks.

pub mod config;
pub mod extractor;
pub mod observation;
pub mod scorer;

pub use config::ScoringConfig;
pub use extractor::{detect_subjects, FeatureExtractor};
pub use observation::{Expressions, FaceBox, FaceLandmarks, Point, SubjectObservation};
pub use scorer::{Classification, EngagementScorer, ScoredSubject};

use thiserror::Error;

/// Feature extraction error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("Model not ready: {0}")]
    NotReady(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Malformed observation #{index}: {reason}")]
    Malformed { index: usize, reason: String },
}
