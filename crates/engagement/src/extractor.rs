//! Boundary to the external face model

use crate::{ExtractionError, SubjectObservation};
use tracing::{debug, warn};
use video_source::VideoFrame;

/// Face model that turns a frame into subject observations.
///
/// Implementations return an empty list when nobody is in frame. Result order
/// follows detection order and is not stable across ticks.
pub trait FeatureExtractor: Send {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<SubjectObservation>, ExtractionError>;
}

/// Run the extractor, treating failures and malformed output as an empty tick
pub fn detect_subjects<E>(extractor: &mut E, frame: &VideoFrame) -> Vec<SubjectObservation>
where
    E: FeatureExtractor + ?Sized,
{
    let observations = match extractor.detect(frame) {
        Ok(observations) => observations,
        Err(ExtractionError::NotReady(reason)) => {
            debug!("Extractor not ready on frame #{}: {}", frame.sequence, reason);
            return Vec::new();
        }
        Err(e) => {
            warn!("Extraction failed on frame #{}: {}", frame.sequence, e);
            metrics::counter!("engagement_extraction_failures_total").increment(1);
            return Vec::new();
        }
    };

    for (index, observation) in observations.iter().enumerate() {
        if let Err(e) = observation.validate(index) {
            warn!("Discarding frame #{} output: {}", frame.sequence, e);
            metrics::counter!("engagement_extraction_failures_total").increment(1);
            return Vec::new();
        }
    }

    observations
}
