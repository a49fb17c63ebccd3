#![deny(unsafe_code)]
//! # proctor-detectors
//!
//! Uniform adapters over the perceptual inference routines.
//!
//! Every adapter implements [`Detector`]: given one [`Sample`] it returns zero
//! or more [`Finding`]s. Adapters never touch session state; the supervisor
//! decides what a finding means.
//!
//! - [`FaceDetector`]: face presence and count over video frames
//! - [`ObjectDetector`]: prohibited objects over video frames
//! - [`AudioDetector`]: speech and whispering over audio buffers
//!
//! The inference itself is an external collaborator supplied through
//! [`FaceModel`], [`ObjectModel`] and [`AudioModel`].

pub mod audio;
pub mod config;
pub mod error;
pub mod face;
pub mod object;
pub mod sample;

pub use audio::{AudioDetector, AudioModel, ClassScore};
pub use config::DetectorThresholds;
pub use error::{DetectorError, DetectorResult};
pub use face::{FaceDetection, FaceDetector, FaceModel};
pub use object::{ObjectDetection, ObjectDetector, ObjectModel};
pub use sample::{AudioBuffer, BoundingBox, Frame, Sample, SampleKind};

use proctor_types::{DetectorSource, Finding};
use tracing::warn;

/// Detector adapter contract.
///
/// One call is one evaluation; implementations must be side-effect free with
/// respect to the session and safe to call from a blocking worker thread.
pub trait Detector: Send + Sync {
    /// Perceptual source of the findings this detector emits.
    fn source(&self) -> DetectorSource;

    /// Kind of sample this detector consumes.
    fn input(&self) -> SampleKind;

    /// Evaluate one sample.
    fn evaluate(&self, sample: &Sample) -> DetectorResult<Vec<Finding>>;

    /// Replace the confidence thresholds used by subsequent evaluations.
    fn configure(&self, thresholds: &DetectorThresholds);

    /// Name used in logs.
    fn name(&self) -> &str {
        match self.source() {
            DetectorSource::Face => "face",
            DetectorSource::Object => "object",
            DetectorSource::Audio => "audio",
        }
    }

    /// Evaluate, converting failures into a warning and an empty result.
    fn evaluate_or_empty(&self, sample: &Sample) -> Vec<Finding> {
        match self.evaluate(sample) {
            Ok(findings) => findings,
            Err(e) => {
                warn!(detector = self.name(), error = %e, "Detector evaluation failed");
                Vec::new()
            }
        }
    }
}

/// Check that a sample matches what the detector consumes.
pub(crate) fn expect_kind(
    source: DetectorSource,
    expected: SampleKind,
    sample: &Sample,
) -> DetectorResult<()> {
    if sample.kind() == expected {
        Ok(())
    } else {
        Err(DetectorError::SampleMismatch {
            detector: source,
            expected,
            actual: sample.kind(),
        })
    }
}
