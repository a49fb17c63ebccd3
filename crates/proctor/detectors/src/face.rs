//! Face presence and count.

use parking_lot::RwLock;
use proctor_types::{labels, DetectorSource, Finding};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DetectorThresholds;
use crate::error::DetectorResult;
use crate::sample::{BoundingBox, Sample, SampleKind};
use crate::{expect_kind, Detector};

/// A face reported by the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    pub bbox: BoundingBox,
    pub confidence: f64,
}

/// Face inference routine.
pub trait FaceModel: Send + Sync {
    fn detect_faces(&self, frame: &crate::Frame) -> DetectorResult<Vec<FaceDetection>>;
}

/// Emits `face not visible` when nobody is in frame and `multiple faces`
/// when more than one confident face is present.
pub struct FaceDetector<M> {
    model: M,
    thresholds: RwLock<DetectorThresholds>,
}

impl<M: FaceModel> FaceDetector<M> {
    pub fn new(model: M, thresholds: DetectorThresholds) -> Self {
        Self {
            model,
            thresholds: RwLock::new(thresholds),
        }
    }
}

impl<M: FaceModel> Detector for FaceDetector<M> {
    fn source(&self) -> DetectorSource {
        DetectorSource::Face
    }

    fn input(&self) -> SampleKind {
        SampleKind::Frame
    }

    fn evaluate(&self, sample: &Sample) -> DetectorResult<Vec<Finding>> {
        expect_kind(self.source(), self.input(), sample)?;
        let Some(frame) = sample.as_frame() else {
            return Ok(Vec::new());
        };

        let min_confidence = self.thresholds.read().face_min_confidence;
        let faces: Vec<FaceDetection> = self
            .model
            .detect_faces(frame)?
            .into_iter()
            .filter(|face| face.confidence > min_confidence)
            .collect();

        debug!(faces = faces.len(), "Face evaluation complete");

        let finding = match faces.len() {
            0 => Finding::new(
                DetectorSource::Face,
                labels::FACE_NOT_VISIBLE,
                1.0,
                "Face not visible, please show your face",
            ),
            1 => return Ok(Vec::new()),
            _ => {
                let confidence = faces
                    .iter()
                    .map(|face| face.confidence)
                    .fold(0.0, f64::max);
                Finding::new(
                    DetectorSource::Face,
                    labels::MULTIPLE_FACES,
                    confidence,
                    "Abnormal Movement Detected: Multiple faces detected!",
                )
            }
        };

        Ok(vec![finding])
    }

    fn configure(&self, thresholds: &DetectorThresholds) {
        *self.thresholds.write() = thresholds.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AudioBuffer, DetectorError, Frame};

    struct FixedFaces(Vec<f64>);

    impl FaceModel for FixedFaces {
        fn detect_faces(&self, _frame: &Frame) -> DetectorResult<Vec<FaceDetection>> {
            Ok(self
                .0
                .iter()
                .map(|confidence| FaceDetection {
                    bbox: BoundingBox::default(),
                    confidence: *confidence,
                })
                .collect())
        }
    }

    struct BrokenModel;

    impl FaceModel for BrokenModel {
        fn detect_faces(&self, _frame: &Frame) -> DetectorResult<Vec<FaceDetection>> {
            Err(DetectorError::inference(DetectorSource::Face, "no weights"))
        }
    }

    fn frame() -> Sample {
        Frame::blank(8, 8).into()
    }

    #[test]
    fn single_face_is_quiet() {
        let detector = FaceDetector::new(FixedFaces(vec![0.99]), DetectorThresholds::default());
        assert!(detector.evaluate(&frame()).unwrap().is_empty());
    }

    #[test]
    fn no_face_reports_not_visible() {
        let detector = FaceDetector::new(FixedFaces(vec![]), DetectorThresholds::default());
        let findings = detector.evaluate(&frame()).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].label, labels::FACE_NOT_VISIBLE);
    }

    #[test]
    fn low_confidence_faces_do_not_count() {
        let detector =
            FaceDetector::new(FixedFaces(vec![0.95, 0.5]), DetectorThresholds::default());
        assert!(detector.evaluate(&frame()).unwrap().is_empty());
    }

    #[test]
    fn multiple_faces_reported_with_top_confidence() {
        let detector =
            FaceDetector::new(FixedFaces(vec![0.92, 0.97]), DetectorThresholds::default());
        let findings = detector.evaluate(&frame()).unwrap();
        assert_eq!(findings[0].label, labels::MULTIPLE_FACES);
        assert!((findings[0].confidence - 0.97).abs() < f64::EPSILON);
    }

    #[test]
    fn configure_changes_face_threshold() {
        let detector =
            FaceDetector::new(FixedFaces(vec![0.95, 0.5]), DetectorThresholds::default());
        detector.configure(&DetectorThresholds {
            face_min_confidence: 0.4,
            ..Default::default()
        });
        let findings = detector.evaluate(&frame()).unwrap();
        assert_eq!(findings[0].label, labels::MULTIPLE_FACES);
    }

    #[test]
    fn rejects_audio_samples() {
        let detector = FaceDetector::new(FixedFaces(vec![]), DetectorThresholds::default());
        let audio: Sample = AudioBuffer::silence(16, 1.0).into();
        assert!(matches!(
            detector.evaluate(&audio),
            Err(DetectorError::SampleMismatch { .. })
        ));
    }

    #[test]
    fn inference_failure_becomes_empty() {
        let detector = FaceDetector::new(BrokenModel, DetectorThresholds::default());
        assert!(detector.evaluate(&frame()).is_err());
        assert!(detector.evaluate_or_empty(&frame()).is_empty());
    }
}
