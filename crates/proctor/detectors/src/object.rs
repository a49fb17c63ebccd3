//! Prohibited object detection.

use parking_lot::RwLock;
use proctor_types::{labels, DetectorSource, Finding};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DetectorThresholds;
use crate::error::DetectorResult;
use crate::sample::{BoundingBox, Frame, Sample, SampleKind};
use crate::{expect_kind, Detector};

/// An object reported by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDetection {
    pub label: String,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

impl ObjectDetection {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox: BoundingBox::default(),
        }
    }
}

/// Object inference routine.
pub trait ObjectModel: Send + Sync {
    fn detect_objects(&self, frame: &Frame) -> DetectorResult<Vec<ObjectDetection>>;
}

/// Emits one finding per prohibited object above its class threshold.
pub struct ObjectDetector<M> {
    model: M,
    thresholds: RwLock<DetectorThresholds>,
}

impl<M: ObjectModel> ObjectDetector<M> {
    pub fn new(model: M, thresholds: DetectorThresholds) -> Self {
        Self {
            model,
            thresholds: RwLock::new(thresholds),
        }
    }
}

fn alert_message(detection: &ObjectDetection) -> String {
    if detection.label.eq_ignore_ascii_case(labels::MOBILE_PHONE) {
        "Warning: Mobile phone detected".to_string()
    } else {
        format!(
            "Abnormal Movement Detected: {} (Confidence: {:.2})",
            detection.label, detection.confidence
        )
    }
}

impl<M: ObjectModel> Detector for ObjectDetector<M> {
    fn source(&self) -> DetectorSource {
        DetectorSource::Object
    }

    fn input(&self) -> SampleKind {
        SampleKind::Frame
    }

    fn evaluate(&self, sample: &Sample) -> DetectorResult<Vec<Finding>> {
        expect_kind(self.source(), self.input(), sample)?;
        let Some(frame) = sample.as_frame() else {
            return Ok(Vec::new());
        };

        let detections = self.model.detect_objects(frame)?;
        let thresholds = self.thresholds.read();

        let findings = detections
            .into_iter()
            .filter(|d| {
                let threshold = thresholds.object_threshold(&d.label);
                if d.confidence < threshold {
                    debug!(
                        label = %d.label,
                        confidence = d.confidence,
                        threshold,
                        "Ignored low-confidence detection"
                    );
                    return false;
                }
                thresholds.is_prohibited(&d.label)
            })
            .map(|d| {
                Finding::new(
                    DetectorSource::Object,
                    d.label.to_lowercase(),
                    d.confidence,
                    alert_message(&d),
                )
            })
            .collect();

        Ok(findings)
    }

    fn configure(&self, thresholds: &DetectorThresholds) {
        *self.thresholds.write() = thresholds.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedObjects(Vec<ObjectDetection>);

    impl ObjectModel for FixedObjects {
        fn detect_objects(&self, _frame: &Frame) -> DetectorResult<Vec<ObjectDetection>> {
            Ok(self.0.clone())
        }
    }

    fn evaluate(detections: Vec<ObjectDetection>) -> Vec<Finding> {
        let detector = ObjectDetector::new(FixedObjects(detections), DetectorThresholds::default());
        detector.evaluate(&Frame::blank(8, 8).into()).unwrap()
    }

    #[test]
    fn phone_below_strict_threshold_is_ignored() {
        let findings = evaluate(vec![ObjectDetection::new("mobile phone", 0.3)]);
        assert!(findings.is_empty());
    }

    #[test]
    fn book_passes_lenient_threshold() {
        let findings = evaluate(vec![ObjectDetection::new("book", 0.3)]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].label, "book");
        assert_eq!(
            findings[0].message,
            "Abnormal Movement Detected: book (Confidence: 0.30)"
        );
    }

    #[test]
    fn phone_has_dedicated_message() {
        let findings = evaluate(vec![ObjectDetection::new("Mobile Phone", 0.8)]);
        assert_eq!(findings[0].label, labels::MOBILE_PHONE);
        assert_eq!(findings[0].message, "Warning: Mobile phone detected");
    }

    #[test]
    fn unlisted_objects_are_ignored() {
        let findings = evaluate(vec![
            ObjectDetection::new("cup", 0.99),
            ObjectDetection::new("laptop", 0.5),
        ]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].label, labels::LAPTOP);
    }
}
