//! Confidence thresholds for the built-in adapters.

use std::collections::HashMap;

use proctor_types::labels;
use serde::{Deserialize, Serialize};

/// Per-class confidence thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorThresholds {
    /// Minimum confidence for a face to count as present.
    #[serde(default = "default_face_min_confidence")]
    pub face_min_confidence: f64,

    /// Minimum confidence for object classes without an override.
    #[serde(default = "default_object_confidence")]
    pub object_default_confidence: f64,

    /// Per-class overrides, keyed by label.
    #[serde(default = "default_object_class_confidence")]
    pub object_class_confidence: HashMap<String, f64>,

    /// Object labels that produce findings.
    #[serde(default = "default_prohibited_objects")]
    pub prohibited_objects: Vec<String>,

    /// Minimum class score for an audio finding.
    #[serde(default = "default_audio_min_confidence")]
    pub audio_min_confidence: f64,

    /// Audio classes considered suspicious.
    #[serde(default = "default_audio_classes")]
    pub audio_classes: Vec<String>,
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        Self {
            face_min_confidence: default_face_min_confidence(),
            object_default_confidence: default_object_confidence(),
            object_class_confidence: default_object_class_confidence(),
            prohibited_objects: default_prohibited_objects(),
            audio_min_confidence: default_audio_min_confidence(),
            audio_classes: default_audio_classes(),
        }
    }
}

impl DetectorThresholds {
    /// Threshold for an object class, falling back to the default.
    pub fn object_threshold(&self, label: &str) -> f64 {
        self.object_class_confidence
            .iter()
            .find(|(class, _)| class.eq_ignore_ascii_case(label))
            .map(|(_, threshold)| *threshold)
            .unwrap_or(self.object_default_confidence)
    }

    pub fn is_prohibited(&self, label: &str) -> bool {
        self.prohibited_objects
            .iter()
            .any(|p| p.eq_ignore_ascii_case(label))
    }

    pub fn is_suspicious_audio(&self, class: &str) -> bool {
        self.audio_classes
            .iter()
            .any(|c| c.eq_ignore_ascii_case(class))
    }
}

fn default_face_min_confidence() -> f64 {
    0.9
}

fn default_object_confidence() -> f64 {
    0.2
}

fn default_object_class_confidence() -> HashMap<String, f64> {
    HashMap::from([(labels::MOBILE_PHONE.to_string(), 0.4)])
}

fn default_prohibited_objects() -> Vec<String> {
    vec![
        labels::BOOK.to_string(),
        labels::MOBILE_PHONE.to_string(),
        labels::LAPTOP.to_string(),
    ]
}

fn default_audio_min_confidence() -> f64 {
    0.3
}

fn default_audio_classes() -> Vec<String> {
    vec![labels::SPEECH.to_string(), labels::WHISPERING.to_string()]
}
