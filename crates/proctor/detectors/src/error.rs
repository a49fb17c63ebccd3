//! Error types for proctor-detectors.

use proctor_types::DetectorSource;
use thiserror::Error;

use crate::sample::SampleKind;

/// Errors raised by a single detector evaluation. Never fatal to a session.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// The underlying model failed.
    #[error("{detector} inference failed: {reason}")]
    Inference {
        detector: DetectorSource,
        reason: String,
    },

    /// The detector was handed a sample it cannot evaluate.
    #[error("{detector} detector expects {expected} samples, got {actual}")]
    SampleMismatch {
        detector: DetectorSource,
        expected: SampleKind,
        actual: SampleKind,
    },

    /// The sample is structurally unusable (empty frame, zero sample rate).
    #[error("invalid sample: {0}")]
    InvalidSample(String),
}

impl DetectorError {
    pub fn inference(detector: DetectorSource, reason: impl Into<String>) -> Self {
        Self::Inference {
            detector,
            reason: reason.into(),
        }
    }
}

/// Result type for detector operations.
pub type DetectorResult<T> = Result<T, DetectorError>;
