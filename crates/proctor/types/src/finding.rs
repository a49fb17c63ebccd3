//! Detector findings and the ledger records built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known finding labels produced by the built-in detectors.
pub mod labels {
    /// No face with sufficient confidence in the frame.
    pub const FACE_NOT_VISIBLE: &str = "face not visible";
    /// More than one face in the frame.
    pub const MULTIPLE_FACES: &str = "multiple faces";
    pub const MOBILE_PHONE: &str = "mobile phone";
    pub const BOOK: &str = "book";
    pub const LAPTOP: &str = "laptop";
    pub const SPEECH: &str = "Speech";
    pub const WHISPERING: &str = "Whispering";
}

/// Perceptual source a finding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorSource {
    Face,
    Object,
    Audio,
}

impl fmt::Display for DetectorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorSource::Face => write!(f, "face"),
            DetectorSource::Object => write!(f, "object"),
            DetectorSource::Audio => write!(f, "audio"),
        }
    }
}

/// A single observation emitted by one detector evaluation.
///
/// Findings are immutable and short-lived: they flow through the cooldown
/// gate and, if they survive, become a [`ViolationRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Detector that produced this finding.
    pub source: DetectorSource,

    /// Classification label (e.g. `"mobile phone"`).
    pub label: String,

    /// Confidence in `[0.0, 1.0]`.
    pub confidence: f64,

    /// Human-readable alert text.
    pub message: String,

    /// When the evaluation produced this finding.
    pub timestamp: DateTime<Utc>,
}

impl Finding {
    /// Create a finding stamped with the current time. Confidence is clamped
    /// into `[0.0, 1.0]`; NaN becomes `0.0`.
    pub fn new(
        source: DetectorSource,
        label: impl Into<String>,
        confidence: f64,
        message: impl Into<String>,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };

        Self {
            source,
            label: label.into(),
            confidence,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Override the timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Case-insensitive label comparison.
    pub fn has_label(&self, label: &str) -> bool {
        self.label.eq_ignore_ascii_case(label)
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} ({:.2})",
            self.source, self.label, self.confidence
        )
    }
}

/// Append-only ledger entry for a finding that survived filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationRecord {
    /// Position in the session log, starting at 1, gap-free.
    pub sequence_number: u64,

    pub source: DetectorSource,
    pub label: String,
    pub message: String,

    /// When the ledger admitted the finding.
    pub timestamp: DateTime<Utc>,

    /// Whether this record incremented the violation count.
    pub counted: bool,

    /// Violation count after this record was applied.
    pub violation_count: u32,
}
