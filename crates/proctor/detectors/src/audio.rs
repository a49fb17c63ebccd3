//! Suspicious audio (speech, whispering).

use parking_lot::RwLock;
use proctor_types::{DetectorSource, Finding};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DetectorThresholds;
use crate::error::{DetectorError, DetectorResult};
use crate::sample::{Sample, SampleKind};
use crate::{expect_kind, Detector};

/// Averaged score for one audio class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    pub class: String,
    pub score: f64,
}

impl ClassScore {
    pub fn new(class: impl Into<String>, score: f64) -> Self {
        Self {
            class: class.into(),
            score,
        }
    }
}

/// Audio classification routine. Receives a peak-normalised one-second
/// window at the buffer's sample rate.
pub trait AudioModel: Send + Sync {
    fn classify(&self, window: &[f32], sample_rate: u32) -> DetectorResult<Vec<ClassScore>>;
}

/// Emits at most one finding per buffer: the highest-scoring suspicious class
/// above threshold.
pub struct AudioDetector<M> {
    model: M,
    thresholds: RwLock<DetectorThresholds>,
}

impl<M: AudioModel> AudioDetector<M> {
    pub fn new(model: M, thresholds: DetectorThresholds) -> Self {
        Self {
            model,
            thresholds: RwLock::new(thresholds),
        }
    }
}

impl<M: AudioModel> Detector for AudioDetector<M> {
    fn source(&self) -> DetectorSource {
        DetectorSource::Audio
    }

    fn input(&self) -> SampleKind {
        SampleKind::Audio
    }

    fn evaluate(&self, sample: &Sample) -> DetectorResult<Vec<Finding>> {
        expect_kind(self.source(), self.input(), sample)?;
        let Some(audio) = sample.as_audio() else {
            return Ok(Vec::new());
        };
        if audio.sample_rate == 0 {
            return Err(DetectorError::InvalidSample("zero sample rate".into()));
        }

        let scores = self
            .model
            .classify(&audio.normalized_window(), audio.sample_rate)?;
        let thresholds = self.thresholds.read();

        let best = scores
            .into_iter()
            .filter(|s| thresholds.is_suspicious_audio(&s.class))
            .filter(|s| s.score > thresholds.audio_min_confidence)
            .max_by(|a, b| a.score.total_cmp(&b.score));

        let Some(best) = best else {
            debug!("No suspicious audio");
            return Ok(Vec::new());
        };

        let message = format!(
            "Suspicious sound detected - {} (Confidence: {:.2})",
            best.class, best.score
        );
        Ok(vec![Finding::new(
            DetectorSource::Audio,
            best.class,
            best.score,
            message,
        )])
    }

    fn configure(&self, thresholds: &DetectorThresholds) {
        *self.thresholds.write() = thresholds.clone();
    }
}
