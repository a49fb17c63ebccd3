//! Samples handed to detectors.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of sample a detector consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    Frame,
    Audio,
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleKind::Frame => write!(f, "frame"),
            SampleKind::Audio => write!(f, "audio"),
        }
    }
}

/// One unit of perceptual input. Cheap to clone; payloads are shared.
#[derive(Debug, Clone)]
pub enum Sample {
    Frame(Arc<Frame>),
    Audio(Arc<AudioBuffer>),
}

impl Sample {
    pub fn kind(&self) -> SampleKind {
        match self {
            Sample::Frame(_) => SampleKind::Frame,
            Sample::Audio(_) => SampleKind::Audio,
        }
    }

    pub fn as_frame(&self) -> Option<&Frame> {
        match self {
            Sample::Frame(frame) => Some(frame),
            Sample::Audio(_) => None,
        }
    }

    pub fn as_audio(&self) -> Option<&AudioBuffer> {
        match self {
            Sample::Audio(audio) => Some(audio),
            Sample::Frame(_) => None,
        }
    }
}

impl From<Frame> for Sample {
    fn from(frame: Frame) -> Self {
        Sample::Frame(Arc::new(frame))
    }
}

impl From<AudioBuffer> for Sample {
    fn from(audio: AudioBuffer) -> Self {
        Sample::Audio(Arc::new(audio))
    }
}

/// A captured video frame, packed RGB8.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
            captured_at: Utc::now(),
        }
    }

    /// A black frame of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * 3;
        Self::new(width, height, vec![0; len])
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }
}

/// Axis-aligned box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A mono audio capture window.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
    pub captured_at: DateTime<Utc>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            samples,
            captured_at: Utc::now(),
        }
    }

    /// Buffer of silence lasting `seconds`.
    pub fn silence(sample_rate: u32, seconds: f32) -> Self {
        let len = (sample_rate as f32 * seconds.max(0.0)) as usize;
        Self::new(sample_rate, vec![0.0; len])
    }

    /// Largest absolute amplitude.
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .fold(0.0_f32, |peak, s| peak.max(s.abs()))
    }

    /// Peak-normalised one-second window: scaled into `[-1, 1]`, zero padded
    /// or truncated to exactly `sample_rate` samples.
    pub fn normalized_window(&self) -> Vec<f32> {
        let scale = self.peak() + 1e-7;
        let len = self.sample_rate as usize;
        let mut window: Vec<f32> = self
            .samples
            .iter()
            .take(len)
            .map(|s| s / scale)
            .collect();
        window.resize(len, 0.0);
        window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_kind_and_accessors() {
        let frame: Sample = Frame::blank(4, 2).into();
        let audio: Sample = AudioBuffer::silence(100, 1.0).into();

        assert_eq!(frame.kind(), SampleKind::Frame);
        assert!(frame.as_frame().is_some());
        assert!(frame.as_audio().is_none());

        assert_eq!(audio.kind(), SampleKind::Audio);
        assert!(audio.as_audio().is_some());
    }

    #[test]
    fn blank_frame_has_rgb_payload() {
        let frame = Frame::blank(4, 2);
        assert_eq!(frame.pixels.len(), 24);
        assert!(!frame.is_empty());
        assert!(Frame::new(0, 0, Vec::new()).is_empty());
    }

    #[test]
    fn normalized_window_scales_and_pads() {
        let audio = AudioBuffer::new(4, vec![0.5, -0.25]);
        let window = audio.normalized_window();
        assert_eq!(window.len(), 4);
        assert!((window[0] - 1.0).abs() < 1e-4);
        assert!((window[1] + 0.5).abs() < 1e-4);
        assert_eq!(window[2], 0.0);
    }

    #[test]
    fn normalized_window_truncates() {
        let audio = AudioBuffer::new(2, vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(audio.normalized_window().len(), 2);
    }

    #[test]
    fn silence_normalizes_without_nan() {
        let window = AudioBuffer::silence(8, 1.0).normalized_window();
        assert!(window.iter().all(|s| *s == 0.0));
    }
}
