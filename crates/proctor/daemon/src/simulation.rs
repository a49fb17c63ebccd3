//! Simulated camera, microphone and inference models.
//!
//! Stand-ins for real devices and models so a session can run end to end on
//! any machine. Every random draw goes through one seeded generator per
//! component.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use proctor_detectors::{
    AudioBuffer, AudioModel, BoundingBox, ClassScore, DetectorResult, FaceDetection, FaceModel,
    Frame, ObjectDetection, ObjectModel,
};
use proctor_supervisor::{AudioInput, CaptureDevice, ResourceError};
use proctor_types::labels;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::SimulationConfig;

fn rng(seed: Option<u64>, stream: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream)),
        None => StdRng::from_entropy(),
    }
}

/// Synthetic camera producing noise frames.
pub struct SimulatedCamera {
    width: u32,
    height: u32,
    fail_after: Option<u64>,
    frames: u64,
    open: bool,
    rng: StdRng,
}

impl SimulatedCamera {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            width: config.frame_width,
            height: config.frame_height,
            fail_after: config.camera_fail_after,
            frames: 0,
            open: false,
            rng: rng(config.seed, 0),
        }
    }
}

#[async_trait]
impl CaptureDevice for SimulatedCamera {
    fn name(&self) -> &str {
        "simulated camera"
    }

    async fn open(&mut self) -> Result<(), ResourceError> {
        if self.width == 0 || self.height == 0 {
            return Err(ResourceError::unavailable(
                "camera",
                "zero frame dimensions",
            ));
        }
        self.open = true;
        info!(width = self.width, height = self.height, "Simulated camera opened");
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Option<Frame>, ResourceError> {
        if !self.open {
            return Err(ResourceError::lost("camera", "device not open"));
        }
        if let Some(limit) = self.fail_after {
            if self.frames >= limit {
                return Err(ResourceError::lost("camera", "simulated disconnect"));
            }
        }

        self.frames += 1;
        let len = (self.width as usize) * (self.height as usize) * 3;
        let mut pixels = vec![0u8; len];
        self.rng.fill(&mut pixels[..]);
        Ok(Some(Frame::new(self.width, self.height, pixels)))
    }

    async fn release(&mut self) {
        self.open = false;
        info!(frames = self.frames, "Simulated camera released");
    }
}

/// Synthetic microphone producing low-level noise.
pub struct SimulatedMicrophone {
    open: bool,
    rng: StdRng,
}

impl SimulatedMicrophone {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            open: false,
            rng: rng(config.seed, 1),
        }
    }
}

#[async_trait]
impl AudioInput for SimulatedMicrophone {
    fn name(&self) -> &str {
        "simulated microphone"
    }

    async fn open(&mut self) -> Result<(), ResourceError> {
        self.open = true;
        info!("Simulated microphone opened");
        Ok(())
    }

    async fn capture(
        &mut self,
        duration: Duration,
        sample_rate: u32,
    ) -> Result<AudioBuffer, ResourceError> {
        if !self.open {
            return Err(ResourceError::lost("microphone", "device not open"));
        }

        tokio::time::sleep(duration).await;
        let len = (duration.as_secs_f64() * f64::from(sample_rate)) as usize;
        let samples = (0..len).map(|_| self.rng.gen_range(-0.05f32..0.05)).collect();
        Ok(AudioBuffer::new(sample_rate, samples))
    }

    async fn release(&mut self) {
        self.open = false;
        info!("Simulated microphone released");
    }
}

/// Face model that usually sees exactly one face.
pub struct SimulatedFaceModel {
    missing_probability: f64,
    extra_probability: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedFaceModel {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            missing_probability: config.face_missing_probability,
            extra_probability: config.extra_face_probability,
            rng: Mutex::new(rng(config.seed, 2)),
        }
    }
}

impl FaceModel for SimulatedFaceModel {
    fn detect_faces(&self, frame: &Frame) -> DetectorResult<Vec<FaceDetection>> {
        let mut rng = self.rng.lock();
        if rng.gen_bool(self.missing_probability) {
            return Ok(Vec::new());
        }

        let faces = if rng.gen_bool(self.extra_probability) { 2 } else { 1 };
        let detections = (0..faces)
            .map(|i| FaceDetection {
                bbox: BoundingBox {
                    x: (frame.width / 4) * (i + 1),
                    y: frame.height / 4,
                    width: frame.width / 4,
                    height: frame.height / 2,
                },
                confidence: rng.gen_range(0.92..0.99),
            })
            .collect();
        Ok(detections)
    }
}

/// Object model that occasionally sees a prohibited object.
pub struct SimulatedObjectModel {
    probability: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedObjectModel {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            probability: config.object_probability,
            rng: Mutex::new(rng(config.seed, 3)),
        }
    }
}

impl ObjectModel for SimulatedObjectModel {
    fn detect_objects(&self, _frame: &Frame) -> DetectorResult<Vec<ObjectDetection>> {
        let mut rng = self.rng.lock();
        let mut detections = vec![ObjectDetection::new("person", rng.gen_range(0.8..0.99))];

        if rng.gen_bool(self.probability) {
            let label = match rng.gen_range(0..3) {
                0 => labels::MOBILE_PHONE,
                1 => labels::BOOK,
                _ => labels::LAPTOP,
            };
            let confidence = rng.gen_range(0.3..0.95);
            debug!(label, confidence, "Simulated object");
            detections.push(ObjectDetection::new(label, confidence));
        }

        Ok(detections)
    }
}

/// Audio model that occasionally hears speech or whispering.
pub struct SimulatedAudioModel {
    probability: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedAudioModel {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            probability: config.speech_probability,
            rng: Mutex::new(rng(config.seed, 4)),
        }
    }
}

impl AudioModel for SimulatedAudioModel {
    fn classify(&self, _window: &[f32], _sample_rate: u32) -> DetectorResult<Vec<ClassScore>> {
        let mut rng = self.rng.lock();
        let (speech, whispering) = if rng.gen_bool(self.probability) {
            if rng.gen_bool(0.5) {
                (rng.gen_range(0.35..0.9), rng.gen_range(0.0..0.2))
            } else {
                (rng.gen_range(0.0..0.2), rng.gen_range(0.35..0.9))
            }
        } else {
            (rng.gen_range(0.0..0.2), rng.gen_range(0.0..0.1))
        };

        Ok(vec![
            ClassScore::new(labels::SPEECH, speech),
            ClassScore::new(labels::WHISPERING, whispering),
            ClassScore::new("Silence", 1.0 - speech.max(whispering)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> SimulationConfig {
        SimulationConfig {
            seed: Some(7),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn camera_fails_after_configured_frames() {
        let mut camera = SimulatedCamera::new(&SimulationConfig {
            camera_fail_after: Some(2),
            frame_width: 4,
            frame_height: 4,
            ..seeded()
        });
        camera.open().await.unwrap();

        let frame = camera.read_frame().await.unwrap().unwrap();
        assert_eq!(frame.pixels.len(), 4 * 4 * 3);
        assert!(camera.read_frame().await.unwrap().is_some());

        let err = camera.read_frame().await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn microphone_produces_requested_length() {
        let mut microphone = SimulatedMicrophone::new(&seeded());
        microphone.open().await.unwrap();

        let buffer = microphone
            .capture(Duration::from_millis(10), 16_000)
            .await
            .unwrap();
        assert_eq!(buffer.sample_rate, 16_000);
        assert_eq!(buffer.samples.len(), 160);
    }

    #[test]
    fn certain_probabilities_are_honoured() {
        let frame = Frame::blank(8, 8);

        let always_missing = SimulatedFaceModel::new(&SimulationConfig {
            face_missing_probability: 1.0,
            ..seeded()
        });
        assert!(always_missing.detect_faces(&frame).unwrap().is_empty());

        let never_missing = SimulatedFaceModel::new(&SimulationConfig {
            face_missing_probability: 0.0,
            extra_face_probability: 0.0,
            ..seeded()
        });
        assert_eq!(never_missing.detect_faces(&frame).unwrap().len(), 1);

        let objects = SimulatedObjectModel::new(&SimulationConfig {
            object_probability: 1.0,
            ..seeded()
        });
        assert_eq!(objects.detect_objects(&frame).unwrap().len(), 2);

        let quiet = SimulatedAudioModel::new(&SimulationConfig {
            speech_probability: 0.0,
            ..seeded()
        });
        let scores = quiet.classify(&[0.0; 16], 16).unwrap();
        assert!(scores
            .iter()
            .filter(|s| s.class != "Silence")
            .all(|s| s.score < 0.3));
    }
}
