//! Fakes shared by the supervisor scenario tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use proctor_detectors::{
    AudioBuffer, AudioModel, BoundingBox, ClassScore, DetectorResult, FaceDetection, FaceModel,
    Frame, ObjectDetection, ObjectModel,
};
use proctor_session::ViolationPolicy;
use proctor_supervisor::{
    AudioInput, CaptureDevice, ConfirmationAuthority, ConfirmationError, ConfirmationRequest,
    JournalError, Lockdown, LockdownError, PresentationSink, ResourceError, ScheduleConfig,
    SupervisorConfig, ViolationJournal,
};
use proctor_types::{ConfirmationOutcome, SessionId, ViolationRecord};

pub fn fast_config(max_violations: u32, cooldown_secs: u64) -> SupervisorConfig {
    SupervisorConfig {
        policy: ViolationPolicy::default()
            .with_max_violations(max_violations)
            .with_cooldown_secs(cooldown_secs),
        schedule: ScheduleConfig {
            frame_interval_ms: 5,
            face_every_n_frames: 1,
            object_every_n_frames: 1,
            audio_interval_ms: 10,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Poll until `condition` holds, for at most five seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..1_000 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

#[derive(Default)]
pub struct DeviceCounters {
    pub opens: AtomicUsize,
    pub reads: AtomicUsize,
    pub releases: AtomicUsize,
}

impl DeviceCounters {
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

pub struct FakeCamera {
    pub counters: Arc<DeviceCounters>,
    pub fail_open: bool,
    /// Report the device lost after this many frames.
    pub lose_after: Option<usize>,
}

impl FakeCamera {
    pub fn new(counters: &Arc<DeviceCounters>) -> Self {
        Self {
            counters: Arc::clone(counters),
            fail_open: false,
            lose_after: None,
        }
    }
}

#[async_trait]
impl CaptureDevice for FakeCamera {
    async fn open(&mut self) -> Result<(), ResourceError> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(ResourceError::unavailable("camera", "device busy"));
        }
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Option<Frame>, ResourceError> {
        let reads = self.counters.reads.fetch_add(1, Ordering::SeqCst) + 1;
        match self.lose_after {
            Some(limit) if reads > limit => Err(ResourceError::lost("camera", "unplugged")),
            _ => Ok(Some(Frame::blank(8, 8))),
        }
    }

    async fn release(&mut self) {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeMicrophone {
    pub counters: Arc<DeviceCounters>,
    pub fail_open: bool,
    /// Report the device lost after this many captures.
    pub lose_after: Option<usize>,
}

impl FakeMicrophone {
    pub fn new(counters: &Arc<DeviceCounters>) -> Self {
        Self {
            counters: Arc::clone(counters),
            fail_open: false,
            lose_after: None,
        }
    }
}

#[async_trait]
impl AudioInput for FakeMicrophone {
    async fn open(&mut self) -> Result<(), ResourceError> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(ResourceError::unavailable("microphone", "no input device"));
        }
        Ok(())
    }

    async fn capture(
        &mut self,
        duration: Duration,
        sample_rate: u32,
    ) -> Result<AudioBuffer, ResourceError> {
        let reads = self.counters.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if matches!(self.lose_after, Some(limit) if reads > limit) {
            return Err(ResourceError::lost("microphone", "disconnected"));
        }
        tokio::time::sleep(duration).await;
        Ok(AudioBuffer::new(sample_rate, vec![0.1; sample_rate as usize / 10]))
    }

    async fn release(&mut self) {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub alerts: Mutex<Vec<(String, u32, u32)>>,
    pub notices: Mutex<Vec<String>>,
    pub renders: AtomicUsize,
    pub hides: AtomicUsize,
    pub closes: AtomicUsize,
}

impl RecordingSink {
    pub fn alerts(&self) -> Vec<(String, u32, u32)> {
        self.alerts.lock().clone()
    }
}

impl PresentationSink for RecordingSink {
    fn render(&self, _frame: Option<&Frame>) {
        self.renders.fetch_add(1, Ordering::SeqCst);
    }

    fn raise_alert(&self, message: &str, violation_count: u32, max_violations: u32) {
        self.alerts
            .lock()
            .push((message.to_string(), violation_count, max_violations));
    }

    fn hide_alerts(&self) {
        self.hides.fetch_add(1, Ordering::SeqCst);
    }

    fn terminal_notice(&self, message: &str) {
        self.notices.lock().push(message.to_string());
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeLockdown {
    pub fail_enter: bool,
    pub entered: AtomicUsize,
    pub exited: AtomicUsize,
    pub terminated_patterns: Mutex<Vec<String>>,
}

#[async_trait]
impl Lockdown for FakeLockdown {
    async fn enter_lockdown(&self) -> Result<(), LockdownError> {
        if self.fail_enter {
            return Err(LockdownError::Enter("kiosk mode unavailable".into()));
        }
        self.entered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn exit_lockdown(&self) -> Result<(), LockdownError> {
        self.exited.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn terminate_external_processes(
        &self,
        name_patterns: &[String],
    ) -> Result<usize, LockdownError> {
        self.terminated_patterns
            .lock()
            .extend(name_patterns.iter().cloned());
        Ok(name_patterns.len())
    }
}

/// Answers confirmation requests from a script; runs out as `Accepted`.
#[derive(Default)]
pub struct ScriptedAuthority {
    pub script: Mutex<VecDeque<Result<ConfirmationOutcome, ConfirmationError>>>,
    pub requests: Mutex<Vec<ConfirmationRequest>>,
    /// Hold each request open this long before answering.
    pub delay: Option<Duration>,
    /// Counter sampled before and after the delay.
    pub watched: Option<Arc<AtomicUsize>>,
    pub counter_samples: Mutex<Vec<(usize, usize)>>,
}

impl ScriptedAuthority {
    pub fn answering(
        answers: impl IntoIterator<Item = Result<ConfirmationOutcome, ConfirmationError>>,
    ) -> Self {
        Self {
            script: Mutex::new(answers.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<ConfirmationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ConfirmationAuthority for ScriptedAuthority {
    async fn request_confirmation(
        &self,
        request: &ConfirmationRequest,
    ) -> Result<ConfirmationOutcome, ConfirmationError> {
        self.requests.lock().push(request.clone());

        let before = self.watched.as_ref().map(|p| p.load(Ordering::SeqCst));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let (Some(before), Some(watched)) = (before, self.watched.as_ref()) {
            self.counter_samples
                .lock()
                .push((before, watched.load(Ordering::SeqCst)));
        }

        self.script
            .lock()
            .pop_front()
            .unwrap_or(Ok(ConfirmationOutcome::Accepted))
    }
}

#[derive(Default)]
pub struct MemoryJournal {
    pub records: Mutex<Vec<(SessionId, ViolationRecord)>>,
    pub fail: AtomicBool,
}

impl ViolationJournal for MemoryJournal {
    fn append(&self, session_id: &SessionId, record: &ViolationRecord) -> Result<(), JournalError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(JournalError("disk full".into()));
        }
        self.records.lock().push((session_id.clone(), record.clone()));
        Ok(())
    }
}

/// Sees a phone in every frame.
pub struct PhoneModel {
    pub calls: Arc<AtomicUsize>,
}

impl ObjectModel for PhoneModel {
    fn detect_objects(&self, _frame: &Frame) -> DetectorResult<Vec<ObjectDetection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![ObjectDetection::new("mobile phone", 0.95)])
    }
}

/// Sees exactly one confident face, or none.
pub struct FixedFaces {
    pub faces: usize,
}

impl FaceModel for FixedFaces {
    fn detect_faces(&self, _frame: &Frame) -> DetectorResult<Vec<FaceDetection>> {
        Ok((0..self.faces)
            .map(|_| FaceDetection {
                bbox: BoundingBox::default(),
                confidence: 0.99,
            })
            .collect())
    }
}

/// Hears speech in every window.
pub struct SpeechModel;

impl AudioModel for SpeechModel {
    fn classify(&self, _window: &[f32], _sample_rate: u32) -> DetectorResult<Vec<ClassScore>> {
        Ok(vec![
            ClassScore::new("Speech", 0.8),
            ClassScore::new("Whispering", 0.1),
        ])
    }
}
