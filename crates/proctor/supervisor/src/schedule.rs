//! Detector schedules.
//!
//! One frame pump owns the capture device and publishes the latest frame on a
//! watch channel. Each vision detector follows that channel and evaluates
//! every Nth frame; the audio detector owns the microphone and runs its own
//! capture loop. Every schedule awaits its current evaluation before taking
//! the next one, so a detector never has more than one evaluation in flight.

use std::sync::Arc;
use std::time::Duration;

use proctor_detectors::{Detector, Frame, Sample};
use proctor_types::{DetectorSource, Finding};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, trace, warn};

use crate::collaborators::PresentationSink;
use crate::dispatch::DispatchGate;
use crate::error::ResourceError;
use crate::resources::{AudioInput, CaptureDevice, ResourceSlot};

/// Findings from one evaluation, tagged with the dispatch epoch.
#[derive(Debug, Clone)]
pub struct DetectorReport {
    pub epoch: u64,
    pub source: DetectorSource,
    pub findings: Vec<Finding>,
}

/// Out-of-band events for the session loop.
#[derive(Debug, Clone)]
pub enum ControlEvent {
    /// The operator asked to end the session while dispatch ran at `epoch`.
    OperatorTermination { epoch: u64 },
    /// A resource was lost mid-session.
    ResourceLost { resource: String, detail: String },
}

/// Latest pumped frame.
#[derive(Debug, Clone)]
pub struct FrameTick {
    pub epoch: u64,
    /// Position within the epoch, starting at 1.
    pub frame_number: u64,
    pub frame: Arc<Frame>,
}

/// Reads frames at a fixed period, renders them and publishes them.
pub(crate) struct FramePump {
    pub camera: ResourceSlot<dyn CaptureDevice>,
    pub sink: Arc<dyn PresentationSink>,
    pub period: Duration,
    pub gate: DispatchGate,
    pub frames: watch::Sender<Option<FrameTick>>,
    pub control: mpsc::Sender<ControlEvent>,
}

impl FramePump {
    pub async fn run(mut self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut current_epoch = None;
        let mut frame_number = 0u64;

        loop {
            let Some(epoch) = self.gate.wait_running().await else {
                break;
            };
            if current_epoch != Some(epoch) {
                current_epoch = Some(epoch);
                frame_number = 0;
                ticker.reset();
            }

            ticker.tick().await;
            if !self.gate.is_running(epoch) {
                continue;
            }

            let read = {
                let mut camera = self.camera.lock().await;
                match camera.as_mut() {
                    Some(device) => device.read_frame().await,
                    None => break,
                }
            };

            match read {
                Ok(Some(frame)) => {
                    frame_number += 1;
                    let frame = Arc::new(frame);
                    self.sink.render(Some(&frame));
                    self.frames.send_replace(Some(FrameTick {
                        epoch,
                        frame_number,
                        frame,
                    }));
                }
                Ok(None) => {
                    trace!("No frame this cycle");
                    self.sink.render(None);
                }
                Err(e) if e.is_fatal() => {
                    error!(resource = %e.resource(), error = %e, "Capture device lost");
                    let _ = self
                        .control
                        .send(ControlEvent::ResourceLost {
                            resource: e.resource().to_string(),
                            detail: e.reason().to_string(),
                        })
                        .await;
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "Frame read failed");
                }
            }
        }

        debug!("Frame pump stopped");
    }
}

/// Evaluates every Nth pumped frame.
pub(crate) struct VisionSchedule {
    pub detector: Arc<dyn Detector>,
    pub every_n_frames: u64,
    pub gate: DispatchGate,
    pub frames: watch::Receiver<Option<FrameTick>>,
    pub reports: mpsc::Sender<DetectorReport>,
}

impl VisionSchedule {
    pub async fn run(mut self) {
        let every = self.every_n_frames.max(1);
        let mut current_epoch = None;
        let mut next_due = every;

        while self.frames.changed().await.is_ok() {
            let tick = self.frames.borrow_and_update().clone();
            let Some(tick) = tick else {
                continue;
            };
            if !self.gate.is_running(tick.epoch) {
                continue;
            }
            if current_epoch != Some(tick.epoch) {
                current_epoch = Some(tick.epoch);
                next_due = every;
            }
            if tick.frame_number < next_due {
                continue;
            }
            next_due = tick.frame_number + every;

            let detector = Arc::clone(&self.detector);
            let sample = Sample::Frame(tick.frame);
            let findings =
                match tokio::task::spawn_blocking(move || detector.evaluate_or_empty(&sample)).await
                {
                    Ok(findings) => findings,
                    Err(e) => {
                        warn!(detector = self.detector.name(), error = %e, "Detector task failed");
                        continue;
                    }
                };

            let report = DetectorReport {
                epoch: tick.epoch,
                source: self.detector.source(),
                findings,
            };
            if self.reports.send(report).await.is_err() {
                break;
            }
        }

        debug!(detector = self.detector.name(), "Vision schedule stopped");
    }
}

/// Captures and evaluates one audio window per period.
pub(crate) struct AudioSchedule {
    pub detector: Arc<dyn Detector>,
    pub microphone: ResourceSlot<dyn AudioInput>,
    pub period: Duration,
    pub sample_rate: u32,
    pub gate: DispatchGate,
    pub reports: mpsc::Sender<DetectorReport>,
    pub control: mpsc::Sender<ControlEvent>,
}

impl AudioSchedule {
    pub async fn run(mut self) {
        loop {
            let Some(epoch) = self.gate.wait_running().await else {
                break;
            };

            let captured = {
                let mut microphone = self.microphone.lock().await;
                match microphone.as_mut() {
                    Some(device) => device.capture(self.period, self.sample_rate).await,
                    None => break,
                }
            };

            match captured {
                Ok(buffer) => {
                    if self.gate.is_running(epoch) {
                        if !self.evaluate(epoch, buffer).await {
                            break;
                        }
                    } else {
                        trace!(epoch, "Discarding audio captured across a pause");
                    }
                }
                Err(e) if e.is_fatal() => {
                    self.report_loss(&e).await;
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "Audio capture failed");
                }
            }

            sleep(self.period).await;
        }

        debug!(detector = self.detector.name(), "Audio schedule stopped");
    }

    async fn evaluate(&self, epoch: u64, buffer: proctor_detectors::AudioBuffer) -> bool {
        let detector = Arc::clone(&self.detector);
        let sample = Sample::from(buffer);
        let findings =
            match tokio::task::spawn_blocking(move || detector.evaluate_or_empty(&sample)).await {
                Ok(findings) => findings,
                Err(e) => {
                    warn!(detector = self.detector.name(), error = %e, "Detector task failed");
                    return true;
                }
            };

        self.reports
            .send(DetectorReport {
                epoch,
                source: self.detector.source(),
                findings,
            })
            .await
            .is_ok()
    }

    async fn report_loss(&self, e: &ResourceError) {
        error!(resource = %e.resource(), error = %e, "Audio input lost");
        let _ = self
            .control
            .send(ControlEvent::ResourceLost {
                resource: e.resource().to_string(),
                detail: e.reason().to_string(),
            })
            .await;
    }
}
