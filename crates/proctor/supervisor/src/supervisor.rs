//! Session supervisor.
//!
//! Startup acquires the camera, the microphone (when an audio detector is
//! registered) and lockdown, in that order; any failure releases what was
//! already acquired and the session never starts. Once running, a single
//! session loop consumes detector reports and control events and is the only
//! writer of session state.

use std::sync::Arc;

use proctor_detectors::{Detector, SampleKind};
use proctor_session::{SessionStateMachine, ViolationPipeline};
use proctor_types::{
    Admission, Clock, ConfirmationOutcome, SessionId, SessionPhase, SystemClock,
    TerminationReason, TerminationTrigger,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use crate::collaborators::{
    ConfirmationAuthority, ConfirmationRequest, Lockdown, NullJournal, PresentationSink,
    ViolationJournal,
};
use crate::config::{Cadence, SupervisorConfig};
use crate::dispatch::{DispatchControl, DispatchState};
use crate::error::{SupervisorError, SupervisorResult};
use crate::report::SessionReport;
use crate::resources::{AudioInput, CaptureDevice, ResourceSlot};
use crate::schedule::{AudioSchedule, ControlEvent, DetectorReport, FramePump, VisionSchedule};
use crate::teardown::Teardown;

const CONTROL_BUFFER: usize = 16;

struct Registered {
    detector: Arc<dyn Detector>,
    cadence: Cadence,
}

/// Builder for [`Supervisor`].
pub struct SupervisorBuilder {
    config: SupervisorConfig,
    session_id: Option<SessionId>,
    camera: Option<Box<dyn CaptureDevice>>,
    microphone: Option<Box<dyn AudioInput>>,
    detectors: Vec<(Arc<dyn Detector>, Option<Cadence>)>,
    sink: Option<Arc<dyn PresentationSink>>,
    lockdown: Option<Arc<dyn Lockdown>>,
    authority: Option<Arc<dyn ConfirmationAuthority>>,
    journal: Arc<dyn ViolationJournal>,
    clock: Arc<dyn Clock>,
}

impl SupervisorBuilder {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            session_id: None,
            camera: None,
            microphone: None,
            detectors: Vec::new(),
            sink: None,
            lockdown: None,
            authority: None,
            journal: Arc::new(NullJournal),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn session_id(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn camera(mut self, camera: Box<dyn CaptureDevice>) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn microphone(mut self, microphone: Box<dyn AudioInput>) -> Self {
        self.microphone = Some(microphone);
        self
    }

    /// Register a detector at the configured cadence for its source.
    pub fn detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.detectors.push((detector, None));
        self
    }

    /// Register a detector at an explicit cadence.
    pub fn detector_with_cadence(mut self, detector: Arc<dyn Detector>, cadence: Cadence) -> Self {
        self.detectors.push((detector, Some(cadence)));
        self
    }

    pub fn sink(mut self, sink: Arc<dyn PresentationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn lockdown(mut self, lockdown: Arc<dyn Lockdown>) -> Self {
        self.lockdown = Some(lockdown);
        self
    }

    pub fn authority(mut self, authority: Arc<dyn ConfirmationAuthority>) -> Self {
        self.authority = Some(authority);
        self
    }

    pub fn journal(mut self, journal: Arc<dyn ViolationJournal>) -> Self {
        self.journal = journal;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> SupervisorResult<Supervisor> {
        self.config.validate()?;

        let camera = self.camera.ok_or_else(|| missing("camera"))?;
        let sink = self.sink.ok_or_else(|| missing("presentation sink"))?;
        let lockdown = self.lockdown.ok_or_else(|| missing("lockdown"))?;
        let authority = self.authority.ok_or_else(|| missing("confirmation authority"))?;

        let mut detectors = Vec::with_capacity(self.detectors.len());
        for (detector, cadence) in self.detectors {
            let cadence =
                cadence.unwrap_or_else(|| self.config.schedule.cadence_for(detector.source()));
            match (detector.input(), cadence) {
                (SampleKind::Frame, Cadence::EveryNthFrame(n)) if n > 0 => {}
                (SampleKind::Audio, Cadence::Every(period)) if !period.is_zero() => {}
                (input, cadence) => {
                    return Err(SupervisorError::Config(format!(
                        "detector {} consumes {:?} samples and cannot run at {:?}",
                        detector.name(),
                        input,
                        cadence
                    )));
                }
            }
            detectors.push(Registered { detector, cadence });
        }

        let audio_detectors = detectors
            .iter()
            .filter(|r| r.detector.input() == SampleKind::Audio)
            .count();
        if audio_detectors > 1 {
            return Err(SupervisorError::Config(
                "the audio input can serve only one detector".into(),
            ));
        }
        if audio_detectors == 1 && self.microphone.is_none() {
            return Err(missing("microphone"));
        }

        Ok(Supervisor {
            config: self.config,
            session_id: self.session_id.unwrap_or_else(SessionId::generate),
            camera,
            microphone: if audio_detectors == 1 {
                self.microphone
            } else {
                None
            },
            detectors,
            sink,
            lockdown,
            authority,
            journal: self.journal,
            clock: self.clock,
        })
    }
}

fn missing(what: &str) -> SupervisorError {
    SupervisorError::Config(format!("no {what} configured"))
}

/// A configured session, ready to start.
pub struct Supervisor {
    config: SupervisorConfig,
    session_id: SessionId,
    camera: Box<dyn CaptureDevice>,
    microphone: Option<Box<dyn AudioInput>>,
    detectors: Vec<Registered>,
    sink: Arc<dyn PresentationSink>,
    lockdown: Arc<dyn Lockdown>,
    authority: Arc<dyn ConfirmationAuthority>,
    journal: Arc<dyn ViolationJournal>,
    clock: Arc<dyn Clock>,
}

impl Supervisor {
    pub fn builder(config: SupervisorConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(config)
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Start and wait for the session to end.
    pub async fn run(self) -> SupervisorResult<SessionReport> {
        self.start().await?.wait().await
    }

    /// Acquire resources, start every schedule and the session loop.
    #[instrument(skip(self), fields(session_id = %self.session_id))]
    pub async fn start(mut self) -> SupervisorResult<SupervisorHandle> {
        let started_at = self.clock.now();
        let machine = Arc::new(SessionStateMachine::new(
            self.session_id.clone(),
            self.config.policy.max_violations,
            started_at,
        ));
        let pipeline =
            ViolationPipeline::new(&self.config.policy, Arc::clone(&machine), Arc::clone(&self.clock))?;

        self.acquire().await?;

        for registered in &self.detectors {
            registered.detector.configure(&self.config.thresholds);
        }

        let camera: ResourceSlot<dyn CaptureDevice> = ResourceSlot::new("camera", self.camera);
        let microphone: Option<ResourceSlot<dyn AudioInput>> = self
            .microphone
            .map(|device| ResourceSlot::new("microphone", device));
        let dispatch = Arc::new(DispatchControl::new());
        let teardown = Arc::new(Teardown::new(
            Arc::clone(&dispatch),
            camera.clone(),
            microphone.clone(),
            Arc::clone(&self.lockdown),
            self.config.lockdown.process_patterns.clone(),
            Arc::clone(&self.sink),
            Arc::clone(&machine),
        ));
        teardown.lockdown_entered();

        let schedule = &self.config.schedule;
        let (report_tx, report_rx) = mpsc::channel(schedule.report_buffer);
        let (control_tx, control_rx) = mpsc::channel(CONTROL_BUFFER);
        let (frame_tx, _) = watch::channel(None);

        for registered in &self.detectors {
            let task = match registered.cadence {
                Cadence::EveryNthFrame(every_n_frames) => tokio::spawn(
                    VisionSchedule {
                        detector: Arc::clone(&registered.detector),
                        every_n_frames,
                        gate: dispatch.subscribe(),
                        frames: frame_tx.subscribe(),
                        reports: report_tx.clone(),
                    }
                    .run(),
                ),
                Cadence::Every(period) => {
                    let Some(microphone) = microphone.clone() else {
                        continue;
                    };
                    tokio::spawn(
                        AudioSchedule {
                            detector: Arc::clone(&registered.detector),
                            microphone,
                            period,
                            sample_rate: schedule.audio_sample_rate,
                            gate: dispatch.subscribe(),
                            reports: report_tx.clone(),
                            control: control_tx.clone(),
                        }
                        .run(),
                    )
                }
            };
            teardown.track(task);
        }

        teardown.track(tokio::spawn(
            FramePump {
                camera,
                sink: Arc::clone(&self.sink),
                period: schedule.frame_interval(),
                gate: dispatch.subscribe(),
                frames: frame_tx,
                control: control_tx.clone(),
            }
            .run(),
        ));
        drop(report_tx);

        info!(
            max_violations = self.config.policy.max_violations,
            cooldown_secs = self.config.policy.cooldown_secs,
            detectors = self.detectors.len(),
            "Session started"
        );

        let controller_dispatch = Arc::clone(&dispatch);
        let session = SessionLoop {
            session_id: self.session_id.clone(),
            pipeline,
            dispatch,
            teardown,
            sink: self.sink,
            authority: self.authority,
            journal: self.journal,
            reports: report_rx,
            control: control_rx,
        };

        Ok(SupervisorHandle {
            controller: SessionController {
                control: control_tx,
                machine,
                dispatch: controller_dispatch,
            },
            join: tokio::spawn(session.run()),
        })
    }

    /// Open devices and enter lockdown, undoing partial acquisition on error.
    async fn acquire(&mut self) -> SupervisorResult<()> {
        if let Err(e) = self.camera.open().await {
            warn!(error = %e, "Failed to open capture device");
            return Err(SupervisorError::ResourceAcquisition(e));
        }

        if let Some(microphone) = self.microphone.as_mut() {
            if let Err(e) = microphone.open().await {
                warn!(error = %e, "Failed to open audio input");
                self.camera.release().await;
                return Err(SupervisorError::ResourceAcquisition(e));
            }
        }

        if let Err(e) = self.lockdown.enter_lockdown().await {
            warn!(error = %e, "Failed to enter lockdown");
            if let Some(microphone) = self.microphone.as_mut() {
                microphone.release().await;
            }
            self.camera.release().await;
            return Err(e.into());
        }

        Ok(())
    }
}

/// Single consumer of detector reports and control events.
struct SessionLoop {
    session_id: SessionId,
    pipeline: ViolationPipeline,
    dispatch: Arc<DispatchControl>,
    teardown: Arc<Teardown>,
    sink: Arc<dyn PresentationSink>,
    authority: Arc<dyn ConfirmationAuthority>,
    journal: Arc<dyn ViolationJournal>,
    reports: mpsc::Receiver<DetectorReport>,
    control: mpsc::Receiver<ControlEvent>,
}

impl SessionLoop {
    async fn run(mut self) -> SessionReport {
        while !self.pipeline.phase().is_terminal() {
            tokio::select! {
                Some(report) = self.reports.recv() => self.on_report(report).await,
                Some(event) = self.control.recv() => self.on_control(event).await,
                else => {
                    warn!("All schedules and controllers are gone");
                    self.teardown
                        .run(TerminationReason::ResourceLoss {
                            resource: "supervisor".into(),
                            detail: "no remaining event sources".into(),
                        })
                        .await;
                }
            }
        }

        SessionReport::from_pipeline(&self.pipeline)
    }

    async fn on_report(&mut self, report: DetectorReport) {
        if !self.dispatch.accepts(report.epoch) {
            trace!(epoch = report.epoch, source = %report.source, "Discarding stale report");
            return;
        }

        for finding in report.findings {
            let Some(applied) = self.pipeline.apply(finding) else {
                return;
            };

            if applied.is_alert() {
                self.sink.raise_alert(
                    &applied.finding.message,
                    applied.violation_count,
                    applied.max_violations,
                );
            }

            if applied.admission == Admission::Counted {
                if let Some(record) = &applied.record {
                    if let Err(e) = self.journal.append(&self.session_id, record) {
                        warn!(error = %e, "Failed to journal violation");
                    }
                }
            }

            if let Some(transition) = applied.transition {
                if transition.to == SessionPhase::ConfirmingTermination {
                    self.confirm(TerminationTrigger::ThresholdReached).await;
                }
                return;
            }
        }
    }

    async fn on_control(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::OperatorTermination { epoch } => {
                if !self.dispatch.accepts(epoch) {
                    debug!(epoch, "Ignoring termination request from a previous epoch");
                } else if self.pipeline.machine().request_termination().is_some() {
                    self.confirm(TerminationTrigger::OperatorRequest).await;
                } else {
                    debug!(phase = %self.pipeline.phase(), "Ignoring termination request");
                }
            }
            ControlEvent::ResourceLost { resource, detail } => {
                self.sink
                    .terminal_notice(&format!("{resource} unavailable: {detail}"));
                self.teardown
                    .run(TerminationReason::ResourceLoss { resource, detail })
                    .await;
            }
        }
    }

    /// Pause dispatch, ask the authority, then resume or tear down.
    #[instrument(skip(self))]
    async fn confirm(&mut self, trigger: TerminationTrigger) {
        self.dispatch.pause();
        self.sink.hide_alerts();

        let state = self.pipeline.machine().snapshot();
        let request = ConfirmationRequest {
            session_id: state.session_id,
            trigger,
            violation_count: state.violation_count,
            max_violations: state.max_violations,
        };

        let outcome = match self.authority.request_confirmation(&request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Confirmation unavailable, treating as denied");
                ConfirmationOutcome::Denied
            }
        };

        match outcome {
            ConfirmationOutcome::Denied => match self.pipeline.machine().resume() {
                Ok(_) => {
                    if let Some(epoch) = self.dispatch.resume() {
                        info!(epoch, "Termination denied, monitoring resumed");
                    }
                }
                Err(e) => debug!(error = %e, "Session no longer awaiting confirmation"),
            },
            ConfirmationOutcome::Accepted => {
                info!("Termination confirmed");
                self.teardown
                    .run(TerminationReason::Confirmed { trigger })
                    .await;
            }
        }
    }
}

/// Cloneable control surface of a running session.
#[derive(Clone)]
pub struct SessionController {
    control: mpsc::Sender<ControlEvent>,
    machine: Arc<SessionStateMachine>,
    dispatch: Arc<DispatchControl>,
}

impl SessionController {
    /// Ask to end the session through the confirmation path. No-op unless the
    /// session is active. A request still queued when a confirmation starts
    /// belongs to the epoch that confirmation closed and is dropped.
    pub async fn request_termination(&self) {
        let DispatchState::Running { epoch } = self.dispatch.state() else {
            debug!(phase = %self.machine.phase(), "Ignoring termination request");
            return;
        };
        let event = ControlEvent::OperatorTermination { epoch };
        if self.control.send(event).await.is_err() {
            debug!("Session loop already finished");
        }
    }

    /// Report an externally detected resource loss.
    pub async fn report_resource_loss(&self, resource: impl Into<String>, detail: impl Into<String>) {
        let event = ControlEvent::ResourceLost {
            resource: resource.into(),
            detail: detail.into(),
        };
        if self.control.send(event).await.is_err() {
            debug!("Session loop already finished");
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.machine.phase()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.machine.subscribe()
    }

    pub fn violation_count(&self) -> u32 {
        self.machine.snapshot().violation_count
    }
}

/// Handle to a running session.
pub struct SupervisorHandle {
    controller: SessionController,
    join: JoinHandle<SessionReport>,
}

impl SupervisorHandle {
    pub fn controller(&self) -> SessionController {
        self.controller.clone()
    }

    pub async fn request_termination(&self) {
        self.controller.request_termination().await;
    }

    pub fn phase(&self) -> SessionPhase {
        self.controller.phase()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.controller.subscribe()
    }

    /// Wait for the session to terminate.
    pub async fn wait(self) -> SupervisorResult<SessionReport> {
        self.join
            .await
            .map_err(|e| SupervisorError::Task(e.to_string()))
    }
}
