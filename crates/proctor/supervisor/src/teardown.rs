//! Terminal teardown.
//!
//! Every path into `Terminated` ends here: confirmed termination and resource
//! loss alike. The sequence is guarded so it runs once, and each step is
//! idempotent on its own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use proctor_session::SessionStateMachine;
use proctor_types::TerminationReason;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::collaborators::{Lockdown, PresentationSink};
use crate::dispatch::DispatchControl;
use crate::resources::{AudioInput, CaptureDevice, ResourceSlot};

/// Everything that must be released when a session ends.
pub struct Teardown {
    dispatch: Arc<DispatchControl>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    camera: ResourceSlot<dyn CaptureDevice>,
    microphone: Option<ResourceSlot<dyn AudioInput>>,
    lockdown: Arc<dyn Lockdown>,
    lockdown_active: AtomicBool,
    process_patterns: Vec<String>,
    sink: Arc<dyn PresentationSink>,
    machine: Arc<SessionStateMachine>,
    done: AtomicBool,
}

impl Teardown {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dispatch: Arc<DispatchControl>,
        camera: ResourceSlot<dyn CaptureDevice>,
        microphone: Option<ResourceSlot<dyn AudioInput>>,
        lockdown: Arc<dyn Lockdown>,
        process_patterns: Vec<String>,
        sink: Arc<dyn PresentationSink>,
        machine: Arc<SessionStateMachine>,
    ) -> Self {
        Self {
            dispatch,
            tasks: Mutex::new(Vec::new()),
            camera,
            microphone,
            lockdown,
            lockdown_active: AtomicBool::new(false),
            process_patterns,
            sink,
            machine,
            done: AtomicBool::new(false),
        }
    }

    /// Record that lockdown is in effect and must be exited.
    pub fn lockdown_entered(&self) {
        self.lockdown_active.store(true, Ordering::SeqCst);
    }

    /// Track a schedule task so teardown can stop it.
    pub fn track(&self, task: JoinHandle<()>) {
        self.tasks.lock().push(task);
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Run the teardown sequence. Returns `false` if it already ran.
    #[instrument(skip(self), fields(session_id = %self.machine.snapshot().session_id))]
    pub async fn run(&self, reason: TerminationReason) -> bool {
        if self.done.swap(true, Ordering::SeqCst) {
            return false;
        }

        self.dispatch.stop();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            task.abort();
        }

        self.camera.release().await;
        if let Some(microphone) = &self.microphone {
            microphone.release().await;
        }

        self.exit_lockdown().await;

        match self
            .lockdown
            .terminate_external_processes(&self.process_patterns)
            .await
        {
            Ok(count) => info!(terminated = count, "External processes terminated"),
            Err(e) => warn!(error = %e, "Failed to terminate external processes"),
        }

        self.sink.hide_alerts();
        self.sink.close();

        self.machine.terminate(reason);
        info!("Session torn down");
        true
    }

    /// Exit lockdown if it is in effect. Safe to call at any time.
    pub async fn exit_lockdown(&self) {
        if !self.lockdown_active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.lockdown.exit_lockdown().await {
            warn!(error = %e, "Failed to exit lockdown");
        }
    }
}
