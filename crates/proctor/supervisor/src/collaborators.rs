//! External collaborators the supervisor drives but does not implement.

use async_trait::async_trait;
use proctor_detectors::Frame;
use proctor_types::{ConfirmationOutcome, SessionId, TerminationTrigger, ViolationRecord};
use serde::{Deserialize, Serialize};

use crate::error::{ConfirmationError, JournalError, LockdownError};

/// Presentation surface for the examinee.
///
/// Calls arrive from the frame pump and the session loop; implementations must
/// return promptly.
pub trait PresentationSink: Send + Sync {
    /// Show the latest frame, or nothing when the read produced none.
    fn render(&self, frame: Option<&Frame>);

    /// Surface a finding together with the running count.
    fn raise_alert(&self, message: &str, violation_count: u32, max_violations: u32);

    /// Clear any visible alerts.
    fn hide_alerts(&self);

    /// Final message before the surface closes (e.g. device loss).
    fn terminal_notice(&self, message: &str);

    /// Close the surface. Called once at teardown.
    fn close(&self) {}
}

/// OS-level kiosk mode and process control.
#[async_trait]
pub trait Lockdown: Send + Sync {
    async fn enter_lockdown(&self) -> Result<(), LockdownError>;

    async fn exit_lockdown(&self) -> Result<(), LockdownError>;

    /// Terminate processes whose name matches any pattern. Returns how many
    /// were terminated.
    async fn terminate_external_processes(
        &self,
        name_patterns: &[String],
    ) -> Result<usize, LockdownError>;
}

/// What the confirmation authority is asked to approve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub session_id: SessionId,
    pub trigger: TerminationTrigger,
    pub violation_count: u32,
    pub max_violations: u32,
}

/// Out-of-band approval for ending the session (e.g. a proctor passphrase).
#[async_trait]
pub trait ConfirmationAuthority: Send + Sync {
    async fn request_confirmation(
        &self,
        request: &ConfirmationRequest,
    ) -> Result<ConfirmationOutcome, ConfirmationError>;
}

/// Durable record of counted violations.
pub trait ViolationJournal: Send + Sync {
    fn append(&self, session_id: &SessionId, record: &ViolationRecord)
        -> Result<(), JournalError>;
}

/// Journal that keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullJournal;

impl ViolationJournal for NullJournal {
    fn append(&self, _session_id: &SessionId, _record: &ViolationRecord) -> Result<(), JournalError> {
        Ok(())
    }
}
