//! Error types for proctor-supervisor.

use proctor_session::SessionError;
use thiserror::Error;

/// Failures of an owned resource (camera, microphone).
#[derive(Debug, Clone, Error)]
pub enum ResourceError {
    /// Could not be acquired at startup.
    #[error("{resource} unavailable: {reason}")]
    Unavailable { resource: String, reason: String },

    /// Disappeared mid-session. Fatal.
    #[error("{resource} lost: {reason}")]
    Lost { resource: String, reason: String },

    /// A single read failed; the next cycle retries.
    #[error("{resource} read failed: {reason}")]
    Transient { resource: String, reason: String },
}

impl ResourceError {
    pub fn unavailable(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    pub fn lost(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Lost {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    pub fn transient(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transient {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error must end the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ResourceError::Lost { .. })
    }

    pub fn resource(&self) -> &str {
        match self {
            ResourceError::Unavailable { resource, .. }
            | ResourceError::Lost { resource, .. }
            | ResourceError::Transient { resource, .. } => resource,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            ResourceError::Unavailable { reason, .. }
            | ResourceError::Lost { reason, .. }
            | ResourceError::Transient { reason, .. } => reason,
        }
    }
}

/// OS lockdown failures.
#[derive(Debug, Error)]
pub enum LockdownError {
    #[error("failed to enter lockdown: {0}")]
    Enter(String),

    #[error("failed to exit lockdown: {0}")]
    Exit(String),

    #[error("failed to terminate external processes: {0}")]
    ProcessTermination(String),
}

/// The confirmation channel could not produce an answer. Treated as denied.
#[derive(Debug, Error)]
pub enum ConfirmationError {
    #[error("confirmation channel unavailable: {0}")]
    Unavailable(String),

    #[error("confirmation cancelled")]
    Cancelled,
}

/// Violation journal write failure. Logged, never fatal.
#[derive(Debug, Error)]
#[error("journal write failed: {0}")]
pub struct JournalError(pub String);

/// Errors that prevent a session from starting or continuing.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A required resource could not be acquired; the session never started.
    #[error("resource acquisition failed: {0}")]
    ResourceAcquisition(ResourceError),

    /// Lockdown could not be established at startup.
    #[error("lockdown error: {0}")]
    Lockdown(#[from] LockdownError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("configuration error: {0}")]
    Config(String),

    /// The session loop panicked or was cancelled.
    #[error("session task failed: {0}")]
    Task(String),
}

/// Result type for supervisor operations.
pub type SupervisorResult<T> = Result<T, SupervisorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_loss_is_fatal() {
        assert!(ResourceError::lost("camera", "unplugged").is_fatal());
        assert!(!ResourceError::transient("camera", "dropped frame").is_fatal());
        assert!(!ResourceError::unavailable("camera", "busy").is_fatal());
    }

    #[test]
    fn accessors_and_display() {
        let e = ResourceError::lost("microphone", "device removed");
        assert_eq!(e.resource(), "microphone");
        assert_eq!(e.reason(), "device removed");
        assert_eq!(e.to_string(), "microphone lost: device removed");

        let e = SupervisorError::ResourceAcquisition(ResourceError::unavailable("camera", "busy"));
        assert_eq!(e.to_string(), "resource acquisition failed: camera unavailable: busy");
    }
}
