//! Error types for proctor-session.

use proctor_types::SessionPhase;
use thiserror::Error;

/// Errors from session policy and lifecycle operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The requested transition is not defined from the current phase.
    #[error("cannot {event} while {from}")]
    InvalidTransition {
        from: SessionPhase,
        event: &'static str,
    },

    /// Policy values are out of range.
    #[error("invalid violation policy: {0}")]
    InvalidPolicy(String),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_display() {
        let e = SessionError::InvalidTransition {
            from: SessionPhase::Active,
            event: "resume",
        };
        assert_eq!(e.to_string(), "cannot resume while active");
    }
}
