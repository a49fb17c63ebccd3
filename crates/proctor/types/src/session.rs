//! Session lifecycle types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::SessionId;

/// Lifecycle phase of an exam session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Normal operation; detectors run and findings are accepted.
    Active,

    /// Dispatch is paused while an external authority confirms termination.
    ConfirmingTermination,

    /// Final. Resources are released and nothing else happens.
    Terminated,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Terminated)
    }

    /// Whether detectors may dispatch and findings are accepted.
    pub fn accepts_findings(&self) -> bool {
        matches!(self, SessionPhase::Active)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Active => write!(f, "active"),
            SessionPhase::ConfirmingTermination => write!(f, "confirming-termination"),
            SessionPhase::Terminated => write!(f, "terminated"),
        }
    }
}

/// Snapshot of the session owned by the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: SessionId,
    pub phase: SessionPhase,
    pub violation_count: u32,
    pub max_violations: u32,
    pub started_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(session_id: SessionId, max_violations: u32, started_at: DateTime<Utc>) -> Self {
        Self {
            session_id,
            phase: SessionPhase::Active,
            violation_count: 0,
            max_violations,
            started_at,
        }
    }

    /// Whether the count has reached the termination threshold.
    pub fn threshold_reached(&self) -> bool {
        self.violation_count >= self.max_violations
    }
}

/// Result of passing a finding through the cooldown gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Admission {
    /// Counts toward termination.
    Counted,

    /// Dropped: arrived inside the cooldown window.
    Suppressed,

    /// Surfaced to the operator but never counted.
    Informational,
}

impl fmt::Display for Admission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Admission::Counted => write!(f, "counted"),
            Admission::Suppressed => write!(f, "suppressed"),
            Admission::Informational => write!(f, "informational"),
        }
    }
}

/// Answer from the confirmation authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationOutcome {
    Accepted,
    Denied,
}

/// Why a termination confirmation was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationTrigger {
    /// The violation count reached the configured maximum.
    ThresholdReached,

    /// An operator asked to end the session.
    OperatorRequest,
}

impl fmt::Display for TerminationTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationTrigger::ThresholdReached => write!(f, "threshold reached"),
            TerminationTrigger::OperatorRequest => write!(f, "operator request"),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminationReason {
    /// The confirmation authority accepted termination.
    Confirmed { trigger: TerminationTrigger },

    /// An owned resource failed mid-session.
    ResourceLoss { resource: String, detail: String },
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Confirmed { trigger } => {
                write!(f, "termination confirmed ({})", trigger)
            }
            TerminationReason::ResourceLoss { resource, detail } => {
                write!(f, "{} lost: {}", resource, detail)
            }
        }
    }
}
