//! End-of-session summary.

use chrono::{DateTime, Utc};
use proctor_session::ViolationPipeline;
use proctor_types::{SessionId, TerminationReason, ViolationRecord};
use serde::{Deserialize, Serialize};

/// Outcome of a finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub reason: Option<TerminationReason>,
    pub violation_count: u32,
    pub max_violations: u32,
    /// Every ledger record, counted and informational.
    pub records: Vec<ViolationRecord>,
}

impl SessionReport {
    pub fn from_pipeline(pipeline: &ViolationPipeline) -> Self {
        let machine = pipeline.machine();
        let state = machine.snapshot();

        Self {
            session_id: state.session_id,
            started_at: state.started_at,
            ended_at: machine.ended_at(),
            reason: machine.termination_reason(),
            violation_count: pipeline.ledger().count(),
            max_violations: state.max_violations,
            records: pipeline.ledger().records(),
        }
    }

    pub fn counted_records(&self) -> impl Iterator<Item = &ViolationRecord> {
        self.records.iter().filter(|r| r.counted)
    }
}
