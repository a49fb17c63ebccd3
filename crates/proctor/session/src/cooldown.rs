//! Cooldown gate (rate limiter) for findings.
//!
//! The check against the last counted violation and the update of that
//! timestamp happen under one lock, so two findings racing through the gate
//! can never both be counted inside the same window.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use proctor_types::{Admission, Clock, Finding};
use tracing::debug;

use crate::config::{ViolationPolicy, MAX_COOLDOWN_SECS};

/// State owned by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownState {
    /// When the last counted violation was admitted.
    pub last_counted_violation_time: Option<DateTime<Utc>>,

    /// Minimum spacing between counted violations.
    pub cooldown_duration: Duration,
}

/// Classifies findings as counted, suppressed or informational.
pub struct CooldownGate {
    informational_labels: Vec<String>,
    state: Mutex<CooldownState>,
    clock: Arc<dyn Clock>,
}

impl CooldownGate {
    pub fn new(policy: &ViolationPolicy, clock: Arc<dyn Clock>) -> Self {
        let secs = policy.cooldown_secs.min(MAX_COOLDOWN_SECS) as i64;
        Self {
            informational_labels: policy.informational_labels.clone(),
            state: Mutex::new(CooldownState {
                last_counted_violation_time: None,
                cooldown_duration: Duration::seconds(secs),
            }),
            clock,
        }
    }

    /// Admit a finding at the current clock time.
    pub fn admit(&self, finding: &Finding) -> Admission {
        self.admit_at(finding, self.clock.now())
    }

    /// Admit a finding at an explicit instant.
    pub fn admit_at(&self, finding: &Finding, now: DateTime<Utc>) -> Admission {
        if self.is_informational(finding) {
            return Admission::Informational;
        }

        let mut state = self.state.lock();

        if let Some(last) = state.last_counted_violation_time {
            let elapsed = now - last;
            if !state.cooldown_duration.is_zero() && elapsed < state.cooldown_duration {
                debug!(
                    finding = %finding,
                    elapsed_ms = elapsed.num_milliseconds(),
                    cooldown_ms = state.cooldown_duration.num_milliseconds(),
                    "Finding suppressed by cooldown"
                );
                return Admission::Suppressed;
            }
        }

        state.last_counted_violation_time = Some(now);
        Admission::Counted
    }

    /// Whether a finding's label is configured as non-counting.
    pub fn is_informational(&self, finding: &Finding) -> bool {
        self.informational_labels
            .iter()
            .any(|label| finding.has_label(label))
    }

    pub fn state(&self) -> CooldownState {
        *self.state.lock()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}
