//! Session lifecycle state machine.
//!
//! ```text
//!            threshold / operator request
//!   Active ──────────────────────────────▶ ConfirmingTermination
//!     ▲                                          │        │
//!     └─────────────── denied ───────────────────┘        │ accepted
//!                                                         ▼
//!   (any) ───────────── resource loss ─────────────▶ Terminated
//! ```
//!
//! The state machine only records transitions. Effects (pausing schedules,
//! teardown, prompting) belong to the supervisor, which calls
//! [`SessionStateMachine::terminate`] last, after resources are released.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use proctor_types::{SessionId, SessionPhase, SessionState, TerminationReason, TerminationTrigger};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, instrument};

use crate::error::{SessionError, SessionResult};

/// What caused a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionCause {
    ThresholdReached { violation_count: u32 },
    OperatorRequest,
    ConfirmationDenied,
    Terminated { reason: TerminationReason },
}

/// A completed phase change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: SessionPhase,
    pub to: SessionPhase,
    pub cause: TransitionCause,
    pub at: DateTime<Utc>,
}

#[derive(Debug)]
struct MachineInner {
    state: SessionState,
    pending: Option<TerminationTrigger>,
    reason: Option<TerminationReason>,
    ended_at: Option<DateTime<Utc>>,
}

/// Single authority over the session phase.
pub struct SessionStateMachine {
    inner: Mutex<MachineInner>,
    phase_tx: watch::Sender<SessionPhase>,
}

impl SessionStateMachine {
    pub fn new(session_id: SessionId, max_violations: u32, started_at: DateTime<Utc>) -> Self {
        let (phase_tx, _) = watch::channel(SessionPhase::Active);
        Self {
            inner: Mutex::new(MachineInner {
                state: SessionState::new(session_id, max_violations, started_at),
                pending: None,
                reason: None,
                ended_at: None,
            }),
            phase_tx,
        }
    }

    /// Watch phase changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.lock().state.phase
    }

    pub fn snapshot(&self) -> SessionState {
        self.inner.lock().state.clone()
    }

    /// Trigger of the confirmation currently in progress.
    pub fn pending_trigger(&self) -> Option<TerminationTrigger> {
        self.inner.lock().pending
    }

    /// Why the session ended, once terminated.
    pub fn termination_reason(&self) -> Option<TerminationReason> {
        self.inner.lock().reason.clone()
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().ended_at
    }

    /// Apply a new violation count. Enters `ConfirmingTermination` when the
    /// count reaches the threshold while `Active`.
    pub fn observe_count(&self, count: u32) -> Option<Transition> {
        let mut inner = self.inner.lock();
        if inner.state.phase.is_terminal() {
            return None;
        }

        inner.state.violation_count = inner.state.violation_count.max(count);

        if inner.state.phase == SessionPhase::Active && inner.state.threshold_reached() {
            let violation_count = inner.state.violation_count;
            info!(
                session_id = %inner.state.session_id,
                count = violation_count,
                max = inner.state.max_violations,
                "Violation threshold reached"
            );
            return Some(self.enter_confirmation(
                &mut inner,
                TerminationTrigger::ThresholdReached,
                TransitionCause::ThresholdReached { violation_count },
            ));
        }

        None
    }

    /// Operator-initiated termination. No-op unless `Active`.
    #[instrument(skip(self))]
    pub fn request_termination(&self) -> Option<Transition> {
        let mut inner = self.inner.lock();
        if inner.state.phase != SessionPhase::Active {
            debug!(phase = %inner.state.phase, "Ignoring termination request");
            return None;
        }

        Some(self.enter_confirmation(
            &mut inner,
            TerminationTrigger::OperatorRequest,
            TransitionCause::OperatorRequest,
        ))
    }

    /// Confirmation denied: back to `Active`, count unchanged.
    #[instrument(skip(self))]
    pub fn resume(&self) -> SessionResult<Transition> {
        let mut inner = self.inner.lock();
        if inner.state.phase != SessionPhase::ConfirmingTermination {
            return Err(SessionError::InvalidTransition {
                from: inner.state.phase,
                event: "resume",
            });
        }

        inner.pending = None;
        let transition = self.transition(
            &mut inner,
            SessionPhase::Active,
            TransitionCause::ConfirmationDenied,
        );
        info!(
            session_id = %inner.state.session_id,
            count = inner.state.violation_count,
            "Session resumed"
        );
        Ok(transition)
    }

    /// Enter `Terminated`. Returns `None` when already terminated.
    #[instrument(skip(self))]
    pub fn terminate(&self, reason: TerminationReason) -> Option<Transition> {
        let mut inner = self.inner.lock();
        if inner.state.phase.is_terminal() {
            debug!("Session already terminated");
            return None;
        }

        inner.pending = None;
        inner.reason = Some(reason.clone());
        let transition = self.transition(
            &mut inner,
            SessionPhase::Terminated,
            TransitionCause::Terminated {
                reason: reason.clone(),
            },
        );
        inner.ended_at = Some(transition.at);
        info!(session_id = %inner.state.session_id, reason = %reason, "Session terminated");
        Some(transition)
    }

    fn enter_confirmation(
        &self,
        inner: &mut MachineInner,
        trigger: TerminationTrigger,
        cause: TransitionCause,
    ) -> Transition {
        inner.pending = Some(trigger);
        self.transition(inner, SessionPhase::ConfirmingTermination, cause)
    }

    fn transition(
        &self,
        inner: &mut MachineInner,
        to: SessionPhase,
        cause: TransitionCause,
    ) -> Transition {
        let from = inner.state.phase;
        inner.state.phase = to;
        self.phase_tx.send_replace(to);

        info!(
            session_id = %inner.state.session_id,
            from = %from,
            to = %to,
            "Session phase changed"
        );

        Transition {
            from,
            to,
            cause,
            at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(max: u32) -> SessionStateMachine {
        SessionStateMachine::new(SessionId::generate(), max, Utc::now())
    }

    #[test]
    fn threshold_enters_confirmation() {
        let sm = machine(3);
        assert!(sm.observe_count(1).is_none());
        assert!(sm.observe_count(2).is_none());

        let t = sm.observe_count(3).unwrap();
        assert_eq!(t.from, SessionPhase::Active);
        assert_eq!(t.to, SessionPhase::ConfirmingTermination);
        assert_eq!(t.cause, TransitionCause::ThresholdReached { violation_count: 3 });
        assert_eq!(sm.pending_trigger(), Some(TerminationTrigger::ThresholdReached));
    }

    #[test]
    fn count_is_a_high_water_mark() {
        let sm = machine(10);
        sm.observe_count(5);
        sm.observe_count(4);
        assert_eq!(sm.snapshot().violation_count, 5);
    }

    #[test]
    fn resume_keeps_count_and_reenters_on_next_violation() {
        let sm = machine(3);
        sm.observe_count(3);

        let t = sm.resume().unwrap();
        assert_eq!(t.to, SessionPhase::Active);
        assert_eq!(sm.snapshot().violation_count, 3);
        assert!(sm.pending_trigger().is_none());

        let t = sm.observe_count(4).unwrap();
        assert_eq!(t.to, SessionPhase::ConfirmingTermination);
    }

    #[test]
    fn counts_while_confirming_do_not_retrigger() {
        let sm = machine(2);
        sm.observe_count(2);
        assert!(sm.observe_count(3).is_none());
        assert_eq!(sm.phase(), SessionPhase::ConfirmingTermination);
    }

    #[test]
    fn operator_request_only_from_active() {
        let sm = machine(10);
        let t = sm.request_termination().unwrap();
        assert_eq!(t.cause, TransitionCause::OperatorRequest);
        assert_eq!(sm.pending_trigger(), Some(TerminationTrigger::OperatorRequest));
        assert!(sm.request_termination().is_none());
    }

    #[test]
    fn resume_outside_confirmation_is_rejected() {
        let sm = machine(10);
        assert!(matches!(
            sm.resume(),
            Err(SessionError::InvalidTransition { from: SessionPhase::Active, .. })
        ));
    }

    #[test]
    fn terminate_is_idempotent() {
        let sm = machine(10);
        let reason = TerminationReason::ResourceLoss {
            resource: "camera".into(),
            detail: "unplugged".into(),
        };
        assert!(sm.terminate(reason.clone()).is_some());
        assert!(sm.terminate(reason.clone()).is_none());
        assert_eq!(sm.termination_reason(), Some(reason));
        assert!(sm.ended_at().is_some());
    }

    #[test]
    fn terminated_ignores_everything() {
        let sm = machine(1);
        sm.terminate(TerminationReason::Confirmed {
            trigger: TerminationTrigger::OperatorRequest,
        });
        assert!(sm.observe_count(5).is_none());
        assert!(sm.request_termination().is_none());
        assert!(sm.resume().is_err());
        assert_eq!(sm.snapshot().violation_count, 0);
    }

    #[tokio::test]
    async fn subscribers_see_phase_changes() {
        let sm = machine(1);
        let mut rx = sm.subscribe();
        assert_eq!(*rx.borrow(), SessionPhase::Active);

        sm.observe_count(1);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), SessionPhase::ConfirmingTermination);
    }
}
