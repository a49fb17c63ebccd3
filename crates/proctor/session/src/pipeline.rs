//! Gate → ledger → state machine.

use std::sync::Arc;

use parking_lot::Mutex;
use proctor_types::{Admission, Clock, Finding, SessionPhase, ViolationRecord};
use tracing::debug;

use crate::config::ViolationPolicy;
use crate::cooldown::CooldownGate;
use crate::error::SessionResult;
use crate::ledger::{LedgerObserver, ViolationLedger};
use crate::state_machine::{SessionStateMachine, Transition};

/// Outcome of applying one finding.
#[derive(Debug, Clone)]
pub struct Applied {
    pub finding: Finding,
    pub admission: Admission,

    /// Ledger entry for counted and informational findings.
    pub record: Option<ViolationRecord>,

    /// Phase change caused by this finding, if any.
    pub transition: Option<Transition>,

    /// Running count after the finding was applied.
    pub violation_count: u32,
    pub max_violations: u32,
}

impl Applied {
    /// Whether the finding should be shown to the candidate.
    pub fn is_alert(&self) -> bool {
        matches!(
            self.admission,
            Admission::Counted | Admission::Informational
        )
    }
}

/// Forwards ledger counts to the state machine and keeps any transition for
/// the pipeline to report.
struct ThresholdWatch {
    machine: Arc<SessionStateMachine>,
    last: Mutex<Option<Transition>>,
}

impl LedgerObserver for ThresholdWatch {
    fn on_violation_count(&self, count: u32) {
        if let Some(transition) = self.machine.observe_count(count) {
            *self.last.lock() = Some(transition);
        }
    }
}

/// The violation aggregation path for one session.
pub struct ViolationPipeline {
    gate: CooldownGate,
    ledger: ViolationLedger,
    machine: Arc<SessionStateMachine>,
    watch: Arc<ThresholdWatch>,
    clock: Arc<dyn Clock>,
}

impl ViolationPipeline {
    pub fn new(
        policy: &ViolationPolicy,
        machine: Arc<SessionStateMachine>,
        clock: Arc<dyn Clock>,
    ) -> SessionResult<Self> {
        policy.validate()?;

        let watch = Arc::new(ThresholdWatch {
            machine: Arc::clone(&machine),
            last: Mutex::new(None),
        });
        let ledger = ViolationLedger::new(Arc::clone(&clock)).with_observer(watch.clone());

        Ok(Self {
            gate: CooldownGate::new(policy, Arc::clone(&clock)),
            ledger,
            machine,
            watch,
            clock,
        })
    }

    /// Apply one finding. Returns `None` when the session is not accepting
    /// findings; the finding is dropped without touching any state.
    pub fn apply(&self, finding: Finding) -> Option<Applied> {
        let phase = self.machine.phase();
        if !phase.accepts_findings() {
            debug!(phase = %phase, finding = %finding, "Discarding finding outside active phase");
            return None;
        }

        let now = self.clock.now();
        let admission = self.gate.admit_at(&finding, now);

        let record = match admission {
            Admission::Counted => Some(self.ledger.record_at(&finding, now)),
            Admission::Informational => Some(self.ledger.note_at(&finding, now)),
            Admission::Suppressed => None,
        };
        let transition = self.watch.last.lock().take();
        let snapshot = self.machine.snapshot();

        Some(Applied {
            finding,
            admission,
            record,
            transition,
            violation_count: snapshot.violation_count,
            max_violations: snapshot.max_violations,
        })
    }

    pub fn machine(&self) -> &Arc<SessionStateMachine> {
        &self.machine
    }

    pub fn ledger(&self) -> &ViolationLedger {
        &self.ledger
    }

    pub fn gate(&self) -> &CooldownGate {
        &self.gate
    }

    pub fn phase(&self) -> SessionPhase {
        self.machine.phase()
    }
}
