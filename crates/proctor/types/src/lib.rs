#![deny(unsafe_code)]
//! # proctor-types
//!
//! Shared vocabulary for the proctoring monitor: what detectors report
//! ([`Finding`]), what the ledger keeps ([`ViolationRecord`]) and where a
//! session is in its lifecycle ([`SessionPhase`], [`SessionState`]).
//!
//! Nothing in this crate performs I/O or holds locks across calls; it is safe
//! to depend on from every other proctor crate.

pub mod clock;
pub mod finding;
pub mod ids;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use finding::{labels, DetectorSource, Finding, ViolationRecord};
pub use ids::SessionId;
pub use session::{
    Admission, ConfirmationOutcome, SessionPhase, SessionState, TerminationReason,
    TerminationTrigger,
};
