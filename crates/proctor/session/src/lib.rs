#![deny(unsafe_code)]
//! # proctor-session
//!
//! The violation aggregation core of a proctored exam session:
//!
//! - [`CooldownGate`]: classifies each finding as counted, suppressed or
//!   informational, enforcing a minimum spacing between counted violations
//! - [`ViolationLedger`]: append-only log and monotonic violation counter
//! - [`SessionStateMachine`]: `Active → ConfirmingTermination → Active |
//!   Terminated`, plus the direct fatal path to `Terminated`
//! - [`ViolationPipeline`]: gate → ledger → state machine in one call
//!
//! Every mutation happens inside a short synchronous critical section; nothing
//! here blocks on I/O, so the types are safe to share between async tasks and
//! blocking detector threads alike.

pub mod config;
pub mod cooldown;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod state_machine;

pub use config::{PolicyProfile, ViolationPolicy};
pub use cooldown::{CooldownGate, CooldownState};
pub use error::{SessionError, SessionResult};
pub use ledger::{LedgerObserver, ViolationLedger};
pub use pipeline::{Applied, ViolationPipeline};
pub use state_machine::{SessionStateMachine, Transition, TransitionCause};
