#![deny(unsafe_code)]
//! # proctor-supervisor
//!
//! Runs one proctored session end to end:
//!
//! - acquires the camera, microphone and OS lockdown, all or nothing
//! - pumps frames to the presentation sink and dispatches detectors on their
//!   cadence without blocking each other
//! - funnels every finding through the [`ViolationPipeline`] in one loop
//! - pauses everything while termination is being confirmed, and resumes in a
//!   fresh dispatch epoch when it is denied
//! - tears the session down exactly once, whatever ended it
//!
//! ```text
//!   FramePump ──frames──▶ VisionSchedule (face) ─┐
//!       │               ▶ VisionSchedule (object)├─reports──▶ SessionLoop ──▶ ViolationPipeline
//!       │                 AudioSchedule ─────────┘               │
//!       └──────────── resource loss ──────────── control ───────▶│──▶ ConfirmationAuthority
//!                                                                └──▶ Teardown
//! ```
//!
//! [`ViolationPipeline`]: proctor_session::ViolationPipeline

pub mod collaborators;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod report;
pub mod resources;
pub mod schedule;
pub mod supervisor;
pub mod teardown;

pub use collaborators::{
    ConfirmationAuthority, ConfirmationRequest, Lockdown, NullJournal, PresentationSink,
    ViolationJournal,
};
pub use config::{Cadence, LockdownConfig, ScheduleConfig, SupervisorConfig};
pub use dispatch::{DispatchControl, DispatchGate, DispatchState};
pub use error::{
    ConfirmationError, JournalError, LockdownError, ResourceError, SupervisorError,
    SupervisorResult,
};
pub use report::SessionReport;
pub use resources::{AudioInput, CaptureDevice, ResourceSlot};
pub use schedule::{ControlEvent, DetectorReport, FrameTick};
pub use supervisor::{SessionController, Supervisor, SupervisorBuilder, SupervisorHandle};
pub use teardown::Teardown;
