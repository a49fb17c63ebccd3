//! Pause, resume and stop signalling for detector schedules.
//!
//! Every resume starts a new epoch. Schedules tag each report with the epoch
//! it was produced in, and the session loop drops reports from any epoch but
//! the current running one. An evaluation that was in flight when the session
//! paused can therefore finish, but its findings are never applied.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

/// Dispatch state shared by all schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DispatchState {
    Running { epoch: u64 },
    Paused { epoch: u64 },
    Stopped,
}

impl DispatchState {
    pub fn is_running(&self, at_epoch: u64) -> bool {
        matches!(self, DispatchState::Running { epoch } if *epoch == at_epoch)
    }
}

/// Owner side of the dispatch signal. Held by the session loop.
#[derive(Debug)]
pub struct DispatchControl {
    tx: watch::Sender<DispatchState>,
}

impl Default for DispatchControl {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchControl {
    /// Start running at epoch zero.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(DispatchState::Running { epoch: 0 });
        Self { tx }
    }

    pub fn state(&self) -> DispatchState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> DispatchGate {
        DispatchGate {
            rx: self.tx.subscribe(),
        }
    }

    /// Whether a report from `epoch` may still be applied.
    pub fn accepts(&self, epoch: u64) -> bool {
        self.state().is_running(epoch)
    }

    /// Pause all schedules. No effect unless running.
    pub fn pause(&self) {
        self.tx.send_if_modified(|state| match *state {
            DispatchState::Running { epoch } => {
                *state = DispatchState::Paused { epoch };
                debug!(epoch, "Dispatch paused");
                true
            }
            _ => false,
        });
    }

    /// Resume in a fresh epoch. Returns the new epoch, or `None` once stopped.
    pub fn resume(&self) -> Option<u64> {
        let mut resumed = None;
        self.tx.send_if_modified(|state| {
            let next = match *state {
                DispatchState::Running { epoch } | DispatchState::Paused { epoch } => epoch + 1,
                DispatchState::Stopped => return false,
            };
            *state = DispatchState::Running { epoch: next };
            resumed = Some(next);
            true
        });
        if let Some(epoch) = resumed {
            debug!(epoch, "Dispatch resumed");
        }
        resumed
    }

    /// Stop all schedules permanently.
    pub fn stop(&self) {
        self.tx.send_if_modified(|state| {
            if *state == DispatchState::Stopped {
                false
            } else {
                *state = DispatchState::Stopped;
                true
            }
        });
    }
}

/// Schedule side of the dispatch signal.
#[derive(Debug, Clone)]
pub struct DispatchGate {
    rx: watch::Receiver<DispatchState>,
}

impl DispatchGate {
    pub fn state(&self) -> DispatchState {
        *self.rx.borrow()
    }

    pub fn is_running(&self, epoch: u64) -> bool {
        self.state().is_running(epoch)
    }

    /// Wait until dispatch is running and return its epoch. `None` once
    /// stopped.
    pub async fn wait_running(&mut self) -> Option<u64> {
        loop {
            match *self.rx.borrow_and_update() {
                DispatchState::Running { epoch } => return Some(epoch),
                DispatchState::Stopped => return None,
                DispatchState::Paused { .. } => {}
            }
            if self.rx.changed().await.is_err() {
                return None;
            }
        }
    }
}
