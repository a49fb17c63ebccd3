//! Proctor Daemon library
//!
//! Wires a monitored exam session from configuration:
//! - simulated camera, microphone and inference models
//! - console presentation sink
//! - command-driven lockdown and process termination
//! - passphrase confirmation on stdin
//! - JSON-lines violation journal

pub mod authority;
pub mod config;
pub mod console;
pub mod error;
pub mod journal;
pub mod lockdown;
pub mod simulation;

use std::sync::Arc;

use proctor_detectors::{AudioDetector, FaceDetector, ObjectDetector};
use proctor_supervisor::{NullJournal, Supervisor, ViolationJournal};
use tracing::info;

pub use authority::PassphraseAuthority;
pub use config::ProctorConfig;
pub use console::ConsoleSink;
pub use error::{DaemonError, DaemonResult};
pub use journal::JsonLinesJournal;
pub use lockdown::CommandLockdown;

use simulation::{
    SimulatedAudioModel, SimulatedCamera, SimulatedFaceModel, SimulatedMicrophone,
    SimulatedObjectModel,
};

/// Build a supervisor with simulated devices and models.
pub fn build_supervisor(config: &ProctorConfig) -> DaemonResult<Supervisor> {
    config.validate()?;

    let sim = &config.simulation;
    let thresholds = &config.session.thresholds;

    let journal: Arc<dyn ViolationJournal> = if config.journal.enabled {
        let journal = JsonLinesJournal::open(&config.journal.path)?;
        info!(path = %journal.path().display(), "Journaling violations");
        Arc::new(journal)
    } else {
        Arc::new(NullJournal)
    };

    let supervisor = Supervisor::builder(config.session.clone())
        .camera(Box::new(SimulatedCamera::new(sim)))
        .microphone(Box::new(SimulatedMicrophone::new(sim)))
        .detector(Arc::new(FaceDetector::new(
            SimulatedFaceModel::new(sim),
            thresholds.clone(),
        )))
        .detector(Arc::new(ObjectDetector::new(
            SimulatedObjectModel::new(sim),
            thresholds.clone(),
        )))
        .detector(Arc::new(AudioDetector::new(
            SimulatedAudioModel::new(sim),
            thresholds.clone(),
        )))
        .sink(Arc::new(ConsoleSink::stdout()))
        .lockdown(Arc::new(CommandLockdown::new(
            &config.session.lockdown,
            &config.processes,
        )))
        .authority(Arc::new(PassphraseAuthority::stdin(
            config.confirmation.passphrase_blake3.clone(),
        )))
        .journal(journal)
        .build()?;

    Ok(supervisor)
}
