//! Configuration for proctor-daemon

use std::path::PathBuf;

use proctor_session::{PolicyProfile, ViolationPolicy};
use proctor_supervisor::SupervisorConfig;
use serde::{Deserialize, Serialize};

use crate::error::{DaemonError, DaemonResult};

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProctorConfig {
    /// Policy preset. When set it replaces `max_violations` and
    /// `cooldown_secs` from the file or environment; only command-line
    /// overrides apply on top of it.
    #[serde(default)]
    pub profile: Option<PolicyProfile>,

    /// Session policy, cadence, thresholds and lockdown
    #[serde(default)]
    pub session: SupervisorConfig,

    /// Termination confirmation
    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    /// Violation journal
    #[serde(default)]
    pub journal: JournalConfig,

    /// Process control
    #[serde(default)]
    pub processes: ProcessConfig,

    /// Simulated devices and models
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Termination confirmation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    /// Hex BLAKE3 digest of the proctor passphrase
    #[serde(default)]
    pub passphrase_blake3: Option<String>,
}

/// Violation journal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// JSON-lines file, appended to across sessions
    #[serde(default = "default_journal_path")]
    pub path: PathBuf,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_journal_path(),
        }
    }
}

/// Process control configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Program invoked once per pattern to terminate processes
    #[serde(default = "default_kill_program")]
    pub kill_program: String,

    /// Log commands instead of running them
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            kill_program: default_kill_program(),
            dry_run: false,
        }
    }
}

/// Simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,

    #[serde(default = "default_frame_height")]
    pub frame_height: u32,

    /// Probability that a frame shows no face
    #[serde(default = "default_face_missing_probability")]
    pub face_missing_probability: f64,

    /// Probability that a frame shows a second face
    #[serde(default = "default_extra_face_probability")]
    pub extra_face_probability: f64,

    /// Probability that a frame shows a prohibited object
    #[serde(default = "default_object_probability")]
    pub object_probability: f64,

    /// Probability that an audio window contains speech
    #[serde(default = "default_speech_probability")]
    pub speech_probability: f64,

    /// Report the camera lost after this many frames
    #[serde(default)]
    pub camera_fail_after: Option<u64>,

    /// Seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
            face_missing_probability: default_face_missing_probability(),
            extra_face_probability: default_extra_face_probability(),
            object_probability: default_object_probability(),
            speech_probability: default_speech_probability(),
            camera_fail_after: None,
            seed: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_journal_path() -> PathBuf {
    PathBuf::from("violations.jsonl")
}

fn default_kill_program() -> String {
    "pkill".to_string()
}

fn default_frame_width() -> u32 {
    320
}

fn default_frame_height() -> u32 {
    240
}

fn default_face_missing_probability() -> f64 {
    0.05
}

fn default_extra_face_probability() -> f64 {
    0.02
}

fn default_object_probability() -> f64 {
    0.03
}

fn default_speech_probability() -> f64 {
    0.2
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ProctorConfig {
    /// Load configuration from an optional file and `PROCTOR__` environment
    /// variables (e.g. `PROCTOR__SESSION__POLICY__MAX_VIOLATIONS=5`).
    pub fn load(path: Option<&str>) -> DaemonResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("PROCTOR")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: ProctorConfig = builder.build()?.try_deserialize()?;
        config.apply_profile();
        Ok(config)
    }

    /// Replace the policy with a profile preset, keeping configured
    /// informational labels.
    pub fn set_profile(&mut self, profile: PolicyProfile) {
        self.profile = Some(profile);
        self.apply_profile();
    }

    fn apply_profile(&mut self) {
        let Some(profile) = self.profile else {
            return;
        };
        let labels = std::mem::take(&mut self.session.policy.informational_labels);
        self.session.policy = ViolationPolicy {
            informational_labels: labels,
            ..ViolationPolicy::for_profile(profile)
        };
    }

    pub fn validate(&self) -> DaemonResult<()> {
        self.session
            .validate()
            .map_err(|e| DaemonError::Config(e.to_string()))?;

        let sim = &self.simulation;
        for (name, p) in [
            ("face_missing_probability", sim.face_missing_probability),
            ("extra_face_probability", sim.extra_face_probability),
            ("object_probability", sim.object_probability),
            ("speech_probability", sim.speech_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(DaemonError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, p
                )));
            }
        }

        if let Some(digest) = &self.confirmation.passphrase_blake3 {
            if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(DaemonError::Config(
                    "passphrase_blake3 must be a 64-character hex digest".into(),
                ));
            }
        }

        Ok(())
    }
}
