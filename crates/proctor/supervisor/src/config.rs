//! Supervisor configuration.

use std::time::Duration;

use proctor_detectors::DetectorThresholds;
use proctor_session::ViolationPolicy;
use proctor_types::DetectorSource;
use serde::{Deserialize, Serialize};

use crate::error::{SupervisorError, SupervisorResult};

/// Main supervisor configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default)]
    pub policy: ViolationPolicy,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub thresholds: DetectorThresholds,

    #[serde(default)]
    pub lockdown: LockdownConfig,
}

impl SupervisorConfig {
    /// Check every section; a session never starts with an invalid config.
    pub fn validate(&self) -> SupervisorResult<()> {
        self.policy.validate()?;
        self.schedule.validate()
    }
}

/// Detector cadence and capture parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Frame pump period.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    #[serde(default = "default_every_n_frames")]
    pub face_every_n_frames: u64,

    #[serde(default = "default_every_n_frames")]
    pub object_every_n_frames: u64,

    /// Length of each audio capture and the pause that follows it.
    #[serde(default = "default_audio_interval_ms")]
    pub audio_interval_ms: u64,

    #[serde(default = "default_audio_sample_rate")]
    pub audio_sample_rate: u32,

    /// Capacity of the detector report queue.
    #[serde(default = "default_report_buffer")]
    pub report_buffer: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval_ms(),
            face_every_n_frames: default_every_n_frames(),
            object_every_n_frames: default_every_n_frames(),
            audio_interval_ms: default_audio_interval_ms(),
            audio_sample_rate: default_audio_sample_rate(),
            report_buffer: default_report_buffer(),
        }
    }
}

impl ScheduleConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn audio_interval(&self) -> Duration {
        Duration::from_millis(self.audio_interval_ms)
    }

    /// Default cadence for a detector source.
    pub fn cadence_for(&self, source: DetectorSource) -> Cadence {
        match source {
            DetectorSource::Face => Cadence::EveryNthFrame(self.face_every_n_frames),
            DetectorSource::Object => Cadence::EveryNthFrame(self.object_every_n_frames),
            DetectorSource::Audio => Cadence::Every(self.audio_interval()),
        }
    }

    pub fn validate(&self) -> SupervisorResult<()> {
        if self.frame_interval_ms == 0 {
            return Err(SupervisorError::Config(
                "frame_interval_ms must be positive".into(),
            ));
        }
        if self.face_every_n_frames == 0 || self.object_every_n_frames == 0 {
            return Err(SupervisorError::Config(
                "every_n_frames must be positive".into(),
            ));
        }
        if self.audio_interval_ms == 0 {
            return Err(SupervisorError::Config(
                "audio_interval_ms must be positive".into(),
            ));
        }
        if self.audio_sample_rate == 0 {
            return Err(SupervisorError::Config(
                "audio_sample_rate must be positive".into(),
            ));
        }
        if self.report_buffer == 0 {
            return Err(SupervisorError::Config("report_buffer must be positive".into()));
        }
        Ok(())
    }
}

/// How often a detector is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Evaluate every Nth pumped frame.
    EveryNthFrame(u64),
    /// Capture and evaluate once per period.
    Every(Duration),
}

/// Lockdown parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockdownConfig {
    /// Process name patterns terminated when the session ends.
    #[serde(default = "default_process_patterns")]
    pub process_patterns: Vec<String>,

    /// Command (program and arguments) that enters kiosk mode.
    #[serde(default)]
    pub enter_command: Option<Vec<String>>,

    /// Command that leaves kiosk mode.
    #[serde(default)]
    pub exit_command: Option<Vec<String>>,
}

impl Default for LockdownConfig {
    fn default() -> Self {
        Self {
            process_patterns: default_process_patterns(),
            enter_command: None,
            exit_command: None,
        }
    }
}

fn default_frame_interval_ms() -> u64 {
    100
}

fn default_every_n_frames() -> u64 {
    8
}

fn default_audio_interval_ms() -> u64 {
    5_000
}

fn default_audio_sample_rate() -> u32 {
    16_000
}

fn default_report_buffer() -> usize {
    64
}

fn default_process_patterns() -> Vec<String> {
    ["chrome", "firefox", "edge", "safari", "opera", "brave"]
        .into_iter()
        .map(String::from)
        .collect()
}
