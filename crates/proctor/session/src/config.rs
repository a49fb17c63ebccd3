//! Violation policy configuration.

use std::time::Duration;

use proctor_types::labels;
use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// Upper bound on the cooldown window (one day).
pub const MAX_COOLDOWN_SECS: u64 = 86_400;

/// Policy deciding which findings count and how often.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationPolicy {
    /// Counted violations that trigger termination confirmation.
    #[serde(default = "default_max_violations")]
    pub max_violations: u32,

    /// Minimum spacing between counted violations, in seconds. Zero counts
    /// every finding.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Labels that are surfaced but never counted.
    #[serde(default = "default_informational_labels")]
    pub informational_labels: Vec<String>,
}

impl Default for ViolationPolicy {
    fn default() -> Self {
        Self {
            max_violations: default_max_violations(),
            cooldown_secs: default_cooldown_secs(),
            informational_labels: default_informational_labels(),
        }
    }
}

impl ViolationPolicy {
    /// Default policy with the cooldown disabled.
    pub fn count_every_finding() -> Self {
        Self {
            cooldown_secs: 0,
            ..Default::default()
        }
    }

    /// Policy preset for a deployment profile.
    pub fn for_profile(profile: PolicyProfile) -> Self {
        let mut policy = Self::default();

        match profile {
            PolicyProfile::Strict => {
                policy.max_violations = 5;
                policy.cooldown_secs = 5;
            }
            PolicyProfile::Standard => {}
            PolicyProfile::Practice => {
                policy.max_violations = 20;
                policy.cooldown_secs = 2;
            }
        }

        policy
    }

    pub fn with_max_violations(mut self, max_violations: u32) -> Self {
        self.max_violations = max_violations;
        self
    }

    pub fn with_cooldown_secs(mut self, secs: u64) -> Self {
        self.cooldown_secs = secs;
        self
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// Whether a label is informational (case-insensitive).
    pub fn is_informational(&self, label: &str) -> bool {
        self.informational_labels
            .iter()
            .any(|l| l.eq_ignore_ascii_case(label))
    }

    pub fn validate(&self) -> SessionResult<()> {
        if self.max_violations == 0 {
            return Err(SessionError::InvalidPolicy(
                "max_violations must be at least 1".into(),
            ));
        }
        if self.cooldown_secs > MAX_COOLDOWN_SECS {
            return Err(SessionError::InvalidPolicy(format!(
                "cooldown_secs {} exceeds {}",
                self.cooldown_secs, MAX_COOLDOWN_SECS
            )));
        }
        Ok(())
    }
}

/// Deployment presets. They only choose values; counting rules are the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyProfile {
    /// Fewer violations tolerated, short cooldown.
    Strict,
    /// Ten violations, fifteen second cooldown.
    #[default]
    Standard,
    /// Mock exams.
    Practice,
}

impl std::str::FromStr for PolicyProfile {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(PolicyProfile::Strict),
            "standard" => Ok(PolicyProfile::Standard),
            "practice" => Ok(PolicyProfile::Practice),
            other => Err(SessionError::InvalidPolicy(format!(
                "unknown policy profile: {}",
                other
            ))),
        }
    }
}

fn default_max_violations() -> u32 {
    10
}

fn default_cooldown_secs() -> u64 {
    15
}

fn default_informational_labels() -> Vec<String> {
    vec![labels::FACE_NOT_VISIBLE.to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let policy = ViolationPolicy::default();
        assert_eq!(policy.max_violations, 10);
        assert_eq!(policy.cooldown(), Duration::from_secs(15));
        assert!(policy.is_informational("Face Not Visible"));
        assert!(!policy.is_informational("mobile phone"));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn count_every_finding_disables_cooldown() {
        assert_eq!(ViolationPolicy::count_every_finding().cooldown_secs, 0);
    }

    #[test]
    fn profiles_differ_only_in_values() {
        let strict = ViolationPolicy::for_profile(PolicyProfile::Strict);
        let practice = ViolationPolicy::for_profile(PolicyProfile::Practice);
        assert!(strict.max_violations < practice.max_violations);
        assert_eq!(strict.informational_labels, practice.informational_labels);
        assert_eq!(
            ViolationPolicy::for_profile(PolicyProfile::Standard),
            ViolationPolicy::default()
        );
    }

    #[test]
    fn validation_rejects_zero_threshold() {
        assert!(ViolationPolicy::default()
            .with_max_violations(0)
            .validate()
            .is_err());
        assert!(ViolationPolicy::default()
            .with_cooldown_secs(MAX_COOLDOWN_SECS + 1)
            .validate()
            .is_err());
    }

    #[test]
    fn profile_parsing() {
        assert_eq!("STRICT".parse::<PolicyProfile>().unwrap(), PolicyProfile::Strict);
        assert!("lax".parse::<PolicyProfile>().is_err());
    }
}
