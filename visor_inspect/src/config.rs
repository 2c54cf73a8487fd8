//! Station configuration.
//!
//! One TOML file describes a deployment: camera and detector backends, the
//! class priority/actuation tables, PLC addressing, and evidence capture.
//! All cross-table consistency is checked up front by
//! [`InspectionConfig::validate`] — a priority label without an actuation
//! code is a startup failure, never a silent per-frame drop.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use visor_common::actuation::ActuationTable;
use visor_common::config::{ConfigError, SharedConfig};
use visor_common::consts::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_EVIDENCE_COOLDOWN_MS, DEFAULT_GRAB_TIMEOUT_MS,
};
use visor_common::policy::PriorityPolicy;
use visor_plc::PlcConfig;

/// Behavior when a frame yields no detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OnEmpty {
    /// Do not write; the PLC keeps the previous decision. Beware: the data
    /// block can hold a stale class while the belt is already empty.
    #[default]
    Suppress,
    /// Write `idle_code` so the PLC sees an explicit clear.
    Idle,
}

/// Camera section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Frame source backend name ("sim"; SDK-backed sources are wired by
    /// the integration layer).
    #[serde(default = "default_backend")]
    pub source: String,

    /// Maximum wait for one frame, in milliseconds.
    #[serde(default = "default_grab_timeout_ms")]
    pub grab_timeout_ms: u64,
}

/// Detector section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Detector backend name ("sim"; model-backed detectors are wired by
    /// the integration layer).
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Minimum confidence the detector reports, `0.0..=1.0`.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
}

/// Decision policy section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Label → priority rank (higher wins).
    pub priority: HashMap<String, u32>,

    /// Label → actuation code.
    pub codes: HashMap<String, i64>,

    /// Empty-frame behavior.
    #[serde(default)]
    pub on_empty: OnEmpty,

    /// Code written on empty frames when `on_empty = "idle"`.
    #[serde(default)]
    pub idle_code: Option<i64>,
}

/// Evidence capture section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceConfig {
    /// Directory receiving evidence images and sidecars.
    #[serde(default = "default_evidence_dir")]
    pub dir: PathBuf,

    /// Minimum interval between captures, in milliseconds.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Labels whose resolution triggers a capture. Empty disables capture.
    #[serde(default)]
    pub labels: Vec<String>,

    /// Bounded writer queue depth; a full queue drops captures.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

fn default_backend() -> String {
    "sim".to_string()
}
fn default_grab_timeout_ms() -> u64 {
    DEFAULT_GRAB_TIMEOUT_MS
}
fn default_confidence_threshold() -> f32 {
    DEFAULT_CONFIDENCE_THRESHOLD
}
fn default_evidence_dir() -> PathBuf {
    PathBuf::from("evidence")
}
fn default_cooldown_ms() -> u64 {
    DEFAULT_EVIDENCE_COOLDOWN_MS
}
fn default_queue_depth() -> usize {
    8
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            dir: default_evidence_dir(),
            cooldown_ms: default_cooldown_ms(),
            labels: Vec::new(),
            queue_depth: default_queue_depth(),
        }
    }
}

/// Complete station configuration.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// station_name = "sorter-line-01"
///
/// [camera]
/// source = "sim"
/// grab_timeout_ms = 5000
///
/// [detector]
/// backend = "sim"
/// confidence_threshold = 0.5
///
/// [policy]
/// on_empty = "suppress"
/// [policy.priority]
/// PEDRA = 3
/// NOK = 2
/// OK = 1
/// [policy.codes]
/// OK = 0
/// NOK = 1
/// PEDRA = 2
///
/// [plc]
/// address = "192.168.100.83"
///
/// [evidence]
/// labels = ["PEDRA", "NOK"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionConfig {
    pub shared: SharedConfig,
    pub camera: CameraConfig,
    pub detector: DetectorConfig,
    pub policy: PolicyConfig,
    pub plc: PlcConfig,
    #[serde(default)]
    pub evidence: EvidenceConfig,
}

impl InspectionConfig {
    /// Build the priority policy from the configured ranks.
    pub fn priority_policy(&self) -> PriorityPolicy {
        PriorityPolicy::new(self.policy.priority.iter().map(|(l, r)| (l.clone(), *r)))
    }

    /// Build the actuation table from the configured codes.
    pub fn actuation_table(&self) -> ActuationTable {
        ActuationTable::new(self.policy.codes.iter().map(|(l, c)| (l.clone(), *c)))
    }

    /// Validate the whole configuration, including cross-table consistency.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - any embedded section fails its own validation
    /// - `policy.priority` or `policy.codes` is empty
    /// - a priority label has no actuation code
    /// - an evidence label is absent from the priority table (typo guard)
    /// - any actuation code (or the idle code) does not fit the PLC wire
    ///   format
    /// - `on_empty = "idle"` without an `idle_code`
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.plc.validate()?;

        if self.camera.grab_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "camera.grab_timeout_ms must be > 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.detector.confidence_threshold) {
            return Err(ConfigError::ValidationError(format!(
                "detector.confidence_threshold {} out of range (0.0-1.0)",
                self.detector.confidence_threshold
            )));
        }

        if self.policy.priority.is_empty() {
            return Err(ConfigError::ValidationError(
                "policy.priority cannot be empty".to_string(),
            ));
        }
        if self.policy.codes.is_empty() {
            return Err(ConfigError::ValidationError(
                "policy.codes cannot be empty".to_string(),
            ));
        }

        // Every label the resolver can pick must encode — catch the
        // inconsistency at startup, not in frame N.
        for label in self.policy.priority.keys() {
            if !self.policy.codes.contains_key(label) {
                return Err(ConfigError::ValidationError(format!(
                    "priority label '{label}' has no entry in policy.codes"
                )));
            }
        }

        for label in &self.evidence.labels {
            if !self.policy.priority.contains_key(label) {
                return Err(ConfigError::ValidationError(format!(
                    "evidence label '{label}' is not in policy.priority"
                )));
            }
        }

        let wire = self.plc.wire_format();
        for (label, code) in &self.policy.codes {
            if !wire.fits(*code) {
                return Err(ConfigError::ValidationError(format!(
                    "code {code} for label '{label}' does not fit the PLC wire format"
                )));
            }
        }

        match (self.policy.on_empty, self.policy.idle_code) {
            (OnEmpty::Idle, None) => {
                return Err(ConfigError::ValidationError(
                    "policy.idle_code is required when on_empty = \"idle\"".to_string(),
                ));
            }
            (OnEmpty::Idle, Some(code)) if !wire.fits(code) => {
                return Err(ConfigError::ValidationError(format!(
                    "policy.idle_code {code} does not fit the PLC wire format"
                )));
            }
            _ => {}
        }

        if self.evidence.cooldown_ms == 0 {
            return Err(ConfigError::ValidationError(
                "evidence.cooldown_ms must be > 0".to_string(),
            ));
        }
        if self.evidence.queue_depth == 0 {
            return Err(ConfigError::ValidationError(
                "evidence.queue_depth must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use visor_common::config::ConfigLoader;

    const VALID: &str = r#"
[shared]
station_name = "sorter-line-01"

[camera]
source = "sim"

[detector]
backend = "sim"

[policy]
[policy.priority]
PEDRA = 3
NOK = 2
OK = 1
[policy.codes]
OK = 0
NOK = 1
PEDRA = 2

[plc]
address = "192.168.100.83"
transport = "sim"

[evidence]
labels = ["PEDRA", "NOK"]
"#;

    fn parse(toml_text: &str) -> InspectionConfig {
        toml::from_str(toml_text).expect("parse config")
    }

    #[test]
    fn valid_config_passes() {
        let cfg = parse(VALID);
        cfg.validate().expect("valid config");
        assert_eq!(cfg.camera.grab_timeout_ms, DEFAULT_GRAB_TIMEOUT_MS);
        assert_eq!(cfg.policy.on_empty, OnEmpty::Suppress);
        assert_eq!(cfg.evidence.cooldown_ms, DEFAULT_EVIDENCE_COOLDOWN_MS);
    }

    #[test]
    fn tables_build_from_config() {
        let cfg = parse(VALID);
        let policy = cfg.priority_policy();
        assert_eq!(policy.rank("PEDRA"), 3);
        assert_eq!(policy.rank("UNMAPPED"), 0);

        let table = cfg.actuation_table();
        assert_eq!(table.code("NOK"), Some(1));
    }

    #[test]
    fn priority_label_without_code_rejected() {
        let mut cfg = parse(VALID);
        cfg.policy.codes.remove("PEDRA");
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("PEDRA"));
    }

    #[test]
    fn evidence_label_outside_priority_rejected() {
        let mut cfg = parse(VALID);
        cfg.evidence.labels.push("TYPO".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn idle_mode_requires_idle_code() {
        let mut cfg = parse(VALID);
        cfg.policy.on_empty = OnEmpty::Idle;
        assert!(cfg.validate().is_err());

        cfg.policy.idle_code = Some(255);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn codes_must_fit_wire_format() {
        let mut cfg = parse(VALID);
        cfg.policy.codes.insert("OK".to_string(), -1);
        // Default wire format is 4 bytes unsigned.
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn loads_via_config_loader() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("visor.toml");
        std::fs::write(&path, VALID).unwrap();

        let cfg = InspectionConfig::load(&path).expect("load config");
        assert_eq!(cfg.shared.station_name, "sorter-line-01");
        cfg.validate().expect("valid");
    }
}
