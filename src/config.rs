//! Monitor configuration.
//!
//! One [`MonitorConfig`] is built at startup (from defaults or a JSON file with
//! the sections below) and moved into the engine. Every field has a default so
//! a partial document is accepted.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tracker::Action;

/// How detected faces are assigned to untracked identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStrategy {
    /// Accept pairs in ascending distance order, skipping claimed faces/profiles.
    #[default]
    Greedy,
    /// Minimum total distance assignment (Jonker-Volgenant).
    Optimal,
}

/// Which alert evaluators run while alert mode is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorMode {
    #[default]
    ActionAndSleep,
    ActionOnly,
    SleepOnly,
}

impl MonitorMode {
    pub fn checks_action(self) -> bool {
        matches!(self, Self::ActionAndSleep | Self::ActionOnly)
    }

    pub fn checks_sleep(self) -> bool {
        matches!(self, Self::ActionAndSleep | Self::SleepOnly)
    }
}

/// Score used to decide which of two overlapping tracks survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapScoring {
    /// Identity confidence only.
    Confidence,
    /// Identity confidence plus a bonus for a stable (non-Unknown) action.
    #[default]
    Weighted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Maximum embedding distance accepted as a match.
    pub face_recognition_tolerance: f32,
    /// Untracked identities are searched for once every this many frames.
    pub re_detect_interval: u32,
    pub assignment: AssignmentStrategy,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            face_recognition_tolerance: 0.5,
            re_detect_interval: 30,
            assignment: AssignmentStrategy::Greedy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub pose_buffer_size: usize,
    pub min_buffer_for_classification: usize,
    /// Majority fraction that must be exceeded for the vote to be accepted.
    pub majority_floor: f32,
    /// Frames without a pose in the body box before the track is dropped.
    pub ghost_box_threshold: u32,
    pub body_box_expansion: f32,
    pub overlap_iou_threshold: f32,
    pub overlap_scoring: OverlapScoring,
    /// EMA weight of the previous face box (0 disables smoothing).
    pub box_smoothing: f32,
    /// Tracker steps larger than this many face sizes count as tracker failure.
    pub max_jump_factor: f32,
    pub min_pose_quality: f32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            pose_buffer_size: 12,
            min_buffer_for_classification: 5,
            majority_floor: 0.5,
            ghost_box_threshold: 30,
            body_box_expansion: 3.0,
            overlap_iou_threshold: 0.35,
            overlap_scoring: OverlapScoring::Weighted,
            box_smoothing: 0.75,
            max_jump_factor: 0.8,
            min_pose_quality: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub required_action: Action,
    pub interval_seconds: f64,
    pub cooldown_seconds: f64,
    pub monitor_mode: MonitorMode,
    pub sleep_seconds: f64,
    pub ear_floor: f32,
    pub ear_recalibration_min: f32,
    pub ear_threshold_ratio: f32,
    pub initial_ear_threshold: f32,
    pub initial_open_ear: f32,
    pub min_closure_frames: u32,
    pub siren_seconds: f64,
    pub sleep_siren_seconds: f64,
    /// Minimum seconds between two alert snapshots of the same target.
    pub snapshot_interval_seconds: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            required_action: Action::HandsUp,
            interval_seconds: 10.0,
            cooldown_seconds: 2.5,
            monitor_mode: MonitorMode::ActionAndSleep,
            sleep_seconds: 1.5,
            ear_floor: 0.20,
            ear_recalibration_min: 0.35,
            ear_threshold_ratio: 0.70,
            initial_ear_threshold: 0.22,
            initial_open_ear: 0.30,
            min_closure_frames: 3,
            siren_seconds: 30.0,
            sleep_siren_seconds: 10.0,
            snapshot_interval_seconds: 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub guard_profiles_dir: PathBuf,
    pub pose_references_dir: PathBuf,
    pub alert_snapshots_dir: PathBuf,
    pub snapshot_retention_days: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            guard_profiles_dir: PathBuf::from("guard_profiles"),
            pose_references_dir: PathBuf::from("pose_references"),
            alert_snapshots_dir: PathBuf::from("alert_snapshots"),
            snapshot_retention_days: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReidConfig {
    pub enabled: bool,
    pub similarity_threshold: f32,
    /// Weight of the new observation when a gallery feature drifts.
    pub drift_alpha: f32,
}

impl Default for ReidConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            similarity_threshold: 0.65,
            drift_alpha: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchlistConfig {
    pub cooldown_frames: u64,
}

impl Default for WatchlistConfig {
    fn default() -> Self {
        Self {
            cooldown_frames: 60,
        }
    }
}

/// Full monitor configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub detection: DetectionConfig,
    pub tracking: TrackingConfig,
    pub alert: AlertConfig,
    pub storage: StorageConfig,
    pub reid: ReidConfig,
    pub watchlist: WatchlistConfig,
}

impl MonitorConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config = Self::from_json_str(&text)?;
        log::info!("loaded monitor configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));

        if !(self.detection.face_recognition_tolerance > 0.0) {
            return invalid("detection.face_recognition_tolerance must be positive");
        }
        if self.detection.re_detect_interval == 0 {
            return invalid("detection.re_detect_interval must be at least 1");
        }
        let tracking = &self.tracking;
        if tracking.pose_buffer_size == 0 {
            return invalid("tracking.pose_buffer_size must be at least 1");
        }
        if tracking.min_buffer_for_classification > tracking.pose_buffer_size {
            return invalid("tracking.min_buffer_for_classification exceeds pose_buffer_size");
        }
        if !(0.0..1.0).contains(&tracking.majority_floor) {
            return invalid("tracking.majority_floor must be in [0, 1)");
        }
        if !(0.0..1.0).contains(&tracking.box_smoothing) {
            return invalid("tracking.box_smoothing must be in [0, 1)");
        }
        if tracking.body_box_expansion <= 0.0 {
            return invalid("tracking.body_box_expansion must be positive");
        }
        if self.alert.interval_seconds <= 0.0 || self.alert.sleep_seconds < 0.0 {
            return invalid("alert intervals must be positive");
        }
        if !(0.0..=1.0).contains(&self.reid.drift_alpha) {
            return invalid("reid.drift_alpha must be in [0, 1]");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_uses_defaults() {
        let config = MonitorConfig::from_json_str(
            r#"{
                "detection": { "face_recognition_tolerance": 0.55, "assignment": "optimal" },
                "alert": { "required_action": "T-Pose", "monitor_mode": "action_only" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.detection.face_recognition_tolerance, 0.55);
        assert_eq!(config.detection.assignment, AssignmentStrategy::Optimal);
        assert_eq!(config.detection.re_detect_interval, 30);
        assert_eq!(config.alert.required_action, Action::TPose);
        assert!(!config.alert.monitor_mode.checks_sleep());
        assert_eq!(config.tracking.pose_buffer_size, 12);
    }

    #[test]
    fn test_rejects_min_fill_above_capacity() {
        let err = MonitorConfig::from_json_str(
            r#"{ "tracking": { "pose_buffer_size": 4, "min_buffer_for_classification": 5 } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_zero_tolerance() {
        let mut config = MonitorConfig::default();
        config.detection.face_recognition_tolerance = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = MonitorConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
