//! Multi-target guard monitoring.
//!
//! The [`tracker`] module holds the per-target engine: identity matching,
//! visual-track bookkeeping, pose-action classification with temporal
//! smoothing, overlap resolution and the alert timers. The [`integration`]
//! module defines the black-box collaborators (face detection, pose
//! estimation, visual trackers, alert side effects) and the per-frame
//! [`MonitorPipeline`] that drives the engine with them.

pub mod config;
pub mod error;
pub mod integration;
pub mod tracker;

pub use config::MonitorConfig;
pub use error::{Error, Result};
pub use integration::{
    AlertSink, FaceDetectionBuilder, FaceDetector, FaceEncoder, Frame, FrameReport,
    MonitorPipeline, PoseEstimator, PoseObservation, ProfileStore, TrackerFactory,
    VisualTracker,
};
pub use tracker::{
    Action, Alert, AlertKind, AlertStatus, FaceDetection, GuardTracker, Landmark, Rect,
    TargetProfile, TrackPhase, TrackState,
};
