//! Integration module for connecting detection, pose and tracking backends
//! with the monitoring engine.
//!
//! This module provides the collaborator traits, the alert side-effect sink
//! with its background tasks, enrollment storage and the per-frame
//! [`MonitorPipeline`].

mod alerts;
mod builder;
mod detector;
mod events;
mod pipeline;
mod store;

pub use alerts::{AlertSink, NullSink, SirenTask, SnapshotJanitor, purge_old_snapshots};
pub use builder::FaceDetectionBuilder;
pub use detector::{
    FaceDetector, FaceEncoder, Frame, PoseEstimator, PoseObservation, TrackerFactory,
    VisualTracker,
};
pub use events::{EventLog, EventRecord};
pub use pipeline::{FpsEstimator, FrameReport, MonitorPipeline, StaticTracker};
pub use store::ProfileStore;
