//! MonitorPipeline for driving the engine with real collaborators.

use std::time::Duration;

use serde::Serialize;

use crate::config::MonitorConfig;
use crate::integration::alerts::{AlertSink, NullSink};
use crate::integration::detector::{
    FaceDetector, Frame, PoseEstimator, PoseObservation, TrackerFactory, VisualTracker,
};
use crate::integration::events::EventRecord;
use crate::tracker::{
    Alert, AlertKind, Assignment, GuardTracker, LossReason, OverlapResolution, Rect, ReidMatch,
    TargetStatus,
};

/// Weight of the previous estimate in the frame-rate EMA.
const FPS_SMOOTHING: f32 = 0.9;

/// Frame rate from consecutive frame timestamps.
#[derive(Debug, Clone, Default)]
pub struct FpsEstimator {
    last_timestamp: Option<f64>,
    fps: Option<f32>,
}

impl FpsEstimator {
    pub fn observe(&mut self, timestamp: f64) -> Option<f32> {
        if let Some(prev) = self.last_timestamp {
            let dt = timestamp - prev;
            if dt > 0.0 {
                let instant = (1.0 / dt) as f32;
                self.fps = Some(match self.fps {
                    Some(fps) => FPS_SMOOTHING * fps + (1.0 - FPS_SMOOTHING) * instant,
                    None => instant,
                });
            }
        }
        self.last_timestamp = Some(timestamp);
        self.fps
    }

    pub fn fps(&self) -> Option<f32> {
        self.fps
    }
}

/// Everything that happened while processing one frame.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FrameReport {
    pub frame_id: u64,
    pub timestamp: f64,
    pub detection_ran: bool,
    pub assignments: Vec<Assignment>,
    pub losses: Vec<(String, LossReason)>,
    pub overlaps: Vec<OverlapResolution>,
    pub reid: Vec<(usize, ReidMatch)>,
    pub alerts: Vec<Alert>,
    pub events: Vec<EventRecord>,
    pub targets: Vec<TargetStatus>,
}

impl FrameReport {
    pub fn is_visible(&self, name: &str) -> bool {
        self.targets.iter().any(|t| t.name == name && t.visible)
    }
}

/// Face detection, visual tracking and pose estimation bundled with the
/// tracking engine.
pub struct MonitorPipeline<D, P, F, S>
where
    F: TrackerFactory,
{
    detector: D,
    pose: P,
    factory: F,
    sink: S,
    engine: GuardTracker<F::Tracker>,
    fps: FpsEstimator,
}

impl<D, P, F> MonitorPipeline<D, P, F, NullSink>
where
    D: FaceDetector,
    P: PoseEstimator,
    F: TrackerFactory,
{
    /// Pipeline with the default configuration and no alert side effects.
    pub fn with_default_config(detector: D, pose: P, factory: F) -> Self {
        Self::new(MonitorConfig::default(), detector, pose, factory, NullSink)
    }
}

impl<D, P, F, S> MonitorPipeline<D, P, F, S>
where
    D: FaceDetector,
    P: PoseEstimator,
    F: TrackerFactory,
    S: AlertSink,
{
    pub fn new(config: MonitorConfig, detector: D, pose: P, factory: F, sink: S) -> Self {
        Self {
            detector,
            pose,
            factory,
            sink,
            engine: GuardTracker::new(config),
            fps: FpsEstimator::default(),
        }
    }

    /// Run one frame through detection, tracking, pose classification and
    /// the alert timers.
    ///
    /// Collaborator errors are logged and treated as a miss; this never fails.
    pub fn process_frame(&mut self, frame: &Frame<'_>) -> FrameReport {
        let now = frame.timestamp;
        if let Some(fps) = self.fps.observe(now) {
            self.engine.set_fps(fps);
        }

        self.engine.begin_frame(frame.width as f32, frame.height as f32);
        let mut report = FrameReport {
            frame_id: self.engine.frame_id(),
            timestamp: now,
            ..FrameReport::default()
        };

        report.losses = self.engine.advance_tracks(|_, tracker| tracker.update(frame));

        if self.engine.needs_detection() {
            report.detection_ran = true;
            match self.detector.detect(frame) {
                Ok(faces) => {
                    let factory = &mut self.factory;
                    let outcome = self
                        .engine
                        .assign_detections(&faces, |_, face| factory.create(frame, face.bbox));
                    report.assignments = outcome.assignments;
                    report.reid = outcome.reid;
                    if let Some(sighting) = outcome.wanted {
                        report.alerts.push(Alert::wanted(&sighting));
                    }
                }
                Err(e) => log::warn!("face detection failed on frame {}: {e}", report.frame_id),
            }
        }

        report.overlaps = self.engine.resolve_overlaps();
        for resolution in &report.overlaps {
            report
                .losses
                .push((resolution.loser.clone(), LossReason::Overlap));
        }

        let mut events = Vec::new();
        for (name, region) in self.engine.pose_regions() {
            let observation = if region.is_empty() {
                PoseObservation::empty()
            } else {
                self.pose.estimate(frame, region).unwrap_or_else(|e| {
                    log::warn!("pose estimation failed for {name}: {e}");
                    PoseObservation::empty()
                })
            };
            let Some(update) = self.engine.observe_pose(
                &name,
                observation.landmarks.as_deref(),
                observation.face_landmarks.as_deref(),
                region,
                now,
            ) else {
                continue;
            };
            if update.performed {
                self.sink.stop_siren();
            }
            if update.log_performed {
                let confidence = self
                    .engine
                    .state(&name)
                    .map_or(0.0, |s| s.face_confidence());
                events.push(EventRecord::action_performed(&name, update.action, now, confidence));
            }
            if update.lost {
                report.losses.push((name, LossReason::GhostBox));
            }
        }

        for (name, reason) in &report.losses {
            events.push(EventRecord::track_lost(name, *reason, now));
        }

        report.alerts.extend(self.engine.evaluate_alerts(now));
        let alert_config = &self.engine.config().alert;
        for alert in &report.alerts {
            let image = if alert.snapshot {
                self.sink.snapshot(alert, frame, alert.region)
            } else {
                None
            };
            let siren = match alert.kind {
                AlertKind::Sleeping => alert_config.sleep_siren_seconds,
                _ => alert_config.siren_seconds,
            };
            self.sink.start_siren(Duration::from_secs_f64(siren.max(0.0)));
            events.push(EventRecord::from_alert(alert, now, image));
        }

        for event in &events {
            self.sink.record(event);
        }
        report.events = events;
        report.targets = self.engine.status(now);
        report
    }

    pub fn fps(&self) -> Option<f32> {
        self.fps.fps()
    }

    pub fn engine(&self) -> &GuardTracker<F::Tracker> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut GuardTracker<F::Tracker> {
        &mut self.engine
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    pub fn pose_estimator_mut(&mut self) -> &mut P {
        &mut self.pose
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

/// A tracker that reports a fixed box; useful when replaying recorded boxes.
#[derive(Debug, Clone)]
pub struct StaticTracker(pub Rect);

impl VisualTracker for StaticTracker {
    fn update(&mut self, _frame: &Frame<'_>) -> Option<Rect> {
        Some(self.0)
    }
}
