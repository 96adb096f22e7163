//! The per-frame engine that owns every monitored identity.
//!
//! One frame is processed in this order:
//!
//! 1. [`GuardTracker::begin_frame`] settles tracks lost last frame and
//!    reports whether this is a detection frame.
//! 2. [`GuardTracker::advance_tracks`] steps every visual tracker.
//! 3. On detection frames, [`GuardTracker::assign_detections`] matches
//!    detected faces to untracked identities.
//! 4. [`GuardTracker::resolve_overlaps`] drops duplicate tracks.
//! 5. [`GuardTracker::observe_pose`] feeds each visible target's pose and
//!    face landmarks, found on its [`GuardTracker::pose_regions`] body box.
//! 6. [`GuardTracker::evaluate_alerts`] polls the alert timers.
//!
//! The visual tracker type `T` is opaque here; the caller steps and creates
//! trackers through closures, so the engine never touches frame data.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{AssignmentStrategy, MonitorConfig};
use crate::error::{Error, Result};
use crate::tracker::action::Action;
use crate::tracker::alert::{ActionTimer, AlertStatus, SleepTransition};
use crate::tracker::classifier::{Landmark, LandmarkClassifier, Thresholds, pose_quality};
use crate::tracker::eye::measured_ear;
use crate::tracker::matching::{self, Embedding, EmbeddingMetric, Euclidean, FaceDetection};
use crate::tracker::overlap::{self, OverlapCandidate, OverlapResolution};
use crate::tracker::profile::TargetProfile;
use crate::tracker::rect::Rect;
use crate::tracker::reid::{ReidGallery, ReidMatch};
use crate::tracker::track_state::{LossReason, TrackPhase, TrackState};
use crate::tracker::watchlist::{WantedSighting, Watchlist};

/// Frame rate assumed until the caller measures one.
const DEFAULT_FPS: f32 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertKind {
    /// A visible target has not performed the required action in time.
    ActionTimeout,
    /// The required action is overdue and the target is not in view.
    TargetMissing,
    Sleeping,
    WantedPerson,
}

/// An alert raised by the engine. Side effects (sound, snapshot, log) are
/// left to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub name: String,
    pub kind: AlertKind,
    pub status: AlertStatus,
    /// Smoothed action at the time of the alert.
    pub action: Action,
    /// Seconds since the required action was last seen.
    pub elapsed: f64,
    /// Region to capture; `None` means the full frame.
    pub region: Option<Rect>,
    /// Whether the snapshot rate limit allows a capture for this alert.
    pub snapshot: bool,
    pub confidence: f32,
}

impl Alert {
    pub fn wanted(sighting: &WantedSighting) -> Self {
        Self {
            name: sighting.name.clone(),
            kind: AlertKind::WantedPerson,
            status: AlertStatus::Triggered,
            action: Action::Unknown,
            elapsed: 0.0,
            region: Some(sighting.bbox),
            snapshot: true,
            confidence: (1.0 - sighting.distance).clamp(0.0, 1.0),
        }
    }
}

/// A detected face claimed by an enrolled identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub name: String,
    /// Index into the detections passed to [`GuardTracker::assign_detections`].
    pub detection: usize,
    pub distance: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionOutcome {
    pub assignments: Vec<Assignment>,
    /// Detections no identity claimed.
    pub unassigned: Vec<usize>,
    /// Gallery identities of unassigned faces, when re-identification is on.
    pub reid: Vec<(usize, ReidMatch)>,
    pub wanted: Option<WantedSighting>,
}

/// What one frame's pose observation did to a target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoseUpdate {
    /// Smoothed action after this frame.
    pub action: Action,
    /// Raw classifier label, when the pose was good enough to classify.
    pub raw: Option<Action>,
    pub quality: f32,
    /// The required action was observed and reset the timer.
    pub performed: bool,
    /// `performed`, and the action log rate limit allows an entry.
    pub log_performed: bool,
    pub sleep: Option<SleepTransition>,
    /// The target was dropped as a ghost box.
    pub lost: bool,
}

/// Read-only view of one target for display and reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetStatus {
    pub name: String,
    pub phase: TrackPhase,
    pub visible: bool,
    pub face_box: Option<Rect>,
    pub action: Action,
    pub face_confidence: f32,
    pub pose_confidence: f32,
    pub sleeping: bool,
    pub alert_triggered: bool,
    pub time_left: f64,
}

/// Multi-target tracking and alert engine.
pub struct GuardTracker<T> {
    config: MonitorConfig,
    classifier: LandmarkClassifier,
    metric: Box<dyn EmbeddingMetric>,
    profiles: BTreeMap<String, TargetProfile>,
    states: BTreeMap<String, TrackState<T>>,
    frame_id: u64,
    frame_size: (f32, f32),
    fps: f32,
    alert_mode: bool,
    watchlist: Option<Watchlist>,
    reid: Option<ReidGallery>,
}

impl<T> GuardTracker<T> {
    /// Create an engine with the Euclidean embedding metric and no profiles.
    pub fn new(config: MonitorConfig) -> Self {
        Self::with_metric(config, Box::new(Euclidean))
    }

    /// Create an engine that compares embeddings with `metric`.
    pub fn with_metric(config: MonitorConfig, metric: Box<dyn EmbeddingMetric>) -> Self {
        let reid = config.reid.enabled.then(|| ReidGallery::new(&config.reid));
        Self {
            config,
            classifier: LandmarkClassifier::default(),
            metric,
            profiles: BTreeMap::new(),
            states: BTreeMap::new(),
            frame_id: 0,
            frame_size: (0.0, 0.0),
            fps: DEFAULT_FPS,
            alert_mode: false,
            watchlist: None,
            reid,
        }
    }

    /// Replace the classifier thresholds.
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.classifier = LandmarkClassifier::new(thresholds);
        self
    }

    /// Configuration the engine was built with.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Pose classifier in use.
    pub fn classifier(&self) -> &LandmarkClassifier {
        &self.classifier
    }

    /// Number of the current frame, starting at 1.
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    /// Frame rate used by the sleep timer.
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Measured frame rate, used to turn sleep seconds into frames.
    pub fn set_fps(&mut self, fps: f32) {
        if fps.is_finite() && fps > 0.0 {
            self.fps = fps;
        }
    }

    /// Whether alerts are being raised.
    pub fn alert_mode(&self) -> bool {
        self.alert_mode
    }

    /// Switch alerting on or off. Switching on restarts every action timer;
    /// either way the sleep counters start over.
    pub fn set_alert_mode(&mut self, on: bool, now: f64) {
        if on && !self.alert_mode {
            for state in self.states.values_mut() {
                state.action_timer = ActionTimer::new(now);
            }
        }
        for state in self.states.values_mut() {
            state.sleep.reset();
            state.sleep_alerted = false;
        }
        self.alert_mode = on;
        log::info!("alert mode {}", if on { "on" } else { "off" });
    }

    /// Install or remove the wanted-person watch.
    pub fn set_watchlist(&mut self, watchlist: Option<Watchlist>) {
        self.watchlist = watchlist;
    }

    /// Watch for `name` with the configured tolerance and cooldown.
    pub fn watch_for(&mut self, name: impl Into<String>, embedding: Embedding) {
        self.watchlist = Some(Watchlist::new(
            name,
            embedding,
            self.config.detection.face_recognition_tolerance,
            self.config.watchlist.cooldown_frames,
        ));
    }

    /// Active wanted-person watch, if any.
    pub fn watchlist(&self) -> Option<&Watchlist> {
        self.watchlist.as_ref()
    }

    /// Re-identification gallery, present when enabled in the configuration.
    pub fn reid(&self) -> Option<&ReidGallery> {
        self.reid.as_ref()
    }

    /// Start monitoring `profile`. Re-selecting a name starts its track over.
    ///
    /// Every monitored embedding must have the same dimension.
    pub fn select_profile(&mut self, profile: TargetProfile, now: f64) -> Result<()> {
        let got = profile.embedding().len();
        if let Some(other) = self.profiles.values().find(|p| p.name() != profile.name()) {
            let expected = other.embedding().len();
            if expected != got {
                return Err(Error::DimensionMismatch { expected, got });
            }
        }
        let name = profile.name().to_string();
        log::info!("monitoring {name}");
        self.states
            .insert(name.clone(), TrackState::new(name.clone(), &self.config, now));
        self.profiles.insert(name, profile);
        Ok(())
    }

    /// Stop monitoring `name`, dropping its track and tracker.
    pub fn deselect_profile(&mut self, name: &str) -> Option<TargetProfile> {
        self.states.remove(name);
        let profile = self.profiles.remove(name);
        if profile.is_some() {
            log::info!("stopped monitoring {name}");
        }
        profile
    }

    /// Stop monitoring every profile.
    pub fn clear(&mut self) {
        self.states.clear();
        self.profiles.clear();
    }

    /// Monitored profile called `name`.
    pub fn profile(&self, name: &str) -> Option<&TargetProfile> {
        self.profiles.get(name)
    }

    /// Monitored profiles in name order.
    pub fn profiles(&self) -> impl Iterator<Item = &TargetProfile> {
        self.profiles.values()
    }

    /// Track state of `name`.
    pub fn state(&self, name: &str) -> Option<&TrackState<T>> {
        self.states.get(name)
    }

    /// Track states in name order.
    pub fn states(&self) -> impl Iterator<Item = &TrackState<T>> {
        self.states.values()
    }

    /// Number of monitored profiles.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Start a frame of `width` x `height` pixels. Returns whether this is a
    /// detection frame.
    pub fn begin_frame(&mut self, width: f32, height: f32) -> bool {
        self.frame_id += 1;
        self.frame_size = (width, height);
        for state in self.states.values_mut() {
            state.settle();
        }
        self.is_detection_frame()
    }

    /// Untracked identities are searched for on the first frame and every
    /// `re_detect_interval` frames after it.
    pub fn is_detection_frame(&self) -> bool {
        let interval = u64::from(self.config.detection.re_detect_interval.max(1));
        self.frame_id > 0 && (self.frame_id - 1) % interval == 0
    }

    /// Whether face detection has anything to do this frame.
    pub fn needs_detection(&self) -> bool {
        self.is_detection_frame()
            && (self.watchlist.is_some()
                || self.reid.is_some()
                || self.states.values().any(TrackState::is_searchable))
    }

    /// Step every visual tracker. `update` returns the new face box, or
    /// `None` when the tracker failed.
    ///
    /// Failures and implausible jumps drop the track; accepted boxes are
    /// blended with the previous one.
    pub fn advance_tracks<F>(&mut self, mut update: F) -> Vec<(String, LossReason)>
    where
        F: FnMut(&str, &mut T) -> Option<Rect>,
    {
        let smoothing = self.config.tracking.box_smoothing;
        let max_jump = self.config.tracking.max_jump_factor;
        let mut losses = Vec::new();

        for state in self.states.values_mut() {
            if !state.is_visible() {
                continue;
            }
            let Some(tracker) = state.tracker.as_mut() else {
                continue;
            };
            let step = match update(&state.name, tracker).filter(|b| !b.is_empty()) {
                None => Err(LossReason::TrackerFailure),
                Some(next) => match state.face_box {
                    Some(prev) if max_jump > 0.0 && !prev.is_plausible_step(&next, max_jump) => {
                        Err(LossReason::ImplausibleStep)
                    }
                    Some(prev) if smoothing > 0.0 => Ok(prev.blend(&next, smoothing)),
                    _ => Ok(next),
                },
            };
            match step {
                Ok(face_box) => state.face_box = Some(face_box),
                Err(reason) => {
                    log::debug!("{}: track lost ({reason:?})", state.name);
                    state.mark_lost(reason);
                    losses.push((state.name.clone(), reason));
                }
            }
        }
        losses
    }

    /// Match detected faces to untracked identities, including tracks lost to
    /// a tracker failure earlier this frame, and start tracking the
    /// matches. `init` creates a tracker seeded with the matched face, or
    /// returns `None` if it could not.
    ///
    /// Faces left over feed the re-identification gallery; every face is
    /// checked against the watchlist.
    pub fn assign_detections<F>(&mut self, detections: &[FaceDetection], mut init: F) -> DetectionOutcome
    where
        F: FnMut(&str, &FaceDetection) -> Option<T>,
    {
        let rows: Vec<(String, &Embedding)> = self
            .states
            .values()
            .filter(|s| s.is_searchable())
            .filter_map(|s| {
                self.profiles
                    .get(&s.name)
                    .map(|p| (s.name.clone(), p.embedding()))
            })
            .collect();
        let references: Vec<&Embedding> = rows.iter().map(|(_, e)| *e).collect();

        let tolerance = self.config.detection.face_recognition_tolerance;
        let dists = matching::embedding_distance(self.metric.as_ref(), &references, detections);
        let result = match self.config.detection.assignment {
            AssignmentStrategy::Greedy => matching::greedy_assignment(&dists, tolerance),
            AssignmentStrategy::Optimal => matching::linear_assignment(&dists, tolerance),
        };

        let mut outcome = DetectionOutcome::default();
        let mut claimed = vec![false; detections.len()];
        for &(row, col) in &result.matches {
            let name = rows[row].0.as_str();
            let detection = &detections[col];
            let distance = dists[[row, col]];
            let Some(state) = self.states.get_mut(name) else {
                continue;
            };
            let Some(tracker) = init(name, detection) else {
                log::warn!("{name}: tracker initialisation failed");
                continue;
            };
            state.start_tracking(tracker, detection.bbox, (1.0 - distance).clamp(0.0, 1.0));
            claimed[col] = true;
            log::debug!("{name}: matched face {col} at distance {distance:.3}");
            outcome.assignments.push(Assignment {
                name: name.to_string(),
                detection: col,
                distance,
            });
        }
        outcome.unassigned = (0..detections.len()).filter(|&i| !claimed[i]).collect();

        if let Some(gallery) = self.reid.as_mut() {
            for &idx in &outcome.unassigned {
                let id = gallery.identify(&detections[idx].embedding, self.frame_id);
                outcome.reid.push((idx, id));
            }
        }
        if let Some(watch) = self.watchlist.as_mut() {
            outcome.wanted = watch.check(self.metric.as_ref(), detections, self.frame_id);
        }
        outcome
    }

    /// Drop the weaker of every pair of visible tracks whose face boxes
    /// overlap beyond the configured IoU.
    pub fn resolve_overlaps(&mut self) -> Vec<OverlapResolution> {
        let tracking = &self.config.tracking;
        let candidates: Vec<OverlapCandidate<'_>> = self
            .states
            .values()
            .filter(|s| s.is_visible())
            .filter_map(|s| {
                Some(OverlapCandidate {
                    name: &s.name,
                    face_box: s.face_box?,
                    face_confidence: s.face_confidence,
                    has_stable_action: s.current_action.is_known(),
                })
            })
            .collect();
        let resolutions = overlap::resolve_overlaps(
            &candidates,
            tracking.overlap_iou_threshold,
            tracking.overlap_scoring,
        );

        for resolution in &resolutions {
            if let Some(state) = self.states.get_mut(&resolution.loser) {
                state.mark_lost(LossReason::Overlap);
            }
        }
        resolutions
    }

    /// Body box of a visible target in the current frame.
    pub fn body_box(&self, name: &str) -> Option<Rect> {
        let state = self.states.get(name).filter(|s| s.is_visible())?;
        let (w, h) = self.frame_size;
        state
            .face_box
            .map(|b| b.body_box(w, h, self.config.tracking.body_box_expansion))
    }

    /// Body boxes of every visible target, in name order.
    pub fn pose_regions(&self) -> Vec<(String, Rect)> {
        self.states
            .values()
            .filter_map(|s| Some((s.name.clone(), self.body_box(&s.name)?)))
            .collect()
    }

    /// Feed the pose and face landmarks found in `region` for `name` this
    /// frame. `None` landmarks mean the estimator found nothing.
    ///
    /// Returns `None` if the target is not visible.
    pub fn observe_pose(
        &mut self,
        name: &str,
        pose: Option<&[Landmark]>,
        face: Option<&[Landmark]>,
        region: Rect,
        now: f64,
    ) -> Option<PoseUpdate> {
        let alert = &self.config.alert;
        let tracking = &self.config.tracking;
        let state = self.states.get_mut(name).filter(|s| s.is_visible())?;

        let sleep = if self.alert_mode && alert.monitor_mode.checks_sleep() {
            let ear = face.and_then(|f| measured_ear(f, region.width, region.height));
            state.sleep.observe(ear, self.fps, alert)
        } else {
            state.sleep.reset()
        };
        match sleep {
            Some(SleepTransition::FellAsleep) => log::info!("{name}: eyes closed, sleeping"),
            Some(SleepTransition::WokeUp) => {
                log::info!("{name}: awake");
                state.sleep_alerted = false;
            }
            None => {}
        }

        let mut update = PoseUpdate {
            action: state.current_action,
            raw: None,
            quality: 0.0,
            performed: false,
            log_performed: false,
            sleep,
            lost: false,
        };

        let Some(landmarks) = pose else {
            if state.record_pose_presence(false, tracking.ghost_box_threshold) {
                log::debug!(
                    "{name}: no pose for {} frames, dropping ghost box",
                    state.missing_pose_counter
                );
                state.mark_lost(LossReason::GhostBox);
                update.lost = true;
            }
            return Some(update);
        };

        state.record_pose_presence(true, tracking.ghost_box_threshold);
        let quality = pose_quality(landmarks);
        state.pose_confidence = quality;
        update.quality = quality;
        state.current_action = if quality >= tracking.min_pose_quality {
            let raw = self.classifier.classify(landmarks, region.height, region.width);
            update.raw = Some(raw);
            state.actions.push(raw);
            state.actions.smoothed()
        } else {
            state.actions.held()
        };
        update.action = state.current_action;

        // A sleeping target cannot satisfy the action check.
        if state.current_action == alert.required_action && !state.is_sleeping() {
            state.action_timer.performed(now);
            update.performed = true;
            update.log_performed = state.should_log_action(now);
        }
        Some(update)
    }

    /// Poll every target's alert timers. Nothing is raised while alert mode
    /// is off.
    pub fn evaluate_alerts(&mut self, now: f64) -> Vec<Alert> {
        if !self.alert_mode {
            return Vec::new();
        }
        let alert = &self.config.alert;
        let expansion = self.config.tracking.body_box_expansion;
        let (w, h) = self.frame_size;
        let mode = alert.monitor_mode;

        let mut alerts = Vec::new();
        for state in self.states.values_mut() {
            let visible = state.is_visible();
            let region = if visible {
                state.face_box.map(|b| b.body_box(w, h, expansion))
            } else {
                None
            };

            if mode.checks_sleep() && visible && state.is_sleeping() && state.should_log_sleep(now) {
                let status = if state.sleep_alerted {
                    AlertStatus::Continued
                } else {
                    AlertStatus::Triggered
                };
                state.sleep_alerted = true;
                log::info!("{}: sleeping ({status:?})", state.name);
                alerts.push(Alert {
                    name: state.name.clone(),
                    kind: AlertKind::Sleeping,
                    status,
                    action: state.current_action,
                    elapsed: state.action_timer.elapsed(now),
                    region,
                    snapshot: state.take_snapshot_slot(now, alert.snapshot_interval_seconds),
                    confidence: state.face_confidence,
                });
            }

            if !mode.checks_action() {
                state.action_timer.performed(now);
                continue;
            }
            let Some(status) =
                state
                    .action_timer
                    .poll(now, alert.interval_seconds, alert.cooldown_seconds)
            else {
                continue;
            };
            let kind = if visible {
                AlertKind::ActionTimeout
            } else {
                AlertKind::TargetMissing
            };
            let elapsed = state.action_timer.elapsed(now);
            log::info!("{}: {kind:?} ({status:?}) after {elapsed:.1}s", state.name);
            alerts.push(Alert {
                name: state.name.clone(),
                kind,
                status,
                action: state.current_action,
                elapsed,
                region,
                snapshot: state.take_snapshot_slot(now, alert.snapshot_interval_seconds),
                confidence: state.face_confidence,
            });
        }
        alerts
    }

    /// Display view of every target, in name order.
    pub fn status(&self, now: f64) -> Vec<TargetStatus> {
        let interval = self.config.alert.interval_seconds;
        self.states
            .values()
            .map(|s| TargetStatus {
                name: s.name.clone(),
                phase: s.phase,
                visible: s.is_visible(),
                face_box: s.face_box,
                action: s.current_action,
                face_confidence: s.face_confidence,
                pose_confidence: s.pose_confidence,
                sleeping: s.is_sleeping(),
                alert_triggered: s.alert_triggered(),
                time_left: s.action_timer.time_left(now, interval),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverlapScoring;
    use crate::tracker::classifier::tests::{hands_up_pose, standing_pose};
    use crate::tracker::eye::tests::face_mesh;
    use nalgebra::DVector;

    const FRAME_W: f32 = 640.0;
    const FRAME_H: f32 = 480.0;

    fn emb(values: &[f32]) -> Embedding {
        DVector::from_row_slice(values)
    }

    fn engine(config: MonitorConfig) -> GuardTracker<u32> {
        let mut engine = GuardTracker::new(config);
        for (name, e) in [("alice", [0.0, 0.0]), ("bob", [1.0, 1.0])] {
            let profile = TargetProfile::new(name, emb(&e)).unwrap();
            engine.select_profile(profile, 0.0).unwrap();
        }
        engine
    }

    fn faces() -> Vec<FaceDetection> {
        vec![
            FaceDetection::new(400.0, 100.0, 440.0, 140.0, emb(&[0.9, 1.0])),
            FaceDetection::new(100.0, 100.0, 140.0, 140.0, emb(&[0.1, 0.0])),
        ]
    }

    fn region() -> Rect {
        Rect::new(0.0, 0.0, 300.0, 400.0)
    }

    #[test]
    fn test_assigns_detections_to_untracked_profiles() {
        let mut engine = engine(MonitorConfig::default());
        assert!(engine.begin_frame(FRAME_W, FRAME_H));
        let outcome = engine.assign_detections(&faces(), |_, _| Some(7));

        let names: Vec<(&str, usize)> = outcome
            .assignments
            .iter()
            .map(|a| (a.name.as_str(), a.detection))
            .collect();
        assert_eq!(names, vec![("alice", 1), ("bob", 0)]);
        assert!(outcome.unassigned.is_empty());

        let alice = engine.state("alice").unwrap();
        assert!(alice.is_visible());
        assert_eq!(alice.face_box().unwrap().x, 100.0);
        assert!((alice.face_confidence() - 0.9).abs() < 1e-5);
    }

    #[test]
    fn test_failed_tracker_init_leaves_untracked() {
        let mut engine = engine(MonitorConfig::default());
        engine.begin_frame(FRAME_W, FRAME_H);
        let outcome = engine.assign_detections(&faces(), |name, _| (name == "bob").then_some(1));
        assert_eq!(outcome.assignments.len(), 1);
        assert_eq!(outcome.unassigned, vec![1]);
        assert_eq!(engine.state("alice").unwrap().phase(), TrackPhase::Untracked);
    }

    #[test]
    fn test_detection_cadence() {
        let mut config = MonitorConfig::default();
        config.detection.re_detect_interval = 3;
        let mut engine = engine(config);
        let detect: Vec<bool> = (0..7).map(|_| engine.begin_frame(FRAME_W, FRAME_H)).collect();
        assert_eq!(detect, vec![true, false, false, true, false, false, true]);
    }

    #[test]
    fn test_tracker_failure_then_settles_untracked() {
        let mut engine = engine(MonitorConfig::default());
        engine.begin_frame(FRAME_W, FRAME_H);
        engine.assign_detections(&faces(), |_, _| Some(0));

        engine.begin_frame(FRAME_W, FRAME_H);
        let losses = engine.advance_tracks(|name, _| {
            (name == "bob").then(|| Rect::new(402.0, 100.0, 40.0, 40.0))
        });
        assert_eq!(losses, vec![("alice".to_string(), LossReason::TrackerFailure)]);
        let alice = engine.state("alice").unwrap();
        assert_eq!(alice.phase(), TrackPhase::Lost);
        assert!(!alice.has_tracker());
        assert!(engine.state("bob").unwrap().is_visible());

        engine.begin_frame(FRAME_W, FRAME_H);
        assert_eq!(engine.state("alice").unwrap().phase(), TrackPhase::Untracked);
    }

    #[test]
    fn test_tracker_failure_on_detection_frame_is_matched_again() {
        let mut config = MonitorConfig::default();
        config.detection.re_detect_interval = 3;
        let mut engine = engine(config);
        engine.begin_frame(FRAME_W, FRAME_H);
        engine.assign_detections(&faces(), |_, _| Some(0));

        let keep = |name: &str, _: &mut u32| {
            Some(if name == "alice" {
                Rect::new(100.0, 100.0, 40.0, 40.0)
            } else {
                Rect::new(400.0, 100.0, 40.0, 40.0)
            })
        };
        for _ in 2..=3 {
            assert!(!engine.begin_frame(FRAME_W, FRAME_H));
            assert!(engine.advance_tracks(keep).is_empty());
        }

        assert!(engine.begin_frame(FRAME_W, FRAME_H));
        let losses = engine.advance_tracks(|name, tracker| {
            if name == "alice" { None } else { keep(name, tracker) }
        });
        assert_eq!(losses, vec![("alice".to_string(), LossReason::TrackerFailure)]);
        assert!(engine.needs_detection());

        let outcome = engine.assign_detections(&faces(), |_, _| Some(1));
        assert_eq!(outcome.assignments.len(), 1);
        assert_eq!(outcome.assignments[0].name, "alice");
        assert_eq!(outcome.unassigned, vec![0]);
        assert!(engine.state("alice").unwrap().is_visible());
    }

    #[test]
    fn test_implausible_step_drops_track() {
        let mut engine = engine(MonitorConfig::default());
        engine.begin_frame(FRAME_W, FRAME_H);
        engine.assign_detections(&faces(), |_, _| Some(0));

        engine.begin_frame(FRAME_W, FRAME_H);
        let losses = engine.advance_tracks(|name, _| {
            Some(if name == "alice" {
                Rect::new(500.0, 300.0, 40.0, 40.0)
            } else {
                Rect::new(400.0, 100.0, 40.0, 40.0)
            })
        });
        assert_eq!(losses, vec![("alice".to_string(), LossReason::ImplausibleStep)]);
    }

    #[test]
    fn test_tracker_step_is_smoothed() {
        let mut engine = engine(MonitorConfig::default());
        engine.begin_frame(FRAME_W, FRAME_H);
        engine.assign_detections(&faces(), |_, _| Some(0));

        engine.begin_frame(FRAME_W, FRAME_H);
        engine.advance_tracks(|_, _| Some(Rect::new(108.0, 100.0, 40.0, 40.0)));
        // 0.75 * 100 + 0.25 * 108
        assert_eq!(engine.state("alice").unwrap().face_box().unwrap().x, 102.0);
    }

    #[test]
    fn test_overlap_leaves_one_visible() {
        let mut config = MonitorConfig::default();
        config.tracking.overlap_scoring = OverlapScoring::Confidence;
        let mut engine = engine(config);
        engine.begin_frame(FRAME_W, FRAME_H);
        // Both identities within tolerance of faces at the same spot.
        let dets = vec![
            FaceDetection::new(100.0, 100.0, 140.0, 140.0, emb(&[0.1, 0.0])),
            FaceDetection::new(102.0, 100.0, 142.0, 140.0, emb(&[0.8, 1.0])),
        ];
        engine.assign_detections(&dets, |_, _| Some(0));
        assert_eq!(engine.states().filter(|s| s.is_visible()).count(), 2);

        let resolutions = engine.resolve_overlaps();
        assert_eq!(resolutions.len(), 1);
        assert_eq!(resolutions[0].winner, "alice");
        assert_eq!(engine.states().filter(|s| s.is_visible()).count(), 1);
        assert_eq!(engine.state("bob").unwrap().last_loss(), Some(LossReason::Overlap));
        assert!(engine.resolve_overlaps().is_empty());
    }

    #[test]
    fn test_required_action_resets_timer() {
        let mut engine = engine(MonitorConfig::default());
        engine.set_alert_mode(true, 0.0);
        engine.begin_frame(FRAME_W, FRAME_H);
        engine.assign_detections(&faces(), |_, _| Some(0));

        let mut last = None;
        for i in 0..5 {
            last = engine.observe_pose("alice", Some(&hands_up_pose()[..]), None, region(), 1.0 + i as f64);
        }
        let update = last.unwrap();
        assert_eq!(update.action, Action::HandsUp);
        assert!(update.performed);
        // Only the first performance within a minute is logged.
        assert!(!update.log_performed);
        assert_eq!(engine.state("alice").unwrap().action_timer().last_action_time(), 5.0);
    }

    #[test]
    fn test_low_quality_pose_holds_action() {
        let mut engine = engine(MonitorConfig::default());
        engine.begin_frame(FRAME_W, FRAME_H);
        engine.assign_detections(&faces(), |_, _| Some(0));

        engine.observe_pose("alice", Some(&standing_pose()[..]), None, region(), 0.0);
        let mut dim = hands_up_pose();
        for lm in dim.iter_mut().skip(5) {
            lm.visibility = 0.1;
        }
        let update = engine
            .observe_pose("alice", Some(&dim[..]), None, region(), 0.1)
            .unwrap();
        assert_eq!(update.raw, None);
        assert_eq!(update.action, Action::Standing);
        assert_eq!(engine.state("alice").unwrap().actions().len(), 1);
    }

    #[test]
    fn test_ghost_box_eviction() {
        let mut config = MonitorConfig::default();
        config.tracking.ghost_box_threshold = 3;
        let mut engine = engine(config);
        engine.begin_frame(FRAME_W, FRAME_H);
        engine.assign_detections(&faces(), |_, _| Some(0));

        for _ in 0..3 {
            let update = engine.observe_pose("alice", None, None, region(), 0.0).unwrap();
            assert!(!update.lost);
        }
        let update = engine.observe_pose("alice", None, None, region(), 0.0).unwrap();
        assert!(update.lost);
        let alice = engine.state("alice").unwrap();
        assert!(!alice.is_visible());
        assert_eq!(alice.last_loss(), Some(LossReason::GhostBox));
        assert!(engine.observe_pose("alice", None, None, region(), 0.0).is_none());
    }

    #[test]
    fn test_no_alerts_outside_alert_mode() {
        let mut engine = engine(MonitorConfig::default());
        engine.begin_frame(FRAME_W, FRAME_H);
        assert!(engine.evaluate_alerts(100.0).is_empty());
    }

    #[test]
    fn test_missing_target_alerts() {
        let mut engine = engine(MonitorConfig::default());
        engine.set_alert_mode(true, 0.0);
        engine.begin_frame(FRAME_W, FRAME_H);
        assert!(engine.evaluate_alerts(5.0).is_empty());

        let alerts = engine.evaluate_alerts(10.5);
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|a| a.kind == AlertKind::TargetMissing));
        assert!(alerts.iter().all(|a| a.status == AlertStatus::Triggered));
        assert!(alerts.iter().all(|a| a.region.is_none() && a.snapshot));

        let again = engine.evaluate_alerts(13.5);
        assert!(again.iter().all(|a| a.status == AlertStatus::Continued));
        assert!(again.iter().all(|a| !a.snapshot));
    }

    #[test]
    fn test_visible_target_timeout_has_body_region() {
        let mut config = MonitorConfig::default();
        config.alert.monitor_mode = crate::config::MonitorMode::ActionOnly;
        let mut engine = engine(config);
        engine.set_alert_mode(true, 0.0);
        engine.begin_frame(FRAME_W, FRAME_H);
        engine.assign_detections(&faces(), |_, _| Some(0));

        let alerts = engine.evaluate_alerts(11.0);
        let alice = alerts.iter().find(|a| a.name == "alice").unwrap();
        assert_eq!(alice.kind, AlertKind::ActionTimeout);
        assert_eq!(alice.region, Some(Rect::from_tlbr(0.0, 80.0, 240.0, 480.0)));
    }

    #[test]
    fn test_sleeping_target_cannot_reset_timer() {
        let mut config = MonitorConfig::default();
        config.alert.sleep_seconds = 0.1;
        let mut engine = engine(config);
        engine.set_fps(30.0);
        engine.set_alert_mode(true, 0.0);
        engine.begin_frame(FRAME_W, FRAME_H);
        engine.assign_detections(&faces(), |_, _| Some(0));

        let closed = face_mesh(0.0);
        let mut transitions = Vec::new();
        for i in 0..6 {
            let update = engine
                .observe_pose("alice", Some(&hands_up_pose()[..]), Some(&closed[..]), region(), i as f64)
                .unwrap();
            transitions.push(update.sleep);
            if engine.state("alice").unwrap().is_sleeping() {
                assert!(!update.performed);
            }
        }
        // Three closed frames are required; the fourth flips to sleeping.
        assert_eq!(transitions[3], Some(SleepTransition::FellAsleep));

        let alerts = engine.evaluate_alerts(6.0);
        let sleep = alerts.iter().find(|a| a.kind == AlertKind::Sleeping).unwrap();
        assert_eq!(sleep.name, "alice");
        assert_eq!(sleep.status, AlertStatus::Triggered);
    }

    #[test]
    fn test_lost_target_is_not_reported_asleep() {
        let mut config = MonitorConfig::default();
        config.alert.sleep_seconds = 0.1;
        let mut engine = engine(config);
        engine.set_fps(30.0);
        engine.set_alert_mode(true, 0.0);
        engine.begin_frame(FRAME_W, FRAME_H);
        engine.assign_detections(&faces(), |_, _| Some(0));

        let closed = face_mesh(0.0);
        for i in 0..6 {
            engine.observe_pose("alice", Some(&standing_pose()[..]), Some(&closed[..]), region(), i as f64);
        }
        assert!(engine.state("alice").unwrap().is_sleeping());

        engine.begin_frame(FRAME_W, FRAME_H);
        engine.advance_tracks(|name, _| (name == "bob").then(|| Rect::new(400.0, 100.0, 40.0, 40.0)));
        let alice = engine
            .status(6.0)
            .into_iter()
            .find(|t| t.name == "alice")
            .unwrap();
        assert!(!alice.visible);
        assert!(!alice.sleeping);
    }

    #[test]
    fn test_reid_gallery_takes_leftover_faces() {
        let mut config = MonitorConfig::default();
        config.reid.enabled = true;
        let mut engine = engine(config);
        engine.begin_frame(FRAME_W, FRAME_H);
        let mut dets = faces();
        dets.push(FaceDetection::new(300.0, 0.0, 340.0, 40.0, emb(&[-5.0, 3.0])));
        let outcome = engine.assign_detections(&dets, |_, _| Some(0));
        assert_eq!(outcome.unassigned, vec![2]);
        assert_eq!(outcome.reid.len(), 1);
        assert_eq!(outcome.reid[0].1.id, "Person_001");
    }

    #[test]
    fn test_watchlist_sighting() {
        let mut engine = engine(MonitorConfig::default());
        engine.watch_for("fugitive", emb(&[0.9, 1.0]));
        engine.begin_frame(FRAME_W, FRAME_H);
        assert!(engine.needs_detection());
        let outcome = engine.assign_detections(&faces(), |_, _| Some(0));
        let sighting = outcome.wanted.unwrap();
        assert_eq!(sighting.bbox.x, 400.0);
        assert_eq!(Alert::wanted(&sighting).kind, AlertKind::WantedPerson);
    }

    #[test]
    fn test_deselect_drops_state() {
        let mut engine = engine(MonitorConfig::default());
        assert!(engine.deselect_profile("bob").is_some());
        assert!(engine.state("bob").is_none());
        assert_eq!(engine.len(), 1);
        assert!(engine.deselect_profile("bob").is_none());
    }

    #[test]
    fn test_rejects_mismatched_embedding_dimension() {
        let mut engine = engine(MonitorConfig::default());
        let carol = TargetProfile::new("carol", emb(&[0.0, 0.0, 0.0])).unwrap();
        let err = engine.select_profile(carol, 0.0).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, got: 3 }));
    }
}
