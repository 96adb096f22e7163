use crate::config::MonitorConfig;
use crate::tracker::action::Action;
use crate::tracker::alert::{ActionTimer, SleepMonitor};
use crate::tracker::rect::Rect;
use crate::tracker::smoothing::ActionBuffer;

/// Tracking lifecycle of one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum TrackPhase {
    /// No tracker; eligible for identity matching on detection frames.
    #[default]
    Untracked,
    /// A visual tracker advances the face box every frame.
    Tracking,
    /// Dropped during the current frame; becomes `Untracked` on the next.
    Lost,
}

/// Why a track was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum LossReason {
    /// The visual tracker reported failure.
    TrackerFailure,
    /// The tracker jumped further than a face can move in one frame.
    ImplausibleStep,
    /// No pose was found in the body box for too many frames.
    GhostBox,
    /// Yielded to an overlapping track with a better score.
    Overlap,
}

/// Live tracking record of one enrolled identity.
///
/// `T` is the visual tracker handle; at most one is held, and only while
/// the phase is [`TrackPhase::Tracking`].
#[derive(Debug)]
pub struct TrackState<T> {
    pub(crate) name: String,
    pub(crate) phase: TrackPhase,
    pub(crate) face_box: Option<Rect>,
    pub(crate) tracker: Option<T>,
    pub(crate) actions: ActionBuffer,
    pub(crate) current_action: Action,
    pub(crate) missing_pose_counter: u32,
    pub(crate) face_confidence: f32,
    pub(crate) pose_confidence: f32,
    pub(crate) action_timer: ActionTimer,
    pub(crate) sleep: SleepMonitor,
    pub(crate) last_action_log_time: Option<f64>,
    pub(crate) last_sleep_log_time: Option<f64>,
    pub(crate) last_snapshot_time: Option<f64>,
    pub(crate) sleep_alerted: bool,
    pub(crate) last_loss: Option<LossReason>,
}

/// Minimum seconds between two "required action performed" log entries.
const ACTION_LOG_INTERVAL: f64 = 60.0;
/// Minimum seconds between two sleep log entries.
const SLEEP_LOG_INTERVAL: f64 = 5.0;

fn throttle(last: &mut Option<f64>, now: f64, interval: f64) -> bool {
    if last.is_some_and(|t| now - t < interval) {
        return false;
    }
    *last = Some(now);
    true
}

impl<T> TrackState<T> {
    /// Untracked state whose action timer starts at `now`.
    pub fn new(name: impl Into<String>, config: &MonitorConfig, now: f64) -> Self {
        let tracking = &config.tracking;
        Self {
            name: name.into(),
            phase: TrackPhase::Untracked,
            face_box: None,
            tracker: None,
            actions: ActionBuffer::new(
                tracking.pose_buffer_size,
                tracking.min_buffer_for_classification,
                tracking.majority_floor,
            ),
            current_action: Action::Unknown,
            missing_pose_counter: 0,
            face_confidence: 0.0,
            pose_confidence: 0.0,
            action_timer: ActionTimer::new(now),
            sleep: SleepMonitor::new(&config.alert),
            last_action_log_time: None,
            last_sleep_log_time: None,
            last_snapshot_time: None,
            sleep_alerted: false,
            last_loss: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> TrackPhase {
        self.phase
    }

    /// Visible means actively tracked; a visible track always has a face box.
    pub fn is_visible(&self) -> bool {
        self.phase == TrackPhase::Tracking
    }

    /// Last known face box (kept after the track is lost).
    pub fn face_box(&self) -> Option<Rect> {
        self.face_box
    }

    pub fn has_tracker(&self) -> bool {
        self.tracker.is_some()
    }

    /// Smoothed action shown for this target.
    pub fn current_action(&self) -> Action {
        self.current_action
    }

    pub fn actions(&self) -> &ActionBuffer {
        &self.actions
    }

    pub fn missing_pose_counter(&self) -> u32 {
        self.missing_pose_counter
    }

    pub fn face_confidence(&self) -> f32 {
        self.face_confidence
    }

    pub fn pose_confidence(&self) -> f32 {
        self.pose_confidence
    }

    pub fn action_timer(&self) -> &ActionTimer {
        &self.action_timer
    }

    pub fn sleep(&self) -> &SleepMonitor {
        &self.sleep
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleep.is_sleeping()
    }

    pub fn alert_triggered(&self) -> bool {
        self.action_timer.is_triggered()
    }

    pub fn last_loss(&self) -> Option<LossReason> {
        self.last_loss
    }

    /// Enter `Tracking` with a freshly initialized tracker.
    pub(crate) fn start_tracking(&mut self, tracker: T, face_box: Rect, confidence: f32) {
        self.tracker = Some(tracker);
        self.face_box = Some(face_box);
        self.face_confidence = confidence;
        self.missing_pose_counter = 0;
        self.last_loss = None;
        self.phase = TrackPhase::Tracking;
    }

    /// Eligible for identity matching this frame: untracked, or dropped
    /// earlier this frame because its visual tracker gave out.
    pub fn is_searchable(&self) -> bool {
        match self.phase {
            TrackPhase::Untracked => true,
            TrackPhase::Lost => matches!(
                self.last_loss,
                Some(LossReason::TrackerFailure | LossReason::ImplausibleStep)
            ),
            TrackPhase::Tracking => false,
        }
    }

    /// Release the tracker and leave `Tracking`. A target that is not seen
    /// cannot be asleep.
    pub(crate) fn mark_lost(&mut self, reason: LossReason) {
        self.tracker = None;
        self.phase = TrackPhase::Lost;
        self.last_loss = Some(reason);
        let _ = self.sleep.reset();
        self.sleep_alerted = false;
    }

    /// Advance `Lost` to `Untracked` at a frame boundary.
    pub(crate) fn settle(&mut self) {
        if self.phase == TrackPhase::Lost {
            self.phase = TrackPhase::Untracked;
        }
    }

    /// A pose was (or was not) found in the body box this frame. Returns
    /// `true` when the ghost-box threshold was exceeded.
    pub(crate) fn record_pose_presence(&mut self, found: bool, ghost_threshold: u32) -> bool {
        if found {
            self.missing_pose_counter = 0;
            return false;
        }
        self.missing_pose_counter += 1;
        self.missing_pose_counter > ghost_threshold
    }

    /// Whether a "required action performed" entry may be logged now.
    pub(crate) fn should_log_action(&mut self, now: f64) -> bool {
        throttle(&mut self.last_action_log_time, now, ACTION_LOG_INTERVAL)
    }

    pub(crate) fn should_log_sleep(&mut self, now: f64) -> bool {
        throttle(&mut self.last_sleep_log_time, now, SLEEP_LOG_INTERVAL)
    }

    /// Claim the snapshot slot if `interval` seconds have passed since the last one.
    pub(crate) fn take_snapshot_slot(&mut self, now: f64, interval: f64) -> bool {
        throttle(&mut self.last_snapshot_time, now, interval)
    }
}
