//! Per-target alert timers: required-action timeout and sleep detection.
//!
//! Both are plain state updates. Missing input (no face landmarks this frame)
//! resets the sleep counter; nothing here fails.

use serde::Serialize;

use crate::config::AlertConfig;

/// Outcome of an action-timeout poll that raised an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertStatus {
    /// First alert of a timeout episode.
    Triggered,
    /// Repeated alert while the same episode is still open.
    Continued,
}

/// Time since the required action was last performed.
#[derive(Debug, Clone)]
pub struct ActionTimer {
    last_action_time: f64,
    last_alert_time: Option<f64>,
    triggered: bool,
}

impl ActionTimer {
    pub fn new(now: f64) -> Self {
        Self {
            last_action_time: now,
            last_alert_time: None,
            triggered: false,
        }
    }

    /// The required action was observed: restart the interval and close the episode.
    pub fn performed(&mut self, now: f64) {
        self.last_action_time = now;
        self.triggered = false;
    }

    pub fn elapsed(&self, now: f64) -> f64 {
        (now - self.last_action_time).max(0.0)
    }

    pub fn time_left(&self, now: f64, interval: f64) -> f64 {
        (interval - self.elapsed(now)).max(0.0)
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    pub fn last_action_time(&self) -> f64 {
        self.last_action_time
    }

    /// Raise an alert when the interval has run out and the cooldown since
    /// the previous alert has passed.
    pub fn poll(&mut self, now: f64, interval: f64, cooldown: f64) -> Option<AlertStatus> {
        if self.elapsed(now) <= interval {
            return None;
        }
        if self
            .last_alert_time
            .is_some_and(|last| now - last <= cooldown)
        {
            return None;
        }
        self.last_alert_time = Some(now);
        let status = if self.triggered {
            AlertStatus::Continued
        } else {
            AlertStatus::Triggered
        };
        self.triggered = true;
        Some(status)
    }
}

/// Change reported by [`SleepMonitor::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SleepTransition {
    FellAsleep,
    WokeUp,
}

/// Eyes-closed counter with an adaptive EAR threshold.
///
/// The threshold follows an EMA of clearly open eyes and only ever moves
/// upward, never below the configured floor, so a subject dozing off cannot
/// teach the monitor that closed eyes are normal.
#[derive(Debug, Clone)]
pub struct SleepMonitor {
    eye_closed_counter: u32,
    ear_threshold: f32,
    baseline_open_ear: f32,
    is_sleeping: bool,
}

impl SleepMonitor {
    pub fn new(config: &AlertConfig) -> Self {
        Self {
            eye_closed_counter: 0,
            ear_threshold: config.initial_ear_threshold.max(config.ear_floor),
            baseline_open_ear: config.initial_open_ear,
            is_sleeping: false,
        }
    }

    pub fn ear_threshold(&self) -> f32 {
        self.ear_threshold
    }

    pub fn baseline_open_ear(&self) -> f32 {
        self.baseline_open_ear
    }

    pub fn eye_closed_counter(&self) -> u32 {
        self.eye_closed_counter
    }

    pub fn is_sleeping(&self) -> bool {
        self.is_sleeping
    }

    /// Closed-eye frames that must be exceeded at `fps` before the subject
    /// counts as asleep.
    pub fn required_frames(config: &AlertConfig, fps: f32) -> u32 {
        let frames = (config.sleep_seconds * fps.max(0.0) as f64).round() as u32;
        frames.max(config.min_closure_frames)
    }

    /// Feed one frame's EAR (`None` when the eyes could not be measured).
    pub fn observe(
        &mut self,
        ear: Option<f32>,
        fps: f32,
        config: &AlertConfig,
    ) -> Option<SleepTransition> {
        let Some(ear) = ear else {
            return self.reset();
        };

        if ear < self.ear_threshold {
            self.eye_closed_counter += 1;
        } else {
            self.eye_closed_counter = 0;
            if ear > config.ear_recalibration_min {
                self.baseline_open_ear = self.baseline_open_ear * 0.95 + ear * 0.05;
                let candidate = self.baseline_open_ear * config.ear_threshold_ratio;
                self.ear_threshold = self.ear_threshold.max(candidate).max(config.ear_floor);
            }
        }

        let sleeping = self.eye_closed_counter > Self::required_frames(config, fps);
        self.transition(sleeping)
    }

    /// Forget the closed-eye run (no measurement, or sleep checks disabled).
    pub fn reset(&mut self) -> Option<SleepTransition> {
        self.eye_closed_counter = 0;
        self.transition(false)
    }

    fn transition(&mut self, sleeping: bool) -> Option<SleepTransition> {
        let change = match (self.is_sleeping, sleeping) {
            (false, true) => Some(SleepTransition::FellAsleep),
            (true, false) => Some(SleepTransition::WokeUp),
            _ => None,
        };
        self.is_sleeping = sleeping;
        change
    }
}
