//! Majority-vote smoothing of raw action labels.

use std::collections::VecDeque;

use crate::tracker::action::Action;

/// Bounded FIFO of recent raw labels with the held-over last valid label.
#[derive(Debug, Clone)]
pub struct ActionBuffer {
    labels: VecDeque<Action>,
    capacity: usize,
    min_fill: usize,
    majority_floor: f32,
    last_valid: Option<Action>,
}

impl ActionBuffer {
    pub fn new(capacity: usize, min_fill: usize, majority_floor: f32) -> Self {
        let capacity = capacity.max(1);
        Self {
            labels: VecDeque::with_capacity(capacity),
            capacity,
            min_fill: min_fill.min(capacity),
            majority_floor,
            last_valid: None,
        }
    }

    /// Push a raw label, evicting the oldest when full. `Unknown` is dropped.
    pub fn push(&mut self, action: Action) {
        if !action.is_known() {
            return;
        }
        if self.labels.len() == self.capacity {
            self.labels.pop_front();
        }
        self.labels.push_back(action);
        self.last_valid = Some(action);
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last_valid(&self) -> Option<Action> {
        self.last_valid
    }

    /// Most frequent label and its share of the buffer. Ties go to the label
    /// seen first (oldest).
    pub fn majority(&self) -> Option<(Action, f32)> {
        let mut counts: Vec<(Action, usize)> = Vec::new();
        for &label in &self.labels {
            match counts.iter_mut().find(|(a, _)| *a == label) {
                Some((_, n)) => *n += 1,
                None => counts.push((label, 1)),
            }
        }
        let mut best: Option<(Action, usize)> = None;
        for (action, n) in counts {
            if best.is_none_or(|(_, top)| n > top) {
                best = Some((action, n));
            }
        }
        best.map(|(action, n)| (action, n as f32 / self.labels.len() as f32))
    }

    /// The externally observable action.
    ///
    /// Below the minimum fill the last valid label is held (or `Unknown`).
    /// Once filled, the majority wins if its share exceeds the floor;
    /// otherwise the last valid label is held.
    pub fn smoothed(&self) -> Action {
        if self.labels.len() < self.min_fill.max(1) {
            return self.last_valid.unwrap_or(Action::Unknown);
        }
        match self.majority() {
            Some((action, share)) if share > self.majority_floor => action,
            _ => self.held(),
        }
    }

    /// Label shown when the current frame cannot be trusted.
    pub fn held(&self) -> Action {
        self.last_valid.unwrap_or(Action::Standing)
    }

    pub fn clear(&mut self) {
        self.labels.clear();
        self.last_valid = None;
    }
}
