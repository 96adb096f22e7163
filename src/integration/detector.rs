//! Traits for the black-box capability providers the monitor consumes.
//!
//! Implement these to connect a face detector/recognizer, a pose estimator,
//! a single-object visual tracker and a face encoder for enrollment images.
//!
//! # Example
//!
//! ```ignore
//! use poseguard_rs::{FaceDetector, Frame};
//! use poseguard_rs::tracker::FaceDetection;
//!
//! struct MyDetector {
//!     // Your model here
//! }
//!
//! impl FaceDetector for MyDetector {
//!     type Error = std::io::Error;
//!
//!     fn detect(&mut self, frame: &Frame<'_>) -> Result<Vec<FaceDetection>, Self::Error> {
//!         // Run detection and recognition, return boxes with embeddings
//!         Ok(vec![])
//!     }
//! }
//! ```

use std::fmt::Display;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::tracker::{Embedding, FaceDetection, Landmark, Rect};

/// One video frame handed to the collaborators.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Raw image bytes (format depends on the collaborators).
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    /// Capture time in seconds.
    pub timestamp: f64,
}

impl<'a> Frame<'a> {
    pub fn new(data: &'a [u8], width: u32, height: u32, timestamp: f64) -> Self {
        Self {
            data,
            width,
            height,
            timestamp,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width as f32, self.height as f32)
    }
}

/// Face detection plus identity embedding.
pub trait FaceDetector {
    type Error: Display;

    fn detect(&mut self, frame: &Frame<'_>) -> Result<Vec<FaceDetection>, Self::Error>;
}

/// Landmarks found in one body region. Coordinates are normalized to the
/// region. Either set is `None` when nothing was found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseObservation {
    #[serde(default)]
    pub landmarks: Option<Vec<Landmark>>,
    /// Face mesh, used for the eye aspect ratio.
    #[serde(default)]
    pub face_landmarks: Option<Vec<Landmark>>,
}

impl PoseObservation {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_pose(&self) -> bool {
        self.landmarks.is_some()
    }
}

/// Pose (and face mesh) estimation on a region of the frame.
pub trait PoseEstimator {
    type Error: Display;

    fn estimate(&mut self, frame: &Frame<'_>, region: Rect) -> Result<PoseObservation, Self::Error>;
}

/// A single-object visual tracker seeded with one face box.
pub trait VisualTracker {
    /// Advance to `frame`. `None` means the tracker lost its object.
    fn update(&mut self, frame: &Frame<'_>) -> Option<Rect>;
}

/// Creates visual trackers for newly matched faces.
pub trait TrackerFactory {
    type Tracker: VisualTracker;

    /// Initialize a tracker on `face` in `frame`, or `None` on failure.
    fn create(&mut self, frame: &Frame<'_>, face: Rect) -> Option<Self::Tracker>;
}

/// Face embedding of an enrollment image.
pub trait FaceEncoder {
    type Error: Display;

    /// `Ok(None)` when the image holds no face.
    fn encode(&mut self, image: &Path) -> Result<Option<Embedding>, Self::Error>;
}
