//! Wanted-person watch over every detected face.

use crate::tracker::matching::{Embedding, EmbeddingMetric, FaceDetection};
use crate::tracker::rect::Rect;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct WantedSighting {
    pub name: String,
    pub bbox: Rect,
    pub distance: f32,
    pub frame_id: u64,
}

/// A single wanted reference embedding with an alert cooldown in frames.
#[derive(Debug, Clone)]
pub struct Watchlist {
    name: String,
    embedding: Embedding,
    tolerance: f32,
    cooldown_frames: u64,
    last_alert_frame: Option<u64>,
}

impl Watchlist {
    /// Watch for `embedding`, matching faces closer than `tolerance` and
    /// staying quiet for `cooldown_frames` after each sighting.
    pub fn new(
        name: impl Into<String>,
        embedding: Embedding,
        tolerance: f32,
        cooldown_frames: u64,
    ) -> Self {
        Self {
            name: name.into(),
            embedding,
            tolerance,
            cooldown_frames,
            last_alert_frame: None,
        }
    }

    /// Name reported with sightings.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Frame of the most recent sighting.
    pub fn last_alert_frame(&self) -> Option<u64> {
        self.last_alert_frame
    }

    /// Closest face within tolerance, unless an alert was raised less than
    /// the cooldown ago.
    pub fn check(
        &mut self,
        metric: &dyn EmbeddingMetric,
        detections: &[FaceDetection],
        frame_id: u64,
    ) -> Option<WantedSighting> {
        if self
            .last_alert_frame
            .is_some_and(|last| frame_id.saturating_sub(last) < self.cooldown_frames)
        {
            return None;
        }
        let (bbox, distance) = detections
            .iter()
            .map(|d| (d.bbox, metric.distance(&self.embedding, &d.embedding)))
            .filter(|&(_, dist)| dist < self.tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1))?;

        self.last_alert_frame = Some(frame_id);
        log::info!("wanted person {} sighted (distance {distance:.2})", self.name);
        Some(WantedSighting {
            name: self.name.clone(),
            bbox,
            distance,
            frame_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::matching::Euclidean;
    use nalgebra::DVector;

    fn det(x: f32, emb: &[f32]) -> FaceDetection {
        FaceDetection::new(x, 0.0, x + 40.0, 40.0, DVector::from_row_slice(emb))
    }

    #[test]
    fn test_closest_match_with_cooldown() {
        let mut watch = Watchlist::new("fugitive", DVector::from_vec(vec![0.0, 0.0]), 0.5, 60);
        let dets = [det(0.0, &[0.4, 0.0]), det(100.0, &[0.1, 0.0])];

        let hit = watch.check(&Euclidean, &dets, 10).unwrap();
        assert_eq!(hit.bbox.x, 100.0);
        assert!(watch.check(&Euclidean, &dets, 69).is_none());
        assert!(watch.check(&Euclidean, &dets, 70).is_some());
    }

    #[test]
    fn test_no_match_outside_tolerance() {
        let mut watch = Watchlist::new("fugitive", DVector::from_vec(vec![0.0, 0.0]), 0.5, 60);
        assert!(watch.check(&Euclidean, &[det(0.0, &[0.9, 0.0])], 1).is_none());
        assert_eq!(watch.last_alert_frame(), None);
    }
}
