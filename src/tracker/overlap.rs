//! Deduplication of tracks that have converged on the same person.

use crate::config::OverlapScoring;
use crate::tracker::rect::{Rect, iou_batch};

/// A visible track taking part in overlap resolution.
#[derive(Debug, Clone)]
pub struct OverlapCandidate<'a> {
    pub name: &'a str,
    pub face_box: Rect,
    pub face_confidence: f32,
    /// Whether the track currently shows a non-Unknown smoothed action.
    pub has_stable_action: bool,
}

impl OverlapCandidate<'_> {
    pub fn score(&self, scoring: OverlapScoring) -> f32 {
        match scoring {
            OverlapScoring::Confidence => self.face_confidence,
            OverlapScoring::Weighted => {
                let consistency = if self.has_stable_action { 0.3 } else { 0.0 };
                self.face_confidence * 0.6 + consistency
            }
        }
    }
}

/// One pair decision: `loser` must drop its track.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct OverlapResolution {
    pub winner: String,
    pub loser: String,
    pub iou: f32,
}

/// Pairwise resolution over all candidates whose face boxes overlap by more
/// than `iou_threshold`.
///
/// Pairs are visited in name order; a candidate that already lost takes no
/// further part. Equal scores go to the lexicographically smaller name.
/// The surviving set is pairwise non-overlapping, so resolving it again
/// changes nothing.
pub fn resolve_overlaps(
    candidates: &[OverlapCandidate<'_>],
    iou_threshold: f32,
    scoring: OverlapScoring,
) -> Vec<OverlapResolution> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| candidates[a].name.cmp(candidates[b].name));
    let sorted: Vec<&OverlapCandidate<'_>> = order.iter().map(|&i| &candidates[i]).collect();

    let boxes: Vec<Rect> = sorted.iter().map(|c| c.face_box).collect();
    let ious = iou_batch(&boxes, &boxes);

    let mut alive = vec![true; sorted.len()];
    let mut resolutions = Vec::new();
    for i in 0..sorted.len() {
        for j in (i + 1)..sorted.len() {
            if !alive[i] || !alive[j] || ious[[i, j]] <= iou_threshold {
                continue;
            }
            let (a, b) = (sorted[i], sorted[j]);
            // `a` sorts first, so it keeps the track on a tie.
            let (winner, loser) = if b.score(scoring) > a.score(scoring) {
                alive[i] = false;
                (b, a)
            } else {
                alive[j] = false;
                (a, b)
            };
            log::debug!(
                "overlap: keeping {} ({:.2}) over {} ({:.2}), iou {:.2}",
                winner.name,
                winner.score(scoring),
                loser.name,
                loser.score(scoring),
                ious[[i, j]]
            );
            resolutions.push(OverlapResolution {
                winner: winner.name.to_string(),
                loser: loser.name.to_string(),
                iou: ious[[i, j]],
            });
        }
    }
    resolutions
}
