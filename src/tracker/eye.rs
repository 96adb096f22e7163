//! Eye aspect ratio from face-mesh landmarks.

use crate::tracker::classifier::Landmark;

/// Six-point eye contours in the 468-point face mesh: two corners, then two
/// upper/lower lid pairs.
pub const RIGHT_EYE: [usize; 6] = [33, 133, 159, 145, 158, 153];
pub const LEFT_EYE: [usize; 6] = [362, 263, 386, 374, 385, 380];

/// Landmarks inspected for the visibility check before EAR is trusted.
const EYE_REGION: std::ops::Range<usize> = 33..48;
const MIN_VISIBLE_EYE_LANDMARKS: usize = 12;

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

fn single_eye(face: &[Landmark], indices: &[usize; 6], width: f32, height: f32) -> Option<f32> {
    let mut points = [(0.0f32, 0.0f32); 6];
    for (slot, &idx) in points.iter_mut().zip(indices) {
        let lm = face.get(idx)?;
        *slot = (lm.x * width, lm.y * height);
    }
    let [p1, p2, p3, p4, p5, p6] = points;
    let horizontal = distance(p1, p2);
    if horizontal == 0.0 {
        return Some(0.0);
    }
    Some((distance(p3, p4) + distance(p5, p6)) / (2.0 * horizontal))
}

/// Mean EAR of both eyes, in the pixel space of a `width` x `height` region.
/// `None` if the mesh is too short.
pub fn eye_aspect_ratio(face: &[Landmark], width: f32, height: f32) -> Option<f32> {
    let right = single_eye(face, &RIGHT_EYE, width, height)?;
    let left = single_eye(face, &LEFT_EYE, width, height)?;
    Some((right + left) / 2.0)
}

/// EAR only when enough of the eye region is visible to trust it.
pub fn measured_ear(face: &[Landmark], width: f32, height: f32) -> Option<f32> {
    let visible = face
        .get(EYE_REGION)?
        .iter()
        .filter(|lm| lm.visibility > 0.5)
        .count();
    if visible < MIN_VISIBLE_EYE_LANDMARKS {
        return None;
    }
    eye_aspect_ratio(face, width, height)
}
