//! Rule-based pose action classifier.
//!
//! Landmarks follow the 33-point BlazePose topology with normalized
//! coordinates. Classification is an ordered decision table: the first rule
//! whose predicate holds names the action.

use serde::{Deserialize, Serialize};

use crate::tracker::action::Action;

/// One body or face landmark, coordinates normalized to the region it was
/// computed on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            visibility,
        }
    }
}

pub const NOSE: usize = 0;
pub const LEFT_SHOULDER: usize = 11;
pub const RIGHT_SHOULDER: usize = 12;
pub const LEFT_ELBOW: usize = 13;
pub const RIGHT_ELBOW: usize = 14;
pub const LEFT_WRIST: usize = 15;
pub const RIGHT_WRIST: usize = 16;
pub const LEFT_HIP: usize = 23;
pub const RIGHT_HIP: usize = 24;
pub const LEFT_KNEE: usize = 25;
pub const RIGHT_KNEE: usize = 26;

/// Number of landmarks in a full pose.
pub const POSE_LANDMARK_COUNT: usize = 33;

/// Empirical thresholds of the rule cascade. Distances are fractions of the
/// region height (`*_h`) or width (`*_w`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub limb_visibility: f32,
    pub hip_visibility: f32,
    pub nose_visibility: f32,
    /// Key joints (of 11) that must be visible before any rule runs.
    pub min_visible_joints: usize,
    pub raised_margin_h: f32,
    pub chest_band_h: f32,
    pub shoulder_band_h: f32,
    pub t_pose_reach_w: f32,
    pub lowered_margin_h: f32,
    /// Normalized knee-hip height below which the thigh counts as horizontal.
    pub sit_thigh: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            limb_visibility: 0.70,
            hip_visibility: 0.65,
            nose_visibility: 0.6,
            min_visible_joints: 9,
            raised_margin_h: 0.15,
            chest_band_h: 0.25,
            shoulder_band_h: 0.2,
            t_pose_reach_w: 0.25,
            lowered_margin_h: 0.2,
            sit_thigh: 0.12,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Joint {
    x: f32,
    y: f32,
    /// Normalized y, for the scale-free thigh test.
    ny: f32,
    visible: bool,
}

/// Pixel-space view of the joints the rules look at.
struct PoseGeometry {
    h: f32,
    w: f32,
    nose: Joint,
    l_shoulder: Joint,
    r_shoulder: Joint,
    l_elbow: Joint,
    r_elbow: Joint,
    l_wrist: Joint,
    r_wrist: Joint,
    l_hip: Joint,
    r_hip: Joint,
    l_knee: Joint,
    r_knee: Joint,
}

impl PoseGeometry {
    fn new(landmarks: &[Landmark], h: f32, w: f32, t: &Thresholds) -> Option<Self> {
        let joint = |idx: usize, min_visibility: f32| {
            landmarks.get(idx).map(|lm| Joint {
                x: lm.x * w,
                y: lm.y * h,
                ny: lm.y,
                visible: lm.visibility > min_visibility,
            })
        };
        Some(Self {
            h,
            w,
            nose: joint(NOSE, t.nose_visibility)?,
            l_shoulder: joint(LEFT_SHOULDER, t.limb_visibility)?,
            r_shoulder: joint(RIGHT_SHOULDER, t.limb_visibility)?,
            l_elbow: joint(LEFT_ELBOW, t.limb_visibility)?,
            r_elbow: joint(RIGHT_ELBOW, t.limb_visibility)?,
            l_wrist: joint(LEFT_WRIST, t.limb_visibility)?,
            r_wrist: joint(RIGHT_WRIST, t.limb_visibility)?,
            l_hip: joint(LEFT_HIP, t.hip_visibility)?,
            r_hip: joint(RIGHT_HIP, t.hip_visibility)?,
            l_knee: joint(LEFT_KNEE, t.limb_visibility)?,
            r_knee: joint(RIGHT_KNEE, t.limb_visibility)?,
        })
    }

    fn visible_joints(&self) -> usize {
        [
            self.l_wrist,
            self.r_wrist,
            self.l_elbow,
            self.r_elbow,
            self.l_shoulder,
            self.r_shoulder,
            self.l_knee,
            self.r_knee,
            self.l_hip,
            self.r_hip,
            self.nose,
        ]
        .iter()
        .filter(|j| j.visible)
        .count()
    }

    fn shoulders_visible(&self) -> bool {
        self.l_shoulder.visible && self.r_shoulder.visible
    }

    fn chest(&self) -> (f32, f32) {
        (
            (self.l_shoulder.x + self.r_shoulder.x) / 2.0,
            (self.l_shoulder.y + self.r_shoulder.y) / 2.0,
        )
    }

    /// +1 when the subject's left side lies toward larger x, -1 when mirrored.
    fn left_outward(&self) -> f32 {
        if self.l_shoulder.x >= self.r_shoulder.x {
            1.0
        } else {
            -1.0
        }
    }

    fn raised(&self, wrist: Joint, t: &Thresholds) -> bool {
        wrist.visible && wrist.y < self.nose.y - t.raised_margin_h * self.h
    }

    fn lowered(&self, wrist: Joint, t: &Thresholds) -> bool {
        wrist.visible && wrist.y > self.chest().1 + t.lowered_margin_h * self.h
    }
}

type Rule = fn(&PoseGeometry, &Thresholds) -> bool;

fn hands_up(p: &PoseGeometry, t: &Thresholds) -> bool {
    p.raised(p.l_wrist, t) && p.raised(p.r_wrist, t)
}

fn hands_crossed(p: &PoseGeometry, t: &Thresholds) -> bool {
    if !(p.l_wrist.visible && p.r_wrist.visible && p.shoulders_visible()) {
        return false;
    }
    let (center_x, chest_y) = p.chest();
    let band = t.chest_band_h * p.h;
    let at_chest = (p.l_wrist.y - chest_y).abs() < band && (p.r_wrist.y - chest_y).abs() < band;
    // Wrists on opposite sides of the body center, in either order.
    let opposite = (p.l_wrist.x - center_x) * (p.r_wrist.x - center_x) < 0.0;
    // Arms stretched out sideways are a T-pose, not crossed.
    at_chest && opposite && !t_pose(p, t)
}

fn t_pose(p: &PoseGeometry, t: &Thresholds) -> bool {
    let arms_visible = p.l_wrist.visible
        && p.r_wrist.visible
        && p.l_elbow.visible
        && p.r_elbow.visible
        && p.shoulders_visible();
    if !arms_visible {
        return false;
    }
    let band = t.shoulder_band_h * p.h;
    let level = (p.l_wrist.y - p.l_shoulder.y).abs() < band
        && (p.r_wrist.y - p.r_shoulder.y).abs() < band
        && (p.l_elbow.y - p.l_shoulder.y).abs() < band
        && (p.r_elbow.y - p.r_shoulder.y).abs() < band;
    let reach = t.t_pose_reach_w * p.w;
    let dir = p.left_outward();
    let extended = (p.l_wrist.x - p.l_shoulder.x) * dir >= reach
        && (p.r_wrist.x - p.r_shoulder.x) * -dir >= reach;
    level && extended
}

fn one_hand_left(p: &PoseGeometry, t: &Thresholds) -> bool {
    p.raised(p.l_wrist, t)
        && (!p.r_wrist.visible || (p.shoulders_visible() && p.lowered(p.r_wrist, t)))
}

fn one_hand_right(p: &PoseGeometry, t: &Thresholds) -> bool {
    p.raised(p.r_wrist, t)
        && (!p.l_wrist.visible || (p.shoulders_visible() && p.lowered(p.l_wrist, t)))
}

fn sit(p: &PoseGeometry, t: &Thresholds) -> bool {
    if !(p.l_knee.visible && p.r_knee.visible && p.l_hip.visible && p.r_hip.visible) {
        return false;
    }
    let thigh_l = (p.l_knee.ny - p.l_hip.ny).abs();
    let thigh_r = (p.r_knee.ny - p.r_hip.ny).abs();
    (thigh_l + thigh_r) / 2.0 < t.sit_thigh
}

fn standing(_: &PoseGeometry, _: &Thresholds) -> bool {
    true
}

/// Evaluated in order; the first matching rule wins.
const RULES: [(Action, Rule); 7] = [
    (Action::HandsUp, hands_up),
    (Action::HandsCrossed, hands_crossed),
    (Action::TPose, t_pose),
    (Action::OneHandLeft, one_hand_left),
    (Action::OneHandRight, one_hand_right),
    (Action::Sit, sit),
    (Action::Standing, standing),
];

/// Pose action classifier over a configurable threshold set.
#[derive(Debug, Clone, Default)]
pub struct LandmarkClassifier {
    thresholds: Thresholds,
}

impl LandmarkClassifier {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Classify a landmark set computed on a region of `h` x `w` pixels.
    ///
    /// Poor-quality poses (too few key joints visible) classify as
    /// [`Action::Standing`]; a landmark set missing key joints altogether is
    /// [`Action::Unknown`].
    pub fn classify(&self, landmarks: &[Landmark], h: f32, w: f32) -> Action {
        let t = &self.thresholds;
        let Some(pose) = PoseGeometry::new(landmarks, h, w, t) else {
            return Action::Unknown;
        };
        if pose.visible_joints() < t.min_visible_joints {
            return Action::Standing;
        }
        RULES
            .iter()
            .find(|(_, rule)| rule(&pose, t))
            .map(|(action, _)| *action)
            .unwrap_or(Action::Unknown)
    }

    /// Rules that match, in cascade order. Useful when tuning thresholds.
    pub fn matching_rules(&self, landmarks: &[Landmark], h: f32, w: f32) -> Vec<Action> {
        let t = &self.thresholds;
        match PoseGeometry::new(landmarks, h, w, t) {
            Some(pose) => RULES
                .iter()
                .filter(|(_, rule)| rule(&pose, t))
                .map(|(action, _)| *action)
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Classify with the default thresholds.
pub fn classify_action(landmarks: &[Landmark], h: f32, w: f32) -> Action {
    LandmarkClassifier::default().classify(landmarks, h, w)
}

/// Share of a full pose that is confidently visible: landmarks with
/// visibility above 0.5, saturating at 20.
pub fn pose_quality(landmarks: &[Landmark]) -> f32 {
    let visible = landmarks.iter().filter(|lm| lm.visibility > 0.5).count();
    (visible as f32 / 20.0).min(1.0)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Neutral standing pose, subject facing the camera (left side at larger x).
    pub(crate) fn standing_pose() -> Vec<Landmark> {
        let mut lms = vec![Landmark::new(0.5, 0.5, 0.9); POSE_LANDMARK_COUNT];
        lms[NOSE] = Landmark::new(0.5, 0.25, 0.9);
        lms[LEFT_SHOULDER] = Landmark::new(0.6, 0.3, 0.9);
        lms[RIGHT_SHOULDER] = Landmark::new(0.4, 0.3, 0.9);
        lms[LEFT_ELBOW] = Landmark::new(0.62, 0.45, 0.9);
        lms[RIGHT_ELBOW] = Landmark::new(0.38, 0.45, 0.9);
        lms[LEFT_WRIST] = Landmark::new(0.63, 0.6, 0.9);
        lms[RIGHT_WRIST] = Landmark::new(0.37, 0.6, 0.9);
        lms[LEFT_HIP] = Landmark::new(0.56, 0.6, 0.9);
        lms[RIGHT_HIP] = Landmark::new(0.44, 0.6, 0.9);
        lms[LEFT_KNEE] = Landmark::new(0.56, 0.9, 0.9);
        lms[RIGHT_KNEE] = Landmark::new(0.44, 0.9, 0.9);
        lms
    }

    pub(crate) fn hands_up_pose() -> Vec<Landmark> {
        let mut lms = standing_pose();
        lms[LEFT_WRIST] = Landmark::new(0.6, 0.02, 0.9);
        lms[RIGHT_WRIST] = Landmark::new(0.4, 0.02, 0.9);
        lms
    }

    const H: f32 = 400.0;
    const W: f32 = 300.0;

    #[test]
    fn test_standing() {
        assert_eq!(classify_action(&standing_pose(), H, W), Action::Standing);
    }

    #[test]
    fn test_hands_up() {
        assert_eq!(classify_action(&hands_up_pose(), H, W), Action::HandsUp);
    }

    #[test]
    fn test_hands_up_needs_full_margin() {
        let mut lms = standing_pose();
        // Only 0.07h above the nose: not enough for either hand.
        lms[LEFT_WRIST] = Landmark::new(0.6, 0.18, 0.9);
        lms[RIGHT_WRIST] = Landmark::new(0.4, 0.18, 0.9);
        assert_ne!(classify_action(&lms, H, W), Action::HandsUp);
    }

    #[test]
    fn test_hands_crossed() {
        let mut lms = standing_pose();
        lms[LEFT_WRIST] = Landmark::new(0.45, 0.35, 0.9);
        lms[RIGHT_WRIST] = Landmark::new(0.55, 0.35, 0.9);
        assert_eq!(classify_action(&lms, H, W), Action::HandsCrossed);

        // Either wrist order counts.
        lms[LEFT_WRIST] = Landmark::new(0.55, 0.35, 0.9);
        lms[RIGHT_WRIST] = Landmark::new(0.45, 0.35, 0.9);
        assert_eq!(classify_action(&lms, H, W), Action::HandsCrossed);

        // Both wrists on one side of the body are not crossed.
        lms[LEFT_WRIST] = Landmark::new(0.55, 0.35, 0.9);
        lms[RIGHT_WRIST] = Landmark::new(0.52, 0.35, 0.9);
        assert_ne!(classify_action(&lms, H, W), Action::HandsCrossed);

        // Wrists below the chest band are not crossed.
        lms[LEFT_WRIST] = Landmark::new(0.45, 0.6, 0.9);
        lms[RIGHT_WRIST] = Landmark::new(0.55, 0.6, 0.9);
        assert_ne!(classify_action(&lms, H, W), Action::HandsCrossed);
    }

    #[test]
    fn test_t_pose_either_orientation() {
        let mut lms = standing_pose();
        lms[LEFT_ELBOW] = Landmark::new(0.75, 0.3, 0.9);
        lms[RIGHT_ELBOW] = Landmark::new(0.25, 0.3, 0.9);
        lms[LEFT_WRIST] = Landmark::new(0.95, 0.31, 0.9);
        lms[RIGHT_WRIST] = Landmark::new(0.05, 0.31, 0.9);
        assert_eq!(classify_action(&lms, H, W), Action::TPose);

        // Mirrored image: flip every x.
        let mirrored: Vec<Landmark> = lms
            .iter()
            .map(|lm| Landmark::new(1.0 - lm.x, lm.y, lm.visibility))
            .collect();
        assert_eq!(classify_action(&mirrored, H, W), Action::TPose);
    }

    #[test]
    fn test_one_hand_raised() {
        let mut lms = standing_pose();
        lms[LEFT_WRIST] = Landmark::new(0.6, 0.02, 0.9);
        assert_eq!(classify_action(&lms, H, W), Action::OneHandLeft);

        let mut lms = standing_pose();
        lms[RIGHT_WRIST] = Landmark::new(0.4, 0.02, 0.9);
        assert_eq!(classify_action(&lms, H, W), Action::OneHandRight);
    }

    #[test]
    fn test_one_hand_raised_other_hidden() {
        let mut lms = standing_pose();
        lms[RIGHT_WRIST] = Landmark::new(0.4, 0.02, 0.9);
        lms[LEFT_WRIST].visibility = 0.1;
        assert_eq!(classify_action(&lms, H, W), Action::OneHandRight);
    }

    #[test]
    fn test_sit_vs_standing_thigh() {
        let mut lms = standing_pose();
        lms[LEFT_KNEE].y = lms[LEFT_HIP].y + 0.05;
        lms[RIGHT_KNEE].y = lms[RIGHT_HIP].y + 0.05;
        assert_eq!(classify_action(&lms, H, W), Action::Sit);

        lms[LEFT_KNEE].y = lms[LEFT_HIP].y + 0.30;
        lms[RIGHT_KNEE].y = lms[RIGHT_HIP].y + 0.30;
        assert_eq!(classify_action(&lms, H, W), Action::Standing);
    }

    #[test]
    fn test_quality_gate_defaults_to_standing() {
        let mut lms = hands_up_pose();
        for idx in [LEFT_KNEE, RIGHT_KNEE, LEFT_HIP] {
            lms[idx].visibility = 0.1;
        }
        // 8 of 11 key joints visible.
        assert_eq!(classify_action(&lms, H, W), Action::Standing);
    }

    #[test]
    fn test_truncated_landmarks_are_unknown() {
        let lms = standing_pose();
        assert_eq!(classify_action(&lms[..20], H, W), Action::Unknown);
    }

    #[test]
    fn test_matching_rules_in_cascade_order() {
        let classifier = LandmarkClassifier::default();
        let rules = classifier.matching_rules(&hands_up_pose(), H, W);
        assert_eq!(rules.first(), Some(&Action::HandsUp));
        assert_eq!(rules.last(), Some(&Action::Standing));
    }

    #[test]
    fn test_pose_quality() {
        assert_eq!(pose_quality(&standing_pose()), 1.0);
        let dim = vec![Landmark::new(0.5, 0.5, 0.2); POSE_LANDMARK_COUNT];
        assert_eq!(pose_quality(&dim), 0.0);
    }
}
