//! Guided enrollment: one face capture followed by a fixed series of
//! reference poses.

use crate::tracker::action::Action;
use crate::tracker::classifier::{Landmark, LandmarkClassifier};
use crate::tracker::profile::ReferencePoses;
use crate::tracker::rect::Rect;

/// Poses captured after the face, in order.
pub const ENROLLMENT_POSES: [Action; 4] = [
    Action::OneHandLeft,
    Action::OneHandRight,
    Action::Sit,
    Action::Standing,
];

/// Smallest face area, as a share of the frame, accepted for enrollment.
const MIN_FACE_AREA_RATIO: f32 = 0.02;
/// Landmarks with visibility above 0.5 required for a reference pose.
const MIN_VISIBLE_POSE_LANDMARKS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentStep {
    Face,
    Pose(Action),
    Done,
}

/// Why a capture was refused; the session stays on the same step.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureRejected {
    /// Face capture needs exactly one face in view.
    FaceCount(usize),
    FaceTooSmall { area_ratio: f32 },
    NoPose,
    PoseUnclear { visible: usize },
    PoseMismatch { expected: Action, detected: Action },
    Finished,
}

/// Enrollment state machine for one new profile.
#[derive(Debug, Clone)]
pub struct EnrollmentSession {
    name: String,
    step: EnrollmentStep,
    face_box: Option<Rect>,
    poses: ReferencePoses,
    classifier: LandmarkClassifier,
}

impl EnrollmentSession {
    /// Start enrolling `name` at the face step.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            step: EnrollmentStep::Face,
            face_box: None,
            poses: ReferencePoses::new(),
            classifier: LandmarkClassifier::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Step waiting for a capture.
    pub fn step(&self) -> EnrollmentStep {
        self.step
    }

    pub fn face_box(&self) -> Option<Rect> {
        self.face_box
    }

    pub fn is_done(&self) -> bool {
        self.step == EnrollmentStep::Done
    }

    /// Accept the face step from the faces detected in a `frame_w` x `frame_h` frame.
    pub fn capture_face(
        &mut self,
        faces: &[Rect],
        frame_w: f32,
        frame_h: f32,
    ) -> Result<EnrollmentStep, CaptureRejected> {
        if self.step != EnrollmentStep::Face {
            return Err(CaptureRejected::Finished);
        }
        let [face] = faces else {
            return Err(CaptureRejected::FaceCount(faces.len()));
        };
        let area_ratio = face.area() / (frame_w * frame_h).max(1.0);
        if area_ratio < MIN_FACE_AREA_RATIO {
            return Err(CaptureRejected::FaceTooSmall { area_ratio });
        }
        self.face_box = Some(*face);
        self.step = EnrollmentStep::Pose(ENROLLMENT_POSES[0]);
        Ok(self.step)
    }

    /// Accept the current pose step if the landmarks are clear and classify
    /// as the requested action.
    pub fn capture_pose(
        &mut self,
        landmarks: Option<&[Landmark]>,
        h: f32,
        w: f32,
    ) -> Result<EnrollmentStep, CaptureRejected> {
        let EnrollmentStep::Pose(expected) = self.step else {
            return Err(CaptureRejected::Finished);
        };
        let landmarks = landmarks.ok_or(CaptureRejected::NoPose)?;
        let visible = landmarks.iter().filter(|lm| lm.visibility > 0.5).count();
        if visible < MIN_VISIBLE_POSE_LANDMARKS {
            return Err(CaptureRejected::PoseUnclear { visible });
        }
        let detected = self.classifier.classify(landmarks, h, w);
        if detected != expected {
            return Err(CaptureRejected::PoseMismatch { expected, detected });
        }

        self.poses.insert(expected, landmarks.to_vec());
        let next = ENROLLMENT_POSES
            .iter()
            .position(|&a| a == expected)
            .and_then(|i| ENROLLMENT_POSES.get(i + 1));
        self.step = match next {
            Some(&action) => EnrollmentStep::Pose(action),
            None => EnrollmentStep::Done,
        };
        Ok(self.step)
    }

    /// Captured reference poses, keyed by action.
    pub fn into_poses(self) -> ReferencePoses {
        self.poses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::classifier::tests::standing_pose;
    use crate::tracker::classifier::{LEFT_HIP, LEFT_KNEE, LEFT_WRIST, RIGHT_HIP, RIGHT_KNEE, RIGHT_WRIST};

    const H: f32 = 400.0;
    const W: f32 = 300.0;

    fn left_hand() -> Vec<Landmark> {
        let mut lms = standing_pose();
        lms[LEFT_WRIST] = Landmark::new(0.6, 0.02, 0.9);
        lms
    }

    fn right_hand() -> Vec<Landmark> {
        let mut lms = standing_pose();
        lms[RIGHT_WRIST] = Landmark::new(0.4, 0.02, 0.9);
        lms
    }

    fn sitting() -> Vec<Landmark> {
        let mut lms = standing_pose();
        lms[LEFT_KNEE].y = lms[LEFT_HIP].y + 0.05;
        lms[RIGHT_KNEE].y = lms[RIGHT_HIP].y + 0.05;
        lms
    }

    #[test]
    fn test_face_step_requires_single_large_face() {
        let mut session = EnrollmentSession::new("alice");
        let big = Rect::new(100.0, 100.0, 120.0, 120.0);
        let small = Rect::new(0.0, 0.0, 10.0, 10.0);

        assert_eq!(
            session.capture_face(&[big, big], 640.0, 480.0),
            Err(CaptureRejected::FaceCount(2))
        );
        assert!(matches!(
            session.capture_face(&[small], 640.0, 480.0),
            Err(CaptureRejected::FaceTooSmall { .. })
        ));
        assert_eq!(
            session.capture_face(&[big], 640.0, 480.0),
            Ok(EnrollmentStep::Pose(Action::OneHandLeft))
        );
    }

    #[test]
    fn test_full_session() {
        let mut session = EnrollmentSession::new("alice");
        session
            .capture_face(&[Rect::new(100.0, 100.0, 120.0, 120.0)], 640.0, 480.0)
            .unwrap();

        // Wrong pose keeps the step.
        assert_eq!(
            session.capture_pose(Some(&right_hand()[..]), H, W),
            Err(CaptureRejected::PoseMismatch {
                expected: Action::OneHandLeft,
                detected: Action::OneHandRight
            })
        );
        assert_eq!(session.capture_pose(None, H, W), Err(CaptureRejected::NoPose));

        for pose in [left_hand(), right_hand(), sitting(), standing_pose()] {
            session.capture_pose(Some(&pose[..]), H, W).unwrap();
        }
        assert!(session.is_done());
        assert_eq!(
            session.capture_pose(Some(&standing_pose()[..]), H, W),
            Err(CaptureRejected::Finished)
        );

        let poses = session.into_poses();
        assert_eq!(poses.len(), 4);
        assert!(poses.contains_key(&Action::Sit));
    }

    #[test]
    fn test_unclear_pose_rejected() {
        let mut session = EnrollmentSession::new("alice");
        session
            .capture_face(&[Rect::new(100.0, 100.0, 120.0, 120.0)], 640.0, 480.0)
            .unwrap();
        let mut dim = left_hand();
        for lm in dim.iter_mut().skip(10) {
            lm.visibility = 0.1;
        }
        assert_eq!(
            session.capture_pose(Some(&dim[..]), H, W),
            Err(CaptureRejected::PoseUnclear { visible: 10 })
        );
    }
}
