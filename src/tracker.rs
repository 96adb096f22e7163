mod action;
mod alert;
mod classifier;
mod enrollment;
mod eye;
mod guard_tracker;
mod matching;
mod overlap;
mod profile;
mod rect;
mod reid;
mod smoothing;
mod track_state;
mod watchlist;

pub use action::{Action, ParseActionError};
pub use alert::{ActionTimer, AlertStatus, SleepMonitor, SleepTransition};
pub use classifier::{
    Landmark, LandmarkClassifier, POSE_LANDMARK_COUNT, Thresholds, classify_action, pose_quality,
};
pub use enrollment::{CaptureRejected, ENROLLMENT_POSES, EnrollmentSession, EnrollmentStep};
pub use eye::{eye_aspect_ratio, measured_ear};
pub use guard_tracker::{
    Alert, AlertKind, Assignment, DetectionOutcome, GuardTracker, PoseUpdate, TargetStatus,
};
pub use matching::{
    AssignmentResult, Embedding, EmbeddingMetric, Euclidean, FaceDetection, cosine_similarity,
    embedding_distance, greedy_assignment, linear_assignment,
};
pub use overlap::{OverlapCandidate, OverlapResolution, resolve_overlaps};
pub use profile::{ReferencePoses, TargetProfile, display_name, safe_name};
pub use rect::{Rect, iou_batch};
pub use reid::{GalleryEntry, ReidGallery, ReidMatch};
pub use smoothing::ActionBuffer;
pub use track_state::{LossReason, TrackPhase, TrackState};
pub use watchlist::{WantedSighting, Watchlist};
