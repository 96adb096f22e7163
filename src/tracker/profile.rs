use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::tracker::action::Action;
use crate::tracker::classifier::Landmark;
use crate::tracker::matching::Embedding;

/// Reference landmark sets captured at enrollment, keyed by action.
pub type ReferencePoses = BTreeMap<Action, Vec<Landmark>>;

/// An enrolled individual. The reference embedding is fixed at enrollment.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetProfile {
    name: String,
    embedding: Embedding,
    reference_poses: ReferencePoses,
}

impl TargetProfile {
    /// Create a profile. Fails if `embedding` is empty.
    pub fn new(name: impl Into<String>, embedding: Embedding) -> Result<Self> {
        let name = name.into();
        if embedding.is_empty() {
            return Err(Error::EmptyEmbedding(name));
        }
        Ok(Self {
            name,
            embedding,
            reference_poses: ReferencePoses::new(),
        })
    }

    /// Attach the poses captured at enrollment.
    pub fn with_reference_poses(mut self, poses: ReferencePoses) -> Self {
        self.reference_poses = poses;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn embedding(&self) -> &Embedding {
        &self.embedding
    }

    pub fn reference_poses(&self) -> &ReferencePoses {
        &self.reference_poses
    }

    pub fn reference_pose(&self, action: Action) -> Option<&[Landmark]> {
        self.reference_poses.get(&action).map(Vec::as_slice)
    }
}

/// File-system friendly form of a profile name: spaces become underscores.
/// Literal underscores and percent signs are percent-escaped so that
/// [`display_name`] recovers the name exactly.
pub fn safe_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars() {
        match c {
            ' ' => out.push('_'),
            '_' => out.push_str("%5F"),
            '%' => out.push_str("%25"),
            c => out.push(c),
        }
    }
    out
}

/// Inverse of [`safe_name`].
pub fn display_name(safe: &str) -> String {
    safe.replace('_', " ")
        .replace("%5F", "_")
        .replace("%25", "%")
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;

    #[test]
    fn test_rejects_empty_embedding() {
        let err = TargetProfile::new("ghost", DVector::from_vec(vec![])).unwrap_err();
        assert!(matches!(err, Error::EmptyEmbedding(name) if name == "ghost"));
    }

    #[test]
    fn test_reference_pose_lookup() {
        let mut poses = ReferencePoses::new();
        poses.insert(Action::Sit, vec![Landmark::new(0.5, 0.5, 1.0)]);
        let profile = TargetProfile::new("alice", DVector::from_vec(vec![0.1, 0.2]))
            .unwrap()
            .with_reference_poses(poses);
        assert_eq!(profile.reference_pose(Action::Sit).map(<[_]>::len), Some(1));
        assert!(profile.reference_pose(Action::HandsUp).is_none());
    }

    #[test]
    fn test_safe_name() {
        assert_eq!(safe_name(" Jane Doe "), "Jane_Doe");
        assert_eq!(safe_name("john_doe"), "john%5Fdoe");
    }

    #[test]
    fn test_display_name_reverses_safe_name() {
        for name in ["Jane Doe", "john_doe", "a_b c", "100%_sure"] {
            assert_eq!(display_name(&safe_name(name)), name);
        }
    }
}
