//! Enrollment data on disk.
//!
//! Profiles live in `guard_profiles_dir` as `target_<Name>_face.jpg`, with
//! spaces in the name stored as underscores (see [`safe_name`]). Reference poses live in
//! `pose_references_dir` as `<Name>_poses.json`, a map from action label to
//! the captured landmark list.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::integration::detector::FaceEncoder;
use crate::tracker::{ReferencePoses, TargetProfile, display_name, safe_name};

const FACE_PREFIX: &str = "target_";
const FACE_SUFFIX: &str = "_face.jpg";
const POSES_SUFFIX: &str = "_poses.json";

#[derive(Debug, Clone)]
pub struct ProfileStore {
    profiles_dir: PathBuf,
    poses_dir: PathBuf,
}

impl ProfileStore {
    pub fn new(profiles_dir: impl Into<PathBuf>, poses_dir: impl Into<PathBuf>) -> Self {
        Self {
            profiles_dir: profiles_dir.into(),
            poses_dir: poses_dir.into(),
        }
    }

    pub fn from_config(storage: &StorageConfig) -> Self {
        Self::new(&storage.guard_profiles_dir, &storage.pose_references_dir)
    }

    pub fn face_image_path(&self, name: &str) -> PathBuf {
        self.profiles_dir
            .join(format!("{FACE_PREFIX}{}{FACE_SUFFIX}", safe_name(name)))
    }

    pub fn poses_path(&self, name: &str) -> PathBuf {
        self.poses_dir
            .join(format!("{}{POSES_SUFFIX}", safe_name(name)))
    }

    /// Display names of every enrolled profile, sorted. A missing directory
    /// holds no profiles.
    pub fn list_names(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.profiles_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&self.profiles_dir, e)),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&self.profiles_dir, e))?;
            let file_name = entry.file_name();
            let Some(stem) = file_name
                .to_str()
                .and_then(|f| f.strip_prefix(FACE_PREFIX))
                .and_then(|f| f.strip_suffix(FACE_SUFFIX))
            else {
                continue;
            };
            if !stem.is_empty() {
                names.push(display_name(stem));
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Reference poses of `name`; empty when none were captured.
    pub fn load_reference_poses(&self, name: &str) -> Result<ReferencePoses> {
        let path = self.poses_path(name);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(Error::io(&path, e)),
        };
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save_reference_poses(&self, name: &str, poses: &ReferencePoses) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.poses_dir).map_err(|e| Error::io(&self.poses_dir, e))?;
        let path = self.poses_path(name);
        let json = serde_json::to_string_pretty(poses)?;
        std::fs::write(&path, json).map_err(|e| Error::io(&path, e))?;
        log::info!("saved {} reference poses for {name}", poses.len());
        Ok(path)
    }

    /// Encode the face image of `name` and attach its reference poses.
    pub fn load_profile<E: FaceEncoder>(&self, name: &str, encoder: &mut E) -> Result<TargetProfile> {
        let image = self.face_image_path(name);
        if !image.is_file() {
            return Err(Error::UnknownProfile(name.to_string()));
        }
        let embedding = encoder
            .encode(&image)
            .map_err(|e| Error::Encoder {
                path: image.clone(),
                message: e.to_string(),
            })?
            .ok_or_else(|| Error::NoFaceFound(image.clone()))?;
        let poses = self.load_reference_poses(name)?;
        Ok(TargetProfile::new(name, embedding)?.with_reference_poses(poses))
    }

    /// Every profile that loads; failures are logged and skipped.
    pub fn load_all<E: FaceEncoder>(&self, encoder: &mut E) -> Result<Vec<TargetProfile>> {
        let mut profiles = Vec::new();
        for name in self.list_names()? {
            match self.load_profile(&name, encoder) {
                Ok(profile) => profiles.push(profile),
                Err(e) => log::warn!("skipping profile {name}: {e}"),
            }
        }
        log::info!("loaded {} guard profiles", profiles.len());
        Ok(profiles)
    }

    /// Delete the face image and reference poses of `name`. Returns whether
    /// anything was removed.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let mut removed = false;
        for path in [self.face_image_path(name), self.poses_path(name)] {
            match std::fs::remove_file(&path) {
                Ok(()) => removed = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io(&path, e)),
            }
        }
        if removed {
            log::info!("removed profile {name}");
        }
        Ok(removed)
    }
}
