//! Anonymous re-identification gallery.
//!
//! Faces no enrolled profile claimed are matched against a gallery of
//! `Person_NNN` identities by cosine similarity. Gallery features drift
//! toward each new observation; enrolled profiles never do.

use crate::config::ReidConfig;
use crate::tracker::matching::{Embedding, cosine_similarity};

#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub id: String,
    pub feature: Embedding,
    pub first_seen: u64,
    pub last_seen: u64,
    pub sightings: u32,
}

/// Result of identifying one face against the gallery.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ReidMatch {
    pub id: String,
    /// Similarity to the stored feature; 1.0 for a freshly enrolled identity.
    pub similarity: f32,
    pub is_new: bool,
}

#[derive(Debug, Clone)]
pub struct ReidGallery {
    entries: Vec<GalleryEntry>,
    next_id: u32,
    similarity_threshold: f32,
    drift_alpha: f32,
}

impl ReidGallery {
    /// Empty gallery with the configured threshold and drift.
    pub fn new(config: &ReidConfig) -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
            similarity_threshold: config.similarity_threshold,
            drift_alpha: config.drift_alpha,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Identities in enrollment order.
    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    /// Identity with the given `Person_NNN` id.
    pub fn get(&self, id: &str) -> Option<&GalleryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Match `feature` to the most similar identity at or above the
    /// threshold, drifting its feature, or enroll a new identity.
    pub fn identify(&mut self, feature: &Embedding, frame_id: u64) -> ReidMatch {
        let best = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(&e.feature, feature)))
            .filter(|&(_, sim)| sim >= self.similarity_threshold)
            .max_by(|a, b| a.1.total_cmp(&b.1));

        if let Some((idx, similarity)) = best {
            let alpha = self.drift_alpha;
            let entry = &mut self.entries[idx];
            entry.feature = &entry.feature * (1.0 - alpha) + feature * alpha;
            entry.last_seen = frame_id;
            entry.sightings += 1;
            log::debug!("reid: {} seen again ({similarity:.2})", entry.id);
            return ReidMatch {
                id: entry.id.clone(),
                similarity,
                is_new: false,
            };
        }

        let id = format!("Person_{:03}", self.next_id);
        self.next_id += 1;
        log::info!("reid: new identity {id}");
        self.entries.push(GalleryEntry {
            id: id.clone(),
            feature: feature.clone(),
            first_seen: frame_id,
            last_seen: frame_id,
            sightings: 1,
        });
        ReidMatch {
            id,
            similarity: 1.0,
            is_new: true,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_id = 1;
    }
}
