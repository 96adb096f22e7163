//! Identity matching between enrolled profiles and detected faces.

use nalgebra::DVector;
use ndarray::Array2;

use crate::tracker::rect::Rect;

/// Face embedding vector.
pub type Embedding = DVector<f32>;

/// A detected face with its identity embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceDetection {
    /// Face bounding box in frame pixels.
    pub bbox: Rect,
    pub embedding: Embedding,
}

impl FaceDetection {
    /// Create a detection from a TLBR box (x1, y1, x2, y2).
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, embedding: Embedding) -> Self {
        Self {
            bbox: Rect::from_tlbr(x1, y1, x2, y2),
            embedding,
        }
    }

    /// Create a detection from an existing box.
    pub fn from_rect(bbox: Rect, embedding: Embedding) -> Self {
        Self { bbox, embedding }
    }
}

/// Distance between two embeddings; smaller means more alike.
pub trait EmbeddingMetric: Send + Sync {
    fn distance(&self, a: &Embedding, b: &Embedding) -> f32;
}

/// L2 distance, the metric face-recognition embeddings are trained for.
/// Embeddings of different dimension are infinitely far apart.
#[derive(Debug, Clone, Copy, Default)]
pub struct Euclidean;

impl EmbeddingMetric for Euclidean {
    fn distance(&self, a: &Embedding, b: &Embedding) -> f32 {
        if a.len() != b.len() {
            return f32::INFINITY;
        }
        (a - b).norm()
    }
}

/// Cosine similarity in [-1, 1]; 0 when either vector is zero or the
/// dimensions differ.
pub fn cosine_similarity(a: &Embedding, b: &Embedding) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let denom = a.norm() * b.norm();
    if denom <= f32::EPSILON {
        return 0.0;
    }
    a.dot(b) / denom
}

/// Distance matrix between reference embeddings (rows) and detections (columns).
pub fn embedding_distance(
    metric: &dyn EmbeddingMetric,
    references: &[&Embedding],
    detections: &[FaceDetection],
) -> Array2<f32> {
    let mut dists = Array2::zeros((references.len(), detections.len()));
    for (i, r) in references.iter().enumerate() {
        for (j, d) in detections.iter().enumerate() {
            dists[[i, j]] = metric.distance(r, &d.embedding);
        }
    }
    dists
}

#[derive(Debug, Clone)]
pub struct AssignmentResult {
    /// (row, column) pairs.
    pub matches: Vec<(usize, usize)>,
    pub unmatched_rows: Vec<usize>,
    pub unmatched_cols: Vec<usize>,
}

impl AssignmentResult {
    fn from_matches(matches: Vec<(usize, usize)>, num_rows: usize, num_cols: usize) -> Self {
        let mut row_used = vec![false; num_rows];
        let mut col_used = vec![false; num_cols];
        for &(r, c) in &matches {
            row_used[r] = true;
            col_used[c] = true;
        }
        let unused = |used: Vec<bool>| {
            used.iter()
                .enumerate()
                .filter_map(|(i, &u)| if u { None } else { Some(i) })
                .collect()
        };
        Self {
            matches,
            unmatched_rows: unused(row_used),
            unmatched_cols: unused(col_used),
        }
    }
}

/// Greedy bipartite matching: every pair strictly below `thresh`, in
/// ascending cost order, skipping rows and columns already claimed.
///
/// Equal costs keep row-major order, so the result is deterministic.
pub fn greedy_assignment(cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    let mut candidates: Vec<(f32, usize, usize)> = cost_matrix
        .indexed_iter()
        .filter(|&(_, &cost)| cost < thresh)
        .map(|((i, j), &cost)| (cost, i, j))
        .collect();
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut row_used = vec![false; num_rows];
    let mut col_used = vec![false; num_cols];
    let mut matches = Vec::new();
    for (_, i, j) in candidates {
        if row_used[i] || col_used[j] {
            continue;
        }
        row_used[i] = true;
        col_used[j] = true;
        matches.push((i, j));
    }

    AssignmentResult::from_matches(matches, num_rows, num_cols)
}

/// Minimum-cost assignment (Jonker-Volgenant), keeping only pairs strictly
/// below `thresh`.
pub fn linear_assignment(cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 || num_cols == 0 {
        return AssignmentResult::from_matches(vec![], num_rows, num_cols);
    }

    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), 1e6);

    for i in 0..num_rows {
        for j in 0..num_cols {
            let cost = cost_matrix[[i, j]];
            // Out-of-tolerance pairs are priced like padding.
            padded[[i, j]] = if cost.is_finite() && cost < thresh {
                cost as f64
            } else {
                1e6
            };
        }
    }

    let mut matches = vec![];
    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row_idx, &col_idx) in row_to_col.iter().enumerate() {
                if row_idx >= num_rows || col_idx >= num_cols {
                    continue;
                }
                if cost_matrix[[row_idx, col_idx]] < thresh {
                    matches.push((row_idx, col_idx));
                }
            }
        }
        Err(_) => {
            log::warn!("linear assignment solver failed, falling back to greedy");
            return greedy_assignment(cost_matrix, thresh);
        }
    }

    AssignmentResult::from_matches(matches, num_rows, num_cols)
}
