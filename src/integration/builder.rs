//! Builder for creating FaceDetection objects from various input formats.

use nalgebra::DVector;

use crate::tracker::{Embedding, FaceDetection, Rect};

/// Builder for creating `FaceDetection` objects from various box formats.
#[derive(Debug, Clone, Default)]
pub struct FaceDetectionBuilder {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    embedding: Vec<f32>,
}

impl FaceDetectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bounding box in TLBR format (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.x1 = x1;
        self.y1 = y1;
        self.x2 = x2;
        self.y2 = y2;
        self
    }

    /// Set bounding box in XYWH format (center_x, center_y, width, height).
    pub fn xywh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.x1 = cx - w / 2.0;
        self.y1 = cy - h / 2.0;
        self.x2 = cx + w / 2.0;
        self.y2 = cy + h / 2.0;
        self
    }

    /// Set bounding box in TLWH format (left, top, width, height).
    pub fn tlwh(mut self, x: f32, y: f32, w: f32, h: f32) -> Self {
        self.x1 = x;
        self.y1 = y;
        self.x2 = x + w;
        self.y2 = y + h;
        self
    }

    /// Set bounding box from face-recognition style (top, right, bottom, left).
    pub fn trbl(self, top: f32, right: f32, bottom: f32, left: f32) -> Self {
        self.tlbr(left, top, right, bottom)
    }

    pub fn embedding(mut self, values: &[f32]) -> Self {
        self.embedding = values.to_vec();
        self
    }

    /// Build the final `FaceDetection`.
    pub fn build(self) -> FaceDetection {
        let embedding: Embedding = DVector::from_vec(self.embedding);
        FaceDetection::from_rect(Rect::from_tlbr(self.x1, self.y1, self.x2, self.y2), embedding)
    }
}
