/// Axis-aligned box in frame pixel coordinates.
///
/// Stored as TLWH (top-left x, top-left y, width, height); [`Rect::from_tlbr`]
/// and [`Rect::to_tlbr`] convert from and to corner form.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    /// Top-left x coordinate
    pub x: f32,
    /// Top-left y coordinate
    pub y: f32,
    /// Width of the bounding box
    pub width: f32,
    /// Height of the bounding box
    pub height: f32,
}

/// Added to the IoU denominator so empty boxes never divide by zero.
const IOU_EPSILON: f32 = 1e-5;

/// Vertical margin above the face, in face heights, included in the body box.
const BODY_TOP_MARGIN: f32 = 0.5;

impl Rect {
    /// Create a new Rect from top-left coordinates and dimensions (TLWH format).
    #[inline]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a Rect from TLBR format (top-left x, top-left y, bottom-right x, bottom-right y).
    #[inline]
    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        }
    }

    /// Convert to TLBR format: (x1, y1, x2, y2).
    #[inline]
    pub fn to_tlbr(&self) -> [f32; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    /// Convert to TLWH format: (x, y, width, height).
    #[inline]
    pub fn to_tlwh(&self) -> [f32; 4] {
        [self.x, self.y, self.width, self.height]
    }

    /// Get the center point of the bounding box.
    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Get the area of the bounding box.
    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Intersection over Union with another box.
    ///
    /// Symmetric; 0 for disjoint boxes. The denominator carries a small
    /// epsilon, so `a.iou(&a)` is 1 up to that epsilon.
    pub fn iou(&self, other: &Rect) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let inter_width = (x2 - x1).max(0.0);
        let inter_height = (y2 - y1).max(0.0);
        let inter_area = inter_width * inter_height;

        inter_area / (self.area() + other.area() - inter_area + IOU_EPSILON)
    }

    /// Body region below a face box, the region pose estimation runs on.
    ///
    /// Spans `expansion` face widths either side of the face center, starts
    /// half a face height above the face and runs to the bottom of the frame.
    /// Clipped to the frame.
    pub fn body_box(&self, frame_width: f32, frame_height: f32, expansion: f32) -> Rect {
        let face_cx = self.x + (self.width / 2.0).floor();
        let x1 = (face_cx - self.width * expansion).floor().max(0.0);
        let x2 = (face_cx + self.width * expansion).floor().min(frame_width);
        let y1 = (self.y - self.height * BODY_TOP_MARGIN).floor().max(0.0);
        let y2 = frame_height;
        Rect::from_tlbr(x1, y1, x2.max(x1), y2.max(y1))
    }

    /// Exponential blend toward `current`; `weight` is the share kept from `self`.
    pub fn blend(&self, current: &Rect, weight: f32) -> Rect {
        let mix = |prev: f32, curr: f32| (weight * prev + (1.0 - weight) * curr).trunc();
        let [px1, py1, px2, py2] = self.to_tlbr();
        let [cx1, cy1, cx2, cy2] = current.to_tlbr();
        Rect::from_tlbr(mix(px1, cx1), mix(py1, cy1), mix(px2, cx2), mix(py2, cy2))
    }

    /// Whether moving from `self` to `next` in one frame is a believable
    /// tracker step: corner displacement and size change both stay within
    /// `factor` times the larger side of `self`.
    pub fn is_plausible_step(&self, next: &Rect, factor: f32) -> bool {
        let [ox1, oy1, ox2, oy2] = self.to_tlbr();
        let [nx1, ny1, nx2, ny2] = next.to_tlbr();
        let dx = (nx1 - ox1).abs() + (nx2 - ox2).abs();
        let dy = (ny1 - oy1).abs() + (ny2 - oy2).abs();
        let size_change = (next.width - self.width).abs() + (next.height - self.height).abs();

        let max_movement = self.width.max(self.height) * factor;
        let max_size_change = (self.width + self.height) * factor;
        dx <= max_movement && dy <= max_movement && size_change <= max_size_change
    }
}

use ndarray::Array2;

/// Calculate IoU matrix between two sets of bounding boxes.
///
/// Returns a matrix of shape (M, N) where M is the length of `boxes_a`
/// and N is the length of `boxes_b`.
pub fn iou_batch(boxes_a: &[Rect], boxes_b: &[Rect]) -> Array2<f32> {
    let mut ious = Array2::zeros((boxes_a.len(), boxes_b.len()));
    for (i, a) in boxes_a.iter().enumerate() {
        for (j, b) in boxes_b.iter().enumerate() {
            ious[[i, j]] = a.iou(b);
        }
    }
    ious
}
