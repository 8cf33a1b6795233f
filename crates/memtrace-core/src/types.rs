use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-category expression confidences for one face, keyed by category name
/// (`"neutral"`, `"happy"`, ...). Scores are expected in [0, 1].
pub type ExpressionScores = BTreeMap<String, f32>;

/// Bounding box for a detected face, in source-frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection-over-union with another box; 0.0 when the union is empty.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);

        let overlap = (right - left).max(0.0) * (bottom - top).max(0.0);
        let union = self.area() + other.area() - overlap;
        if union > 0.0 {
            overlap / union
        } else {
            0.0
        }
    }
}

/// One detected face with its expression scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub expressions: ExpressionScores,
}

/// Everything the detector saw in one frame.
///
/// Published as a whole snapshot; consumers never see a partially updated set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionFrame {
    pub detections: Vec<Detection>,
}

impl DetectionFrame {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn face_count(&self) -> usize {
        self.detections.len()
    }

    /// The detection that drives the emotion (single-subject installation).
    pub fn primary(&self) -> Option<&Detection> {
        self.detections.first()
    }
}
