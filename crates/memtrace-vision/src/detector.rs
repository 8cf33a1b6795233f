//! Ultra-Light-Fast face detector (RFB-320) via ONNX Runtime.
//!
//! The model takes a 320×240 RGB image and scores a fixed set of priors,
//! emitting per-prior `[background, face]` probabilities and corner-form boxes
//! normalized to the input. Boxes are mapped back to frame pixels and
//! de-duplicated with NMS.

use memtrace_core::BoundingBox;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

use crate::resize::{resize_region, Region};

const RFB_INPUT_WIDTH: usize = 320;
const RFB_INPUT_HEIGHT: usize = 240;
const RFB_MEAN: f32 = 127.0;
const RFB_STD: f32 = 128.0;
const RFB_NMS_THRESHOLD: f32 = 0.3;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}; download version-RFB-320.onnx and place it in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// RFB-320 face detector.
pub struct FaceDetector {
    session: Session,
    /// Output slots for (scores, boxes), discovered by name at load time.
    outputs: (usize, usize),
    min_confidence: f32,
}

impl FaceDetector {
    /// Load the detector model; faces scoring at or below `min_confidence` are dropped.
    pub fn load(model_path: &str, min_confidence: f32) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?output_names,
            "loaded RFB-320 face detector"
        );

        if output_names.len() < 2 {
            return Err(DetectorError::InferenceFailed(format!(
                "detector requires 2 outputs (scores, boxes), got {}",
                output_names.len()
            )));
        }
        let outputs = discover_outputs(&output_names);
        tracing::debug!(?outputs, "detector output mapping");

        Ok(Self {
            session,
            outputs,
            min_confidence,
        })
    }

    /// Detect faces in an interleaved RGB frame, sorted by confidence.
    pub fn detect(&mut self, rgb: &[u8], width: u32, height: u32) -> Result<Vec<BoundingBox>, DetectorError> {
        let input = preprocess(rgb, width as usize, height as usize);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (score_idx, box_idx) = self.outputs;
        let (_, scores) = outputs[score_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("scores: {e}")))?;
        let (_, boxes) = outputs[box_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("boxes: {e}")))?;

        let candidates = decode(scores, boxes, width as f32, height as f32, self.min_confidence);
        Ok(nms(candidates, RFB_NMS_THRESHOLD))
    }
}

/// Find the `scores` and `boxes` outputs by name, else assume that order.
fn discover_outputs(names: &[String]) -> (usize, usize) {
    let find = |target: &str| names.iter().position(|n| n == target);
    match (find("scores"), find("boxes")) {
        (Some(scores), Some(boxes)) => (scores, boxes),
        _ => {
            tracing::info!(?names, "detector output names not recognized, using positional [0]=scores, [1]=boxes");
            (0, 1)
        }
    }
}

/// Resize to 320×240 and normalize into an NCHW tensor.
fn preprocess(rgb: &[u8], width: usize, height: usize) -> Array4<f32> {
    let resized = resize_region(rgb, width, height, 3, Region::full(width, height), RFB_INPUT_WIDTH, RFB_INPUT_HEIGHT);

    let mut tensor = Array4::<f32>::zeros((1, 3, RFB_INPUT_HEIGHT, RFB_INPUT_WIDTH));
    for y in 0..RFB_INPUT_HEIGHT {
        for x in 0..RFB_INPUT_WIDTH {
            let base = (y * RFB_INPUT_WIDTH + x) * 3;
            for c in 0..3 {
                tensor[[0, c, y, x]] = (resized[base + c] - RFB_MEAN) / RFB_STD;
            }
        }
    }
    tensor
}

/// Turn per-prior outputs into frame-space boxes above `threshold`.
///
/// `scores` holds `[background, face]` pairs, `boxes` holds normalized
/// `[x1, y1, x2, y2]` quadruples, one per prior.
fn decode(scores: &[f32], boxes: &[f32], width: f32, height: f32, threshold: f32) -> Vec<BoundingBox> {
    scores
        .chunks_exact(2)
        .zip(boxes.chunks_exact(4))
        .filter(|(score, _)| score[1] > threshold)
        .map(|(score, b)| {
            let x1 = (b[0] * width).clamp(0.0, width);
            let y1 = (b[1] * height).clamp(0.0, height);
            let x2 = (b[2] * width).clamp(0.0, width);
            let y2 = (b[3] * height).clamp(0.0, height);
            BoundingBox {
                x: x1,
                y: y1,
                width: (x2 - x1).max(0.0),
                height: (y2 - y1).max(0.0),
                confidence: score[1],
            }
        })
        .filter(|b| b.area() > 0.0)
        .collect()
}

/// Greedy non-maximum suppression, highest confidence first.
fn nms(mut candidates: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<BoundingBox> = Vec::new();
    for candidate in candidates {
        if kept.iter().all(|k| k.iou(&candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bbox(x: f32, y: f32, w: f32, h: f32, conf: f32) -> BoundingBox {
        BoundingBox { x, y, width: w, height: h, confidence: conf }
    }

    #[test]
    fn test_decode_scales_to_frame() {
        let scores = [0.9, 0.1, 0.2, 0.8];
        let boxes = [0.0, 0.0, 0.5, 0.5, 0.25, 0.5, 0.75, 1.0];
        let faces = decode(&scores, &boxes, 640.0, 480.0, 0.5);

        assert_eq!(faces.len(), 1);
        let f = faces[0];
        assert!((f.x - 160.0).abs() < 1e-3);
        assert!((f.y - 240.0).abs() < 1e-3);
        assert!((f.width - 320.0).abs() < 1e-3);
        assert!((f.height - 240.0).abs() < 1e-3);
        assert!((f.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_decode_clamps_and_drops_degenerate() {
        let scores = [0.0, 0.9, 0.0, 0.95];
        let boxes = [-0.2, -0.1, 0.3, 0.4, 1.2, 0.2, 1.5, 0.6];
        let faces = decode(&scores, &boxes, 100.0, 100.0, 0.5);

        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].x, 0.0);
        assert_eq!(faces[0].y, 0.0);
        assert!((faces[0].width - 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_decode_threshold_is_exclusive() {
        let faces = decode(&[0.5, 0.5], &[0.1, 0.1, 0.2, 0.2], 10.0, 10.0, 0.5);
        assert!(faces.is_empty());
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let candidates = vec![
            make_bbox(5.0, 5.0, 100.0, 100.0, 0.8),
            make_bbox(200.0, 200.0, 50.0, 50.0, 0.7),
            make_bbox(0.0, 0.0, 100.0, 100.0, 0.9),
        ];
        let kept = nms(candidates, 0.3);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
        assert!((kept[1].confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(vec![], 0.3).is_empty());
    }

    #[test]
    fn test_discover_outputs() {
        let named: Vec<String> = ["boxes", "scores"].iter().map(|s| s.to_string()).collect();
        assert_eq!(discover_outputs(&named), (1, 0));

        let generic: Vec<String> = ["out0", "out1"].iter().map(|s| s.to_string()).collect();
        assert_eq!(discover_outputs(&generic), (0, 1));
    }

    #[test]
    fn test_preprocess_normalizes() {
        let rgb = vec![127u8; 64 * 48 * 3];
        let tensor = preprocess(&rgb, 64, 48);
        assert_eq!(tensor.shape(), &[1, 3, 240, 320]);
        assert!(tensor.iter().all(|v| v.abs() < 1e-5));
    }
}
