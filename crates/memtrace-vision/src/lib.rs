//! memtrace-vision: face detection and expression scoring.
//!
//! Uses the Ultra-Light RFB-320 detector to find faces and FER+ to score each
//! face's expression, both running via ONNX Runtime on the CPU.

pub mod detector;
pub mod expression;
pub mod resize;

use std::path::{Path, PathBuf};

use memtrace_core::{BoundingBox, Detection, DetectionFrame, ExpressionScores};
use thiserror::Error;

pub use detector::{DetectorError, FaceDetector};
pub use expression::{ClassifierError, ExpressionClassifier};

/// File name of the face detector model inside the model directory.
pub const DETECTOR_MODEL: &str = "version-RFB-320.onnx";
/// File name of the expression classifier model inside the model directory.
pub const EXPRESSION_MODEL: &str = "emotion-ferplus-8.onnx";

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("classifier error: {0}")]
    Classifier(#[from] ClassifierError),
}

/// Default model directory: `$XDG_DATA_HOME/memtrace/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("memtrace/models")
}

/// Detector + classifier pair producing whole [`DetectionFrame`]s.
pub struct FaceAnalyzer {
    detector: FaceDetector,
    classifier: ExpressionClassifier,
}

impl FaceAnalyzer {
    /// Load both models from `model_dir`.
    pub fn load(model_dir: &Path, min_confidence: f32) -> Result<Self, VisionError> {
        let detector_path = model_dir.join(DETECTOR_MODEL);
        let classifier_path = model_dir.join(EXPRESSION_MODEL);

        let detector = FaceDetector::load(&detector_path.to_string_lossy(), min_confidence)?;
        let classifier = ExpressionClassifier::load(&classifier_path.to_string_lossy())?;
        Ok(Self { detector, classifier })
    }

    /// Find every face in the frame and score its expression.
    ///
    /// `rgb` is interleaved RGB and `luma` the matching grayscale plane, both
    /// `width × height`. Faces come back strongest first.
    pub fn analyze(&mut self, rgb: &[u8], luma: &[u8], width: u32, height: u32) -> Result<DetectionFrame, VisionError> {
        let faces = self.detector.detect(rgb, width, height)?;
        let classifier = &mut self.classifier;
        let detections = score_faces(faces, |bbox| classifier.classify(luma, width, height, bbox))?;

        tracing::trace!(faces = detections.len(), "frame analyzed");
        Ok(DetectionFrame::new(detections))
    }
}

/// Score each face in order. A face whose crop falls outside the frame is
/// skipped; any other classifier error fails the whole frame.
fn score_faces<F>(faces: Vec<BoundingBox>, mut classify: F) -> Result<Vec<Detection>, ClassifierError>
where
    F: FnMut(&BoundingBox) -> Result<ExpressionScores, ClassifierError>,
{
    let mut detections = Vec::with_capacity(faces.len());
    for bbox in faces {
        match classify(&bbox) {
            Ok(expressions) => detections.push(Detection { bbox, expressions }),
            Err(ClassifierError::EmptyCrop(face)) => {
                tracing::warn!(?face, "skipping face with an empty crop");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(detections)
}
