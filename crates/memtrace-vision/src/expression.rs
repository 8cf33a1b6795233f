//! FER+ facial expression classifier via ONNX Runtime.
//!
//! Scores a 64×64 grayscale face crop over eight expressions and reports the
//! seven that the installation's vocabulary knows about.

use memtrace_core::{BoundingBox, Expression, ExpressionScores};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

use crate::resize::{resize_region, Region};

const FERPLUS_INPUT_SIZE: usize = 64;
/// Crop side relative to the larger face box edge.
const FERPLUS_CROP_MARGIN: f32 = 1.1;

/// FER+ logit order. `contempt` has no counterpart and is dropped.
const FERPLUS_LABELS: [Option<Expression>; 8] = [
    Some(Expression::Neutral),
    Some(Expression::Happy),
    Some(Expression::Surprised),
    Some(Expression::Sad),
    Some(Expression::Angry),
    Some(Expression::Disgusted),
    Some(Expression::Fear),
    None,
];

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("model file not found: {0}; download emotion-ferplus-8.onnx and place it in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("face box {0:?} lies outside the frame")]
    EmptyCrop(BoundingBox),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// FER+ expression classifier.
pub struct ExpressionClassifier {
    session: Session,
}

impl ExpressionClassifier {
    pub fn load(model_path: &str) -> Result<Self, ClassifierError> {
        if !Path::new(model_path).exists() {
            return Err(ClassifierError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(1)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded FER+ expression classifier"
        );

        Ok(Self { session })
    }

    /// Score the expression of `face` in a luma plane.
    pub fn classify(
        &mut self,
        luma: &[u8],
        width: u32,
        height: u32,
        face: &BoundingBox,
    ) -> Result<ExpressionScores, ClassifierError> {
        let region = crop_region(face, width as f32, height as f32).ok_or(ClassifierError::EmptyCrop(*face))?;
        let input = preprocess(luma, width as usize, height as usize, region);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, logits) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::InferenceFailed(format!("logits: {e}")))?;

        scores_from_logits(logits)
    }
}

/// Square crop centered on the face, clamped to the frame.
fn crop_region(face: &BoundingBox, width: f32, height: f32) -> Option<Region> {
    let side = face.width.max(face.height) * FERPLUS_CROP_MARGIN;
    let cx = face.x + face.width / 2.0;
    let cy = face.y + face.height / 2.0;

    let x0 = (cx - side / 2.0).max(0.0);
    let y0 = (cy - side / 2.0).max(0.0);
    let x1 = (cx + side / 2.0).min(width);
    let y1 = (cy + side / 2.0).min(height);

    if x1 - x0 < 1.0 || y1 - y0 < 1.0 {
        return None;
    }
    Some(Region {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    })
}

/// FER+ takes raw 0–255 intensities, 1×1×64×64.
fn preprocess(luma: &[u8], width: usize, height: usize, region: Region) -> Array4<f32> {
    let crop = resize_region(luma, width, height, 1, region, FERPLUS_INPUT_SIZE, FERPLUS_INPUT_SIZE);
    Array4::from_shape_vec((1, 1, FERPLUS_INPUT_SIZE, FERPLUS_INPUT_SIZE), crop)
        .unwrap_or_else(|_| Array4::zeros((1, 1, FERPLUS_INPUT_SIZE, FERPLUS_INPUT_SIZE)))
}

/// Softmax over the eight FER+ logits, keyed by vocabulary name.
fn scores_from_logits(logits: &[f32]) -> Result<ExpressionScores, ClassifierError> {
    if logits.len() != FERPLUS_LABELS.len() {
        return Err(ClassifierError::InferenceFailed(format!(
            "expected {} logits, got {}",
            FERPLUS_LABELS.len(),
            logits.len()
        )));
    }

    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let total: f32 = exps.iter().sum();

    Ok(FERPLUS_LABELS
        .iter()
        .zip(exps)
        .filter_map(|(label, e)| label.map(|expr| (expr.as_str().to_string(), e / total)))
        .collect())
}
