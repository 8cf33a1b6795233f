//! Dominant-expression selection and detector → dataset label remapping.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::dataset::EmotionClass;
use crate::types::{DetectionFrame, ExpressionScores};

/// The closed expression vocabulary reported by the face detector.
///
/// Declaration order doubles as the tie-break priority when two categories
/// score exactly the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Expression {
    Neutral,
    Happy,
    Angry,
    Sad,
    Disgusted,
    Surprised,
    Fear,
}

impl Expression {
    pub const ALL: [Expression; 7] = [
        Expression::Neutral,
        Expression::Happy,
        Expression::Angry,
        Expression::Sad,
        Expression::Disgusted,
        Expression::Surprised,
        Expression::Fear,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Expression::Neutral => "neutral",
            Expression::Happy => "happy",
            Expression::Angry => "angry",
            Expression::Sad => "sad",
            Expression::Disgusted => "disgusted",
            Expression::Surprised => "surprised",
            Expression::Fear => "fear",
        }
    }

    /// Dataset label for this expression (DailyDialog coding).
    pub fn dataset_class(self) -> EmotionClass {
        let code = match self {
            Expression::Neutral => "0",
            Expression::Happy => "4",
            Expression::Angry => "1",
            Expression::Sad => "5",
            Expression::Disgusted => "2",
            Expression::Surprised => "6",
            Expression::Fear => "3",
        };
        EmotionClass::new(code)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown expression category: {0}")]
pub struct UnknownExpression(pub String);

impl FromStr for Expression {
    type Err = UnknownExpression;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expression::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| UnknownExpression(s.to_string()))
    }
}

/// Map a detector category name to a dataset label. Unknown names map to neutral.
pub fn map_category(name: &str) -> EmotionClass {
    name.parse::<Expression>()
        .map(Expression::dataset_class)
        .unwrap_or_else(|_| EmotionClass::neutral())
}

/// Ranking key for tie-breaks: known categories by vocabulary order, then
/// unknown names lexicographically.
fn priority(name: &str) -> (usize, &str) {
    match Expression::ALL.iter().position(|e| e.as_str() == name) {
        Some(rank) => (rank, ""),
        None => (Expression::ALL.len(), name),
    }
}

/// Highest-scoring category in `scores`. Non-finite scores are ignored.
pub fn dominant_category(scores: &ExpressionScores) -> Option<(&str, f32)> {
    scores
        .iter()
        .filter(|(_, score)| score.is_finite())
        .map(|(name, &score)| (name.as_str(), score))
        .max_by(|(a_name, a), (b_name, b)| {
            a.partial_cmp(b)
                .unwrap_or(Ordering::Equal)
                // On equal scores the higher-priority (lower-ranked) name wins.
                .then_with(|| priority(b_name).cmp(&priority(a_name)))
        })
}

/// Dominant category of the first detection, for diagnostics.
pub fn dominant_expression(frame: &DetectionFrame) -> Option<(&str, f32)> {
    frame
        .primary()
        .and_then(|detection| dominant_category(&detection.expressions))
}

/// Dataset label for the viewer's dominant expression.
///
/// No detection, or no usable scores, resolves to neutral.
pub fn resolve_dominant(frame: &DetectionFrame) -> EmotionClass {
    match dominant_expression(frame) {
        Some((name, _)) => map_category(name),
        None => EmotionClass::neutral(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, Detection};

    fn frame_with(scores: &[(&str, f32)]) -> DetectionFrame {
        DetectionFrame::new(vec![Detection {
            bbox: BoundingBox { x: 0.0, y: 0.0, width: 10.0, height: 10.0, confidence: 0.9 },
            expressions: scores.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }])
    }

    #[test]
    fn test_remap_all_known_categories() {
        let expected = [
            ("neutral", "0"),
            ("happy", "4"),
            ("angry", "1"),
            ("sad", "5"),
            ("disgusted", "2"),
            ("surprised", "6"),
            ("fear", "3"),
        ];
        for (name, code) in expected {
            let frame = frame_with(&[(name, 0.9), ("other", 0.05)]);
            assert_eq!(resolve_dominant(&frame).as_str(), code, "category {name}");
        }
    }

    #[test]
    fn test_unknown_category_maps_to_neutral() {
        assert_eq!(map_category("contempt"), EmotionClass::neutral());
        assert_eq!(resolve_dominant(&frame_with(&[("bored", 0.99)])).as_str(), "0");
    }

    #[test]
    fn test_no_detection_is_neutral() {
        assert_eq!(resolve_dominant(&DetectionFrame::empty()), EmotionClass::neutral());
        assert_eq!(resolve_dominant(&frame_with(&[])), EmotionClass::neutral());
    }

    #[test]
    fn test_only_first_detection_counts() {
        let mut frame = frame_with(&[("sad", 0.8), ("happy", 0.1)]);
        let mut second = frame.detections[0].clone();
        second.expressions.insert("happy".into(), 1.0);
        frame.detections.push(second);

        assert_eq!(resolve_dominant(&frame).as_str(), "5");
    }

    #[test]
    fn test_tie_prefers_vocabulary_order() {
        let frame = frame_with(&[("fear", 0.5), ("angry", 0.5), ("sad", 0.5)]);
        assert_eq!(dominant_expression(&frame).map(|(n, _)| n), Some("angry"));

        let frame = frame_with(&[("zeta", 0.4), ("alpha", 0.4), ("surprised", 0.4)]);
        assert_eq!(dominant_expression(&frame).map(|(n, _)| n), Some("surprised"));

        let frame = frame_with(&[("zeta", 0.4), ("alpha", 0.4)]);
        assert_eq!(dominant_expression(&frame).map(|(n, _)| n), Some("alpha"));
    }

    #[test]
    fn test_nan_scores_are_ignored() {
        let frame = frame_with(&[("happy", f32::NAN), ("sad", 0.2)]);
        assert_eq!(resolve_dominant(&frame).as_str(), "5");
    }

    #[test]
    fn test_expression_round_trips_through_str() {
        for e in Expression::ALL {
            assert_eq!(e.as_str().parse::<Expression>(), Ok(e));
        }
        assert!("Happy".parse::<Expression>().is_err());
    }
}
