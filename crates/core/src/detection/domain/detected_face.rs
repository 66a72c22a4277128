use serde::Serialize;

use crate::shared::constants::SMILE_THRESHOLD;
use crate::shared::geometry::{Point, Rect};

/// Facial feature a contour belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceContourType {
    LeftEye,
    RightEye,
    NoseBase,
    Mouth,
    LeftEar,
    RightEar,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FaceContour {
    pub kind: FaceContourType,
    pub points: Vec<Point>,
}

/// One face reported by the detector for one frame.
///
/// Lives until the next completed detection replaces the whole list.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectedFace {
    /// Image-space box in upright (rotated) coordinates.
    pub bounding_box: Rect,
    pub smiling_probability: Option<f32>,
    pub tracking_id: Option<u32>,
    pub contours: Vec<FaceContour>,
}

impl DetectedFace {
    pub fn new(bounding_box: Rect) -> Self {
        Self {
            bounding_box,
            smiling_probability: None,
            tracking_id: None,
            contours: Vec::new(),
        }
    }

    pub fn with_smiling_probability(mut self, probability: f32) -> Self {
        self.smiling_probability = Some(probability);
        self
    }

    /// Present and strictly above the threshold; exactly 0.5 is not a smile.
    pub fn is_smiling(&self) -> bool {
        self.smiling_probability
            .is_some_and(|p| p > SMILE_THRESHOLD)
    }

    pub fn contour(&self, kind: FaceContourType) -> Option<&FaceContour> {
        self.contours.iter().find(|c| c.kind == kind)
    }
}
