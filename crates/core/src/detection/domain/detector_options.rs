use serde::{Deserialize, Serialize};

/// Switches passed to the detector at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceDetectorOptions {
    /// Minimum detection score in `[0, 1]`.
    pub confidence: f32,
    /// Smallest face to report, as a fraction of the upright image width.
    pub min_face_size: f32,
    pub enable_contours: bool,
    /// Requests smile probabilities when the backend can produce them.
    pub enable_classification: bool,
    pub enable_tracking: bool,
}

impl Default for FaceDetectorOptions {
    fn default() -> Self {
        Self {
            confidence: 0.5,
            min_face_size: 0.1,
            enable_contours: true,
            enable_classification: true,
            enable_tracking: false,
        }
    }
}

impl FaceDetectorOptions {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "confidence must be in [0, 1], got {}",
                self.confidence
            ));
        }
        if !(0.0..=1.0).contains(&self.min_face_size) {
            return Err(format!(
                "min_face_size must be in [0, 1], got {}",
                self.min_face_size
            ));
        }
        Ok(())
    }
}
