use crate::detection::domain::detected_face::DetectedFace;
use crate::detection::domain::detection_error::DetectionError;
use crate::detection::domain::input_image::InputImage;

/// Domain interface for the external face detector.
///
/// Implementations may be stateful (e.g., tracking ids across frames),
/// hence `&mut self`. Returned boxes are in upright image coordinates.
pub trait FaceDetector: Send {
    fn detect(&mut self, image: &InputImage) -> Result<Vec<DetectedFace>, DetectionError>;
}
