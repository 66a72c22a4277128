use thiserror::Error;

/// The single failure kind of a detection cycle.
///
/// Assembly problems, decoding problems and inference problems all collapse
/// into this one type; callers only ever show the message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("face detection failed: {message}")]
pub struct DetectionError {
    message: String,
}

impl DetectionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ort::Error> for DetectionError {
    fn from(e: ort::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<ndarray::ShapeError> for DetectionError {
    fn from(e: ndarray::ShapeError) -> Self {
        Self::new(e.to_string())
    }
}
