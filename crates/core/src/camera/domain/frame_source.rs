use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::camera::domain::camera_frame::CameraFrame;

#[derive(Error, Debug)]
pub enum FrameSourceError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },
    #[error("no frames found in {}", .0.display())]
    Empty(PathBuf),
    #[error("frame source used before open()")]
    NotOpened,
}

/// Stream properties a camera reports up front.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// `None` when the source cannot know its length (live cameras).
    pub total_frames: Option<usize>,
    pub sensor_orientation: i32,
}

/// Delivers camera frames in capture order.
///
/// Stands in for the platform camera: implementations hide decoding and
/// produce frames already packed into the configured plane layout.
pub trait FrameSource: Send {
    fn open(&mut self, path: &Path) -> Result<SourceMetadata, FrameSourceError>;

    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<CameraFrame, FrameSourceError>> + '_>;

    /// Releases any resources held by the source.
    fn close(&mut self);
}
