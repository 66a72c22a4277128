use crate::detection::domain::detected_face::DetectedFace;
use crate::session::live_detection_session::DetectionEvent;
use crate::shared::geometry::Size;

/// What the overlay currently shows. Owned and mutated by the UI thread only.
///
/// `revision` increases on every mutation; renderers compare it to decide
/// whether a repaint is due.
#[derive(Debug, Clone, Default)]
pub struct OverlayState {
    faces: Vec<DetectedFace>,
    image_size: Size,
    detection_enabled: bool,
    notice: Option<String>,
    revision: u64,
}

impl OverlayState {
    pub fn new(detection_enabled: bool) -> Self {
        Self {
            detection_enabled,
            ..Default::default()
        }
    }

    /// A completed detection replaces the faces wholesale; a failure keeps
    /// them and raises a notice instead.
    pub fn apply(&mut self, event: DetectionEvent) {
        match event {
            DetectionEvent::Completed { faces, image_size } => {
                self.faces = faces;
                self.image_size = image_size;
            }
            DetectionEvent::Failed(message) => {
                self.notice = Some(message);
            }
        }
        self.revision += 1;
    }

    /// Does not clear the faces already on screen.
    pub fn set_detection_enabled(&mut self, enabled: bool) {
        self.detection_enabled = enabled;
        self.revision += 1;
    }

    pub fn dismiss_notice(&mut self) {
        if self.notice.take().is_some() {
            self.revision += 1;
        }
    }

    pub fn faces(&self) -> &[DetectedFace] {
        &self.faces
    }

    pub fn image_size(&self) -> Size {
        self.image_size
    }

    pub fn detection_enabled(&self) -> bool {
        self.detection_enabled
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}
