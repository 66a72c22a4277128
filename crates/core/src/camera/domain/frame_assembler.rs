use crate::camera::domain::camera_frame::Plane;
use crate::detection::domain::detection_error::DetectionError;

/// Planes flattened into the single buffer the detector consumes.
#[derive(Clone, Debug, PartialEq)]
pub struct AssembledFrame {
    pub bytes: Vec<u8>,
    /// Row stride of the first plane.
    pub bytes_per_row: usize,
}

/// Concatenates plane bytes in order and reports the first plane's stride.
///
/// Plane count and sizes are not checked here; an inconsistent layout
/// surfaces later as a detector error. Only an empty plane list is rejected,
/// because there is no first stride to report.
pub fn assemble(planes: &[Plane]) -> Result<AssembledFrame, DetectionError> {
    let first = planes
        .first()
        .ok_or_else(|| DetectionError::new("frame has no pixel planes"))?;

    let total: usize = planes.iter().map(|p| p.bytes().len()).sum();
    let mut bytes = Vec::with_capacity(total);
    for plane in planes {
        bytes.extend_from_slice(plane.bytes());
    }

    Ok(AssembledFrame {
        bytes,
        bytes_per_row: first.bytes_per_row(),
    })
}
