use crate::camera::domain::camera_frame::{CameraFrame, PixelFormat};
use crate::camera::domain::frame_assembler::assemble;
use crate::camera::domain::image_rotation::ImageRotation;
use crate::detection::domain::detection_error::DetectionError;

/// Metadata the detector needs to interpret the raw bytes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputImageMetadata {
    /// Raw sensor dimensions, before rotation.
    pub width: u32,
    pub height: u32,
    pub rotation: ImageRotation,
    pub format: PixelFormat,
    pub bytes_per_row: usize,
}

/// Contiguous frame bytes plus their metadata, as handed to the detector.
#[derive(Clone, Debug)]
pub struct InputImage {
    bytes: Vec<u8>,
    metadata: InputImageMetadata,
}

impl InputImage {
    pub fn new(bytes: Vec<u8>, metadata: InputImageMetadata) -> Self {
        Self { bytes, metadata }
    }

    /// Assembles the frame's planes and maps its sensor orientation.
    pub fn from_frame(frame: &CameraFrame) -> Result<Self, DetectionError> {
        let assembled = assemble(frame.planes())?;
        Ok(Self {
            bytes: assembled.bytes,
            metadata: InputImageMetadata {
                width: frame.width(),
                height: frame.height(),
                rotation: ImageRotation::from_sensor_orientation(frame.sensor_orientation()),
                format: frame.format(),
                bytes_per_row: assembled.bytes_per_row,
            },
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn metadata(&self) -> &InputImageMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::domain::camera_frame::Plane;

    #[test]
    fn test_from_frame_carries_metadata() {
        let frame = CameraFrame::new(
            vec![Plane::new(vec![1; 8], 4), Plane::new(vec![2; 4], 4)],
            4,
            2,
            270,
            PixelFormat::Nv21,
            0,
        );
        let image = InputImage::from_frame(&frame).unwrap();

        assert_eq!(image.bytes().len(), 12);
        let meta = image.metadata();
        assert_eq!((meta.width, meta.height), (4, 2));
        assert_eq!(meta.rotation, ImageRotation::Rotation270);
        assert_eq!(meta.format, PixelFormat::Nv21);
        assert_eq!(meta.bytes_per_row, 4);
    }

    #[test]
    fn test_unknown_orientation_maps_to_zero() {
        let frame = CameraFrame::new(
            vec![Plane::new(vec![0; 3], 3)],
            1,
            1,
            45,
            PixelFormat::Rgb888,
            0,
        );
        let image = InputImage::from_frame(&frame).unwrap();
        assert_eq!(image.metadata().rotation, ImageRotation::Rotation0);
    }

    #[test]
    fn test_frame_without_planes_fails() {
        let frame = CameraFrame::new(vec![], 4, 4, 90, PixelFormat::Nv21, 0);
        assert!(InputImage::from_frame(&frame).is_err());
    }
}
