use std::path::{Path, PathBuf};

use crate::camera::domain::camera_frame::{CameraFrame, PixelFormat};
use crate::camera::domain::frame_source::{FrameSource, FrameSourceError, SourceMetadata};
use crate::camera::domain::image_rotation::ImageRotation;
use crate::camera::infrastructure::pixel_layout::{pack_rgb, rotate_to_sensor};
use crate::shared::constants::IMAGE_EXTENSIONS;

/// Plays still images back as a camera stream.
///
/// Opening a file yields a one-frame stream; opening a directory yields every
/// image in it, sorted by file name. Images are taken to be upright photos:
/// each is turned into sensor orientation, packed into `format` and stamped
/// with that orientation, so the detector's upright view is the original.
pub struct ImageSequenceSource {
    format: PixelFormat,
    sensor_orientation: i32,
    fps: f64,
    paths: Option<Vec<PathBuf>>,
}

impl ImageSequenceSource {
    pub fn new(format: PixelFormat, sensor_orientation: i32, fps: f64) -> Self {
        Self {
            format,
            sensor_orientation,
            fps,
            paths: None,
        }
    }
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn list_images(path: &Path) -> Result<Vec<PathBuf>, FrameSourceError> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let entries = std::fs::read_dir(path).map_err(|source| FrameSourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut images: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_image(p))
        .collect();
    images.sort();
    Ok(images)
}

fn load_rgb(path: &Path) -> Result<image::RgbImage, FrameSourceError> {
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|e| FrameSourceError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self, path: &Path) -> Result<SourceMetadata, FrameSourceError> {
        let paths = list_images(path)?;
        let first = paths
            .first()
            .ok_or_else(|| FrameSourceError::Empty(path.to_path_buf()))?;
        let (upright_w, upright_h) =
            image::image_dimensions(first).map_err(|e| FrameSourceError::Decode {
                path: first.clone(),
                message: e.to_string(),
            })?;

        let swaps = ImageRotation::from_sensor_orientation(self.sensor_orientation).swaps_axes();
        let (width, height) = if swaps {
            (upright_h, upright_w)
        } else {
            (upright_w, upright_h)
        };
        let metadata = SourceMetadata {
            width,
            height,
            fps: self.fps,
            total_frames: Some(paths.len()),
            sensor_orientation: self.sensor_orientation,
        };
        self.paths = Some(paths);
        Ok(metadata)
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<CameraFrame, FrameSourceError>> + '_> {
        let Some(paths) = self.paths.as_ref() else {
            return Box::new(std::iter::once(Err(FrameSourceError::NotOpened)));
        };
        let format = self.format;
        let orientation = self.sensor_orientation;
        let rotation = ImageRotation::from_sensor_orientation(orientation);

        Box::new(paths.iter().enumerate().map(move |(index, path)| {
            let img = rotate_to_sensor(load_rgb(path)?, rotation);
            let (w, h) = img.dimensions();
            let planes = pack_rgb(img.as_raw(), w, h, format);
            Ok(CameraFrame::new(planes, w, h, orientation, format, index))
        }))
    }

    fn close(&mut self) {
        self.paths = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        image::RgbImage::from_pixel(w, h, image::Rgb([90, 90, 90]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_single_file_is_one_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "a.png", 8, 6);
        let mut source = ImageSequenceSource::new(PixelFormat::Nv21, 90, 30.0);

        let meta = source.open(&path).unwrap();
        // Sensor space: a 90 degree mount swaps the axes
        assert_eq!((meta.width, meta.height), (6, 8));
        assert_eq!(meta.total_frames, Some(1));
        assert_eq!(meta.sensor_orientation, 90);

        let frames: Vec<_> = source.frames().collect::<Result<_, _>>().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].format(), PixelFormat::Nv21);
        assert_eq!(frames[0].planes().len(), 2);
        assert_eq!(frames[0].sensor_orientation(), 90);
        assert_eq!((frames[0].width(), frames[0].height()), (6, 8));
    }

    #[test]
    fn test_directory_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "b.png", 4, 4);
        write_png(dir.path(), "a.png", 2, 2);
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let mut source = ImageSequenceSource::new(PixelFormat::Rgb888, 0, 10.0);
        let meta = source.open(dir.path()).unwrap();
        assert_eq!(meta.total_frames, Some(2));
        assert_eq!((meta.width, meta.height), (2, 2));

        let frames: Vec<_> = source.frames().collect::<Result<_, _>>().unwrap();
        assert_eq!(frames[0].width(), 2);
        assert_eq!(frames[1].width(), 4);
        assert_eq!(frames[1].index(), 1);
    }

    #[test]
    fn test_empty_directory_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ImageSequenceSource::new(PixelFormat::Nv21, 90, 30.0);
        assert!(matches!(
            source.open(dir.path()),
            Err(FrameSourceError::Empty(_))
        ));
    }

    #[test]
    fn test_frames_before_open_errors() {
        let mut source = ImageSequenceSource::new(PixelFormat::Nv21, 90, 30.0);
        let first = source.frames().next().unwrap();
        assert!(matches!(first, Err(FrameSourceError::NotOpened)));
    }

    #[test]
    fn test_is_image_is_case_insensitive() {
        assert!(is_image(Path::new("x/FACE.JPG")));
        assert!(!is_image(Path::new("x/clip.mp4")));
    }
}
