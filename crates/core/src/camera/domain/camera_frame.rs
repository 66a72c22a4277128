use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::shared::geometry::Size;

/// Byte layout the camera delivers and the detector is told to expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Full-resolution Y plane followed by an interleaved V/U plane.
    Nv21,
    /// Separate Y, U and V planes, chroma subsampled 2x2.
    Yuv420,
    Bgra8888,
    Rgb888,
}

impl PixelFormat {
    pub const ALL: &[PixelFormat] = &[
        PixelFormat::Nv21,
        PixelFormat::Yuv420,
        PixelFormat::Bgra8888,
        PixelFormat::Rgb888,
    ];
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelFormat::Nv21 => write!(f, "nv21"),
            PixelFormat::Yuv420 => write!(f, "yuv420"),
            PixelFormat::Bgra8888 => write!(f, "bgra8888"),
            PixelFormat::Rgb888 => write!(f, "rgb888"),
        }
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nv21" => Ok(PixelFormat::Nv21),
            "yuv420" | "yuv_420_888" => Ok(PixelFormat::Yuv420),
            "bgra8888" | "bgra" => Ok(PixelFormat::Bgra8888),
            "rgb888" | "rgb" => Ok(PixelFormat::Rgb888),
            other => Err(format!("unknown pixel format: {other}")),
        }
    }
}

/// One contiguous channel of pixel data within a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Plane {
    bytes: Vec<u8>,
    bytes_per_row: usize,
    bytes_per_pixel: Option<usize>,
}

impl Plane {
    pub fn new(bytes: Vec<u8>, bytes_per_row: usize) -> Self {
        Self {
            bytes,
            bytes_per_row,
            bytes_per_pixel: None,
        }
    }

    pub fn with_bytes_per_pixel(mut self, bytes_per_pixel: usize) -> Self {
        self.bytes_per_pixel = Some(bytes_per_pixel);
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    pub fn bytes_per_pixel(&self) -> Option<usize> {
        self.bytes_per_pixel
    }
}

/// One captured camera image: its planes plus the metadata the detector needs.
///
/// Frames are transient. The session consumes each one within a single
/// detection cycle and never keeps it afterwards.
#[derive(Clone, Debug)]
pub struct CameraFrame {
    planes: Vec<Plane>,
    width: u32,
    height: u32,
    sensor_orientation: i32,
    format: PixelFormat,
    index: usize,
}

impl CameraFrame {
    pub fn new(
        planes: Vec<Plane>,
        width: u32,
        height: u32,
        sensor_orientation: i32,
        format: PixelFormat,
        index: usize,
    ) -> Self {
        Self {
            planes,
            width,
            height,
            sensor_orientation,
            format,
            index,
        }
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw sensor dimensions, before any rotation is applied.
    pub fn size(&self) -> Size {
        Size::new(self.width as f32, self.height as f32)
    }

    pub fn sensor_orientation(&self) -> i32 {
        self.sensor_orientation
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_construction_and_accessors() {
        let planes = vec![Plane::new(vec![1, 2, 3, 4], 2), Plane::new(vec![5, 6], 2)];
        let frame = CameraFrame::new(planes.clone(), 2, 2, 90, PixelFormat::Nv21, 7);
        assert_eq!(frame.planes(), &planes[..]);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.sensor_orientation(), 90);
        assert_eq!(frame.format(), PixelFormat::Nv21);
        assert_eq!(frame.index(), 7);
        assert_eq!(frame.size(), Size::new(2.0, 2.0));
    }

    #[test]
    fn test_plane_bytes_per_pixel_is_optional() {
        let plane = Plane::new(vec![0; 8], 8);
        assert_eq!(plane.bytes_per_pixel(), None);
        let plane = plane.with_bytes_per_pixel(2);
        assert_eq!(plane.bytes_per_pixel(), Some(2));
    }

    #[rstest]
    #[case("nv21", PixelFormat::Nv21)]
    #[case("NV21", PixelFormat::Nv21)]
    #[case("yuv_420_888", PixelFormat::Yuv420)]
    #[case("bgra", PixelFormat::Bgra8888)]
    #[case("rgb888", PixelFormat::Rgb888)]
    fn test_parse_pixel_format(#[case] input: &str, #[case] expected: PixelFormat) {
        assert_eq!(input.parse::<PixelFormat>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_pixel_format() {
        assert!("jpeg".parse::<PixelFormat>().is_err());
    }

    #[test]
    fn test_display_parses_back() {
        for &format in PixelFormat::ALL {
            assert_eq!(format.to_string().parse::<PixelFormat>().unwrap(), format);
        }
    }
}
