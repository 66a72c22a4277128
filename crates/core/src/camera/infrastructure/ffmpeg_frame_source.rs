use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::camera::domain::camera_frame::{CameraFrame, PixelFormat};
use crate::camera::domain::frame_source::{FrameSource, FrameSourceError, SourceMetadata};
use crate::camera::domain::image_rotation::ImageRotation;
use crate::camera::infrastructure::pixel_layout::{pack_rgb, rotate_to_sensor, rotate_upright};

/// Replays a video file as a camera stream via ffmpeg-next.
///
/// Frames are decoded to RGB24 and repacked into `format`. Phone recordings
/// carry the sensor rotation as stream metadata; it is used as the sensor
/// orientation unless an override is configured. With an override the
/// pixels are turned upright by the recorded rotation and mounted again at
/// the override, so the frame matches the orientation it is stamped with.
pub struct FfmpegFrameSource {
    format: PixelFormat,
    orientation_override: Option<i32>,
    input_ctx: Option<ffmpeg_next::format::context::Input>,
    video_stream_index: usize,
    sensor_orientation: i32,
    remount: Option<Remount>,
    path: PathBuf,
}

/// Moves decoded pixels from the recorded sensor mounting to another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Remount {
    recorded: ImageRotation,
    target: ImageRotation,
}

impl Remount {
    fn new(recorded: i32, target: i32) -> Option<Self> {
        let recorded = ImageRotation::from_sensor_orientation(recorded);
        let target = ImageRotation::from_sensor_orientation(target);
        (recorded != target).then_some(Self { recorded, target })
    }

    fn apply(self, image: RgbImage) -> RgbImage {
        rotate_to_sensor(rotate_upright(image, self.recorded), self.target)
    }

    fn dimensions(self, width: u32, height: u32) -> (u32, u32) {
        if self.recorded.swaps_axes() == self.target.swaps_axes() {
            (width, height)
        } else {
            (height, width)
        }
    }
}

// Safety: FfmpegFrameSource is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegFrameSource {}

impl FfmpegFrameSource {
    pub fn new(format: PixelFormat, orientation_override: Option<i32>) -> Self {
        Self {
            format,
            orientation_override,
            input_ctx: None,
            video_stream_index: 0,
            sensor_orientation: 0,
            remount: None,
            path: PathBuf::new(),
        }
    }

    fn decode_error(&self, e: impl std::fmt::Display) -> FrameSourceError {
        FrameSourceError::Decode {
            path: self.path.clone(),
            message: e.to_string(),
        }
    }
}

impl FrameSource for FfmpegFrameSource {
    fn open(&mut self, path: &Path) -> Result<SourceMetadata, FrameSourceError> {
        self.path = path.to_path_buf();
        ffmpeg_next::init().map_err(|e| self.decode_error(e))?;

        let ictx = ffmpeg_next::format::input(path).map_err(|e| self.decode_error(e))?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| self.decode_error("no video stream found"))?;

        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| self.decode_error(e))?;
        let decoder = codec_ctx.decoder().video().map_err(|e| self.decode_error(e))?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };
        let recorded = extract_rotation(&stream);
        let sensor_orientation = self.orientation_override.unwrap_or(recorded);
        let remount = Remount::new(recorded, sensor_orientation);
        let (width, height) = remount.map_or((decoder.width(), decoder.height()), |r| {
            r.dimensions(decoder.width(), decoder.height())
        });
        let total = stream.frames();

        let metadata = SourceMetadata {
            width,
            height,
            fps,
            total_frames: (total > 0).then_some(total as usize),
            sensor_orientation,
        };
        log::debug!(
            "Opened {} ({}x{} @ {fps:.1} fps, orientation {sensor_orientation})",
            path.display(),
            metadata.width,
            metadata.height
        );

        self.video_stream_index = video_stream_index;
        self.sensor_orientation = sensor_orientation;
        self.remount = remount;
        self.input_ctx = Some(ictx);

        Ok(metadata)
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<CameraFrame, FrameSourceError>> + '_> {
        let path = self.path.clone();
        let decode_error = move |e: &dyn std::fmt::Display| FrameSourceError::Decode {
            path: path.clone(),
            message: e.to_string(),
        };

        let Some(ictx) = self.input_ctx.as_mut() else {
            return Box::new(std::iter::once(Err(FrameSourceError::NotOpened)));
        };

        let decoder = match open_decoder(ictx, self.video_stream_index) {
            Ok(d) => d,
            Err(e) => return Box::new(std::iter::once(Err(decode_error(&e)))),
        };
        let width = decoder.width();
        let height = decoder.height();

        let scaler = match ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        ) {
            Ok(s) => s,
            Err(e) => return Box::new(std::iter::once(Err(decode_error(&e)))),
        };

        Box::new(FfmpegFrameIter {
            ictx,
            decoder,
            scaler,
            width,
            height,
            format: self.format,
            sensor_orientation: self.sensor_orientation,
            remount: self.remount,
            video_stream_index: self.video_stream_index,
            frame_index: 0,
            flushing: false,
            done: false,
            path: self.path.clone(),
        })
    }

    fn close(&mut self) {
        self.input_ctx = None;
    }
}

fn open_decoder(
    ictx: &ffmpeg_next::format::context::Input,
    stream_index: usize,
) -> Result<ffmpeg_next::decoder::Video, ffmpeg_next::Error> {
    let stream = ictx
        .stream(stream_index)
        .ok_or(ffmpeg_next::Error::StreamNotFound)?;
    let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
    codec_ctx.decoder().video()
}

/// Decodes lazily so a long recording never sits in memory at once.
struct FfmpegFrameIter<'a> {
    ictx: &'a mut ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    format: PixelFormat,
    sensor_orientation: i32,
    remount: Option<Remount>,
    video_stream_index: usize,
    frame_index: usize,
    flushing: bool,
    done: bool,
    path: PathBuf,
}

impl FfmpegFrameIter<'_> {
    fn try_receive(&mut self) -> Option<Result<CameraFrame, FrameSourceError>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return None;
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = self.scaler.run(&decoded, &mut rgb_frame) {
            return Some(Err(FrameSourceError::Decode {
                path: self.path.clone(),
                message: e.to_string(),
            }));
        }

        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        let (pixels, width, height) = match self.remount {
            None => (pixels, self.width, self.height),
            Some(remount) => {
                let Some(image) = RgbImage::from_raw(self.width, self.height, pixels) else {
                    return Some(Err(FrameSourceError::Decode {
                        path: self.path.clone(),
                        message: "decoded frame does not match its size".into(),
                    }));
                };
                let mounted = remount.apply(image);
                let (w, h) = mounted.dimensions();
                (mounted.into_raw(), w, h)
            }
        };
        let planes = pack_rgb(&pixels, width, height, self.format);
        let frame = CameraFrame::new(
            planes,
            width,
            height,
            self.sensor_orientation,
            self.format,
            self.frame_index,
        );
        self.frame_index += 1;
        Some(Ok(frame))
    }
}

impl Iterator for FfmpegFrameIter<'_> {
    type Item = Result<CameraFrame, FrameSourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Some(result) = self.try_receive() {
            return Some(result);
        }

        if self.flushing {
            self.done = true;
            return None;
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                if let Some(result) = self.try_receive() {
                    return Some(result);
                }
                self.done = true;
                return None;
            };

            if stream.index() != self.video_stream_index {
                continue;
            }

            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }

            if let Some(result) = self.try_receive() {
                return Some(result);
            }
        }
    }
}

/// Reads the recording rotation: DisplayMatrix side data first, then the
/// legacy `rotate` tag. Returns 0, 90, 180 or 270.
fn extract_rotation(stream: &ffmpeg_next::format::stream::Stream) -> i32 {
    for side_data in stream.side_data() {
        if side_data.kind() == ffmpeg_next::codec::packet::side_data::Type::DisplayMatrix {
            if let Some(angle) = parse_display_matrix(side_data.data()) {
                return normalize_rotation(angle);
            }
        }
    }

    stream
        .metadata()
        .get("rotate")
        .and_then(|s| s.parse::<i32>().ok())
        .map(normalize_rotation)
        .unwrap_or(0)
}

/// Rotation in degrees from a 3x3 16.16 fixed-point display matrix.
///
/// The matrix describes the transform needed for display, so the angle of
/// its first row vector is negated.
fn parse_display_matrix(data: &[u8]) -> Option<i32> {
    if data.len() < 36 {
        return None;
    }

    let m00 = i32::from_le_bytes(data[0..4].try_into().ok()?) as f64 / 65536.0;
    let m10 = i32::from_le_bytes(data[4..8].try_into().ok()?) as f64 / 65536.0;

    Some(-m10.atan2(m00).to_degrees().round() as i32)
}

/// Snaps an arbitrary angle to the nearest quarter turn.
fn normalize_rotation(angle: i32) -> i32 {
    match angle.rem_euclid(360) {
        45..=134 => 90,
        135..=224 => 180,
        225..=315 => 270,
        _ => 0,
    }
}

/// Strips ffmpeg row padding into a tightly packed RGB24 buffer.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn display_matrix(degrees: f64) -> Vec<u8> {
        // Display matrices store the inverse rotation.
        let rad = (-degrees).to_radians();
        let fixed = |v: f64| ((v * 65536.0).round() as i32).to_le_bytes();
        let mut data = Vec::with_capacity(36);
        data.extend_from_slice(&fixed(rad.cos()));
        data.extend_from_slice(&fixed(rad.sin()));
        data.extend_from_slice(&[0u8; 28]);
        data
    }

    #[rstest]
    #[case(0, 0)]
    #[case(90, 90)]
    #[case(-90, 270)]
    #[case(185, 180)]
    #[case(300, 270)]
    #[case(350, 0)]
    #[case(720, 0)]
    fn test_normalize_rotation(#[case] input: i32, #[case] expected: i32) {
        assert_eq!(normalize_rotation(input), expected);
    }

    #[rstest]
    #[case(0.0, 0)]
    #[case(90.0, 90)]
    #[case(180.0, 180)]
    #[case(270.0, 270)]
    fn test_parse_display_matrix(#[case] degrees: f64, #[case] expected: i32) {
        let angle = parse_display_matrix(&display_matrix(degrees)).unwrap();
        assert_eq!(normalize_rotation(angle), expected);
    }

    #[test]
    fn test_short_display_matrix_is_ignored() {
        assert_eq!(parse_display_matrix(&[0u8; 12]), None);
    }

    fn marked(width: u32, height: u32) -> RgbImage {
        let mut img = RgbImage::new(width, height);
        img.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        img.put_pixel(width - 1, 1, image::Rgb([0, 255, 0]));
        img
    }

    #[test]
    fn test_override_matching_recording_needs_no_remount() {
        assert_eq!(Remount::new(90, 90), None);
        assert_eq!(Remount::new(0, 360), None);
    }

    #[test]
    fn test_remount_upright_clip_to_sensor_space() {
        let upright = marked(8, 6);
        let remount = Remount::new(0, 90).unwrap();

        let sensor = remount.apply(upright.clone());
        assert_eq!(sensor.dimensions(), remount.dimensions(8, 6));
        assert_eq!(sensor.dimensions(), (6, 8));
        assert_eq!(rotate_upright(sensor, ImageRotation::Rotation90), upright);
    }

    #[rstest]
    #[case(90, 0)]
    #[case(270, 90)]
    #[case(180, 270)]
    #[case(90, 180)]
    fn test_remount_keeps_upright_picture(#[case] recorded: i32, #[case] target: i32) {
        let upright = marked(8, 6);
        let recorded_rotation = ImageRotation::from_sensor_orientation(recorded);
        let target_rotation = ImageRotation::from_sensor_orientation(target);
        let decoded = rotate_to_sensor(upright.clone(), recorded_rotation);
        let remount = Remount::new(recorded, target).unwrap();

        let (w, h) = decoded.dimensions();
        let mounted = remount.apply(decoded);
        assert_eq!(mounted.dimensions(), remount.dimensions(w, h));
        assert_eq!(rotate_upright(mounted, target_rotation), upright);
    }

    #[test]
    fn test_frames_before_open_errors() {
        let mut source = FfmpegFrameSource::new(PixelFormat::Nv21, None);
        let first = source.frames().next().unwrap();
        assert!(matches!(first, Err(FrameSourceError::NotOpened)));
    }

    #[test]
    fn test_open_missing_file_errors() {
        let mut source = FfmpegFrameSource::new(PixelFormat::Nv21, Some(90));
        let result = source.open(Path::new("/nonexistent/clip.mp4"));
        assert!(matches!(result, Err(FrameSourceError::Decode { .. })));
    }
}
