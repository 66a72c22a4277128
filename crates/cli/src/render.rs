use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use serde::Serialize;

use facecam_core::camera::domain::camera_frame::CameraFrame;
use facecam_core::camera::infrastructure::pixel_layout::{rotate_upright, unpack_to_rgb};
use facecam_core::detection::domain::detected_face::DetectedFace;
use facecam_core::detection::domain::input_image::InputImage;
use facecam_core::overlay::domain::overlay_painter::{paint, OverlayStyle};
use facecam_core::overlay::infrastructure::raster_canvas::RasterCanvas;
use facecam_core::session::live_detection_session::SessionStats;
use facecam_core::session::overlay_state::OverlayState;
use facecam_core::shared::geometry::Size;

/// Draws what the preview widget would show: the newest camera frame turned
/// upright and stretched to the widget, with the overlay on top.
pub struct OverlayRenderer {
    output_dir: PathBuf,
    widget_width: u32,
    widget_height: u32,
    style: OverlayStyle,
    entries: Vec<RenderEntry>,
}

#[derive(Debug, Serialize)]
pub struct RenderEntry {
    pub file: PathBuf,
    pub revision: u64,
    pub frame_index: Option<usize>,
    pub detection_enabled: bool,
    pub notice: Option<String>,
    pub faces: Vec<DetectedFace>,
}

#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub stats: SessionStats,
    pub renders: &'a [RenderEntry],
}

impl OverlayRenderer {
    pub fn new(output_dir: &Path, widget_width: u32, widget_height: u32, style: OverlayStyle) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            widget_width,
            widget_height,
            style,
            entries: Vec::new(),
        }
    }

    /// Paints one repaint of the preview and saves it as a PNG.
    pub fn repaint(
        &mut self,
        frame: Option<&CameraFrame>,
        state: &OverlayState,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let mut canvas_image = match frame {
            Some(frame) => preview_image(frame, self.widget_width, self.widget_height)?,
            None => RgbaImage::from_pixel(self.widget_width, self.widget_height, Rgba([0, 0, 0, 255])),
        };

        let widget = Size::new(self.widget_width as f32, self.widget_height as f32);
        paint(
            &mut RasterCanvas::new(&mut canvas_image),
            state.faces(),
            state.image_size(),
            widget,
            &self.style,
        );

        let path = self
            .output_dir
            .join(format!("overlay_{:05}.png", state.revision()));
        canvas_image.save(&path)?;
        log::debug!("Repaint {} -> {}", state.revision(), path.display());

        self.entries.push(RenderEntry {
            file: path.clone(),
            revision: state.revision(),
            frame_index: frame.map(CameraFrame::index),
            detection_enabled: state.detection_enabled(),
            notice: state.notice().map(str::to_string),
            faces: state.faces().to_vec(),
        });
        Ok(path)
    }

    pub fn entries(&self) -> &[RenderEntry] {
        &self.entries
    }
}

/// Decodes a camera frame the same way the detector sees it, then scales it
/// to the widget.
pub fn preview_image(
    frame: &CameraFrame,
    widget_width: u32,
    widget_height: u32,
) -> Result<RgbaImage, Box<dyn std::error::Error>> {
    let input = InputImage::from_frame(frame)?;
    let meta = input.metadata();
    let rgb = unpack_to_rgb(
        input.bytes(),
        meta.width,
        meta.height,
        meta.bytes_per_row,
        meta.format,
    )?;
    let raw = image::RgbImage::from_raw(meta.width, meta.height, rgb)
        .ok_or("decoded frame does not match its dimensions")?;
    let upright = image::DynamicImage::ImageRgb8(rotate_upright(raw, meta.rotation)).to_rgba8();
    Ok(imageops::resize(
        &upright,
        widget_width,
        widget_height,
        FilterType::Triangle,
    ))
}
