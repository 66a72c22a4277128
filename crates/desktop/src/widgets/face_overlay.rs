use iced::mouse;
use iced::widget::canvas::{self, Frame, Geometry, Path, Stroke};
use iced::{Color, Point, Rectangle, Renderer, Size, Theme};

use facecam_core::detection::domain::detected_face::DetectedFace;
use facecam_core::overlay::domain::overlay_painter::{self, OverlayCanvas, OverlayStyle};
use facecam_core::shared::geometry::{Rect, Size as ImageSize};

/// Canvas program that strokes the face overlay over the camera preview.
///
/// The canvas bounds are the widget size the coordinate scaler maps into.
pub struct FaceOverlay<'a> {
    pub faces: &'a [DetectedFace],
    pub image_size: ImageSize,
    pub style: OverlayStyle,
}

impl<Message> canvas::Program<Message> for FaceOverlay<'_> {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        overlay_painter::paint(
            &mut FrameCanvas { frame: &mut frame },
            self.faces,
            self.image_size,
            ImageSize::new(bounds.width, bounds.height),
            &self.style,
        );
        vec![frame.into_geometry()]
    }
}

struct FrameCanvas<'a> {
    frame: &'a mut Frame,
}

impl OverlayCanvas for FrameCanvas<'_> {
    fn stroke_rect(&mut self, rect: Rect, color: [u8; 4], width: f32) {
        // Keep the whole stroke inside the box, as the raster canvas does.
        let inset = width / 2.0;
        let path = Path::rectangle(
            Point::new(rect.left + inset, rect.top + inset),
            Size::new(
                (rect.width() - width).max(0.0),
                (rect.height() - width).max(0.0),
            ),
        );
        self.frame.stroke(
            &path,
            Stroke {
                style: canvas::Style::Solid(to_color(color)),
                width,
                ..Stroke::default()
            },
        );
    }
}

fn to_color([r, g, b, a]: [u8; 4]) -> Color {
    Color::from_rgba8(r, g, b, a as f32 / 255.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_color_scales_alpha() {
        let c = to_color([255, 0, 0, 255]);
        assert_eq!(c, Color::from_rgb8(255, 0, 0));
        assert!((to_color([0, 0, 0, 51]).a - 0.2).abs() < 1e-6);
    }
}
