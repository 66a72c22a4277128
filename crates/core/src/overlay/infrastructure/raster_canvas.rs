use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;

use crate::overlay::domain::overlay_painter::{Color, OverlayCanvas};
use crate::shared::geometry::Rect;

/// Strokes overlay rectangles straight into an RGBA buffer.
///
/// Wide strokes are drawn as nested one-pixel outlines growing inward.
pub struct RasterCanvas<'a> {
    image: &'a mut RgbaImage,
}

impl<'a> RasterCanvas<'a> {
    pub fn new(image: &'a mut RgbaImage) -> Self {
        Self { image }
    }
}

impl OverlayCanvas for RasterCanvas<'_> {
    fn stroke_rect(&mut self, rect: Rect, color: Color, width: f32) {
        let (img_w, img_h) = self.image.dimensions();
        if img_w == 0 || img_h == 0 {
            return;
        }
        let passes = width.round().max(1.0) as i32;
        for inset in 0..passes {
            if let Some(r) = to_pixel_rect(rect, inset as f32, img_w, img_h) {
                draw_hollow_rect_mut(self.image, r, Rgba(color));
            }
        }
    }
}

/// Shrink by `inset` and clamp to the image; `None` once nothing is left or
/// the box lies wholly off the image.
fn to_pixel_rect(rect: Rect, inset: f32, img_w: u32, img_h: u32) -> Option<imageproc::rect::Rect> {
    let max_x = (img_w - 1) as f32;
    let max_y = (img_h - 1) as f32;

    let (left, top) = (rect.left + inset, rect.top + inset);
    let (right, bottom) = (rect.right - inset, rect.bottom - inset);
    if left > max_x || top > max_y || right < 0.0 || bottom < 0.0 {
        return None;
    }

    let x1 = left.clamp(0.0, max_x);
    let y1 = top.clamp(0.0, max_y);
    let x2 = right.clamp(0.0, max_x);
    let y2 = bottom.clamp(0.0, max_y);
    if x2 < x1 || y2 < y1 {
        return None;
    }

    // Inclusive edges: the right and bottom strokes sit on x2 and y2.
    let width = (x2 - x1).round() as u32 + 1;
    let height = (y2 - y1).round() as u32 + 1;
    Some(imageproc::rect::Rect::at(x1.round() as i32, y1.round() as i32).of_size(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    use crate::detection::domain::detected_face::DetectedFace;
    use crate::overlay::domain::overlay_painter::{paint, OverlayStyle};
    use crate::shared::geometry::Size;

    const RED: Color = [255, 0, 0, 255];

    #[test]
    fn test_stroke_outline_only() {
        let mut img = RgbaImage::new(20, 20);
        RasterCanvas::new(&mut img).stroke_rect(Rect::new(2.0, 2.0, 12.0, 12.0), RED, 1.0);

        assert_eq!(img.get_pixel(2, 2).0, RED);
        assert_eq!(img.get_pixel(2, 7).0, RED);
        assert_eq!(img.get_pixel(7, 7).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_wide_stroke_grows_inward() {
        let mut img = RgbaImage::new(20, 20);
        RasterCanvas::new(&mut img).stroke_rect(Rect::new(2.0, 2.0, 12.0, 12.0), RED, 2.0);

        assert_eq!(img.get_pixel(3, 7).0, RED);
        assert_eq!(img.get_pixel(1, 7).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_out_of_bounds_rect_is_clamped() {
        let mut img = RgbaImage::new(10, 10);
        RasterCanvas::new(&mut img).stroke_rect(Rect::new(-5.0, -5.0, 50.0, 50.0), RED, 1.0);
        assert_eq!(img.get_pixel(0, 0).0, RED);
        assert_eq!(img.get_pixel(9, 9).0, RED);
    }

    #[rstest]
    #[case(Rect::new(20.0, 2.0, 30.0, 8.0))]
    #[case(Rect::new(2.0, 15.0, 8.0, 25.0))]
    #[case(Rect::new(-12.0, 2.0, -2.0, 8.0))]
    #[case(Rect::new(2.0, -9.0, 8.0, -0.5))]
    fn test_rect_off_image_draws_nothing(#[case] rect: Rect) {
        let mut img = RgbaImage::new(10, 10);
        RasterCanvas::new(&mut img).stroke_rect(rect, RED, 2.0);
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn test_smiling_face_ends_with_smile_color() {
        let style = OverlayStyle::default();
        let face = DetectedFace::new(Rect::new(10.0, 10.0, 30.0, 30.0)).with_smiling_probability(0.8);
        let mut img = RgbaImage::new(40, 40);
        paint(
            &mut RasterCanvas::new(&mut img),
            &[face],
            Size::new(40.0, 40.0),
            Size::new(40.0, 40.0),
            &style,
        );
        assert_eq!(img.get_pixel(10, 20).0, style.smile_color);
    }
}
