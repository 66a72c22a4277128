use serde::{Deserialize, Serialize};

use crate::detection::domain::detected_face::DetectedFace;
use crate::overlay::domain::coordinate_scaler::scale_rect;
use crate::shared::constants::DEFAULT_STROKE_WIDTH;
use crate::shared::geometry::{Rect, Size};

/// RGBA color, 8 bits per channel.
pub type Color = [u8; 4];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayStyle {
    pub face_color: Color,
    pub smile_color: Color,
    pub stroke_width: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            face_color: [255, 0, 0, 255],
            smile_color: [0, 255, 0, 255],
            stroke_width: DEFAULT_STROKE_WIDTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Face,
    Smile,
}

/// One stroked rectangle in widget coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayShape {
    pub rect: Rect,
    pub kind: ShapeKind,
}

/// Drawing surface the painter strokes onto.
pub trait OverlayCanvas {
    fn stroke_rect(&mut self, rect: Rect, color: Color, width: f32);
}

/// Shapes for the current faces, in paint order.
///
/// Every face gets a box; a smiling face gets a second box right after it so
/// it lands on top.
pub fn shapes(faces: &[DetectedFace], image_size: Size, widget_size: Size) -> Vec<OverlayShape> {
    let mut out = Vec::with_capacity(faces.len() * 2);
    for face in faces {
        let rect = scale_rect(face.bounding_box, image_size, widget_size);
        out.push(OverlayShape {
            rect,
            kind: ShapeKind::Face,
        });
        if face.is_smiling() {
            out.push(OverlayShape {
                rect,
                kind: ShapeKind::Smile,
            });
        }
    }
    out
}

pub fn paint(
    canvas: &mut impl OverlayCanvas,
    faces: &[DetectedFace],
    image_size: Size,
    widget_size: Size,
    style: &OverlayStyle,
) {
    for shape in shapes(faces, image_size, widget_size) {
        let color = match shape.kind {
            ShapeKind::Face => style.face_color,
            ShapeKind::Smile => style.smile_color,
        };
        canvas.stroke_rect(shape.rect, color, style.stroke_width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingCanvas {
        strokes: Vec<(Rect, Color)>,
    }

    impl OverlayCanvas for RecordingCanvas {
        fn stroke_rect(&mut self, rect: Rect, color: Color, _width: f32) {
            self.strokes.push((rect, color));
        }
    }

    fn face(probability: Option<f32>) -> DetectedFace {
        let f = DetectedFace::new(Rect::new(0.0, 0.0, 100.0, 100.0));
        match probability {
            Some(p) => f.with_smiling_probability(p),
            None => f,
        }
    }

    #[test]
    fn test_one_box_per_face() {
        let faces = vec![face(None), face(Some(0.2))];
        let s = shapes(&faces, Size::new(100.0, 100.0), Size::new(100.0, 100.0));
        assert_eq!(s.len(), 2);
        assert!(s.iter().all(|sh| sh.kind == ShapeKind::Face));
    }

    #[test]
    fn test_smile_box_follows_its_face() {
        let faces = vec![face(Some(0.9)), face(Some(0.5))];
        let s = shapes(&faces, Size::new(100.0, 100.0), Size::new(100.0, 100.0));
        let kinds: Vec<ShapeKind> = s.iter().map(|sh| sh.kind).collect();
        assert_eq!(kinds, vec![ShapeKind::Face, ShapeKind::Smile, ShapeKind::Face]);
        assert_eq!(s[0].rect, s[1].rect);
    }

    #[test]
    fn test_paint_uses_style_colors() {
        let style = OverlayStyle::default();
        let mut canvas = RecordingCanvas::default();
        paint(
            &mut canvas,
            &[face(Some(0.75))],
            Size::new(200.0, 100.0),
            Size::new(50.0, 100.0),
            &style,
        );
        assert_eq!(canvas.strokes.len(), 2);
        assert_eq!(canvas.strokes[0].1, style.face_color);
        assert_eq!(canvas.strokes[1].1, style.smile_color);
        // sx = 50 / 100, sy = 100 / 200
        assert_eq!(canvas.strokes[0].0, Rect::new(0.0, 0.0, 50.0, 50.0));
    }

    #[test]
    fn test_no_faces_paints_nothing() {
        let mut canvas = RecordingCanvas::default();
        paint(
            &mut canvas,
            &[],
            Size::new(1.0, 1.0),
            Size::new(1.0, 1.0),
            &OverlayStyle::default(),
        );
        assert!(canvas.strokes.is_empty());
    }
}
