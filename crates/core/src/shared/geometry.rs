use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle stored as edges, matching how detectors report boxes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_ltwh(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self::new(left, top, left + width, top + height)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn iou(&self, other: &Rect) -> f32 {
        let ix1 = self.left.max(other.left);
        let iy1 = self.top.max(other.top);
        let ix2 = self.right.min(other.right);
        let iy2 = self.bottom.min(other.bottom);

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_ltwh() {
        let r = Rect::from_ltwh(10.0, 20.0, 30.0, 40.0);
        assert_eq!(r, Rect::new(10.0, 20.0, 40.0, 60.0));
        assert_relative_eq!(r.width(), 30.0);
        assert_relative_eq!(r.height(), 40.0);
    }

    #[test]
    fn test_inverted_rect_has_zero_area() {
        let r = Rect::new(10.0, 10.0, 5.0, 5.0);
        assert_relative_eq!(r.area(), 0.0);
    }

    #[test]
    fn test_iou_identical() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert_relative_eq!(r.iou(&r), 1.0);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 20.0, 30.0, 30.0);
        assert_relative_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        // intersection 5x5 = 25, union 100 + 100 - 25 = 175
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 15.0, 15.0);
        assert_relative_eq!(a.iou(&b), 25.0 / 175.0, epsilon = 1e-6);
    }

    #[test]
    fn test_size_is_empty() {
        assert!(Size::new(0.0, 10.0).is_empty());
        assert!(!Size::new(1.0, 1.0).is_empty());
    }
}
