use serde::{Deserialize, Serialize};

/// A point in image coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box in image pixels, edges inclusive-exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BoundingBox {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn center_x(&self) -> f32 {
        (self.left + self.right) as f32 / 2.0
    }

    pub fn center_y(&self) -> f32 {
        (self.top + self.bottom) as f32 / 2.0
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.left.max(other.left);
        let iy1 = self.top.max(other.top);
        let ix2 = self.right.min(other.right);
        let iy2 = self.bottom.min(other.bottom);

        let inter = (ix2 - ix1).max(0) as f64 * (iy2 - iy1).max(0) as f64;
        if inter == 0.0 {
            return 0.0;
        }

        let area_a = self.width() as f64 * self.height() as f64;
        let area_b = other.width() as f64 * other.height() as f64;
        inter / (area_a + area_b - inter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_dimensions_and_center() {
        let b = BoundingBox::from_xywh(10, 20, 100, 50);
        assert_eq!(b.width(), 100);
        assert_eq!(b.height(), 50);
        assert_relative_eq!(b.center_x(), 60.0);
        assert_relative_eq!(b.center_y(), 45.0);
    }

    #[test]
    fn test_iou_identical() {
        let a = BoundingBox::new(10, 10, 110, 110);
        assert_relative_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        let a = BoundingBox::new(0, 0, 100, 100);
        let b = BoundingBox::new(50, 0, 150, 100);
        assert_relative_eq!(a.iou(&b), 5000.0 / 15000.0);
    }

    #[test]
    fn test_iou_touching_edges_is_zero() {
        let a = BoundingBox::new(0, 0, 50, 50);
        let b = BoundingBox::new(50, 0, 100, 50);
        assert_relative_eq!(a.iou(&b), 0.0);
    }
}
