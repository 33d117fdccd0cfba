use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Coordinate2D {
    pub x: f32,
    pub y: f32,
}

impl Coordinate2D {
    pub fn new(x: f32, y: f32) -> Self {
        Coordinate2D { x, y }
    }

    pub fn to_vector(&self) -> Vector2<f32> {
        Vector2::new(self.x, self.y)
    }

    pub fn distance(&self, other: &Coordinate2D) -> f32 {
        (self.to_vector() - other.to_vector()).norm()
    }
}

/// Integer region `(x, y, width, height)` inside a frame or a face ROI.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        BoundingBox { x, y, width, height }
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Center with integer halving, matching how eye centers are placed on the pixel grid.
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// clamp_to shrinks the box so that it lies fully inside a `frame_width` x `frame_height` image.
    ///
    /// # Arguments
    /// * `frame_width` - i32
    /// * `frame_height` - i32
    ///
    /// # Returns
    /// * `BoundingBox` with non-negative width and height
    pub fn clamp_to(&self, frame_width: i32, frame_height: i32) -> BoundingBox {
        let x0 = self.x.clamp(0, frame_width.max(0));
        let y0 = self.y.clamp(0, frame_height.max(0));
        let x1 = (self.x.saturating_add(self.width)).clamp(x0, frame_width.max(0));
        let y1 = (self.y.saturating_add(self.height)).clamp(y0, frame_height.max(0));
        BoundingBox::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// scale maps a box detected on a resized image back to the source resolution.
    pub fn scale(&self, factor: f32) -> BoundingBox {
        BoundingBox::new(
            (self.x as f32 * factor) as i32,
            (self.y as f32 * factor) as i32,
            (self.width as f32 * factor) as i32,
            (self.height as f32 * factor) as i32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_to_frame() {
        let bbox = BoundingBox::new(-10, 5, 50, 200);
        let clamped = bbox.clamp_to(30, 100);
        assert_eq!(clamped, BoundingBox::new(0, 5, 30, 95));

        let outside = BoundingBox::new(40, 40, 10, 10).clamp_to(30, 30);
        assert_eq!(outside.width, 0);
        assert_eq!(outside.height, 0);
    }

    #[test]
    fn test_center_uses_integer_halving() {
        let bbox = BoundingBox::new(10, 20, 15, 9);
        assert_eq!(bbox.center(), (17, 24));
    }

    #[test]
    fn test_scale_back_from_upscaled_detection() {
        let bbox = BoundingBox::new(100, 60, 81, 81);
        assert_eq!(bbox.scale(0.5), BoundingBox::new(50, 30, 40, 40));
    }

    #[test]
    fn test_coordinate_distance() {
        let a = Coordinate2D::new(0.0, 0.0);
        let b = Coordinate2D::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }
}
