//! Bounding box representation and the frame clamping rules

use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned box in image pixel coordinates (top-left corner plus size)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Box of the given size centred at `(cx, cy)`
    pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self {
            x: cx - width / 2.0,
            y: cy - height / 2.0,
            width,
            height,
        }
    }

    /// Box spanned by two arbitrary opposite corners
    pub fn from_corners(p1: (f32, f32), p2: (f32, f32)) -> Self {
        Self {
            x: p1.0.min(p2.0),
            y: p1.1.min(p2.1),
            width: (p2.0 - p1.0).abs(),
            height: (p2.1 - p1.1).abs(),
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Intersection with another box; empty intersections have zero size
    pub fn intersect(&self, other: &BoundingBox) -> BoundingBox {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        if x2 <= x1 || y2 <= y1 {
            return BoundingBox::new(x1, y1, 0.0, 0.0);
        }
        BoundingBox::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// Clamp applied to the previous box before a frame is searched.
    ///
    /// Keeps the box overlapping the frame by at least one pixel on each axis.
    pub fn clamp_before_search(&mut self, frame_width: u32, frame_height: u32) {
        let cols = frame_width as f32;
        let rows = frame_height as f32;

        if self.x + self.width <= 0.0 {
            self.x = -self.width + 1.0;
        }
        if self.y + self.height <= 0.0 {
            self.y = -self.height + 1.0;
        }
        if self.x >= cols - 1.0 {
            self.x = cols - 2.0;
        }
        if self.y >= rows - 1.0 {
            self.y = rows - 2.0;
        }
    }

    /// Clamp applied after the box has been moved or resized within a frame
    pub fn clamp_after_move(&mut self, frame_width: u32, frame_height: u32) {
        let cols = frame_width as f32;
        let rows = frame_height as f32;

        if self.x >= cols - 1.0 {
            self.x = cols - 1.0;
        }
        if self.y >= rows - 1.0 {
            self.y = rows - 1.0;
        }
        if self.x + self.width <= 0.0 {
            self.x = -self.width + 2.0;
        }
        if self.y + self.height <= 0.0 {
            self.y = -self.height + 2.0;
        }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BoundingBox({:.2}, {:.2}, {:.2}, {:.2})",
            self.x, self.y, self.width, self.height
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_bbox_center_roundtrip() {
        let bbox = BoundingBox::new(40.0, 30.0, 20.0, 10.0);
        let (cx, cy) = bbox.center();
        assert_eq!((cx, cy), (50.0, 35.0));

        let again = BoundingBox::from_center(cx, cy, bbox.width, bbox.height);
        assert_eq!(again, bbox);
    }

    #[test]
    fn test_from_corners_normalises_order() {
        let bbox = BoundingBox::from_corners((30.0, 5.0), (10.0, 25.0));
        assert_eq!(bbox, BoundingBox::new(10.0, 5.0, 20.0, 20.0));
    }

    #[test]
    fn test_intersect() {
        let frame = BoundingBox::new(0.0, 0.0, 100.0, 80.0);
        let bbox = BoundingBox::new(90.0, -10.0, 20.0, 20.0);
        let clipped = bbox.intersect(&frame);
        assert_abs_diff_eq!(clipped.x, 90.0);
        assert_abs_diff_eq!(clipped.y, 0.0);
        assert_abs_diff_eq!(clipped.width, 10.0);
        assert_abs_diff_eq!(clipped.height, 10.0);

        let outside = BoundingBox::new(200.0, 200.0, 5.0, 5.0).intersect(&frame);
        assert_eq!(outside.area(), 0.0);
    }

    #[test]
    fn test_clamp_before_search_keeps_overlap() {
        let mut left = BoundingBox::new(-30.0, -25.0, 20.0, 20.0);
        left.clamp_before_search(100, 100);
        assert_eq!(left.x, -19.0);
        assert_eq!(left.y, -19.0);
        assert!(left.x + left.width > 0.0);

        let mut right = BoundingBox::new(150.0, 99.5, 20.0, 20.0);
        right.clamp_before_search(100, 100);
        assert_eq!(right.x, 98.0);
        assert_eq!(right.y, 98.0);
    }

    #[test]
    fn test_clamp_after_move() {
        let mut bbox = BoundingBox::new(120.0, -40.0, 20.0, 20.0);
        bbox.clamp_after_move(100, 100);
        assert_eq!(bbox.x, 99.0);
        assert_eq!(bbox.y, -18.0);

        // Inside boxes are left alone
        let mut inside = BoundingBox::new(10.0, 10.0, 5.0, 5.0);
        inside.clamp_after_move(100, 100);
        assert_eq!(inside, BoundingBox::new(10.0, 10.0, 5.0, 5.0));
    }
}
