//! Rotated clip rects
//!
//! Clip rects are authored axis-aligned in window space. Once a render
//! transform is involved the clip region becomes a parallelogram, stored as a
//! corner plus two edge vectors and baked into each vertex.

use crate::math::{Rect, Vec2};
use crate::transform::{LayoutTransform, RenderTransform, TransformPoint};

/// Parallelogram: `top_left + u * extent_x + v * extent_y` for u, v in [0, 1]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RotatedRect {
    pub top_left: Vec2,
    pub extent_x: Vec2,
    pub extent_y: Vec2,
}

impl RotatedRect {
    pub fn from_rect(rect: &Rect) -> Self {
        Self {
            top_left: rect.top_left(),
            extent_x: Vec2::new(rect.width(), 0.0),
            extent_y: Vec2::new(0.0, rect.height()),
        }
    }

    pub fn from_rect_in_transform(rect: &Rect, transform: &RenderTransform) -> Self {
        Self {
            top_left: transform.transform_point(rect.top_left()),
            extent_x: transform.transform_vector(Vec2::new(rect.width(), 0.0)),
            extent_y: transform.transform_vector(Vec2::new(0.0, rect.height())),
        }
    }

    /// Window-space clip rect carried into render space and pixel snapped
    ///
    /// The clip rect lives in layout space, so it is first un-done through the
    /// inverse layout transform and then pushed through the render transform.
    /// Axis-aligned results are rounded to whole pixels.
    pub fn snapped(
        clip: &Rect,
        inverse_layout: &LayoutTransform,
        render: &RenderTransform,
    ) -> Self {
        let local = inverse_layout.transform_rect(clip);
        let rotated = Self::from_rect_in_transform(&local, render);

        if rotated.extent_x.y == 0.0 && rotated.extent_y.x == 0.0 {
            let top_left = rotated.top_left.round();
            let bottom_right = (rotated.top_left + rotated.extent_x + rotated.extent_y).round();
            Self {
                top_left,
                extent_x: Vec2::new(bottom_right.x - top_left.x, 0.0),
                extent_y: Vec2::new(0.0, bottom_right.y - top_left.y),
            }
        } else {
            rotated
        }
    }

    pub fn corners(&self) -> [Vec2; 4] {
        [
            self.top_left,
            self.top_left + self.extent_x,
            self.top_left + self.extent_y,
            self.top_left + self.extent_x + self.extent_y,
        ]
    }

    pub fn to_bounding_rect(&self) -> Rect {
        Rect::from_points(&self.corners())
    }

    /// Point containment using the parallelogram's edge basis
    pub fn is_under_location(&self, location: Vec2) -> bool {
        let det = self.extent_x.cross(self.extent_y);
        if det.abs() <= f32::EPSILON {
            return false;
        }
        let offset = location - self.top_left;
        let u = offset.cross(self.extent_y) / det;
        let v = self.extent_x.cross(offset) / det;
        (0.0..=1.0).contains(&u) && (0.0..=1.0).contains(&v)
    }

    pub fn offset(&self, delta: Vec2) -> Self {
        Self {
            top_left: self.top_left + delta,
            ..*self
        }
    }
}
