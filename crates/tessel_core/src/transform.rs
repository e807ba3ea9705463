//! Layout and render transforms
//!
//! Two transform spaces coexist:
//!
//! - **Layout transforms** are a uniform scale followed by a translation. They
//!   place widgets during arrangement and are what hit testing and
//!   absolute/local conversion invert.
//! - **Render transforms** are a full 2x2 matrix plus translation. They may
//!   rotate or shear visuals and never participate in layout.
//!
//! Both use row-vector convention: `concat(a, b)` applies `a` first, then `b`.

use crate::math::{Rect, Vec2};

/// Anything that can move points and directions between spaces
pub trait TransformPoint {
    fn transform_point(&self, point: Vec2) -> Vec2;

    /// Transform a direction (translation ignored)
    fn transform_vector(&self, vector: Vec2) -> Vec2;
}

// ─────────────────────────────────────────────────────────────────────────────
// Layout Transform
// ─────────────────────────────────────────────────────────────────────────────

/// Uniform scale followed by translation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutTransform {
    scale: f32,
    translation: Vec2,
}

impl Default for LayoutTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl LayoutTransform {
    pub const IDENTITY: LayoutTransform = LayoutTransform {
        scale: 1.0,
        translation: Vec2::ZERO,
    };

    pub const fn new(scale: f32, translation: Vec2) -> Self {
        Self { scale, translation }
    }

    pub const fn from_translation(translation: Vec2) -> Self {
        Self::new(1.0, translation)
    }

    pub const fn from_scale(scale: f32) -> Self {
        Self::new(scale, Vec2::ZERO)
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn translation(&self) -> Vec2 {
        self.translation
    }

    /// Apply `self`, then `other`
    pub fn concat(&self, other: &LayoutTransform) -> LayoutTransform {
        LayoutTransform {
            scale: self.scale * other.scale,
            translation: self.translation * other.scale + other.translation,
        }
    }

    pub fn inverse(&self) -> LayoutTransform {
        let inv_scale = 1.0 / self.scale;
        LayoutTransform {
            scale: inv_scale,
            translation: -self.translation * inv_scale,
        }
    }

    pub fn transform_rect(&self, rect: &Rect) -> Rect {
        Rect::from_position_size(
            self.transform_point(rect.top_left()),
            self.transform_vector(rect.size()),
        )
    }

    pub fn is_identity(&self) -> bool {
        self.scale == 1.0 && self.translation == Vec2::ZERO
    }
}

impl TransformPoint for LayoutTransform {
    fn transform_point(&self, point: Vec2) -> Vec2 {
        point * self.scale + self.translation
    }

    fn transform_vector(&self, vector: Vec2) -> Vec2 {
        vector * self.scale
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Render Transform
// ─────────────────────────────────────────────────────────────────────────────

/// 2x2 matrix plus translation
///
/// ```text
/// [x y] * | m00 m01 | + [tx ty]
///         | m10 m11 |
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderTransform {
    /// Matrix elements [m00, m01, m10, m11]
    pub matrix: [f32; 4],
    pub translation: Vec2,
}

impl Default for RenderTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl RenderTransform {
    pub const IDENTITY: RenderTransform = RenderTransform {
        matrix: [1.0, 0.0, 0.0, 1.0],
        translation: Vec2::ZERO,
    };

    pub const fn new(matrix: [f32; 4], translation: Vec2) -> Self {
        Self {
            matrix,
            translation,
        }
    }

    pub fn from_translation(translation: Vec2) -> Self {
        Self::new([1.0, 0.0, 0.0, 1.0], translation)
    }

    pub fn from_scale(sx: f32, sy: f32) -> Self {
        Self::new([sx, 0.0, 0.0, sy], Vec2::ZERO)
    }

    /// Rotation by `radians` (clockwise on a y-down screen)
    pub fn from_rotation(radians: f32) -> Self {
        let (s, c) = radians.sin_cos();
        Self::new([c, s, -s, c], Vec2::ZERO)
    }

    pub fn from_shear(shear_x: f32, shear_y: f32) -> Self {
        Self::new([1.0, shear_y, shear_x, 1.0], Vec2::ZERO)
    }

    /// Promote a layout transform into render space
    pub fn from_layout(layout: &LayoutTransform) -> Self {
        let s = layout.scale();
        Self::new([s, 0.0, 0.0, s], layout.translation())
    }

    /// `transform` applied about `pivot` (a point in the same space)
    pub fn about_pivot(transform: &RenderTransform, pivot: Vec2) -> Self {
        RenderTransform::from_translation(-pivot)
            .concat(transform)
            .concat(&RenderTransform::from_translation(pivot))
    }

    /// Apply `self`, then `other`
    pub fn concat(&self, other: &RenderTransform) -> RenderTransform {
        let [a00, a01, a10, a11] = self.matrix;
        let [b00, b01, b10, b11] = other.matrix;
        RenderTransform {
            matrix: [
                a00 * b00 + a01 * b10,
                a00 * b01 + a01 * b11,
                a10 * b00 + a11 * b10,
                a10 * b01 + a11 * b11,
            ],
            translation: other.transform_point(self.translation),
        }
    }

    pub fn concat_layout(&self, other: &LayoutTransform) -> RenderTransform {
        self.concat(&RenderTransform::from_layout(other))
    }

    pub fn determinant(&self) -> f32 {
        let [m00, m01, m10, m11] = self.matrix;
        m00 * m11 - m01 * m10
    }

    /// Inverse transform. A singular matrix yields the identity.
    pub fn inverse(&self) -> RenderTransform {
        let det = self.determinant();
        if det.abs() <= f32::EPSILON {
            tracing::warn!("inverting a singular render transform");
            return RenderTransform::IDENTITY;
        }
        let inv_det = 1.0 / det;
        let [m00, m01, m10, m11] = self.matrix;
        let inv = RenderTransform::new(
            [m11 * inv_det, -m01 * inv_det, -m10 * inv_det, m00 * inv_det],
            Vec2::ZERO,
        );
        RenderTransform {
            translation: inv.transform_vector(-self.translation),
            ..inv
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// True when the matrix is a pure (possibly non-uniform) scale
    pub fn is_axis_aligned(&self) -> bool {
        self.matrix[1] == 0.0 && self.matrix[2] == 0.0
    }
}

impl TransformPoint for RenderTransform {
    fn transform_point(&self, point: Vec2) -> Vec2 {
        self.transform_vector(point) + self.translation
    }

    fn transform_vector(&self, vector: Vec2) -> Vec2 {
        let [m00, m01, m10, m11] = self.matrix;
        Vec2::new(
            vector.x * m00 + vector.y * m10,
            vector.x * m01 + vector.y * m11,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec2, b: Vec2) -> bool {
        a.is_nearly_equal(b, 1.0e-3)
    }

    #[test]
    fn test_layout_concat_order() {
        let a = LayoutTransform::new(2.0, Vec2::new(10.0, 0.0));
        let b = LayoutTransform::from_translation(Vec2::new(5.0, 5.0));
        let p = Vec2::new(1.0, 1.0);

        let composed = a.concat(&b);
        assert_eq!(
            composed.transform_point(p),
            b.transform_point(a.transform_point(p))
        );
    }

    #[test]
    fn test_layout_inverse() {
        let t = LayoutTransform::new(1.5, Vec2::new(-3.0, 7.0));
        let p = Vec2::new(12.0, -4.0);
        assert!(close(t.inverse().transform_point(t.transform_point(p)), p));
        let id = t.concat(&t.inverse());
        assert!((id.scale() - 1.0).abs() < 1.0e-6);
        assert!(close(id.translation(), Vec2::ZERO));
    }

    #[test]
    fn test_render_rotation_and_inverse() {
        let rot = RenderTransform::from_rotation(std::f32::consts::FRAC_PI_2);
        let p = rot.transform_point(Vec2::new(1.0, 0.0));
        assert!(close(p, Vec2::new(0.0, 1.0)));

        let t = rot
            .concat(&RenderTransform::from_shear(0.3, 0.0))
            .concat(&RenderTransform::from_translation(Vec2::new(4.0, 2.0)));
        let q = Vec2::new(-2.0, 9.0);
        assert!(close(t.inverse().transform_point(t.transform_point(q)), q));
    }

    #[test]
    fn test_pivot_keeps_pivot_fixed() {
        let pivot = Vec2::new(50.0, 25.0);
        let t = RenderTransform::about_pivot(&RenderTransform::from_rotation(0.7), pivot);
        assert!(close(t.transform_point(pivot), pivot));
    }

    #[test]
    fn test_singular_inverse_is_identity() {
        let t = RenderTransform::from_scale(0.0, 1.0);
        assert!(t.inverse().is_identity());
    }
}
