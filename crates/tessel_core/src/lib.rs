//! Tessel core types
//!
//! This crate provides the value types shared by every other Tessel crate:
//! - Vector, rect, margin and color math
//! - Layout transforms (uniform scale + translation)
//! - Render transforms (2x2 matrix + translation)
//! - Immutable per-paint [`Geometry`] with layout/render composition
//! - Rotated clip rects baked into vertices

pub mod clip;
pub mod geometry;
pub mod math;
pub mod transform;

pub use clip::RotatedRect;
pub use geometry::{Geometry, PaintGeometry};
pub use math::{Color, Margin, PackedColor, Rect, Vec2};
pub use transform::{LayoutTransform, RenderTransform, TransformPoint};

/// Tolerance used for "nearly equal" float comparisons across the crate.
pub const KINDA_SMALL_NUMBER: f32 = 1.0e-4;

/// Returns true when `value` is within [`KINDA_SMALL_NUMBER`] of zero.
#[inline]
pub fn is_nearly_zero(value: f32) -> bool {
    value.abs() <= KINDA_SMALL_NUMBER
}
