//! Immutable per-paint geometry
//!
//! A [`Geometry`] is handed to every paint call. It carries the widget's
//! local size and two accumulated transforms:
//!
//! - the accumulated **layout** transform (scale + translation), exposed
//!   through the legacy `absolute_position()` / `scale()` projections
//! - the accumulated **render** transform, composed as
//!   `concat(local_render, local_layout, parent_render)`
//!
//! Absolute/local conversion only ever inverts the layout transform. A render
//! transform rotates what is drawn, never where layout believes it is.

use crate::clip::RotatedRect;
use crate::math::{Rect, Vec2};
use crate::transform::{LayoutTransform, RenderTransform, TransformPoint};

/// Layout and render placement of a widget for one paint pass
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    /// Size in local space
    size: Vec2,
    /// Offset from the parent in the parent's local space
    position: Vec2,
    /// Legacy projection of the accumulated layout transform
    absolute_position: Vec2,
    /// Legacy projection of the accumulated layout transform
    scale: f32,
    accumulated_render_transform: RenderTransform,
    has_render_transform: bool,
}

impl Geometry {
    /// Root geometry for a window
    pub fn make_root(size: Vec2, layout_transform: LayoutTransform) -> Self {
        Self {
            size,
            position: layout_transform.translation(),
            absolute_position: layout_transform.translation(),
            scale: layout_transform.scale(),
            accumulated_render_transform: RenderTransform::from_layout(&layout_transform),
            has_render_transform: false,
        }
    }

    /// Child geometry with a layout transform relative to this geometry
    pub fn make_child(&self, size: Vec2, local_layout: LayoutTransform) -> Self {
        let accumulated_layout = local_layout.concat(&self.layout_transform());
        Self {
            size,
            position: local_layout.translation(),
            absolute_position: accumulated_layout.translation(),
            scale: accumulated_layout.scale(),
            accumulated_render_transform: RenderTransform::from_layout(&local_layout)
                .concat(&self.accumulated_render_transform),
            has_render_transform: self.has_render_transform,
        }
    }

    /// Child geometry at `offset` with a unit local scale
    pub fn make_child_at(&self, offset: Vec2, size: Vec2) -> Self {
        self.make_child(size, LayoutTransform::from_translation(offset))
    }

    /// Child geometry with an additional render transform applied about `pivot`
    ///
    /// `pivot` is normalized to the child's size, so `(0.5, 0.5)` rotates about
    /// the center.
    pub fn make_child_with_render_transform(
        &self,
        size: Vec2,
        local_layout: LayoutTransform,
        local_render: RenderTransform,
        pivot: Vec2,
    ) -> Self {
        let mut child = self.make_child(size, local_layout);
        if local_render.is_identity() {
            return child;
        }

        let pivoted = RenderTransform::about_pivot(&local_render, pivot.component_mul(size));
        child.accumulated_render_transform = pivoted
            .concat_layout(&local_layout)
            .concat(&self.accumulated_render_transform);
        child.has_render_transform = true;
        child
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn absolute_position(&self) -> Vec2 {
        self.absolute_position
    }

    /// Accumulated layout scale. Never includes render rotation or shear.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn absolute_size(&self) -> Vec2 {
        self.size * self.scale
    }

    pub fn has_render_transform(&self) -> bool {
        self.has_render_transform
    }

    pub fn layout_transform(&self) -> LayoutTransform {
        LayoutTransform::new(self.scale, self.absolute_position)
    }

    pub fn render_transform(&self) -> RenderTransform {
        self.accumulated_render_transform
    }

    pub fn absolute_to_local(&self, absolute: Vec2) -> Vec2 {
        self.layout_transform().inverse().transform_point(absolute)
    }

    pub fn local_to_absolute(&self, local: Vec2) -> Vec2 {
        self.layout_transform().transform_point(local)
    }

    /// Layout-space rect in window coordinates
    pub fn layout_bounding_rect(&self) -> Rect {
        Rect::from_position_size(self.absolute_position, self.absolute_size())
    }

    /// Bounds of the rendered (possibly rotated) rect in window coordinates
    pub fn render_bounding_rect(&self) -> Rect {
        self.render_rotated_rect().to_bounding_rect()
    }

    pub fn render_rotated_rect(&self) -> RotatedRect {
        RotatedRect::from_rect_in_transform(
            &Rect::from_position_size(Vec2::ZERO, self.size),
            &self.accumulated_render_transform,
        )
    }

    /// Hit test against the rendered shape
    pub fn is_under_location(&self, absolute: Vec2) -> bool {
        self.render_rotated_rect().is_under_location(absolute)
    }

    pub fn to_paint_geometry(&self) -> PaintGeometry {
        PaintGeometry {
            local_size: self.size,
            layout_transform: self.layout_transform(),
            render_transform: self.accumulated_render_transform,
        }
    }

    /// Same geometry shifted by `delta` in window space
    pub fn translated(&self, delta: Vec2) -> Self {
        let mut moved = *self;
        moved.absolute_position += delta;
        moved.accumulated_render_transform.translation += delta;
        moved
    }
}

/// What a draw element needs from a [`Geometry`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaintGeometry {
    pub local_size: Vec2,
    pub layout_transform: LayoutTransform,
    pub render_transform: RenderTransform,
}

impl Default for PaintGeometry {
    fn default() -> Self {
        Self {
            local_size: Vec2::ZERO,
            layout_transform: LayoutTransform::IDENTITY,
            render_transform: RenderTransform::IDENTITY,
        }
    }
}

impl PaintGeometry {
    /// Geometry for raw window-space coordinates
    pub fn from_rect(rect: &Rect) -> Self {
        let layout = LayoutTransform::from_translation(rect.top_left());
        Self {
            local_size: rect.size(),
            layout_transform: layout,
            render_transform: RenderTransform::from_layout(&layout),
        }
    }

    /// Layout scale only, the font scale used by text
    pub fn draw_scale(&self) -> f32 {
        self.layout_transform.scale()
    }

    pub fn draw_position(&self) -> Vec2 {
        self.layout_transform.translation()
    }

    pub fn draw_size(&self) -> Vec2 {
        self.local_size * self.draw_scale()
    }

    pub fn translated(&self, delta: Vec2) -> Self {
        let mut moved = *self;
        moved.layout_transform =
            LayoutTransform::new(self.layout_transform.scale(), self.layout_transform.translation() + delta);
        moved.render_transform.translation += delta;
        moved
    }
}
