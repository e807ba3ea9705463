//! Batch vertex format
//!
//! Every element kind is expanded into the same vertex layout. Positions are
//! already in render (window) space; the clip parallelogram rides along on
//! each vertex so the pixel shader can reject fragments without a scissor
//! change per element.

use tessel_core::{PackedColor, RenderTransform, RotatedRect, TransformPoint, Vec2};

/// A vertex ready for upload (matches the shader `VertexInput` struct)
///
/// Memory layout:
/// - tex_coords: `vec4<f32>`     (16 bytes) - uv + tiling, or line start + end
/// - position: `vec2<f32>`       (8 bytes)  - render space
/// - clip_origin: `vec2<f32>`    (8 bytes)
/// - clip_extent_x: `vec2<f32>`  (8 bytes)
/// - clip_extent_y: `vec2<f32>`  (8 bytes)
/// - color: `vec4<u8>`           (4 bytes)  - unorm
/// Total: 52 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BatchVertex {
    pub tex_coords: [f32; 4],
    pub position: [f32; 2],
    pub clip_origin: [f32; 2],
    pub clip_extent_x: [f32; 2],
    pub clip_extent_y: [f32; 2],
    pub color: [u8; 4],
}

impl BatchVertex {
    /// Vertex at `local`, pushed through `render`
    pub fn new(
        render: &RenderTransform,
        local: Vec2,
        tex_coords: [f32; 4],
        color: PackedColor,
        clip: &RotatedRect,
    ) -> Self {
        let position = render.transform_point(local);
        Self {
            tex_coords,
            position: position.to_array(),
            clip_origin: clip.top_left.to_array(),
            clip_extent_x: clip.extent_x.to_array(),
            clip_extent_y: clip.extent_y.to_array(),
            color: color.to_array(),
        }
    }

    /// Untiled texture coordinate
    pub fn with_uv(render: &RenderTransform, local: Vec2, uv: Vec2, color: PackedColor, clip: &RotatedRect) -> Self {
        Self::new(render, local, [uv.x, uv.y, 1.0, 1.0], color, clip)
    }

    /// Texture coordinate plus tiling factors; a zero tiling passes the uv through
    pub fn with_tiling(
        render: &RenderTransform,
        local: Vec2,
        uv: Vec2,
        tiling: Vec2,
        color: PackedColor,
        clip: &RotatedRect,
    ) -> Self {
        Self::new(render, local, [uv.x, uv.y, tiling.x, tiling.y], color, clip)
    }

    /// Line segment vertex; the shader measures pixel distance to start..end
    pub fn with_segment(
        render: &RenderTransform,
        local: Vec2,
        segment_start: Vec2,
        segment_end: Vec2,
        color: PackedColor,
        clip: &RotatedRect,
    ) -> Self {
        Self::new(
            render,
            local,
            [segment_start.x, segment_start.y, segment_end.x, segment_end.y],
            color,
            clip,
        )
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.position[0], self.position[1])
    }

    pub fn uv(&self) -> Vec2 {
        Vec2::new(self.tex_coords[0], self.tex_coords[1])
    }

    pub fn packed_color(&self) -> PackedColor {
        let [r, g, b, a] = self.color;
        PackedColor { r, g, b, a }
    }

    pub fn clip_rect(&self) -> RotatedRect {
        RotatedRect {
            top_left: Vec2::new(self.clip_origin[0], self.clip_origin[1]),
            extent_x: Vec2::new(self.clip_extent_x[0], self.clip_extent_x[1]),
            extent_y: Vec2::new(self.clip_extent_y[0], self.clip_extent_y[1]),
        }
    }
}

/// Index type of the batch index buffer
pub type BatchIndex = u32;

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_core::Rect;

    #[test]
    fn test_vertex_size_is_stable() {
        assert_eq!(std::mem::size_of::<BatchVertex>(), 52);
        let vertices = [BatchVertex::default(); 3];
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        assert_eq!(bytes.len(), 156);
    }

    #[test]
    fn test_vertex_is_in_render_space() {
        let render = RenderTransform::from_translation(Vec2::new(10.0, 20.0));
        let clip = RotatedRect::from_rect(&Rect::new(0.0, 0.0, 50.0, 50.0));
        let v = BatchVertex::with_uv(&render, Vec2::new(1.0, 2.0), Vec2::new(0.5, 0.25), PackedColor::WHITE, &clip);
        assert_eq!(v.position(), Vec2::new(11.0, 22.0));
        assert_eq!(v.tex_coords, [0.5, 0.25, 1.0, 1.0]);
        assert_eq!(v.clip_rect(), clip);
        assert_eq!(v.packed_color(), PackedColor::WHITE);
    }
}
