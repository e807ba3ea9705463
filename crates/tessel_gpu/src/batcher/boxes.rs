//! Quads: boxes (plain and 9-slice), debug quads, viewports and borders

use super::{quad_corners, ElementBatcher, ElementSpace};
use crate::batch::BatchKey;
use crate::shader::{BatchDrawFlags, ShaderParams, ShaderType};
use crate::vertex::BatchVertex;
use tessel_core::{Color, RenderTransform, TransformPoint, Vec2};
use tessel_paint::{
    BorderPayload, BoxPayload, BrushDrawType, DrawEffects, DrawElement, RotationSpace, ViewportPayload,
};

/// Texture coordinates of one textured element
struct UvRange {
    start: Vec2,
    end: Vec2,
    size: Vec2,
    half_texel: Vec2,
    texture_size: Vec2,
}

fn nonzero(v: f32) -> f32 {
    if v != 0.0 {
        v
    } else {
        1.0
    }
}

fn at_least_one(tiling: f32) -> f32 {
    if tiling.is_finite() && tiling >= 1.0 {
        tiling
    } else {
        1.0
    }
}

/// Clamp overlapping margins to the middle of the element
fn clamp_margins(lo: f32, hi: f32, extent: f32) -> (f32, f32) {
    if hi < lo {
        let middle = extent / 2.0;
        (middle, middle)
    } else {
        (lo, hi)
    }
}

fn mirror(value: f32, min: f32, max: f32) -> f32 {
    max - (value - min)
}

/// Two triangles per quad for `quads` quads of 4 consecutive vertices
fn quad_indices(start: u32, quads: u32) -> impl Iterator<Item = u32> {
    (0..quads).flat_map(move |q| {
        let b = start + q * 4;
        [b, b + 1, b + 2, b + 2, b + 1, b + 3]
    })
}

/// 9-slice triangle list over a 4x4 vertex grid laid out row by row
const NINE_SLICE_INDICES: [u32; 54] = [
    0, 1, 2, 2, 1, 3, //
    2, 3, 4, 4, 3, 5, //
    4, 5, 6, 6, 5, 7, //
    1, 8, 3, 3, 8, 9, //
    3, 9, 5, 5, 9, 10, //
    5, 10, 7, 7, 10, 11, //
    8, 12, 9, 9, 12, 13, //
    9, 13, 10, 10, 13, 14, //
    10, 14, 11, 11, 14, 15,
];

impl ElementBatcher {
    /// Render transform of a box, including its own rotation
    fn box_render_transform(element: &DrawElement, payload: &BoxPayload) -> RenderTransform {
        let render = element.geometry.render_transform;
        if payload.angle == 0.0 {
            return render;
        }
        let pivot = match (payload.rotation_point, payload.rotation_space) {
            (Some(point), RotationSpace::RelativeToElement) => point,
            (Some(point), RotationSpace::RelativeToWorld) => render.inverse().transform_point(point),
            (None, _) => element.geometry.local_size * 0.5,
        };
        RenderTransform::about_pivot(&RenderTransform::from_rotation(payload.angle), pivot).concat(&render)
    }

    pub(super) fn add_box_element(&mut self, element: &DrawElement, payload: &BoxPayload) {
        let brush = &payload.brush;
        if brush.draws_nothing() {
            return;
        }
        let Some(color) = self.element_color(payload.tint, Some(brush.tint)) else {
            return;
        };

        // The clip ignores the box's own rotation
        let space = ElementSpace::with_render(element, Self::box_render_transform(element, payload));
        let local_size = element.geometry.local_size;
        let pixel_center_offset = self.config.pixel_center_offset;

        let proxy = self.resources.shader_resource(brush);
        let uv = match &proxy {
            Some(proxy) => {
                let texture_size = Vec2::new(nonzero(proxy.actual_size.x), nonzero(proxy.actual_size.y));
                let half_texel = Vec2::new(
                    pixel_center_offset / texture_size.x,
                    pixel_center_offset / texture_size.y,
                );
                let start = proxy.start_uv + half_texel;
                UvRange {
                    start,
                    end: start + proxy.size_uv,
                    size: proxy.size_uv,
                    half_texel,
                    texture_size,
                }
            }
            None => UvRange {
                start: Vec2::ZERO,
                end: Vec2::ONE,
                size: Vec2::ONE,
                half_texel: Vec2::splat(pixel_center_offset),
                texture_size: Vec2::ONE,
            },
        };

        let tile_u = brush.tiling.tiles_u();
        let tile_v = brush.tiling.tiles_v();
        let mut flags = BatchDrawFlags::NONE;
        flags.set(BatchDrawFlags::TILE_U, tile_u);
        flags.set(BatchDrawFlags::TILE_V, tile_v);
        let flags = self.draw_flags(element, flags);

        let key = BatchKey::new(ShaderType::Default, element.effects, flags, element.scissor_rect.as_ref())
            .with_texture(proxy.map(|p| p.texture));
        let slot = self.find_batch_for_element(element.layer, key);

        let tiling = Vec2::new(
            if tile_u { local_size.x / uv.texture_size.x } else { 1.0 },
            if tile_v { local_size.y / uv.texture_size.y } else { 1.0 },
        );
        let vertex = |local: Vec2, tex: Vec2| BatchVertex::with_tiling(&space.render, local, tex, tiling, color, &space.clip);

        let margin = brush.margin;
        let mut buffers = self.buffers(slot);

        if brush.draw_as != BrushDrawType::Image && !margin.is_zero() {
            let UvRange {
                mut start,
                mut end,
                size,
                half_texel,
                texture_size,
            } = uv;

            let mut left_u = if margin.left > 0.0 { start.x + margin.left * size.x + half_texel.x } else { start.x };
            let mut top_v = if margin.top > 0.0 { start.y + margin.top * size.y + half_texel.y } else { start.y };
            let mut right_u = if margin.right > 0.0 { end.x - margin.right * size.x + half_texel.x } else { end.x };
            let mut bottom_v = if margin.bottom > 0.0 { end.y - margin.bottom * size.y + half_texel.y } else { end.y };

            let (min, max) = (start, end);
            if brush.mirroring.flips_u() {
                start.x = mirror(start.x, min.x, max.x);
                end.x = mirror(end.x, min.x, max.x);
                left_u = mirror(left_u, min.x, max.x);
                right_u = mirror(right_u, min.x, max.x);
            }
            if brush.mirroring.flips_v() {
                start.y = mirror(start.y, min.y, max.y);
                end.y = mirror(end.y, min.y, max.y);
                top_v = mirror(top_v, min.y, max.y);
                bottom_v = mirror(bottom_v, min.y, max.y);
            }

            let (left_x, right_x) = clamp_margins(
                texture_size.x * margin.left,
                local_size.x - texture_size.x * margin.right,
                local_size.x,
            );
            let (top_y, bottom_y) = clamp_margins(
                texture_size.y * margin.top,
                local_size.y - texture_size.y * margin.bottom,
                local_size.y,
            );

            let xs = [0.0, left_x, right_x, local_size.x];
            let us = [start.x, left_u, right_u, end.x];
            let ys = [0.0, top_y, bottom_y, local_size.y];
            let vs = [start.y, top_v, bottom_v, end.y];

            let index_start = buffers.next_index();
            // First two rows interleave (x0,y0) (x0,y1) (x1,y0) (x1,y1) ...
            for column in 0..4 {
                for row in 0..2 {
                    buffers.vertices.push(vertex(
                        Vec2::new(xs[column], ys[row]),
                        Vec2::new(us[column], vs[row]),
                    ));
                }
            }
            for row in 2..4 {
                for column in 0..4 {
                    buffers.vertices.push(vertex(
                        Vec2::new(xs[column], ys[row]),
                        Vec2::new(us[column], vs[row]),
                    ));
                }
            }
            buffers
                .indices
                .extend(NINE_SLICE_INDICES.iter().map(|i| index_start + i));
        } else {
            let [tl, tr, bl, br] = quad_corners(local_size);
            buffers.push_quad([
                vertex(tl, uv.start),
                vertex(tr, Vec2::new(uv.end.x, uv.start.y)),
                vertex(bl, Vec2::new(uv.start.x, uv.end.y)),
                vertex(br, uv.end),
            ]);
        }
    }

    /// Untextured wireframe quad covering the element
    pub(super) fn add_quad_element(&mut self, element: &DrawElement, tint: Color) {
        let Some(color) = self.element_color(tint, None) else {
            return;
        };
        let space = ElementSpace::of(element);
        let key = BatchKey::new(
            ShaderType::Default,
            DrawEffects::NONE,
            BatchDrawFlags::WIREFRAME | BatchDrawFlags::NO_BLENDING,
            element.scissor_rect.as_ref(),
        );
        let slot = self.find_batch_for_element(element.layer, key);

        let corners = quad_corners(element.geometry.local_size);
        let uvs = quad_corners(Vec2::ONE);
        let vertices = std::array::from_fn(|i| BatchVertex::with_uv(&space.render, corners[i], uvs[i], color, &space.clip));
        self.buffers(slot).push_quad(vertices);
    }

    pub(super) fn add_viewport_element(&mut self, element: &DrawElement, payload: &ViewportPayload) {
        let color = payload.tint.to_packed();
        let space = ElementSpace::of(element);

        let mut flags = BatchDrawFlags::NONE;
        flags.set(BatchDrawFlags::NO_BLENDING, !payload.allow_blending);
        flags.set(BatchDrawFlags::NO_GAMMA, !payload.gamma_correct);
        let flags = self.draw_flags(element, flags);

        // The font shader samples alpha only
        let shader = if payload.alpha_only { ShaderType::Font } else { ShaderType::Default };
        let texture = payload
            .texture
            .filter(|handle| handle.is_valid())
            .map(|handle| self.resources.texture(handle).map_or(handle, |proxy| proxy.texture));

        let key = BatchKey::new(shader, element.effects, flags, element.scissor_rect.as_ref()).with_texture(texture);
        let slot = self.find_batch_for_element(element.layer, key);
        if payload.requires_vsync {
            self.note_requires_vsync();
        }

        let corners = quad_corners(element.geometry.local_size);
        let uvs = quad_corners(Vec2::ONE);
        let vertices = std::array::from_fn(|i| BatchVertex::with_uv(&space.render, corners[i], uvs[i], color, &space.clip));
        self.buffers(slot).push_quad(vertices);
    }

    /// Tiled 9-slice frame without a center
    pub(super) fn add_border_element(&mut self, element: &DrawElement, payload: &BorderPayload) {
        let brush = &payload.brush;
        let Some(color) = self.element_color(payload.tint, Some(brush.tint)) else {
            return;
        };
        let space = ElementSpace::of(element);
        let local_size = element.geometry.local_size;
        let pixel_center_offset = self.config.pixel_center_offset;

        // Borders tile, so their textures are never atlased
        let proxy = self.resources.shader_resource(brush);
        let texture_size = proxy
            .map(|p| Vec2::new(nonzero(p.actual_size.x), nonzero(p.actual_size.y)))
            .unwrap_or(Vec2::ONE);
        let texture_local = space.inverse_layout.transform_vector(texture_size);

        let half_texel = Vec2::new(
            pixel_center_offset / texture_size.x,
            pixel_center_offset / texture_size.y,
        );
        let start = half_texel;
        let end = Vec2::ONE + half_texel;

        let margin = brush.margin;
        let (left_x, right_x) = clamp_margins(
            texture_local.x * margin.left,
            local_size.x - texture_local.x * margin.right,
            local_size.x,
        );
        let (top_y, bottom_y) = clamp_margins(
            texture_local.y * margin.top,
            local_size.y - texture_local.y * margin.bottom,
            local_size.y,
        );

        let left_u = if margin.left > 0.0 { margin.left } else { 0.0 } + half_texel.x;
        let top_v = if margin.top > 0.0 { margin.top } else { 0.0 } + half_texel.y;
        let right_u = if margin.right > 0.0 { 1.0 - margin.right } else { 1.0 } + half_texel.x;
        let bottom_v = if margin.bottom > 0.0 { 1.0 - margin.bottom } else { 1.0 } + half_texel.y;

        // Pixels covered by the tiled part over texels in the tiled part
        let top_tiling = at_least_one((right_x - left_x) / (texture_local.x * (1.0 - (margin.left + margin.right))));
        let left_tiling = at_least_one((bottom_y - top_y) / (texture_local.y * (1.0 - (margin.top + margin.bottom))));
        let right_tiling = left_tiling;
        let bottom_tiling = top_tiling;

        let params = ShaderParams::pixel([left_u, right_u, top_v, bottom_v]);
        let flags = self.draw_flags(element, BatchDrawFlags::TILE_U | BatchDrawFlags::TILE_V);
        let key = BatchKey::new(ShaderType::Border, element.effects, flags, element.scissor_rect.as_ref())
            .with_texture(proxy.map(|p| p.texture))
            .with_params(params);
        let slot = self.find_batch_for_element(element.layer, key);

        let end_x = local_size.x;
        let end_y = local_size.y;
        // Zero tiling passes the uv through (corners)
        let corner = Vec2::ZERO;
        let horizontal = |t: f32| Vec2::new(t, 0.0);
        let vertical = |t: f32| Vec2::new(0.0, t);

        // (position, uv) per vertex; each group of four is one quad
        let quads: [(Vec2, [(Vec2, Vec2); 4]); 8] = [
            // Top left corner
            (
                corner,
                [
                    (Vec2::new(0.0, 0.0), Vec2::new(start.x, start.y)),
                    (Vec2::new(0.0, top_y), Vec2::new(start.x, top_v)),
                    (Vec2::new(left_x, 0.0), Vec2::new(left_u, start.y)),
                    (Vec2::new(left_x, top_y), Vec2::new(left_u, top_v)),
                ],
            ),
            // Top edge
            (
                horizontal(top_tiling),
                [
                    (Vec2::new(left_x, 0.0), Vec2::new(start.x, start.y)),
                    (Vec2::new(left_x, top_y), Vec2::new(start.x, top_v)),
                    (Vec2::new(right_x, 0.0), Vec2::new(end.x, start.y)),
                    (Vec2::new(right_x, top_y), Vec2::new(end.x, top_v)),
                ],
            ),
            // Top right corner
            (
                corner,
                [
                    (Vec2::new(right_x, 0.0), Vec2::new(right_u, start.y)),
                    (Vec2::new(right_x, top_y), Vec2::new(right_u, top_v)),
                    (Vec2::new(end_x, 0.0), Vec2::new(end.x, start.y)),
                    (Vec2::new(end_x, top_y), Vec2::new(end.x, top_v)),
                ],
            ),
            // Left edge
            (
                vertical(left_tiling),
                [
                    (Vec2::new(0.0, top_y), Vec2::new(start.x, start.y)),
                    (Vec2::new(0.0, bottom_y), Vec2::new(start.x, end.y)),
                    (Vec2::new(left_x, top_y), Vec2::new(left_u, start.y)),
                    (Vec2::new(left_x, bottom_y), Vec2::new(left_u, end.y)),
                ],
            ),
            // Right edge
            (
                vertical(right_tiling),
                [
                    (Vec2::new(right_x, top_y), Vec2::new(right_u, start.y)),
                    (Vec2::new(right_x, bottom_y), Vec2::new(right_u, end.y)),
                    (Vec2::new(end_x, top_y), Vec2::new(end.x, start.y)),
                    (Vec2::new(end_x, bottom_y), Vec2::new(end.x, end.y)),
                ],
            ),
            // Bottom left corner
            (
                corner,
                [
                    (Vec2::new(0.0, bottom_y), Vec2::new(start.x, bottom_v)),
                    (Vec2::new(0.0, end_y), Vec2::new(start.x, end.y)),
                    (Vec2::new(left_x, bottom_y), Vec2::new(left_u, bottom_v)),
                    (Vec2::new(left_x, end_y), Vec2::new(left_u, end.y)),
                ],
            ),
            // Bottom edge
            (
                horizontal(bottom_tiling),
                [
                    (Vec2::new(left_x, bottom_y), Vec2::new(start.x, bottom_v)),
                    (Vec2::new(left_x, end_y), Vec2::new(start.x, end.y)),
                    (Vec2::new(right_x, bottom_y), Vec2::new(end.x, bottom_v)),
                    (Vec2::new(right_x, end_y), Vec2::new(end.x, end.y)),
                ],
            ),
            // Bottom right corner
            (
                corner,
                [
                    (Vec2::new(right_x, bottom_y), Vec2::new(right_u, bottom_v)),
                    (Vec2::new(right_x, end_y), Vec2::new(right_u, end.y)),
                    (Vec2::new(end_x, bottom_y), Vec2::new(end.x, bottom_v)),
                    (Vec2::new(end_x, end_y), Vec2::new(end.x, end.y)),
                ],
            ),
        ];

        let buffers = self.buffers(slot);
        let index_start = buffers.vertices.len() as u32;
        for (tiling, vertices) in quads {
            buffers.vertices.extend(
                vertices
                    .into_iter()
                    .map(|(local, uv)| BatchVertex::with_tiling(&space.render, local, uv, tiling, color, &space.clip)),
            );
        }
        buffers.indices.extend(quad_indices(index_start, 8));
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::resources::{ResourceProxy, ResourceTable};
    use crate::shader::{BatchDrawFlags, ShaderType};
    use tessel_core::{Color, Geometry, LayoutTransform, Margin, Vec2};
    use tessel_paint::{
        Brush, BrushMirroring, BrushTiling, ResourceHandle, RotationSpace, ViewportPayload, WindowElementList,
    };

    fn list() -> WindowElementList {
        WindowElementList::new(Vec2::new(800.0, 600.0))
    }

    fn resources_with(name: &str, size: f32) -> ResourceTable {
        let table = ResourceTable::new();
        table.register(name, ResourceProxy::texture(ResourceHandle(7), Vec2::splat(size)));
        table
    }

    #[test]
    fn test_plain_box_is_one_quad() {
        let mut list = list();
        list.add_box(at(0, Vec2::new(10.0, 20.0), Vec2::new(100.0, 50.0)), &Brush::solid(), Color::WHITE);

        let out = batch(&list, &mut batcher());
        assert_eq!(out.render_batches.len(), 1);
        assert_eq!(out.vertices.len(), 4);
        assert_eq!(out.indices, vec![0, 1, 2, 2, 1, 3]);

        let positions: Vec<Vec2> = out.vertices.iter().map(|v| v.position()).collect();
        assert_eq!(
            positions,
            vec![
                Vec2::new(10.0, 20.0),
                Vec2::new(110.0, 20.0),
                Vec2::new(10.0, 70.0),
                Vec2::new(110.0, 70.0),
            ]
        );
        assert_eq!(out.vertices[3].uv(), Vec2::ONE);
    }

    #[test]
    fn test_nine_slice_box_has_sixteen_vertices() {
        let mut list = list();
        let brush = Brush::boxed("button", Vec2::splat(32.0), Margin::uniform(0.25));
        list.add_box(at(0, Vec2::ZERO, Vec2::new(100.0, 60.0)), &brush, Color::WHITE);

        let out = batch(&list, &mut batcher_with(resources_with("button", 32.0)));
        assert_eq!(out.vertices.len(), 16);
        assert_eq!(out.indices.len(), 54);
        assert_eq!(out.render_batches[0].key.texture, Some(ResourceHandle(7)));

        // Margins sit a quarter of the texture size in from each edge
        assert_eq!(out.vertices[3].position(), Vec2::new(8.0, 8.0));
        assert_eq!(out.vertices[3].uv(), Vec2::new(0.25, 0.25));
        assert_eq!(out.vertices[10].position(), Vec2::new(92.0, 52.0));
        assert_eq!(out.vertices[10].uv(), Vec2::new(0.75, 0.75));
        assert_eq!(out.vertices[15].position(), Vec2::new(100.0, 60.0));
        assert!(out.indices.iter().all(|&i| i < 16));
    }

    #[test]
    fn test_nine_slice_margins_clamp_when_overlapping() {
        let mut list = list();
        let brush = Brush::boxed("button", Vec2::splat(32.0), Margin::uniform(0.4));
        list.add_box(at(0, Vec2::ZERO, Vec2::new(20.0, 20.0)), &brush, Color::WHITE);

        let out = batch(&list, &mut batcher_with(resources_with("button", 32.0)));
        assert_eq!(out.vertices[3].position(), Vec2::new(10.0, 10.0));
        assert_eq!(out.vertices[5].position(), Vec2::new(10.0, 10.0));
    }

    #[test]
    fn test_mirrored_box_flips_uvs() {
        let mut list = list();
        let brush = Brush::boxed("button", Vec2::splat(32.0), Margin::uniform(0.25))
            .with_mirroring(BrushMirroring::Horizontal);
        list.add_box(at(0, Vec2::ZERO, Vec2::new(100.0, 60.0)), &brush, Color::WHITE);

        let out = batch(&list, &mut batcher_with(resources_with("button", 32.0)));
        assert_eq!(out.vertices[0].uv(), Vec2::new(1.0, 0.0));
        assert_eq!(out.vertices[6].uv(), Vec2::new(0.0, 0.0));
    }

    #[test]
    fn test_tiled_box_sets_tiling_and_flags() {
        let mut list = list();
        let brush = Brush::image("pattern", Vec2::splat(16.0)).with_tiling(BrushTiling::Horizontal);
        list.add_box(at(0, Vec2::ZERO, Vec2::new(64.0, 16.0)), &brush, Color::WHITE);

        let out = batch(&list, &mut batcher_with(resources_with("pattern", 16.0)));
        let key = out.render_batches[0].key;
        assert!(key.flags.contains(BatchDrawFlags::TILE_U));
        assert!(!key.flags.contains(BatchDrawFlags::TILE_V));
        assert_eq!(out.vertices[0].tex_coords[2..], [4.0, 1.0]);
    }

    #[test]
    fn test_transparent_box_produces_no_batch() {
        let mut list = list();
        list.add_box(at(0, Vec2::ZERO, Vec2::splat(10.0)), &Brush::solid(), Color::TRANSPARENT);
        list.add_box(
            at(0, Vec2::ZERO, Vec2::splat(10.0)),
            &Brush::solid().with_tint(Color::WHITE.with_alpha(0.0)),
            Color::WHITE,
        );

        let out = batch(&list, &mut batcher());
        assert!(out.render_batches.is_empty());
        assert_eq!(out.stats.transparent_skipped, 2);
    }

    #[test]
    fn test_rotated_box_rotates_about_its_center() {
        let mut list = list();
        list.add_rotated_box(
            at(0, Vec2::ZERO, Vec2::new(10.0, 10.0)),
            &Brush::solid(),
            Color::WHITE,
            std::f32::consts::PI,
            None,
            RotationSpace::RelativeToElement,
        );

        let out = batch(&list, &mut batcher());
        let top_left = out.vertices[0].position();
        assert!(top_left.is_nearly_equal(Vec2::new(10.0, 10.0), 1e-4));
        // The clip is not rotated
        assert_eq!(out.vertices[0].clip_rect().extent_x, Vec2::new(800.0, 0.0));
    }

    #[test]
    fn test_debug_quad_is_wireframe() {
        let mut list = list();
        list.add_debug_quad(at(2, Vec2::ZERO, Vec2::splat(5.0)), Color::RED);

        let out = batch(&list, &mut batcher());
        let key = out.render_batches[0].key;
        assert_eq!(key.flags, BatchDrawFlags::WIREFRAME | BatchDrawFlags::NO_BLENDING);
        assert_eq!(out.vertices[1].uv(), Vec2::new(1.0, 0.0));
        assert_eq!(out.vertices[2].uv(), Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_viewport_flags_and_vsync() {
        let mut list = list();
        list.add_viewport(
            at(0, Vec2::ZERO, Vec2::new(320.0, 240.0)),
            ViewportPayload {
                texture: Some(ResourceHandle(42)),
                allow_blending: false,
                gamma_correct: false,
                alpha_only: true,
                requires_vsync: true,
                ..ViewportPayload::default()
            },
        );

        let out = batch(&list, &mut batcher());
        let key = out.render_batches[0].key;
        assert_eq!(key.shader, ShaderType::Font);
        assert_eq!(key.texture, Some(ResourceHandle(42)));
        assert!(key.flags.contains(BatchDrawFlags::NO_BLENDING | BatchDrawFlags::NO_GAMMA));
        assert!(out.requires_vsync);
        assert_eq!(out.vertices.len(), 4);
    }

    #[test]
    fn test_border_has_eight_quads_and_no_center() {
        let mut list = list();
        let brush = Brush::border("frame", Vec2::splat(16.0), Margin::uniform(0.25));
        list.add_border(at(0, Vec2::ZERO, Vec2::new(100.0, 40.0)), &brush, Color::WHITE);

        let out = batch(&list, &mut batcher_with(resources_with("frame", 16.0)));
        assert_eq!(out.vertices.len(), 32);
        assert_eq!(out.indices.len(), 48);

        let key = out.render_batches[0].key;
        assert_eq!(key.shader, ShaderType::Border);
        assert!(key.flags.contains(BatchDrawFlags::TILE_U | BatchDrawFlags::TILE_V));
        assert_eq!(key.shader_params.pixel_params, [0.25, 0.75, 0.25, 0.75]);

        // Corners pass uvs through, the top edge tiles (96 - 4) / (16 * 0.5) times
        assert_eq!(out.vertices[0].tex_coords[2..], [0.0, 0.0]);
        assert_eq!(out.vertices[4].tex_coords[2..], [11.5, 0.0]);
        assert_eq!(&out.indices[..6], &[0, 1, 2, 2, 1, 3]);
        assert_eq!(&out.indices[42..], &[28, 29, 30, 30, 29, 31]);
    }

    #[test]
    fn test_scaled_geometry_scales_render_positions() {
        let mut list = list();
        let geometry = Geometry::make_root(Vec2::new(800.0, 600.0), LayoutTransform::from_scale(2.0))
            .make_child_at(Vec2::new(5.0, 5.0), Vec2::new(10.0, 10.0));
        list.add_box(at_geometry(0, geometry.to_paint_geometry()), &Brush::solid(), Color::WHITE);

        let out = batch(&list, &mut batcher());
        assert_eq!(out.vertices[0].position(), Vec2::new(10.0, 10.0));
        assert_eq!(out.vertices[3].position(), Vec2::new(30.0, 30.0));
    }
}
