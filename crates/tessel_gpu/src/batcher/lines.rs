//! Line strips, splines and gradients
//!
//! Antialiased lines and splines use prefiltered line segments: each segment
//! is widened into a quad large enough to cover the filter radius, and every
//! vertex carries the segment's render-space endpoints so the pixel shader
//! can measure its distance to the line.

use super::{ElementBatcher, ElementSpace};
use crate::batch::BatchKey;
use crate::shader::{BatchDrawFlags, DrawPrimitive, ShaderParams, ShaderType};
use crate::vertex::BatchVertex;
use smallvec::SmallVec;
use tessel_core::{RenderTransform, TransformPoint, Vec2};
use tessel_paint::{DrawElement, GradientOrientation, GradientPayload, GradientStop, LinesPayload, SplinePayload};

/// Distance from the line, in pixels, over which the shader filters
const FILTER_RADIUS: f32 = 1.5;
/// Spline length covered by one segment
const SPLINE_SEGMENT_LENGTH: f32 = 15.0;
const MAX_SPLINE_SEGMENTS: f32 = 256.0;
const LINE_INTERSECT_TOLERANCE: f32 = 0.1;

fn is_nearly_zero(value: f32) -> bool {
    value.abs() <= 1.0e-8
}

/// Where segments `p1 -> p2` and `p3 -> p4` meet, or would meet when
/// extended by up to `tolerance` of their length
///
/// Coincident segments meet at the midpoint of the first; parallel ones do
/// not meet.
pub fn line_intersect(p1: Vec2, p2: Vec2, p3: Vec2, p4: Vec2, tolerance: f32) -> Option<Vec2> {
    let num_a = (p4.x - p3.x) * (p1.y - p3.y) - (p4.y - p3.y) * (p1.x - p3.x);
    let num_b = (p2.x - p1.x) * (p1.y - p3.y) - (p2.y - p1.y) * (p1.x - p3.x);
    let denom = (p4.y - p3.y) * (p2.x - p1.x) - (p4.x - p3.x) * (p2.y - p1.y);

    if is_nearly_zero(num_a) && is_nearly_zero(num_b) {
        return Some((p1 + p2) / 2.0);
    }
    if is_nearly_zero(denom) {
        return None;
    }

    let a = num_a / denom;
    let b = num_b / denom;
    let within = |t: f32| t >= -tolerance && t <= 1.0 + tolerance;
    (within(a) && within(b)).then(|| p1 + (p2 - p1) * a)
}

/// Cubic Hermite interpolation
fn cubic_interp(p0: Vec2, t0: Vec2, p1: Vec2, t1: Vec2, alpha: f32) -> Vec2 {
    let a2 = alpha * alpha;
    let a3 = a2 * alpha;
    p0 * (2.0 * a3 - 3.0 * a2 + 1.0)
        + t0 * (a3 - 2.0 * a2 + alpha)
        + p1 * (-2.0 * a3 + 3.0 * a2)
        + t1 * (a3 - a2)
}

/// Normal of the segment `start -> end`
fn segment_normal(start: Vec2, end: Vec2) -> Vec2 {
    Vec2::new(start.y - end.y, end.x - start.x).normalize()
}

/// Requested thickness and the half width of the generated strip
fn line_extent(thickness: f32, inverse_layout_scale: f32) -> (f32, f32) {
    let requested = (inverse_layout_scale * thickness).max(1.0);
    let line_thickness = ((2.0 * FILTER_RADIUS + requested) * std::f32::consts::SQRT_2).ceil();
    (requested, line_thickness * 0.5 + FILTER_RADIUS)
}

impl ElementBatcher {
    pub(super) fn add_spline_element(&mut self, element: &DrawElement, payload: &SplinePayload) {
        let Some(color) = self.element_color(payload.tint, None) else {
            return;
        };
        let space = ElementSpace::of(element);
        let render = space.render;

        let SplinePayload {
            start,
            start_dir,
            end,
            end_dir,
            ..
        } = *payload;
        let direct_length = (end - start).length();
        let handle_length = ((end - end_dir) - (start + start_dir)).length();
        let steps = (direct_length.max(handle_length) / SPLINE_SEGMENT_LENGTH)
            .ceil()
            .clamp(1.0, MAX_SPLINE_SEGMENTS) as u32;

        let (_, half_thickness) = line_extent(payload.thickness, space.inverse_layout.scale());
        let params = ShaderParams::pixel([payload.thickness, FILTER_RADIUS, 0.0, 0.0]);
        let flags = self.draw_flags(element, BatchDrawFlags::NONE);
        let key = BatchKey::new(ShaderType::LineSegment, element.effects, flags, element.scissor_rect.as_ref())
            .with_params(params);
        let slot = self.find_batch_for_element(element.layer, key);
        let buffers = self.buffers(slot);

        let vertex = |local: Vec2, from: Vec2, to: Vec2| {
            BatchVertex::with_segment(&render, local, render.transform_point(from), render.transform_point(to), color, &space.clip)
        };

        let mut start_pos = start;
        let mut end_pos = cubic_interp(start, start_dir, end, end_dir, 1.0 / steps as f32);
        let up = segment_normal(start, end) * half_thickness;
        buffers.vertices.push(vertex(start_pos + up, start_pos, end_pos));
        buffers.vertices.push(vertex(start_pos - up, start_pos, end_pos));

        for step in 0..steps {
            if step > 0 {
                end_pos = cubic_interp(start, start_dir, end, end_dir, (step + 1) as f32 / steps as f32);
            }
            let index_start = buffers.next_index();
            let up = segment_normal(start_pos, end_pos) * half_thickness;
            buffers.vertices.push(vertex(end_pos + up, start_pos, end_pos));
            buffers.vertices.push(vertex(end_pos - up, start_pos, end_pos));
            buffers.indices.extend_from_slice(&[
                index_start - 2,
                index_start - 1,
                index_start,
                index_start,
                index_start + 1,
                index_start - 1,
            ]);
            start_pos = end_pos;
        }
    }

    pub(super) fn add_line_element(&mut self, element: &DrawElement, payload: &LinesPayload) {
        let points = &payload.points;
        if points.len() < 2 {
            return;
        }
        let Some(color) = self.element_color(payload.tint, None) else {
            return;
        };
        let space = ElementSpace::of(element);

        if !payload.antialias {
            let flags = self.draw_flags(element, BatchDrawFlags::NONE);
            let key = BatchKey::new(ShaderType::Default, element.effects, flags, element.scissor_rect.as_ref())
                .with_primitive(DrawPrimitive::LineList);
            let slot = self.find_batch_for_element(element.layer, key);
            let buffers = self.buffers(slot);
            for segment in points.windows(2) {
                let index_start = buffers.next_index();
                for &point in segment {
                    buffers
                        .vertices
                        .push(BatchVertex::with_uv(&space.render, point, Vec2::ZERO, color, &space.clip));
                }
                buffers.indices.extend_from_slice(&[index_start, index_start + 1]);
            }
            return;
        }

        let (requested, half_thickness) = line_extent(payload.thickness, space.inverse_layout.scale());
        let params = ShaderParams::pixel([requested, FILTER_RADIUS, 0.0, 0.0]);
        let flags = self.draw_flags(element, BatchDrawFlags::NONE);
        let key = BatchKey::new(ShaderType::LineSegment, element.effects, flags, element.scissor_rect.as_ref())
            .with_params(params);
        let slot = self.find_batch_for_element(element.layer, key);
        let render: RenderTransform = space.render;
        let buffers = self.buffers(slot);

        let mut start_pos = points[0];
        let up = segment_normal(start_pos, points[1]) * half_thickness;
        let first_segment = [render.transform_point(start_pos), render.transform_point(points[1])];
        for local in [start_pos + up, start_pos - up] {
            buffers.vertices.push(BatchVertex::with_segment(
                &render,
                local,
                first_segment[0],
                first_segment[1],
                color,
                &space.clip,
            ));
        }

        for (i, &end_pos) in points.iter().enumerate().skip(1) {
            let mut index_start = buffers.next_index();
            let up = segment_normal(start_pos, end_pos) * half_thickness;
            let mut upper = end_pos + up;
            let mut lower = end_pos - up;
            let mut center = end_pos;

            // Miter into the next segment
            if let Some(&next_pos) = points.get(i + 1) {
                let next_up = segment_normal(end_pos, next_pos) * half_thickness;
                if let Some(p) = line_intersect(
                    start_pos + up,
                    end_pos + up,
                    end_pos + next_up,
                    next_pos + next_up,
                    LINE_INTERSECT_TOLERANCE,
                ) {
                    upper = p;
                }
                if let Some(p) = line_intersect(
                    start_pos - up,
                    end_pos - up,
                    end_pos - next_up,
                    next_pos - next_up,
                    LINE_INTERSECT_TOLERANCE,
                ) {
                    lower = p;
                }
                center = (upper + lower) * 0.5;
            }

            let segment_start = render.transform_point(start_pos);
            let segment_end = render.transform_point(center);
            let tex_coords = [segment_start.x, segment_start.y, segment_end.x, segment_end.y];

            if i > 1 {
                // Restart the strip from the previous join with this segment's endpoints
                let n = buffers.vertices.len();
                let mut before_last = buffers.vertices[n - 2];
                let mut last = buffers.vertices[n - 1];
                before_last.tex_coords = tex_coords;
                last.tex_coords = tex_coords;
                buffers.vertices.push(before_last);
                buffers.vertices.push(last);
                index_start += 2;
            }

            buffers
                .vertices
                .push(BatchVertex::new(&render, upper, tex_coords, color, &space.clip));
            buffers
                .vertices
                .push(BatchVertex::new(&render, lower, tex_coords, color, &space.clip));
            buffers.indices.extend_from_slice(&[
                index_start - 1,
                index_start - 2,
                index_start,
                index_start,
                index_start + 1,
                index_start - 1,
            ]);
            start_pos = end_pos;
        }
    }

    pub(super) fn add_gradient_element(&mut self, element: &DrawElement, payload: &GradientPayload) {
        let (Some(first), Some(last)) = (payload.stops.first(), payload.stops.last()) else {
            tracing::warn!(layer = element.layer, "gradient without stops");
            return;
        };
        let space = ElementSpace::of(element);
        let local_size = element.geometry.local_size;

        let axis = |v: Vec2| match payload.orientation {
            GradientOrientation::Horizontal => v.x,
            GradientOrientation::Vertical => v.y,
        };

        // Extend the first and last colors to the element edges
        let mut stops: SmallVec<[GradientStop; 6]> = SmallVec::new();
        if axis(first.position) > 0.0 {
            stops.push(GradientStop::new(Vec2::ZERO, first.color));
        }
        stops.extend_from_slice(&payload.stops);
        if axis(local_size) > axis(last.position) {
            stops.push(GradientStop::new(local_size, last.color));
        }

        let flags = self.draw_flags(element, BatchDrawFlags::NONE);
        let key = BatchKey::new(ShaderType::Default, element.effects, flags, element.scissor_rect.as_ref());
        let slot = self.find_batch_for_element(element.layer, key);
        let buffers = self.buffers(slot);

        for (i, stop) in stops.iter().enumerate() {
            let index_start = buffers.next_index();
            let (start, end) = match payload.orientation {
                GradientOrientation::Horizontal => (
                    Vec2::new(stop.position.x, 0.0),
                    Vec2::new(stop.position.x, local_size.y),
                ),
                GradientOrientation::Vertical => (
                    Vec2::new(0.0, stop.position.y),
                    Vec2::new(local_size.x, stop.position.y),
                ),
            };
            let color = stop.color.to_packed();
            buffers
                .vertices
                .push(BatchVertex::new(&space.render, start, [0.0; 4], color, &space.clip));
            buffers
                .vertices
                .push(BatchVertex::new(&space.render, end, [0.0; 4], color, &space.clip));

            if i > 0 {
                buffers.indices.extend_from_slice(&[
                    index_start - 2,
                    index_start - 1,
                    index_start,
                    index_start,
                    index_start - 1,
                    index_start + 1,
                ]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use tessel_core::Color;
    use tessel_paint::{DrawEffects, WindowElementList};

    fn list() -> WindowElementList {
        WindowElementList::new(Vec2::new(800.0, 600.0))
    }

    #[test]
    fn test_line_intersect_crossing_and_parallel() {
        let hit = line_intersect(Vec2::ZERO, Vec2::splat(2.0), Vec2::new(0.0, 2.0), Vec2::new(2.0, 0.0), 0.1);
        assert_eq!(hit, Some(Vec2::new(1.0, 1.0)));

        let parallel = line_intersect(Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0), Vec2::new(1.0, 1.0), 0.1);
        assert_eq!(parallel, None);

        let same = line_intersect(Vec2::ZERO, Vec2::new(4.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(3.0, 0.0), 0.1);
        assert_eq!(same, Some(Vec2::new(2.0, 0.0)));
    }

    #[test]
    fn test_line_intersect_tolerance() {
        let near = line_intersect(Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(1.05, -1.0), Vec2::new(1.05, 1.0), 0.1);
        assert!(near.is_some_and(|p| p.is_nearly_equal(Vec2::new(1.05, 0.0), 1e-5)));

        let far = line_intersect(Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(5.0, -1.0), Vec2::new(5.0, 1.0), 0.1);
        assert_eq!(far, None);
    }

    #[test]
    fn test_spline_segment_count() {
        let mut list = list();
        list.add_spline(
            at(0, Vec2::ZERO, Vec2::new(200.0, 50.0)),
            SplinePayload {
                start: Vec2::ZERO,
                start_dir: Vec2::ZERO,
                end: Vec2::new(150.0, 0.0),
                end_dir: Vec2::ZERO,
                thickness: 2.0,
                tint: Color::WHITE,
            },
        );

        let out = batch(&list, &mut batcher());
        // 150 / 15 = 10 segments
        assert_eq!(out.vertices.len(), 2 + 2 * 10);
        assert_eq!(out.indices.len(), 6 * 10);
        let key = out.render_batches[0].key;
        assert_eq!(key.shader, ShaderType::LineSegment);
        assert_eq!(key.shader_params.pixel_params, [2.0, 1.5, 0.0, 0.0]);
        assert!(out.requires_stencil_test);
        assert_eq!(out.vertices.last().map(|v| v.position().x), Some(150.0));
    }

    #[test]
    fn test_spline_segments_are_clamped() {
        let mut list = list();
        let spline = SplinePayload {
            start: Vec2::ZERO,
            start_dir: Vec2::ZERO,
            end: Vec2::new(10_000.0, 0.0),
            end_dir: Vec2::ZERO,
            thickness: 1.0,
            tint: Color::WHITE,
        };
        list.add_spline(at(0, Vec2::ZERO, Vec2::splat(10.0)), spline);
        list.add_spline(
            at(0, Vec2::ZERO, Vec2::splat(10.0)),
            SplinePayload {
                end: Vec2::new(1.0, 0.0),
                thickness: 3.0,
                ..spline
            },
        );

        let out = batch(&list, &mut batcher());
        // Different thickness params keep the two splines apart
        assert_eq!(out.render_batches.len(), 2);
        assert_eq!(out.render_batches[0].vertex_count, 2 + 2 * 256);
        assert_eq!(out.render_batches[1].vertex_count, 2 + 2);
    }

    #[test]
    fn test_antialiased_lines_miter_and_restart() {
        let mut list = list();
        list.add_lines(
            at(0, Vec2::ZERO, Vec2::splat(50.0)),
            vec![Vec2::ZERO, Vec2::new(10.0, 0.0), Vec2::new(10.0, 10.0)],
            Color::WHITE,
            true,
            1.0,
        );

        let out = batch(&list, &mut batcher());
        assert_eq!(out.vertices.len(), 8);
        assert_eq!(out.indices, vec![1, 0, 2, 2, 3, 1, 5, 4, 6, 6, 7, 5]);

        // Half width: ceil((3 + 1) * sqrt 2) / 2 + 1.5 = 4.5
        assert_eq!(out.vertices[0].position(), Vec2::new(0.0, 4.5));
        assert_eq!(out.vertices[1].position(), Vec2::new(0.0, -4.5));
        // The inner side of the corner meets the next segment
        assert!(out.vertices[2].position().is_nearly_equal(Vec2::new(5.5, 4.5), 1e-4));
        // The outer side is too far from the next segment to join
        assert_eq!(out.vertices[3].position(), Vec2::new(10.0, -4.5));
        // The strip restarts from copies of the join
        assert_eq!(out.vertices[4].position(), out.vertices[2].position());
        assert_eq!(out.vertices[5].position(), out.vertices[3].position());
        assert_eq!(out.vertices[0].tex_coords, [0.0, 0.0, 10.0, 0.0]);
        assert_eq!(out.render_batches[0].key.shader_params.pixel_params, [1.0, 1.5, 0.0, 0.0]);
    }

    #[test]
    fn test_plain_lines_use_line_list() {
        let mut list = list();
        list.add_lines(
            at(0, Vec2::ZERO, Vec2::splat(50.0)),
            vec![Vec2::ZERO, Vec2::new(10.0, 0.0), Vec2::new(10.0, 10.0)],
            Color::WHITE,
            false,
            1.0,
        );
        list.add_lines(at(0, Vec2::ZERO, Vec2::splat(50.0)), vec![Vec2::ZERO], Color::WHITE, false, 1.0);

        let out = batch(&list, &mut batcher());
        assert_eq!(out.render_batches.len(), 1);
        assert_eq!(out.render_batches[0].key.primitive, DrawPrimitive::LineList);
        assert_eq!(out.vertices.len(), 4);
        assert_eq!(out.indices, vec![0, 1, 2, 3]);
        assert!(!out.requires_stencil_test);
    }

    #[test]
    fn test_gradient_pads_to_edges() {
        let mut list = list();
        list.add_gradient(
            at(0, Vec2::ZERO, Vec2::new(100.0, 20.0)),
            &[
                GradientStop::new(Vec2::new(10.0, 0.0), Color::RED),
                GradientStop::new(Vec2::new(90.0, 0.0), Color::BLUE),
            ],
            GradientOrientation::Horizontal,
        );

        let out = batch(&list, &mut batcher());
        assert_eq!(out.vertices.len(), 8);
        assert_eq!(out.indices.len(), 18);
        assert_eq!(&out.indices[..6], &[0, 1, 2, 2, 1, 3]);
        assert_eq!(out.vertices[0].position(), Vec2::new(0.0, 0.0));
        assert_eq!(out.vertices[1].position(), Vec2::new(0.0, 20.0));
        assert_eq!(out.vertices[0].packed_color(), Color::RED.to_packed());
        assert_eq!(out.vertices[7].position(), Vec2::new(100.0, 20.0));
        assert_eq!(out.vertices[7].packed_color(), Color::BLUE.to_packed());
    }

    #[test]
    fn test_vertical_gradient_without_padding() {
        let mut list = list();
        list.add_gradient(
            at(0, Vec2::ZERO, Vec2::new(100.0, 20.0)).with_effects(DrawEffects::NO_GAMMA),
            &[
                GradientStop::new(Vec2::ZERO, Color::RED),
                GradientStop::new(Vec2::new(0.0, 20.0), Color::BLUE),
            ],
            GradientOrientation::Vertical,
        );

        let out = batch(&list, &mut batcher());
        assert_eq!(out.vertices.len(), 4);
        assert_eq!(out.vertices[1].position(), Vec2::new(100.0, 0.0));
        assert!(out.render_batches[0].key.flags.contains(BatchDrawFlags::NO_GAMMA));
    }
}
