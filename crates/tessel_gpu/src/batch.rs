//! Batch keys and batched output
//!
//! [`BatchData`] is what a batching pass produces: one bulk vertex buffer,
//! one bulk index buffer and the ordered list of [`RenderBatch`]es that
//! slice them. The same type is stored inside cached render handles, so a
//! frame's output may reference other `BatchData` through cached-buffer
//! batches, either prebuilt or filled by a [`CachedBatch`] job.
//! [`BatchData::resolve_draws`] flattens those references into the final
//! draw order.

use crate::cacher::CachedBatch;
use crate::shader::{BatchDrawFlags, DrawPrimitive, ShaderParams, ShaderType};
use crate::stats::BatchStats;
use crate::vertex::{BatchIndex, BatchVertex};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::sync::Arc;
use tessel_core::{Rect, Vec2};
use tessel_paint::{
    CachedRenderData, CachedRenderHandle, CustomDrawer, DrawEffects, DrawLayerId, ResourceHandle,
};

/// Cached buffers nested deeper than this are not drawn
const MAX_RESOLVE_DEPTH: usize = 16;

/// Whole-pixel scissor rect
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScissorRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ScissorRect {
    /// Smallest pixel rect covering `rect`
    pub fn from_rect(rect: &Rect) -> Self {
        Self {
            left: rect.left.floor() as i32,
            top: rect.top.floor() as i32,
            right: rect.right.ceil() as i32,
            bottom: rect.bottom.ceil() as i32,
        }
    }

    pub fn to_rect(&self) -> Rect {
        Rect::new(
            self.left as f32,
            self.top as f32,
            self.right as f32,
            self.bottom as f32,
        )
    }
}

/// Everything two elements must agree on to share a batch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BatchKey {
    pub texture: Option<ResourceHandle>,
    pub shader_params: ShaderParams,
    pub shader: ShaderType,
    pub primitive: DrawPrimitive,
    pub effects: DrawEffects,
    pub flags: BatchDrawFlags,
    pub scissor: Option<ScissorRect>,
}

impl BatchKey {
    pub fn new(shader: ShaderType, effects: DrawEffects, flags: BatchDrawFlags, scissor: Option<&Rect>) -> Self {
        Self {
            texture: None,
            shader_params: ShaderParams::NONE,
            shader,
            primitive: DrawPrimitive::TriangleList,
            effects,
            flags,
            scissor: scissor.map(ScissorRect::from_rect),
        }
    }

    pub fn with_texture(mut self, texture: Option<ResourceHandle>) -> Self {
        self.texture = texture;
        self
    }

    pub fn with_params(mut self, shader_params: ShaderParams) -> Self {
        self.shader_params = shader_params;
        self
    }

    pub fn with_primitive(mut self, primitive: DrawPrimitive) -> Self {
        self.primitive = primitive;
        self
    }
}

/// What a render batch draws
#[derive(Clone)]
pub enum BatchContent {
    /// A slice of the owning [`BatchData`]'s buffers
    Geometry,
    /// Render-thread callback, drawn in place
    Custom {
        drawer: Arc<dyn CustomDrawer>,
        clip_rect: Rect,
    },
    /// Previously cached batches, translated by `offset`
    CachedBuffer {
        handle: Arc<CachedRenderHandle>,
        offset: Vec2,
    },
    /// This frame's contents of a draw layer
    Layer(DrawLayerId),
}

impl std::fmt::Debug for BatchContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchContent::Geometry => f.write_str("Geometry"),
            BatchContent::Custom { drawer, .. } => f.debug_tuple("Custom").field(&drawer.name()).finish(),
            BatchContent::CachedBuffer { handle, offset } => f
                .debug_struct("CachedBuffer")
                .field("handle", &handle.id())
                .field("offset", offset)
                .finish(),
            BatchContent::Layer(id) => f.debug_tuple("Layer").field(id).finish(),
        }
    }
}

/// A contiguous draw call
#[derive(Clone, Debug)]
pub struct RenderBatch {
    pub layer: i32,
    pub key: BatchKey,
    pub content: BatchContent,
    pub vertex_offset: u32,
    pub vertex_count: u32,
    pub index_offset: u32,
    pub index_count: u32,
    /// Elements merged into this batch
    pub element_count: u32,
}

impl RenderBatch {
    pub fn is_geometry(&self) -> bool {
        matches!(self.content, BatchContent::Geometry)
    }
}

/// Output of a batching pass
#[derive(Debug, Default)]
pub struct BatchData {
    pub vertices: Vec<BatchVertex>,
    pub indices: Vec<BatchIndex>,
    /// Draw order
    pub render_batches: Vec<RenderBatch>,
    /// Batches for each draw layer referenced this frame, slicing the same buffers
    pub layer_batches: FxHashMap<DrawLayerId, Vec<RenderBatch>>,
    /// A line segment batch needs the stencil buffer
    pub requires_stencil_test: bool,
    /// A viewport asked for vsync
    pub requires_vsync: bool,
    pub stats: BatchStats,
}

impl BatchData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.render_batches.clear();
        self.layer_batches.clear();
        self.requires_stencil_test = false;
        self.requires_vsync = false;
        self.stats = BatchStats::default();
    }

    pub fn is_empty(&self) -> bool {
        self.render_batches.is_empty() && self.layer_batches.is_empty()
    }

    pub fn vertices_of(&self, batch: &RenderBatch) -> &[BatchVertex] {
        let start = batch.vertex_offset as usize;
        &self.vertices[start..start + batch.vertex_count as usize]
    }

    pub fn indices_of(&self, batch: &RenderBatch) -> &[BatchIndex] {
        let start = batch.index_offset as usize;
        &self.indices[start..start + batch.index_count as usize]
    }

    /// Bytes held by the bulk buffers
    pub fn buffer_bytes(&self) -> usize {
        self.vertices.len() * std::mem::size_of::<BatchVertex>()
            + self.indices.len() * std::mem::size_of::<BatchIndex>()
    }

    /// Final draw order with cached buffers and draw layers expanded
    pub fn resolve_draws(&self) -> Vec<ResolvedDraw<'_>> {
        let mut out = Vec::with_capacity(self.render_batches.len());
        self.resolve_into(self, &self.render_batches, Vec2::ZERO, 0, &mut out);
        out
    }

    fn resolve_into<'a>(
        &'a self,
        frame: &'a BatchData,
        batches: &'a [RenderBatch],
        offset: Vec2,
        depth: usize,
        out: &mut Vec<ResolvedDraw<'a>>,
    ) {
        if depth > MAX_RESOLVE_DEPTH {
            tracing::warn!(depth, "cached buffers nested too deeply, skipping");
            return;
        }
        for batch in batches {
            match &batch.content {
                BatchContent::Geometry | BatchContent::Custom { .. } => out.push(ResolvedDraw {
                    batch,
                    source: self,
                    offset,
                }),
                BatchContent::CachedBuffer { handle, offset: delta } => match cached_batch_data(handle) {
                    Ok(cached) => cached.resolve_into(frame, &cached.render_batches, offset + *delta, depth + 1, out),
                    Err(reason) => tracing::warn!(handle = handle.id(), reason, "skipping cached buffer"),
                },
                BatchContent::Layer(id) => match frame.layer_batches.get(id) {
                    Some(layer) => frame.resolve_into(frame, layer, offset, depth + 1, out),
                    None => tracing::trace!(layer = ?id, "draw layer has no batches this frame"),
                },
            }
        }
    }
}

/// Batches behind a cached handle: render-thread batched or prebuilt
fn cached_batch_data(handle: &CachedRenderHandle) -> std::result::Result<&BatchData, &'static str> {
    if let Some(cached) = handle.data_as::<CachedBatch>() {
        return cached.data().ok_or("not batched yet");
    }
    handle.data_as::<BatchData>().ok_or("foreign render data")
}

impl CachedRenderData for BatchData {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn memory_bytes(&self) -> usize {
        self.buffer_bytes()
    }
}

/// A batch in final draw order, with the buffers it slices and the
/// translation to apply
#[derive(Clone, Copy, Debug)]
pub struct ResolvedDraw<'a> {
    pub batch: &'a RenderBatch,
    pub source: &'a BatchData,
    pub offset: Vec2,
}

impl<'a> ResolvedDraw<'a> {
    pub fn vertices(&self) -> &'a [BatchVertex] {
        if self.batch.is_geometry() {
            self.source.vertices_of(self.batch)
        } else {
            &[]
        }
    }

    pub fn indices(&self) -> &'a [BatchIndex] {
        if self.batch.is_geometry() {
            self.source.indices_of(self.batch)
        } else {
            &[]
        }
    }

    /// Vertex positions with the offset applied
    pub fn positions(&self) -> impl Iterator<Item = Vec2> + 'a {
        let offset = self.offset;
        self.vertices().iter().map(move |v| v.position() + offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_core::{PackedColor, RenderTransform, RotatedRect};

    fn geometry_batch(layer: i32, vertex_offset: u32, vertex_count: u32) -> RenderBatch {
        RenderBatch {
            layer,
            key: BatchKey::default(),
            content: BatchContent::Geometry,
            vertex_offset,
            vertex_count,
            index_offset: 0,
            index_count: 0,
            element_count: 1,
        }
    }

    fn vertex_at(x: f32) -> BatchVertex {
        BatchVertex::with_uv(
            &RenderTransform::IDENTITY,
            Vec2::new(x, 0.0),
            Vec2::ZERO,
            PackedColor::WHITE,
            &RotatedRect::default(),
        )
    }

    #[test]
    fn test_scissor_rect_covers_fraction() {
        let scissor = ScissorRect::from_rect(&Rect::new(0.5, 1.2, 10.1, 20.0));
        assert_eq!(scissor.to_rect(), Rect::new(0.0, 1.0, 11.0, 20.0));
    }

    #[test]
    fn test_resolve_expands_cached_buffers_with_offset() {
        let mut cached = BatchData::new();
        cached.vertices.push(vertex_at(5.0));
        cached.render_batches.push(geometry_batch(0, 0, 1));
        let handle = Arc::new(CachedRenderHandle::detached(Box::new(cached), Vec::new()));

        let mut frame = BatchData::new();
        frame.vertices.push(vertex_at(1.0));
        frame.render_batches.push(geometry_batch(0, 0, 1));
        frame.render_batches.push(RenderBatch {
            content: BatchContent::CachedBuffer {
                handle,
                offset: Vec2::new(100.0, 0.0),
            },
            ..geometry_batch(1, 0, 0)
        });

        let draws = frame.resolve_draws();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].positions().collect::<Vec<_>>(), vec![Vec2::new(1.0, 0.0)]);
        assert_eq!(draws[1].positions().collect::<Vec<_>>(), vec![Vec2::new(105.0, 0.0)]);
    }

    #[test]
    fn test_cached_batch_resolves_once_its_job_ran() {
        use crate::batcher::test_support::{at, batcher};
        use crate::cacher::ElementCacher;
        use tessel_core::Color;
        use tessel_paint::{Brush, RenderDataCacher, WindowElementList};

        let mut recorded = WindowElementList::new(Vec2::new(100.0, 100.0));
        recorded.add_box(at(0, Vec2::ZERO, Vec2::splat(10.0)), &Brush::solid(), Color::WHITE);
        let cacher = ElementCacher::new();
        let handle = Arc::new(CachedRenderHandle::detached(cacher.cache_elements(&recorded), Vec::new()));

        let mut frame = BatchData::new();
        frame.render_batches.push(RenderBatch {
            content: BatchContent::CachedBuffer {
                handle,
                offset: Vec2::ZERO,
            },
            ..geometry_batch(0, 0, 0)
        });
        assert!(frame.resolve_draws().is_empty());

        cacher.run_pending(&mut batcher());
        let draws = frame.resolve_draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].vertices().len(), 4);
    }

    #[test]
    fn test_cached_render_data_reports_memory() {
        let mut data = BatchData::new();
        data.vertices.push(vertex_at(0.0));
        data.indices.extend([0, 0, 0]);
        assert_eq!(data.memory_bytes(), 52 + 12);
        data.clear();
        assert!(data.is_empty());
        assert_eq!(data.memory_bytes(), 0);
    }
}
