//! Element batcher
//!
//! Turns a [`WindowElementList`] into [`BatchData`]. Elements are visited
//! layer by layer in ascending id order and, within a layer, in emission
//! order. Each element is expanded into vertices and appended to the batch
//! whose [`BatchKey`] matches its draw state; elements that cannot merge
//! (custom drawers, cached buffers, draw layers) get a batch of their own.
//!
//! Per-batch vertex and index arrays come from pools and go back to them in
//! [`ElementBatcher::fill_batch_buffers`], so steady-state frames allocate
//! nothing.
//!
//! ```text
//! add_elements(list)          fill_batch_buffers(out)
//!   layer -3  ── [key A] ─┐     vertices: A A A B B C ...
//!   layer  0  ── [key A] ─┤──►  indices:  ...
//!             ── [key B] ─┤     render_batches: (A, 0..3) (B, 3..5) ...
//!   layer 40  ── [key C] ─┘
//! ```

mod boxes;
mod lines;
mod text;

pub use lines::line_intersect;

use crate::batch::{BatchContent, BatchData, BatchKey, RenderBatch};
use crate::resources::ResourceManager;
use crate::shader::{BatchDrawFlags, ShaderType};
use crate::stats::BatchStats;
use crate::vertex::{BatchIndex, BatchVertex};
use crate::{BatchError, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::sync::Arc;
use tessel_core::{Color, LayoutTransform, PackedColor, RenderTransform, RotatedRect, Vec2};
use tessel_paint::{
    BatchHints, CustomVertsPayload, DrawEffects, DrawElement, DrawLayerHandle, DrawLayerId, ElementLayers,
    ElementPayload, WindowElementList,
};
use tessel_text::FontServices;

/// Batcher tuning
#[derive(Clone, Debug, PartialEq)]
pub struct BatcherConfig {
    /// Capacity reserved for a fresh per-batch vertex array
    pub vertex_reserve: usize,
    /// Capacity reserved for a fresh per-batch index array
    pub index_reserve: usize,
    /// Pooled arrays kept between frames; extra arrays are dropped
    pub max_pooled_arrays: usize,
    /// Texel center offset (0.5 on APIs that sample texel corners)
    pub pixel_center_offset: f32,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            vertex_reserve: 200,
            index_reserve: 500,
            max_pooled_arrays: 256,
            pixel_center_offset: 0.0,
        }
    }
}

/// Pool slots backing one batch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BatchSlot {
    vertices: usize,
    indices: usize,
}

/// Mutable views into one batch's arrays
pub(crate) struct BatchBuffers<'a> {
    pub vertices: &'a mut Vec<BatchVertex>,
    pub indices: &'a mut Vec<BatchIndex>,
}

impl BatchBuffers<'_> {
    /// Index the next pushed vertex will get
    pub fn next_index(&self) -> BatchIndex {
        self.vertices.len() as BatchIndex
    }

    /// Two triangles over four vertices pushed as TL, TR, BL, BR
    pub fn push_quad(&mut self, vertices: [BatchVertex; 4]) {
        let start = self.next_index();
        self.vertices.extend_from_slice(&vertices);
        self.indices
            .extend_from_slice(&[start, start + 1, start + 2, start + 2, start + 1, start + 3]);
    }
}

struct ElementBatch {
    key: BatchKey,
    content: BatchContent,
    slot: Option<BatchSlot>,
    element_count: u32,
}

#[derive(Default)]
struct LayerBatches {
    batches: Vec<ElementBatch>,
    /// Mergeable batches by key
    lookup: FxHashMap<BatchKey, (usize, BatchSlot)>,
}

/// Whether draw layers met while batching get their contents batched
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LayerResolution {
    /// A window frame: batch the current contents of every referenced layer
    Frame,
    /// A cache recording: layers stay references, filled per frame
    Cache,
}

/// Per-element transforms shared by most element kinds
pub(crate) struct ElementSpace {
    pub render: RenderTransform,
    pub clip: RotatedRect,
    pub inverse_layout: LayoutTransform,
}

impl ElementSpace {
    pub fn of(element: &DrawElement) -> Self {
        Self::with_render(element, element.geometry.render_transform)
    }

    /// Clip carried through the element's own render transform, vertices
    /// through `render`
    pub fn with_render(element: &DrawElement, render: RenderTransform) -> Self {
        let inverse_layout = element.geometry.layout_transform.inverse();
        let clip = RotatedRect::snapped(&element.clip_rect, &inverse_layout, &element.geometry.render_transform);
        Self {
            render,
            clip,
            inverse_layout,
        }
    }
}

/// Converts draw elements into merged vertex/index batches
pub struct ElementBatcher {
    config: BatcherConfig,
    resources: Arc<dyn ResourceManager>,
    fonts: Option<Arc<FontServices>>,
    layers: BTreeMap<i32, LayerBatches>,
    vertex_arrays: Vec<Vec<BatchVertex>>,
    index_arrays: Vec<Vec<BatchIndex>>,
    vertex_free: Vec<usize>,
    index_free: Vec<usize>,
    /// Draw layers referenced this pass whose contents still need batching
    pending_layers: Vec<DrawLayerHandle>,
    resolution: LayerResolution,
    requires_vsync: bool,
    /// Counters of the pass in progress
    pass: BatchStats,
    /// Counters of the last completed pass
    stats: BatchStats,
}

impl ElementBatcher {
    pub fn new(config: BatcherConfig, resources: Arc<dyn ResourceManager>) -> Self {
        Self {
            config,
            resources,
            fonts: None,
            layers: BTreeMap::new(),
            vertex_arrays: Vec::new(),
            index_arrays: Vec::new(),
            vertex_free: Vec::new(),
            index_free: Vec::new(),
            pending_layers: Vec::new(),
            resolution: LayerResolution::Frame,
            requires_vsync: false,
            pass: BatchStats::default(),
            stats: BatchStats::default(),
        }
    }

    /// Text elements are dropped without font services
    pub fn with_fonts(mut self, fonts: Arc<FontServices>) -> Self {
        self.fonts = Some(fonts);
        self
    }

    pub fn config(&self) -> &BatcherConfig {
        &self.config
    }

    pub fn resources(&self) -> &Arc<dyn ResourceManager> {
        &self.resources
    }

    pub fn fonts(&self) -> Option<&Arc<FontServices>> {
        self.fonts.as_ref()
    }

    /// Counters of the last [`fill_batch_buffers`](Self::fill_batch_buffers)
    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    /// Arrays currently allocated in the pools, in use or free
    pub fn pooled_arrays(&self) -> (usize, usize) {
        (self.vertex_arrays.len(), self.index_arrays.len())
    }

    /// Batch a window's elements; draw layers it references are batched
    /// from their current contents
    pub fn add_elements(&mut self, list: &WindowElementList) {
        self.resolution = LayerResolution::Frame;
        self.add_layers(list.root_layers());
    }

    /// Batch a window frame into `out`
    ///
    /// Draw layers the list froze with
    /// [`WindowElementList::freeze_draw_layers`] are batched from those
    /// copies; other layers from their current contents.
    pub fn batch_frame(&mut self, list: &WindowElementList, out: &mut BatchData) {
        self.add_elements(list);
        self.fill_with_layers(out, |id| list.frozen_layer(id));
    }

    /// Batch a recorded element list for caching; draw layers stay
    /// references
    pub fn add_cached_elements(&mut self, list: &WindowElementList) {
        self.resolution = LayerResolution::Cache;
        self.add_layers(list.root_layers());
    }

    fn add_layers(&mut self, layers: &ElementLayers) {
        for (_, elements) in layers.iter() {
            for element in elements {
                self.add_element(element);
            }
        }
    }

    fn add_element(&mut self, element: &DrawElement) {
        if element.is_clipped_out() {
            self.pass.clipped += 1;
            return;
        }
        if element.is_scissor_rejected() {
            self.pass.scissor_rejected += 1;
            return;
        }
        self.pass.elements += 1;

        match &element.payload {
            ElementPayload::Box(payload) => self.add_box_element(element, payload),
            ElementPayload::DebugQuad { tint } => self.add_quad_element(element, *tint),
            ElementPayload::Text(payload) => self.add_text_element(element, payload),
            ElementPayload::ShapedText(payload) => self.add_shaped_text_element(element, payload),
            ElementPayload::Spline(payload) => self.add_spline_element(element, payload),
            ElementPayload::Lines(payload) => self.add_line_element(element, payload),
            ElementPayload::Gradient(payload) => self.add_gradient_element(element, payload),
            ElementPayload::Viewport(payload) => self.add_viewport_element(element, payload),
            ElementPayload::Border(payload) => self.add_border_element(element, payload),
            ElementPayload::Custom(drawer) => match drawer {
                Some(drawer) => {
                    let key = BatchKey::new(
                        ShaderType::Custom,
                        element.effects,
                        BatchDrawFlags::NONE,
                        element.scissor_rect.as_ref(),
                    );
                    self.push_unmerged(
                        element.layer,
                        key,
                        BatchContent::Custom {
                            drawer: drawer.clone(),
                            clip_rect: element.clip_rect,
                        },
                    );
                }
                None => self.report(&BatchError::MissingPayload {
                    kind: "custom",
                    what: "drawer",
                }),
            },
            ElementPayload::CustomVerts(payload) => {
                if let Err(err) = self.add_custom_verts_element(element, payload) {
                    self.report(&err);
                }
            }
            ElementPayload::CachedBuffer(payload) => match &payload.handle {
                Some(handle) => {
                    let key = BatchKey::new(
                        ShaderType::Default,
                        element.effects,
                        BatchDrawFlags::NONE,
                        element.scissor_rect.as_ref(),
                    );
                    if self.resolution == LayerResolution::Frame {
                        self.pending_layers.extend(handle.layers().iter().cloned());
                    }
                    self.push_unmerged(
                        element.layer,
                        key,
                        BatchContent::CachedBuffer {
                            handle: handle.clone(),
                            offset: payload.offset,
                        },
                    );
                }
                None => self.report(&BatchError::MissingPayload {
                    kind: "cached buffer",
                    what: "render handle",
                }),
            },
            ElementPayload::Layer(handle) => {
                let key = BatchKey::new(
                    ShaderType::Default,
                    element.effects,
                    BatchDrawFlags::NONE,
                    element.scissor_rect.as_ref(),
                );
                if self.resolution == LayerResolution::Frame {
                    self.pending_layers.push(handle.clone());
                }
                self.push_unmerged(element.layer, key, BatchContent::Layer(handle.id()));
            }
        }
    }

    fn report(&self, err: &BatchError) {
        tracing::error!(error = %err, "skipping draw element");
        debug_assert!(false, "{err}");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Batch lookup
    // ─────────────────────────────────────────────────────────────────────

    fn acquire_vertex_array(&mut self) -> usize {
        if let Some(index) = self.vertex_free.pop() {
            self.vertex_arrays[index].reserve(self.config.vertex_reserve);
            return index;
        }
        self.vertex_arrays.push(Vec::with_capacity(self.config.vertex_reserve));
        self.vertex_arrays.len() - 1
    }

    fn acquire_index_array(&mut self) -> usize {
        if let Some(index) = self.index_free.pop() {
            self.index_arrays[index].reserve(self.config.index_reserve);
            return index;
        }
        self.index_arrays.push(Vec::with_capacity(self.config.index_reserve));
        self.index_arrays.len() - 1
    }

    fn acquire_slot(&mut self) -> BatchSlot {
        BatchSlot {
            vertices: self.acquire_vertex_array(),
            indices: self.acquire_index_array(),
        }
    }

    /// The mergeable batch for `key` in `layer`, created on first use; the
    /// batch's element count goes up by one
    pub(crate) fn find_batch_for_element(&mut self, layer: i32, key: BatchKey) -> BatchSlot {
        self.find_batch(layer, key, true)
    }

    /// Like [`find_batch_for_element`](Self::find_batch_for_element); the
    /// element count only moves when `count_element` is set, for elements
    /// that come back to a batch they already added to
    pub(crate) fn find_batch(&mut self, layer: i32, key: BatchKey, count_element: bool) -> BatchSlot {
        let counted = u32::from(count_element);
        if let Some(batches) = self.layers.get_mut(&layer) {
            if let Some(&(index, slot)) = batches.lookup.get(&key) {
                batches.batches[index].element_count += counted;
                return slot;
            }
        }

        let slot = self.acquire_slot();
        let batches = self.layers.entry(layer).or_default();
        batches.lookup.insert(key, (batches.batches.len(), slot));
        batches.batches.push(ElementBatch {
            key,
            content: BatchContent::Geometry,
            slot: Some(slot),
            element_count: counted,
        });
        slot
    }

    /// A batch that never merges with another element
    fn push_unmerged(&mut self, layer: i32, key: BatchKey, content: BatchContent) -> Option<BatchSlot> {
        let slot = matches!(content, BatchContent::Geometry).then(|| self.acquire_slot());
        self.layers.entry(layer).or_default().batches.push(ElementBatch {
            key,
            content,
            slot,
            element_count: 1,
        });
        slot
    }

    pub(crate) fn buffers(&mut self, slot: BatchSlot) -> BatchBuffers<'_> {
        BatchBuffers {
            vertices: &mut self.vertex_arrays[slot.vertices],
            indices: &mut self.index_arrays[slot.indices],
        }
    }

    /// Final packed color, or `None` when the element would be invisible
    pub(crate) fn element_color(&mut self, tint: Color, brush_tint: Option<Color>) -> Option<PackedColor> {
        let color = match brush_tint {
            Some(brush_tint) => tint.modulate(brush_tint),
            None => tint,
        };
        let packed = color.to_packed();
        if packed.a == 0 {
            self.pass.transparent_skipped += 1;
            return None;
        }
        Some(packed)
    }

    pub(crate) fn note_requires_vsync(&mut self) {
        self.requires_vsync = true;
    }

    /// `base` plus the render state the element's effects and hints ask for
    pub(crate) fn draw_flags(&mut self, element: &DrawElement, base: BatchDrawFlags) -> BatchDrawFlags {
        let mut flags = base;
        for (effect, flag) in [
            (DrawEffects::NO_BLENDING, BatchDrawFlags::NO_BLENDING),
            (DrawEffects::NO_GAMMA, BatchDrawFlags::NO_GAMMA),
            (DrawEffects::PRE_MULTIPLIED_ALPHA, BatchDrawFlags::PRE_MULTIPLIED_ALPHA),
        ] {
            if element.effects.contains(effect) {
                flags |= flag;
            }
        }
        if element.batch_hints.contains(BatchHints::WIREFRAME) {
            flags |= BatchDrawFlags::WIREFRAME;
        }
        if element.batch_hints.contains(BatchHints::REQUIRES_VSYNC) {
            flags |= BatchDrawFlags::REQUIRES_VSYNC;
            self.note_requires_vsync();
        }
        flags
    }

    // ─────────────────────────────────────────────────────────────────────
    // Custom vertices
    // ─────────────────────────────────────────────────────────────────────

    fn add_custom_verts_element(&mut self, element: &DrawElement, payload: &CustomVertsPayload) -> Result<()> {
        let count = payload.vertices.len();
        if let Some(&index) = payload.indices.iter().find(|&&i| i as usize >= count) {
            return Err(BatchError::IndexOutOfRange { index, count });
        }
        if payload.vertices.is_empty() || payload.indices.is_empty() {
            return Ok(());
        }

        let texture = payload
            .resource
            .and_then(|handle| self.resources.texture(handle))
            .map(|proxy| proxy.texture)
            .or(payload.resource);
        let key = BatchKey::new(
            ShaderType::Custom,
            element.effects,
            BatchDrawFlags::NONE,
            element.scissor_rect.as_ref(),
        )
        .with_texture(texture);
        let space = ElementSpace::of(element);

        let Some(slot) = self.push_unmerged(element.layer, key, BatchContent::Geometry) else {
            return Ok(());
        };
        let buffers = self.buffers(slot);
        buffers.vertices.extend(payload.vertices.iter().map(|v| {
            BatchVertex::new(&RenderTransform::IDENTITY, v.position, v.tex_coords, v.color, &space.clip)
        }));
        buffers.indices.extend_from_slice(&payload.indices);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Output
    // ─────────────────────────────────────────────────────────────────────

    /// Copy every batch into `out`'s bulk buffers in layer order and return
    /// the per-batch arrays to the pools
    ///
    /// In a frame pass, the draw layers referenced by the batched elements
    /// are then batched from their current contents into
    /// [`BatchData::layer_batches`].
    pub fn fill_batch_buffers(&mut self, out: &mut BatchData) {
        self.fill_with_layers(out, |_| None);
    }

    fn fill_with_layers<'a>(
        &mut self,
        out: &mut BatchData,
        frozen: impl Fn(DrawLayerId) -> Option<&'a ElementLayers>,
    ) {
        let mut batches = std::mem::take(&mut out.render_batches);
        self.drain_layers_into(out, &mut batches);
        out.render_batches = batches;

        let mut visited: FxHashSet<DrawLayerId> = FxHashSet::default();
        while let Some(handle) = self.pending_layers.pop() {
            if !visited.insert(handle.id()) {
                continue;
            }
            match frozen(handle.id()) {
                Some(contents) => self.add_layers(contents),
                None => {
                    let contents = handle.lock();
                    self.add_layers(&contents);
                }
            }
            let mut layer_batches = Vec::new();
            self.drain_layers_into(out, &mut layer_batches);
            out.layer_batches.insert(handle.id(), layer_batches);
        }

        out.requires_vsync |= std::mem::take(&mut self.requires_vsync);
        self.stats = std::mem::take(&mut self.pass);
        out.stats.accumulate(&self.stats);
        self.trim_pools();
        tracing::trace!(stats = %self.stats, "filled batch buffers");
    }

    fn drain_layers_into(&mut self, out: &mut BatchData, render_batches: &mut Vec<RenderBatch>) {
        let layers = std::mem::take(&mut self.layers);
        self.pass.layers = self.pass.layers.max(layers.len());

        for (layer, batches) in layers {
            self.pass.batches += batches.batches.len();
            for batch in batches.batches {
                let Some(slot) = batch.slot else {
                    render_batches.push(RenderBatch {
                        layer,
                        key: batch.key,
                        content: batch.content,
                        vertex_offset: 0,
                        vertex_count: 0,
                        index_offset: 0,
                        index_count: 0,
                        element_count: batch.element_count,
                    });
                    continue;
                };

                if batch.key.shader == ShaderType::LineSegment {
                    out.requires_stencil_test = true;
                }
                self.vertex_free.push(slot.vertices);
                self.index_free.push(slot.indices);

                let vertices = &mut self.vertex_arrays[slot.vertices];
                let indices = &mut self.index_arrays[slot.indices];
                debug_assert!(
                    vertices.is_empty() == indices.is_empty(),
                    "batch with {} vertices and {} indices",
                    vertices.len(),
                    indices.len()
                );
                if vertices.is_empty() || indices.is_empty() {
                    vertices.clear();
                    indices.clear();
                    continue;
                }

                let vertex_offset = out.vertices.len() as u32;
                let index_offset = out.indices.len() as u32;
                out.vertices.extend_from_slice(vertices);
                out.indices.extend_from_slice(indices);
                self.pass.vertices += vertices.len();
                self.pass.indices += indices.len();
                self.pass.memory_bytes += vertices.len() * std::mem::size_of::<BatchVertex>()
                    + indices.len() * std::mem::size_of::<BatchIndex>();

                render_batches.push(RenderBatch {
                    layer,
                    key: batch.key,
                    content: batch.content,
                    vertex_offset,
                    vertex_count: vertices.len() as u32,
                    index_offset,
                    index_count: indices.len() as u32,
                    element_count: batch.element_count,
                });
                vertices.clear();
                indices.clear();
            }
        }
    }

    /// Drop pooled arrays beyond the configured cap; only free arrays at the
    /// end of the pool can go
    fn trim_pools(&mut self) {
        let cap = self.config.max_pooled_arrays;
        if self.vertex_arrays.len() <= cap && self.index_arrays.len() <= cap {
            return;
        }
        // Every array is free after a fill, so the pools can simply shrink
        self.vertex_arrays.truncate(cap);
        self.index_arrays.truncate(cap);
        self.vertex_free.retain(|&i| i < cap);
        self.index_free.retain(|&i| i < cap);
        tracing::debug!(cap, "trimmed batch array pools");
    }

    /// Drop every pending batch without producing output
    pub fn reset_batches(&mut self) {
        let layers = std::mem::take(&mut self.layers);
        for batch in layers.into_values().flat_map(|l| l.batches) {
            if let Some(slot) = batch.slot {
                self.vertex_arrays[slot.vertices].clear();
                self.index_arrays[slot.indices].clear();
                self.vertex_free.push(slot.vertices);
                self.index_free.push(slot.indices);
            }
        }
        self.pending_layers.clear();
        self.requires_vsync = false;
        self.pass = BatchStats::default();
    }
}

impl std::fmt::Debug for ElementBatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementBatcher")
            .field("config", &self.config)
            .field("layers", &self.layers.len())
            .field("vertex_arrays", &self.vertex_arrays.len())
            .field("index_arrays", &self.index_arrays.len())
            .field("stats", &self.stats)
            .finish()
    }
}

/// Local corners of an element as TL, TR, BL, BR
pub(crate) fn quad_corners(size: Vec2) -> [Vec2; 4] {
    [
        Vec2::ZERO,
        Vec2::new(size.x, 0.0),
        Vec2::new(0.0, size.y),
        size,
    ]
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::resources::ResourceTable;
    use tessel_core::{Geometry, PaintGeometry, Rect};
    use tessel_paint::ElementPlacement;

    pub fn batcher() -> ElementBatcher {
        ElementBatcher::new(BatcherConfig::default(), Arc::new(ResourceTable::new()))
    }

    pub fn batcher_with(resources: ResourceTable) -> ElementBatcher {
        ElementBatcher::new(BatcherConfig::default(), Arc::new(resources))
    }

    pub fn window() -> Rect {
        Rect::new(0.0, 0.0, 800.0, 600.0)
    }

    pub fn at(layer: i32, position: Vec2, size: Vec2) -> ElementPlacement {
        let geometry = Geometry::make_root(Vec2::new(800.0, 600.0), LayoutTransform::IDENTITY)
            .make_child_at(position, size);
        ElementPlacement::new(layer, geometry.to_paint_geometry(), window())
    }

    pub fn at_geometry(layer: i32, geometry: PaintGeometry) -> ElementPlacement {
        ElementPlacement::new(layer, geometry, window())
    }

    pub fn batch(list: &WindowElementList, batcher: &mut ElementBatcher) -> BatchData {
        let mut out = BatchData::new();
        batcher.add_elements(list);
        batcher.fill_batch_buffers(&mut out);
        out
    }
}
