//! Per-window draw element list
//!
//! Widgets append elements through the `add_*` methods. Two reordering
//! constructs run inside the same paint traversal:
//!
//! - **Deferred painting**: a paint queued with
//!   [`WindowElementList::queue_deferred_painting`] runs when its group ends,
//!   above everything painted in the group so far. Groups nest; a nested group
//!   resolves (on its `end_deferred_group`) before the enclosing one, and paints
//!   inside a group resolve first-in first-out, including paints queued while
//!   the group is resolving.
//! - **Volatile painting**: inside a cached subtree, a volatile widget leaves a
//!   layer-marker placeholder and is recorded. Each frame
//!   [`WindowElementList::paint_volatile`] re-runs it into the placeholder's
//!   draw layer, so its output lands in place between the cached elements.

use crate::brush::{Brush, ResourceHandle};
use crate::element::{
    BorderPayload, BoxPayload, CachedBufferPayload, CustomDrawer, CustomVertex,
    CustomVertsPayload, DrawElement, ElementPayload, ElementPlacement, GradientOrientation,
    GradientPayload, GradientStop, LinesPayload, RotationSpace, ShapedTextPayload,
    SplinePayload, TextPayload, ViewportPayload,
};
use crate::layer::{DrawLayerHandle, DrawLayerId, ElementLayers};
use crate::render_handle::{CacheOwner, CachedRenderHandle, RenderDataCacher};
use crate::widget::{PaintArgs, WidgetRef};
use crate::{PaintError, Result};
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use tessel_core::{Color, Geometry, PaintGeometry, Rect, Vec2};
use tessel_text::{FontInfo, ShapedGlyphSequence};

type PaintFn = dyn Fn(&mut WindowElementList, i32) -> i32 + Send + Sync;

#[derive(Clone)]
enum PaintSource {
    Widget {
        node: WidgetRef,
        args: PaintArgs,
        geometry: Geometry,
        clip: Rect,
    },
    Callback(Arc<PaintFn>),
}

impl PaintSource {
    fn execute(&self, list: &mut WindowElementList, layer: i32, args: Option<&PaintArgs>) -> i32 {
        match self {
            PaintSource::Widget {
                node,
                args: recorded,
                geometry,
                clip,
            } => node.paint(args.unwrap_or(recorded), geometry, clip, list, layer, true),
            PaintSource::Callback(paint) => paint(list, layer),
        }
    }
}

/// A paint postponed to the end of its deferred group
#[derive(Clone)]
pub struct DeferredPaint {
    source: PaintSource,
}

impl DeferredPaint {
    /// Paint `node` later with the arguments it had now
    pub fn widget(node: WidgetRef, args: &PaintArgs, geometry: Geometry, clip: Rect) -> Self {
        Self {
            source: PaintSource::Widget {
                node,
                args: args.clone(),
                geometry,
                clip,
            },
        }
    }

    /// Paint through a closure; it receives the layer to start at and
    /// returns the highest layer it used
    pub fn from_fn(paint: impl Fn(&mut WindowElementList, i32) -> i32 + Send + Sync + 'static) -> Self {
        Self {
            source: PaintSource::Callback(Arc::new(paint)),
        }
    }
}

impl std::fmt::Debug for DeferredPaint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            PaintSource::Widget { node, .. } => f.debug_tuple("DeferredPaint").field(&node.id()).finish(),
            PaintSource::Callback(_) => f.write_str("DeferredPaint(fn)"),
        }
    }
}

/// A paint re-run every frame into its placeholder layer
#[derive(Clone)]
pub struct VolatilePaint {
    source: PaintSource,
    handle: DrawLayerHandle,
    layer: i32,
}

impl VolatilePaint {
    pub fn handle(&self) -> &DrawLayerHandle {
        &self.handle
    }

    pub fn layer(&self) -> i32 {
        self.layer
    }

    pub fn widget(&self) -> Option<&WidgetRef> {
        match &self.source {
            PaintSource::Widget { node, .. } => Some(node),
            PaintSource::Callback(_) => None,
        }
    }
}

impl std::fmt::Debug for VolatilePaint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolatilePaint")
            .field("handle", &self.handle)
            .field("layer", &self.layer)
            .finish()
    }
}

/// Every draw element of one window for one frame
pub struct WindowElementList {
    window_size: Vec2,
    root: ElementLayers,
    /// Placeholder layers created by volatile paints
    draw_layers: Vec<DrawLayerHandle>,
    /// Active placeholder target while a volatile paint runs
    layer_stack: Vec<DrawLayerHandle>,
    scissor_stack: SmallVec<[Rect; 4]>,
    /// Outermost group first; never empty
    deferred_groups: Vec<VecDeque<DeferredPaint>>,
    volatile: Vec<VolatilePaint>,
    /// Draw layer contents copied at handoff
    frozen_layers: Vec<(DrawLayerId, ElementLayers)>,
}

impl WindowElementList {
    pub fn new(window_size: Vec2) -> Self {
        Self {
            window_size,
            root: ElementLayers::new(),
            draw_layers: Vec::new(),
            layer_stack: Vec::new(),
            scissor_stack: SmallVec::new(),
            deferred_groups: vec![VecDeque::new()],
            volatile: Vec::new(),
            frozen_layers: Vec::new(),
        }
    }

    pub fn window_size(&self) -> Vec2 {
        self.window_size
    }

    pub fn set_window_size(&mut self, window_size: Vec2) {
        self.window_size = window_size;
    }

    /// Root layers in ascending id order
    pub fn layers(&self) -> impl Iterator<Item = (i32, &[DrawElement])> + '_ {
        self.root.iter()
    }

    pub fn root_layers(&self) -> &ElementLayers {
        &self.root
    }

    /// Placeholder layers owned by this list's volatile paints
    pub fn draw_layers(&self) -> &[DrawLayerHandle] {
        &self.draw_layers
    }

    pub fn volatile_paints(&self) -> &[VolatilePaint] {
        &self.volatile
    }

    /// Elements in the root layers (placeholder contents not included)
    pub fn element_count(&self) -> usize {
        self.root.element_count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Clear everything for the next frame, keeping allocations
    pub fn reset(&mut self) {
        self.root.clear();
        self.draw_layers.clear();
        self.layer_stack.clear();
        self.scissor_stack.clear();
        self.deferred_groups.truncate(1);
        if let Some(root) = self.deferred_groups.first_mut() {
            root.clear();
        }
        self.volatile.clear();
        self.frozen_layers.clear();
    }

    // ─────────────────────────────────────────────────────────────────────
    // Element construction
    // ─────────────────────────────────────────────────────────────────────

    /// Append a built element to the active target
    pub fn add_element(&mut self, mut element: DrawElement) {
        if element.scissor_rect.is_none() {
            element.scissor_rect = self.scissor_stack.last().copied();
        }
        match self.layer_stack.last() {
            Some(handle) => handle.lock().push(element),
            None => self.root.push(element),
        }
    }

    fn add(&mut self, at: ElementPlacement, payload: ElementPayload) {
        self.add_element(DrawElement::new(at, payload));
    }

    /// Scissor applied to elements added until the matching pop
    pub fn push_scissor_rect(&mut self, scissor: Rect) {
        self.scissor_stack.push(scissor);
    }

    pub fn pop_scissor_rect(&mut self) {
        if self.scissor_stack.pop().is_none() {
            tracing::warn!("pop_scissor_rect without a matching push");
        }
    }

    pub fn add_box(&mut self, at: ElementPlacement, brush: &Brush, tint: Color) {
        self.add_rotated_box(at, brush, tint, 0.0, None, RotationSpace::RelativeToElement);
    }

    /// Box rotated by `angle` radians about `rotation_point` (element center
    /// when `None`)
    pub fn add_rotated_box(
        &mut self,
        at: ElementPlacement,
        brush: &Brush,
        tint: Color,
        angle: f32,
        rotation_point: Option<Vec2>,
        rotation_space: RotationSpace,
    ) {
        self.add(
            at,
            ElementPayload::Box(BoxPayload {
                brush: brush.clone(),
                tint,
                angle,
                rotation_point,
                rotation_space,
            }),
        );
    }

    pub fn add_text(&mut self, at: ElementPlacement, text: impl Into<String>, font: &FontInfo, tint: Color) {
        self.add(
            at,
            ElementPayload::Text(TextPayload {
                text: text.into(),
                font: font.clone(),
                tint,
            }),
        );
    }

    pub fn add_shaped_text(&mut self, at: ElementPlacement, sequence: Arc<ShapedGlyphSequence>, tint: Color) {
        self.add(at, ElementPayload::ShapedText(ShapedTextPayload { sequence, tint }));
    }

    pub fn add_lines(&mut self, at: ElementPlacement, points: Vec<Vec2>, tint: Color, antialias: bool, thickness: f32) {
        self.add(
            at,
            ElementPayload::Lines(LinesPayload {
                points,
                tint,
                antialias,
                thickness,
            }),
        );
    }

    pub fn add_spline(&mut self, at: ElementPlacement, spline: SplinePayload) {
        self.add(at, ElementPayload::Spline(spline));
    }

    pub fn add_gradient(&mut self, at: ElementPlacement, stops: &[GradientStop], orientation: GradientOrientation) {
        self.add(
            at,
            ElementPayload::Gradient(GradientPayload {
                stops: SmallVec::from_slice(stops),
                orientation,
            }),
        );
    }

    pub fn add_viewport(&mut self, at: ElementPlacement, viewport: ViewportPayload) {
        self.add(at, ElementPayload::Viewport(viewport));
    }

    pub fn add_border(&mut self, at: ElementPlacement, brush: &Brush, tint: Color) {
        self.add(
            at,
            ElementPayload::Border(BorderPayload {
                brush: brush.clone(),
                tint,
            }),
        );
    }

    pub fn add_custom(&mut self, at: ElementPlacement, drawer: Option<Arc<dyn CustomDrawer>>) {
        if drawer.is_none() {
            tracing::error!(layer = at.layer, "custom element added without a drawer");
            debug_assert!(false, "custom element added without a drawer");
        }
        self.add(at, ElementPayload::Custom(drawer));
    }

    /// Caller-built geometry; every index must address a vertex
    pub fn add_custom_verts(
        &mut self,
        at: ElementPlacement,
        resource: Option<ResourceHandle>,
        vertices: Vec<CustomVertex>,
        indices: Vec<u32>,
    ) -> Result<()> {
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(PaintError::CustomIndexOutOfRange {
                index,
                count: vertices.len(),
            });
        }
        self.add(
            at,
            ElementPayload::CustomVerts(CustomVertsPayload {
                resource,
                vertices,
                indices,
            }),
        );
        Ok(())
    }

    pub fn add_cached_buffer(&mut self, at: ElementPlacement, handle: Option<Arc<CachedRenderHandle>>, offset: Vec2) {
        if handle.is_none() {
            tracing::error!(layer = at.layer, "cached buffer element added without a handle");
            debug_assert!(false, "cached buffer element added without a handle");
        }
        self.add(at, ElementPayload::CachedBuffer(CachedBufferPayload { handle, offset }));
    }

    /// Marker for `handle`'s contents at this position
    pub fn add_layer(&mut self, layer: i32, clip_rect: Rect, handle: DrawLayerHandle) {
        self.add(
            ElementPlacement::new(layer, PaintGeometry::default(), clip_rect),
            ElementPayload::Layer(handle),
        );
    }

    pub fn add_debug_quad(&mut self, at: ElementPlacement, tint: Color) {
        self.add(at, ElementPayload::DebugQuad { tint });
    }

    // ─────────────────────────────────────────────────────────────────────
    // Deferred painting
    // ─────────────────────────────────────────────────────────────────────

    pub fn begin_deferred_group(&mut self) {
        self.deferred_groups.push(VecDeque::new());
    }

    /// Queue into the innermost open group
    pub fn queue_deferred_painting(&mut self, paint: DeferredPaint) {
        if let Some(group) = self.deferred_groups.last_mut() {
            group.push_back(paint);
        }
    }

    /// Resolve and close the innermost group; returns the highest layer used
    pub fn end_deferred_group(&mut self, layer: i32) -> Result<i32> {
        if self.deferred_groups.len() <= 1 {
            return Err(PaintError::DeferredGroupUnderflow);
        }
        let depth = self.deferred_groups.len() - 1;
        let max = self.resolve_group(depth, layer);
        self.deferred_groups.truncate(depth);
        Ok(max)
    }

    /// Resolve the outermost group, normally once after the window painted
    ///
    /// Groups still open are closed first, innermost to outermost, so paints
    /// they queue are not stranded.
    pub fn paint_deferred(&mut self, layer: i32) -> i32 {
        if self.deferred_groups.len() > 1 {
            tracing::warn!(
                open = self.deferred_groups.len() - 1,
                "painting deferred paints with unclosed deferred groups"
            );
        }
        let mut max = layer;
        while self.deferred_groups.len() > 1 {
            let depth = self.deferred_groups.len() - 1;
            max = max.max(self.resolve_group(depth, max));
            self.deferred_groups.truncate(depth);
        }
        max.max(self.resolve_group(0, max))
    }

    fn resolve_group(&mut self, depth: usize, layer: i32) -> i32 {
        let mut max = layer;
        while let Some(paint) = self.deferred_groups.get_mut(depth).and_then(VecDeque::pop_front) {
            max = max.max(paint.source.execute(self, max + 1, None));
        }
        max
    }

    pub fn pending_deferred(&self) -> usize {
        self.deferred_groups.iter().map(VecDeque::len).sum()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Volatile painting
    // ─────────────────────────────────────────────────────────────────────

    /// Leave a placeholder at `layer` and record `paint` for per-frame
    /// repainting into it
    pub fn queue_volatile_painting(&mut self, paint: DeferredPaint, layer: i32, clip_rect: Rect) -> DrawLayerHandle {
        let handle = DrawLayerHandle::new();
        self.add_layer(layer, clip_rect, handle.clone());
        self.draw_layers.push(handle.clone());
        self.volatile.push(VolatilePaint {
            source: paint.source,
            handle: handle.clone(),
            layer,
        });
        handle
    }

    /// Re-run every recorded volatile paint into its placeholder layer;
    /// returns how many ran
    pub fn paint_volatile(&mut self, args: &PaintArgs) -> usize {
        let paints = std::mem::take(&mut self.volatile);
        let args = args.for_volatile_paint();
        for paint in &paints {
            paint.handle.lock().clear();
            self.layer_stack.push(paint.handle.clone());
            paint.source.execute(self, paint.layer, Some(&args));
            self.layer_stack.pop();
        }
        let queued = std::mem::replace(&mut self.volatile, paints);
        if !queued.is_empty() {
            tracing::warn!(count = queued.len(), "volatile paints queued while painting volatile widgets were dropped");
        }
        self.volatile.len()
    }

    /// Paint into `handle` until [`pop_draw_layer`](Self::pop_draw_layer)
    pub fn push_draw_layer(&mut self, handle: DrawLayerHandle) {
        self.layer_stack.push(handle);
    }

    pub fn pop_draw_layer(&mut self) -> Result<DrawLayerHandle> {
        self.layer_stack.pop().ok_or(PaintError::DrawLayerUnderflow)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Caching
    // ─────────────────────────────────────────────────────────────────────

    /// Copy of the painted elements for batching elsewhere: root layers and
    /// placeholder handles, without paint state
    pub fn snapshot(&self) -> WindowElementList {
        let mut copy = WindowElementList::new(self.window_size);
        copy.root = self.root.clone();
        copy.draw_layers = self.draw_layers.clone();
        copy
    }

    /// Copy the current contents of every draw layer this list reaches,
    /// through layer markers and cached buffers, so the list can be batched
    /// while the live layers are repainted; returns how many were copied
    pub fn freeze_draw_layers(&mut self) -> usize {
        self.frozen_layers.clear();
        let mut pending = Vec::new();
        referenced_layers(&self.root, &mut pending);
        while let Some(handle) = pending.pop() {
            if self.frozen_layers.iter().any(|(id, _)| *id == handle.id()) {
                continue;
            }
            let contents = handle.lock().clone();
            referenced_layers(&contents, &mut pending);
            self.frozen_layers.push((handle.id(), contents));
        }
        self.frozen_layers.len()
    }

    /// Contents of draw layer `id` as of the last
    /// [`freeze_draw_layers`](Self::freeze_draw_layers)
    pub fn frozen_layer(&self, id: DrawLayerId) -> Option<&ElementLayers> {
        self.frozen_layers
            .iter()
            .find(|(frozen, _)| *frozen == id)
            .map(|(_, contents)| contents)
    }

    /// Compile this list into a shared render handle owned by `owner`
    pub fn cache_render_data(&self, cacher: &dyn RenderDataCacher, owner: Weak<dyn CacheOwner>) -> Arc<CachedRenderHandle> {
        let data = cacher.cache_elements(self);
        let handle = CachedRenderHandle::new(data, self.draw_layers.clone(), owner);
        tracing::trace!(
            handle = handle.id(),
            elements = self.element_count(),
            layers = self.draw_layers.len(),
            "cached render data"
        );
        Arc::new(handle)
    }
}

/// Draw layers referenced from `layers`
fn referenced_layers(layers: &ElementLayers, out: &mut Vec<DrawLayerHandle>) {
    for (_, elements) in layers.iter() {
        for element in elements {
            match &element.payload {
                ElementPayload::Layer(handle) => out.push(handle.clone()),
                ElementPayload::CachedBuffer(CachedBufferPayload {
                    handle: Some(handle), ..
                }) => out.extend(handle.layers().iter().cloned()),
                _ => {}
            }
        }
    }
}

impl std::fmt::Debug for WindowElementList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowElementList")
            .field("window_size", &self.window_size)
            .field("layers", &self.root)
            .field("draw_layers", &self.draw_layers.len())
            .field("volatile", &self.volatile.len())
            .field("pending_deferred", &self.pending_deferred())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementKind;

    fn at(layer: i32) -> ElementPlacement {
        ElementPlacement::new(layer, PaintGeometry::default(), Rect::new(0.0, 0.0, 100.0, 100.0))
    }

    /// Deferred paint that adds one debug quad tinted with `marker` red
    fn marker(marker: f32) -> DeferredPaint {
        DeferredPaint::from_fn(move |list, layer| {
            list.add_debug_quad(at(layer), Color::rgb(marker, 0.0, 0.0));
            layer
        })
    }

    fn markers(list: &WindowElementList) -> Vec<(i32, f32)> {
        list.layers()
            .flat_map(|(id, elements)| elements.iter().map(move |e| (id, e)))
            .filter_map(|(id, e)| match e.payload {
                ElementPayload::DebugQuad { tint } => Some((id, tint.r)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_deferred_fifo_within_group() {
        let mut list = WindowElementList::new(Vec2::new(100.0, 100.0));
        list.begin_deferred_group();
        list.queue_deferred_painting(marker(0.1));
        list.queue_deferred_painting(marker(0.2));
        let max = list.end_deferred_group(5).unwrap();

        assert_eq!(markers(&list), vec![(6, 0.1), (7, 0.2)]);
        assert_eq!(max, 7);
        assert_eq!(list.pending_deferred(), 0);
    }

    #[test]
    fn test_nested_group_resolves_before_parent() {
        let mut list = WindowElementList::new(Vec2::new(100.0, 100.0));
        list.begin_deferred_group();
        list.queue_deferred_painting(marker(0.1));

        list.begin_deferred_group();
        list.queue_deferred_painting(marker(0.5));
        list.end_deferred_group(0).unwrap();

        list.end_deferred_group(0).unwrap();
        let order: Vec<f32> = markers(&list).into_iter().map(|(_, m)| m).collect();
        assert_eq!(order, vec![0.5, 0.1]);
    }

    #[test]
    fn test_deferred_paint_can_queue_into_same_group() {
        let mut list = WindowElementList::new(Vec2::new(100.0, 100.0));
        list.begin_deferred_group();
        list.queue_deferred_painting(DeferredPaint::from_fn(|list, layer| {
            list.add_debug_quad(at(layer), Color::rgb(0.1, 0.0, 0.0));
            list.queue_deferred_painting(marker(0.3));
            layer
        }));
        list.queue_deferred_painting(marker(0.2));
        let max = list.end_deferred_group(0).unwrap();

        let order: Vec<f32> = markers(&list).into_iter().map(|(_, m)| m).collect();
        assert_eq!(order, vec![0.1, 0.2, 0.3]);
        assert_eq!(max, 3);
    }

    #[test]
    fn test_paint_deferred_closes_open_groups() {
        let mut list = WindowElementList::new(Vec2::new(100.0, 100.0));
        list.queue_deferred_painting(marker(0.1));
        list.begin_deferred_group();
        list.queue_deferred_painting(DeferredPaint::from_fn(|list, layer| {
            list.add_debug_quad(at(layer), Color::rgb(0.4, 0.0, 0.0));
            list.queue_deferred_painting(marker(0.5));
            layer
        }));

        list.paint_deferred(0);

        let painted: Vec<f32> = markers(&list).into_iter().map(|(_, m)| m).collect();
        assert_eq!(painted.len(), 3);
        assert!(painted.contains(&0.1));
        assert!(painted.contains(&0.4));
        assert!(painted.contains(&0.5));
        assert_eq!(list.pending_deferred(), 0);
        assert_eq!(list.end_deferred_group(0), Err(PaintError::DeferredGroupUnderflow));
    }

    #[test]
    fn test_element_list_moves_between_threads() {
        fn assert_send<T: Send>() {}
        assert_send::<WindowElementList>();
    }

    #[test]
    fn test_snapshot_keeps_elements_only() {
        let mut list = WindowElementList::new(Vec2::new(100.0, 100.0));
        list.add_debug_quad(at(2), Color::RED);
        list.queue_volatile_painting(marker(0.3), 4, Rect::new(0.0, 0.0, 10.0, 10.0));
        list.begin_deferred_group();
        list.queue_deferred_painting(marker(0.1));

        let copy = list.snapshot();
        assert_eq!(copy.window_size(), list.window_size());
        assert_eq!(copy.element_count(), 2);
        assert_eq!(copy.draw_layers(), list.draw_layers());
        assert!(copy.volatile_paints().is_empty());
        assert_eq!(copy.pending_deferred(), 0);
    }

    #[test]
    fn test_frozen_layers_follow_nested_markers() {
        let outer = DrawLayerHandle::new();
        let inner = DrawLayerHandle::new();
        let mut list = WindowElementList::new(Vec2::new(100.0, 100.0));
        list.add_layer(1, Rect::new(0.0, 0.0, 100.0, 100.0), outer.clone());
        list.push_draw_layer(outer.clone());
        list.add_layer(0, Rect::new(0.0, 0.0, 100.0, 100.0), inner.clone());
        list.pop_draw_layer().unwrap();
        list.push_draw_layer(inner.clone());
        list.add_debug_quad(at(0), Color::RED);
        list.pop_draw_layer().unwrap();

        assert_eq!(list.freeze_draw_layers(), 2);
        inner.lock().clear();
        assert_eq!(list.frozen_layer(inner.id()).map(ElementLayers::element_count), Some(1));
        assert_eq!(list.frozen_layer(outer.id()).map(ElementLayers::element_count), Some(1));

        list.reset();
        assert!(list.frozen_layer(inner.id()).is_none());
    }

    #[test]
    fn test_end_without_begin() {
        let mut list = WindowElementList::new(Vec2::ZERO);
        assert_eq!(list.end_deferred_group(0), Err(PaintError::DeferredGroupUnderflow));
    }

    #[test]
    fn test_volatile_paint_fills_placeholder() {
        let mut list = WindowElementList::new(Vec2::new(100.0, 100.0));
        list.add_debug_quad(at(1), Color::BLUE);
        let handle = list.queue_volatile_painting(marker(0.7), 2, Rect::new(0.0, 0.0, 50.0, 50.0));
        list.add_debug_quad(at(3), Color::GREEN);

        assert_eq!(list.layers().map(|(id, _)| id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(list.root_layers().layer(2)[0].kind(), ElementKind::Layer);
        assert_eq!(handle.element_count(), 0);

        // Repainting replaces the previous frame's volatile output
        for _ in 0..3 {
            assert_eq!(list.paint_volatile(&PaintArgs::default()), 1);
        }
        assert_eq!(handle.element_count(), 1);
        assert_eq!(list.element_count(), 3);
    }

    #[test]
    fn test_scissor_stack_applies_to_new_elements() {
        let mut list = WindowElementList::new(Vec2::new(100.0, 100.0));
        let scissor = Rect::new(0.0, 0.0, 10.0, 10.0);
        list.push_scissor_rect(scissor);
        list.add_debug_quad(at(0), Color::WHITE);
        list.pop_scissor_rect();
        list.add_debug_quad(at(0), Color::WHITE);

        let elements = list.root_layers().layer(0);
        assert_eq!(elements[0].scissor_rect, Some(scissor));
        assert_eq!(elements[1].scissor_rect, None);
    }

    #[test]
    fn test_custom_verts_index_validation() {
        let mut list = WindowElementList::new(Vec2::ZERO);
        let vertex = CustomVertex {
            position: Vec2::ZERO,
            tex_coords: [0.0; 4],
            color: tessel_core::PackedColor::WHITE,
        };
        let result = list.add_custom_verts(at(0), None, vec![vertex; 3], vec![0, 1, 3]);
        assert_eq!(result, Err(PaintError::CustomIndexOutOfRange { index: 3, count: 3 }));
        assert!(list.is_empty());

        list.add_custom_verts(at(0), None, vec![vertex; 3], vec![0, 1, 2]).unwrap();
        assert_eq!(list.element_count(), 1);
    }

    #[test]
    fn test_reset_clears_frame_state() {
        let mut list = WindowElementList::new(Vec2::new(100.0, 100.0));
        list.add_debug_quad(at(0), Color::WHITE);
        list.queue_volatile_painting(marker(0.1), 1, Rect::new(0.0, 0.0, 1.0, 1.0));
        list.begin_deferred_group();
        list.queue_deferred_painting(marker(0.2));

        list.reset();
        assert!(list.is_empty());
        assert!(list.volatile_paints().is_empty());
        assert!(list.draw_layers().is_empty());
        assert_eq!(list.pending_deferred(), 0);
        assert_eq!(list.end_deferred_group(0), Err(PaintError::DeferredGroupUnderflow));
    }
}
