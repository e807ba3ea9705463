//! Invalidation panels
//!
//! An [`InvalidationPanel`] records its subtree's draw elements once, hands
//! them to the renderer's [`RenderDataCacher`] and replays the resulting
//! [`CachedRenderHandle`] on later frames without running any widget code.
//! While cached, the hit-test grid is refilled from the recorded
//! [`CachedNodeArena`] and volatile descendants repaint into their
//! placeholder layers.
//!
//! The panel re-records when its clip size, allotted size or transforms
//! change, when a descendant invalidates it, or after
//! [`InvalidationPanel::invalidate_all_panels`].

use crate::element::ElementPlacement;
use crate::element_list::WindowElementList;
use crate::hittest::HittestGrid;
use crate::render_handle::{CacheOwner, CachedRenderHandle, RenderDataCacher};
use crate::widget::{PaintArgs, PaintContext, Paintable, WidgetId};
use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tessel_core::{Geometry, Rect, Vec2};

new_key_type! {
    /// Key of a recorded widget in a [`CachedNodeArena`]
    pub struct CachedNodeKey;
}

static GLOBAL_INVALIDATION_GENERATION: AtomicU64 = AtomicU64::new(0);

/// A widget as it was painted during a caching pass
#[derive(Clone, Debug)]
pub struct CachedWidgetNode {
    pub widget: WidgetId,
    pub geometry: Geometry,
    pub hit_testable: bool,
    pub parent: Option<CachedNodeKey>,
    pub children: SmallVec<[CachedNodeKey; 4]>,
}

/// The widget tree recorded by a caching pass, for hit-test replay
#[derive(Debug, Default)]
pub struct CachedNodeArena {
    nodes: SlotMap<CachedNodeKey, CachedWidgetNode>,
    roots: Vec<CachedNodeKey>,
}

impl CachedNodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a painted widget under `parent` (a root when `None`)
    pub fn record(
        &mut self,
        parent: Option<CachedNodeKey>,
        widget: WidgetId,
        geometry: Geometry,
        hit_testable: bool,
    ) -> CachedNodeKey {
        let parent = parent.filter(|key| self.nodes.contains_key(*key));
        let key = self.nodes.insert(CachedWidgetNode {
            widget,
            geometry,
            hit_testable,
            parent,
            children: SmallVec::new(),
        });
        match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(parent) => parent.children.push(key),
            None => self.roots.push(key),
        }
        key
    }

    pub fn get(&self, key: CachedNodeKey) -> Option<&CachedWidgetNode> {
        self.nodes.get(key)
    }

    pub fn roots(&self) -> &[CachedNodeKey] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
    }

    /// Register every hit-testable node, shifted by `offset`, parents before
    /// children; returns the number of entries added
    pub fn replay_into(&self, grid: &mut HittestGrid, offset: Vec2, parent: Option<usize>) -> usize {
        self.roots
            .iter()
            .map(|&root| self.replay_node(root, grid, offset, parent))
            .sum()
    }

    fn replay_node(&self, key: CachedNodeKey, grid: &mut HittestGrid, offset: Vec2, parent: Option<usize>) -> usize {
        let Some(node) = self.nodes.get(key) else {
            return 0;
        };
        let mut added = 0;
        let mut child_parent = parent;
        if node.hit_testable {
            child_parent = Some(grid.insert(node.widget, node.geometry.translated(offset), parent));
            added += 1;
        }
        for &child in &node.children {
            added += self.replay_node(child, grid, offset, child_parent);
        }
        added
    }
}

/// How a panel produced its output on the last paint
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaintType {
    /// Replayed the cached elements
    Cached,
    /// Re-recorded the subtree, then replayed it
    Recached,
    /// Painted the children directly
    Passthrough,
}

#[derive(Debug)]
struct PanelState {
    needs_caching: AtomicBool,
}

impl CacheOwner for PanelState {
    fn invalidate_cache(&self) {
        self.needs_caching.store(true, Ordering::Release);
    }
}

struct PanelCache {
    can_cache: bool,
    cache_relative_transforms: bool,
    elements: WindowElementList,
    nodes: Arc<Mutex<CachedNodeArena>>,
    handle: Option<Arc<CachedRenderHandle>>,
    last_clip_size: Vec2,
    last_size: Vec2,
    last_layout_scale: f32,
    last_render_matrix: [f32; 4],
    last_render_translation: Vec2,
    last_position: Vec2,
    generation: u64,
    /// Highest layer of the recording, relative to the panel's layer
    max_layer_offset: i32,
    last_paint_type: Option<PaintType>,
    cache_passes: u64,
}

impl PanelCache {
    fn is_stale(&self, geometry: &Geometry, clip: &Rect) -> bool {
        let render = geometry.render_transform();
        let moved = !self.cache_relative_transforms
            && (geometry.absolute_position() != self.last_position
                || render.translation != self.last_render_translation);

        self.handle.is_none()
            || clip.size() != self.last_clip_size
            || geometry.size() != self.last_size
            || geometry.scale() != self.last_layout_scale
            || render.matrix != self.last_render_matrix
            || moved
            || GLOBAL_INVALIDATION_GENERATION.load(Ordering::Acquire) != self.generation
    }
}

/// Caches its children's paint output between invalidations
///
/// Clones share the same cache, so one clone can be kept for control while
/// another is installed in a [`WidgetNode`](crate::WidgetNode).
#[derive(Clone)]
pub struct InvalidationPanel {
    state: Arc<PanelState>,
    cache: Arc<Mutex<PanelCache>>,
}

impl Default for InvalidationPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl InvalidationPanel {
    pub fn new() -> Self {
        Self {
            state: Arc::new(PanelState {
                needs_caching: AtomicBool::new(true),
            }),
            cache: Arc::new(Mutex::new(PanelCache {
                can_cache: true,
                cache_relative_transforms: false,
                elements: WindowElementList::new(Vec2::ZERO),
                nodes: Arc::new(Mutex::new(CachedNodeArena::new())),
                handle: None,
                last_clip_size: Vec2::ZERO,
                last_size: Vec2::ZERO,
                last_layout_scale: 1.0,
                last_render_matrix: [1.0, 0.0, 0.0, 1.0],
                last_render_translation: Vec2::ZERO,
                last_position: Vec2::ZERO,
                generation: 0,
                max_layer_offset: 0,
                last_paint_type: None,
                cache_passes: 0,
            })),
        }
    }

    /// Bump the process-wide generation; every panel re-records on its next paint
    pub fn invalidate_all_panels() {
        GLOBAL_INVALIDATION_GENERATION.fetch_add(1, Ordering::AcqRel);
        tracing::debug!("invalidated all panels");
    }

    /// A panel that cannot cache paints straight through
    pub fn set_can_cache(&self, can_cache: bool) {
        let mut cache = self.cache.lock();
        if cache.can_cache != can_cache {
            cache.can_cache = can_cache;
            cache.handle = None;
            self.state.invalidate_cache();
        }
    }

    /// Replay the cache with a position delta instead of re-recording on moves
    pub fn set_cache_relative_transforms(&self, relative: bool) {
        let mut cache = self.cache.lock();
        if cache.cache_relative_transforms != relative {
            cache.cache_relative_transforms = relative;
            self.state.invalidate_cache();
        }
    }

    pub fn can_cache(&self) -> bool {
        self.cache.lock().can_cache
    }

    /// Mark the cache dirty; the next paint re-records
    pub fn invalidate(&self) {
        self.state.invalidate_cache();
    }

    pub fn needs_caching(&self) -> bool {
        self.state.needs_caching.load(Ordering::Acquire)
    }

    /// `None` before the first paint
    pub fn last_paint_type(&self) -> Option<PaintType> {
        self.cache.lock().last_paint_type
    }

    /// Number of recording passes so far
    pub fn cache_passes(&self) -> u64 {
        self.cache.lock().cache_passes
    }

    pub fn cached_handle(&self) -> Option<Arc<CachedRenderHandle>> {
        self.cache.lock().handle.clone()
    }

    fn owner(&self) -> Weak<dyn CacheOwner> {
        let owner: Weak<dyn CacheOwner> = Arc::downgrade(&self.state) as Weak<dyn CacheOwner>;
        owner
    }

    fn record(&self, cache: &mut PanelCache, cx: &PaintContext<'_>, cacher: &dyn RenderDataCacher) {
        cache.elements.reset();
        cache.elements.set_window_size(cx.geometry.absolute_size());
        cache.nodes.lock().clear();

        let args = PaintArgs {
            hittest: None,
            hittest_parent: None,
            recorder: Some(cache.nodes.clone()),
            cache_parent: None,
            layout_cache: Some(self.owner()),
            ..cx.args.clone()
        };
        let max = cx.paint_children_with(&args, &mut cache.elements, 0);
        let max = cache.elements.paint_deferred(max);

        cache.handle = Some(cache.elements.cache_render_data(cacher, self.owner()));
        let render = cx.geometry.render_transform();
        cache.last_clip_size = cx.clip.size();
        cache.last_size = cx.geometry.size();
        cache.last_layout_scale = cx.geometry.scale();
        cache.last_render_matrix = render.matrix;
        cache.last_render_translation = render.translation;
        cache.last_position = cx.geometry.absolute_position();
        cache.generation = GLOBAL_INVALIDATION_GENERATION.load(Ordering::Acquire);
        cache.max_layer_offset = max;
        cache.cache_passes += 1;

        tracing::debug!(
            elements = cache.elements.element_count(),
            volatile = cache.elements.volatile_paints().len(),
            nodes = cache.nodes.lock().len(),
            passes = cache.cache_passes,
            "invalidation panel recorded"
        );
    }
}

impl Paintable for InvalidationPanel {
    fn paint(&self, cx: &PaintContext<'_>, out: &mut WindowElementList) -> i32 {
        let mut guard = self.cache.lock();
        let cache = &mut *guard;

        let cacher = match &cx.args.cacher {
            Some(cacher) if cache.can_cache && !cx.args.is_caching() => cacher.clone(),
            _ => {
                cache.last_paint_type = Some(PaintType::Passthrough);
                drop(guard);
                return cx.paint_children(out, cx.layer);
            }
        };

        if cache.is_stale(cx.geometry, cx.clip) {
            self.state.invalidate_cache();
        }

        // Cleared before recording: an invalidation raised during the pass
        // stays set for the next paint
        let paint_type = if self.state.needs_caching.swap(false, Ordering::AcqRel) {
            self.record(cache, cx, cacher.as_ref());
            PaintType::Recached
        } else {
            PaintType::Cached
        };
        cache.last_paint_type = Some(paint_type);

        let offset = if cache.cache_relative_transforms {
            cx.geometry.absolute_position() - cache.last_position
        } else {
            Vec2::ZERO
        };

        let volatile_args = PaintArgs {
            layout_cache: Some(self.owner()),
            ..cx.args.clone()
        };
        cache.elements.paint_volatile(&volatile_args);

        out.add_cached_buffer(
            ElementPlacement::new(cx.layer, cx.geometry.to_paint_geometry(), *cx.clip),
            cache.handle.clone(),
            offset,
        );
        if let Some(grid) = &cx.args.hittest {
            cache
                .nodes
                .lock()
                .replay_into(&mut grid.lock(), offset, cx.args.hittest_parent);
        }

        cx.layer + cache.max_layer_offset
    }

    fn name(&self) -> &str {
        "invalidation_panel"
    }
}
