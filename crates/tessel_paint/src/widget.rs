//! Widget paint protocol
//!
//! A widget tree is a tree of shared [`WidgetNode`]s, each wrapping a
//! [`Paintable`]. A frame runs in three passes:
//!
//! 1. [`WidgetNode::slate_prepass`] computes desired sizes bottom-up and the
//!    volatility flags top-down.
//! 2. [`WidgetNode::tick_widgets`] advances per-frame state.
//! 3. [`WidgetNode::paint`] arranges children and paints them, returning the
//!    highest layer used.
//!
//! [`WidgetNode::tick_and_paint`] fuses 2 and 3 in one traversal and produces
//! the same element list.
//!
//! Volatile widgets inside a caching pass are not painted. They leave a
//! placeholder in the element list and repaint into it every frame.

use crate::element::ElementPlacement;
use crate::element_list::{DeferredPaint, WindowElementList};
use crate::hittest::HittestGrid;
use crate::invalidation::{CachedNodeArena, CachedNodeKey};
use crate::render_handle::{CacheOwner, RenderDataCacher};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tessel_core::{Geometry, LayoutTransform, Rect, RenderTransform, Vec2};

static NEXT_WIDGET_ID: AtomicU64 = AtomicU64::new(1);

/// Unique widget identity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(pub u64);

impl WidgetId {
    fn next() -> Self {
        WidgetId(NEXT_WIDGET_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Shared handle to a node in the widget tree
pub type WidgetRef = Arc<WidgetNode>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Visibility {
    #[default]
    Visible,
    /// Takes no space, not painted
    Collapsed,
    /// Takes space, not painted
    Hidden,
    /// Painted, neither it nor its children are hit-testable
    HitTestInvisible,
    /// Painted, not hit-testable itself but its children may be
    SelfHitTestInvisible,
}

impl Visibility {
    pub fn is_visible(self) -> bool {
        !matches!(self, Visibility::Collapsed | Visibility::Hidden)
    }

    pub fn is_hit_testable(self) -> bool {
        self == Visibility::Visible
    }

    pub fn are_children_hit_testable(self) -> bool {
        matches!(self, Visibility::Visible | Visibility::SelfHitTestInvisible)
    }
}

/// What changed about a widget
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WidgetInvalidation {
    Layout,
    /// Layout changed and volatility may have changed with it
    LayoutAndVolatility,
}

/// Placement of one child produced by [`Paintable::arrange_children`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArrangedChild {
    /// Index into the node's children
    pub index: usize,
    pub size: Vec2,
    pub local_layout: LayoutTransform,
}

impl ArrangedChild {
    pub fn new(index: usize, offset: Vec2, size: Vec2) -> Self {
        Self {
            index,
            size,
            local_layout: LayoutTransform::from_translation(offset),
        }
    }

    pub fn with_layout(index: usize, size: Vec2, local_layout: LayoutTransform) -> Self {
        Self {
            index,
            size,
            local_layout,
        }
    }
}

/// Per-paint arguments handed down the tree
#[derive(Clone, Default)]
pub struct PaintArgs {
    pub current_time: f64,
    pub delta_time: f32,
    /// Compiles recorded element lists for invalidation panels; no cacher
    /// makes every panel pass through
    pub cacher: Option<Arc<dyn RenderDataCacher>>,
    pub hittest: Option<Arc<Mutex<HittestGrid>>>,
    /// Hit-test index of the nearest hit-testable ancestor
    pub hittest_parent: Option<usize>,
    /// Set while an invalidation panel records its children
    pub recorder: Option<Arc<Mutex<CachedNodeArena>>>,
    pub cache_parent: Option<CachedNodeKey>,
    /// The panel caching the widgets painted with these arguments
    pub layout_cache: Option<Weak<dyn CacheOwner>>,
    /// Tick each widget right before painting it
    pub fold_tick: bool,
}

impl PaintArgs {
    pub fn new(current_time: f64, delta_time: f32) -> Self {
        Self {
            current_time,
            delta_time,
            ..Self::default()
        }
    }

    pub fn with_cacher(mut self, cacher: Arc<dyn RenderDataCacher>) -> Self {
        self.cacher = Some(cacher);
        self
    }

    pub fn with_hittest(mut self, hittest: Arc<Mutex<HittestGrid>>) -> Self {
        self.hittest = Some(hittest);
        self
    }

    /// Inside an invalidation panel's recording pass
    pub fn is_caching(&self) -> bool {
        self.recorder.is_some()
    }

    /// Arguments for repainting recorded volatile widgets
    ///
    /// Volatile widgets are registered for hit-testing when recorded, their
    /// descendants are not.
    pub fn for_volatile_paint(&self) -> Self {
        Self {
            hittest: None,
            hittest_parent: None,
            recorder: None,
            cache_parent: None,
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for PaintArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaintArgs")
            .field("current_time", &self.current_time)
            .field("delta_time", &self.delta_time)
            .field("caching", &self.is_caching())
            .field("has_cacher", &self.cacher.is_some())
            .field("fold_tick", &self.fold_tick)
            .finish()
    }
}

/// Everything a widget's paint sees
pub struct PaintContext<'a> {
    /// Arguments for painting this widget's children
    pub args: &'a PaintArgs,
    pub geometry: &'a Geometry,
    pub clip: &'a Rect,
    pub layer: i32,
    pub parent_enabled: bool,
    children: &'a [(WidgetRef, Geometry)],
}

impl<'a> PaintContext<'a> {
    /// Placement covering this widget at `layer`
    pub fn placement(&self, layer: i32) -> ElementPlacement {
        ElementPlacement::new(layer, self.geometry.to_paint_geometry(), *self.clip)
    }

    /// Arranged children with their geometry
    pub fn children(&self) -> &[(WidgetRef, Geometry)] {
        self.children
    }

    /// Paint every arranged child at `layer`; returns the highest layer used
    pub fn paint_children(&self, out: &mut WindowElementList, layer: i32) -> i32 {
        self.paint_children_with(self.args, out, layer)
    }

    /// Like [`paint_children`](Self::paint_children) with other arguments
    pub fn paint_children_with(&self, args: &PaintArgs, out: &mut WindowElementList, layer: i32) -> i32 {
        let mut max = layer;
        for (child, geometry) in self.children {
            if !geometry.render_bounding_rect().intersects(self.clip) {
                continue;
            }
            max = max.max(child.paint(args, geometry, self.clip, out, layer, self.parent_enabled));
        }
        max
    }

    /// Queue the child at `index` to paint at the end of the current deferred group
    pub fn defer_child(&self, index: usize, out: &mut WindowElementList) {
        if let Some((child, geometry)) = self.children.get(index) {
            out.queue_deferred_painting(DeferredPaint::widget(child.clone(), self.args, *geometry, *self.clip));
        }
    }
}

/// Widget behavior plugged into a [`WidgetNode`]
pub trait Paintable: Send + Sync {
    /// Desired size given the children's desired sizes; defaults to their
    /// component-wise maximum
    fn desired_size(&self, children_desired: &[Vec2], _layout_scale_multiplier: f32) -> Vec2 {
        children_desired
            .iter()
            .fold(Vec2::ZERO, |acc, size| Vec2::new(acc.x.max(size.x), acc.y.max(size.y)))
    }

    /// Place children; defaults to every child filling this widget
    fn arrange_children(&self, geometry: &Geometry, children_desired: &[Vec2], out: &mut Vec<ArrangedChild>) {
        for index in 0..children_desired.len() {
            out.push(ArrangedChild::new(index, Vec2::ZERO, geometry.size()));
        }
    }

    /// Paint this widget and its children; returns the highest layer used
    fn paint(&self, cx: &PaintContext<'_>, out: &mut WindowElementList) -> i32 {
        cx.paint_children(out, cx.layer)
    }

    fn tick(&mut self, _geometry: &Geometry, _current_time: f64, _delta_time: f32) {}

    fn visibility(&self) -> Visibility {
        Visibility::Visible
    }

    /// Whether the output changes every frame without invalidation
    fn compute_volatility(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "widget"
    }
}

struct WidgetState {
    render_transform: Option<RenderTransform>,
    /// Normalized to the widget size
    render_transform_pivot: Vec2,
    force_volatile: bool,
    cached_volatile: bool,
    inherited_volatile: bool,
    desired_size: Vec2,
    layout_cache: Option<Weak<dyn CacheOwner>>,
}

impl Default for WidgetState {
    fn default() -> Self {
        Self {
            render_transform: None,
            render_transform_pivot: Vec2::splat(0.5),
            force_volatile: false,
            cached_volatile: false,
            inherited_volatile: false,
            desired_size: Vec2::ZERO,
            layout_cache: None,
        }
    }
}

/// A widget in the tree
pub struct WidgetNode {
    id: WidgetId,
    widget: RwLock<Box<dyn Paintable>>,
    children: RwLock<Vec<WidgetRef>>,
    state: Mutex<WidgetState>,
}

impl WidgetNode {
    pub fn new(widget: impl Paintable + 'static) -> WidgetRef {
        Self::with_children(widget, Vec::new())
    }

    pub fn with_children(widget: impl Paintable + 'static, children: Vec<WidgetRef>) -> WidgetRef {
        Arc::new(Self {
            id: WidgetId::next(),
            widget: RwLock::new(Box::new(widget)),
            children: RwLock::new(children),
            state: Mutex::new(WidgetState::default()),
        })
    }

    pub fn id(&self) -> WidgetId {
        self.id
    }

    pub fn widget(&self) -> RwLockReadGuard<'_, Box<dyn Paintable>> {
        self.widget.read()
    }

    /// Swap the widget behavior, invalidating layout and volatility
    pub fn replace_widget(&self, widget: impl Paintable + 'static) {
        *self.widget.write() = Box::new(widget);
        self.invalidate(WidgetInvalidation::LayoutAndVolatility);
    }

    pub fn add_child(&self, child: WidgetRef) {
        self.children.write().push(child);
        self.invalidate(WidgetInvalidation::Layout);
    }

    pub fn children(&self) -> Vec<WidgetRef> {
        self.children.read().clone()
    }

    pub fn child_count(&self) -> usize {
        self.children.read().len()
    }

    pub fn desired_size(&self) -> Vec2 {
        self.state.lock().desired_size
    }

    pub fn render_transform(&self) -> Option<RenderTransform> {
        self.state.lock().render_transform
    }

    /// Render transform applied about the pivot; does not affect layout
    pub fn set_render_transform(&self, transform: Option<RenderTransform>) {
        self.state.lock().render_transform = transform;
        self.invalidate(WidgetInvalidation::Layout);
    }

    pub fn set_render_transform_pivot(&self, pivot: Vec2) {
        self.state.lock().render_transform_pivot = pivot;
        self.invalidate(WidgetInvalidation::Layout);
    }

    pub fn set_force_volatile(&self, force: bool) {
        self.state.lock().force_volatile = force;
        self.invalidate(WidgetInvalidation::LayoutAndVolatility);
    }

    /// Volatile itself
    pub fn is_volatile(&self) -> bool {
        self.state.lock().cached_volatile
    }

    /// Has a volatile ancestor
    pub fn is_volatile_indirectly(&self) -> bool {
        self.state.lock().inherited_volatile
    }

    /// Note a change; invalidates the caching panel unless the widget was
    /// already repainting every frame. Returns whether a panel was invalidated.
    pub fn invalidate(&self, invalidation: WidgetInvalidation) -> bool {
        let recomputed = match invalidation {
            WidgetInvalidation::LayoutAndVolatility => Some(self.widget.read().compute_volatility()),
            WidgetInvalidation::Layout => None,
        };

        let mut state = self.state.lock();
        let was_volatile = state.cached_volatile || state.inherited_volatile;
        let mut volatility_changed = false;
        if let Some(computed) = recomputed {
            let volatile = state.force_volatile || computed;
            volatility_changed = volatile != state.cached_volatile;
            state.cached_volatile = volatile;
        }

        if was_volatile && !volatility_changed {
            return false;
        }
        let owner = state.layout_cache.as_ref().and_then(Weak::upgrade);
        drop(state);

        match owner {
            Some(owner) => {
                tracing::trace!(widget = self.id.0, ?invalidation, "invalidating layout cache");
                owner.invalidate_cache();
                true
            }
            None => false,
        }
    }

    /// Desired sizes bottom-up, volatility top-down
    pub fn slate_prepass(&self, layout_scale_multiplier: f32) {
        self.prepass(layout_scale_multiplier, false);
    }

    fn prepass(&self, layout_scale_multiplier: f32, parent_volatile: bool) {
        let widget = self.widget.read();
        let volatile = {
            let mut state = self.state.lock();
            state.cached_volatile = state.force_volatile || widget.compute_volatility();
            state.inherited_volatile = parent_volatile;
            state.cached_volatile
        };

        let children = self.children();
        for child in &children {
            child.prepass(layout_scale_multiplier, parent_volatile || volatile);
        }

        let desired_size = if widget.visibility() == Visibility::Collapsed {
            Vec2::ZERO
        } else {
            let children_desired: Vec<Vec2> = children.iter().map(|c| c.desired_size()).collect();
            widget.desired_size(&children_desired, layout_scale_multiplier)
        };
        self.state.lock().desired_size = desired_size;
    }

    /// Children that take part in layout, with their geometry
    pub fn arrange(&self, geometry: &Geometry) -> Vec<(WidgetRef, Geometry)> {
        let children = self.children();
        if children.is_empty() {
            return Vec::new();
        }
        let children_desired: Vec<Vec2> = children.iter().map(|c| c.desired_size()).collect();
        let mut arranged = Vec::with_capacity(children.len());
        self.widget.read().arrange_children(geometry, &children_desired, &mut arranged);

        arranged
            .into_iter()
            .filter_map(|slot| {
                let Some(child) = children.get(slot.index) else {
                    tracing::warn!(widget = self.id.0, index = slot.index, "arranged a child that does not exist");
                    return None;
                };
                if child.widget.read().visibility() == Visibility::Collapsed {
                    return None;
                }
                let (render, pivot) = {
                    let state = child.state.lock();
                    (state.render_transform, state.render_transform_pivot)
                };
                let child_geometry = match render {
                    Some(render) => geometry.make_child_with_render_transform(slot.size, slot.local_layout, render, pivot),
                    None => geometry.make_child(slot.size, slot.local_layout),
                };
                Some((child.clone(), child_geometry))
            })
            .collect()
    }

    /// Advance this subtree's per-frame state
    pub fn tick_widgets(&self, geometry: &Geometry, current_time: f64, delta_time: f32) {
        let visibility = {
            let mut widget = self.widget.write();
            widget.tick(geometry, current_time, delta_time);
            widget.visibility()
        };
        if !visibility.is_visible() {
            return;
        }
        for (child, child_geometry) in self.arrange(geometry) {
            child.tick_widgets(&child_geometry, current_time, delta_time);
        }
    }

    /// Paint this subtree; returns the highest layer used
    pub fn paint(
        self: &Arc<Self>,
        args: &PaintArgs,
        geometry: &Geometry,
        clip: &Rect,
        out: &mut WindowElementList,
        layer: i32,
        parent_enabled: bool,
    ) -> i32 {
        if args.fold_tick {
            self.widget.write().tick(geometry, args.current_time, args.delta_time);
        }
        let visibility = self.widget.read().visibility();
        if !visibility.is_visible() {
            return layer;
        }

        let volatile = {
            let mut state = self.state.lock();
            state.layout_cache = args.layout_cache.clone();
            state.cached_volatile
        };

        if args.is_caching() && volatile {
            if let Some(recorder) = &args.recorder {
                recorder
                    .lock()
                    .record(args.cache_parent, self.id, *geometry, visibility.is_hit_testable());
            }
            out.queue_volatile_painting(DeferredPaint::widget(self.clone(), args, *geometry, *clip), layer, *clip);
            return layer;
        }

        let mut child_args = args.clone();
        if let Some(recorder) = &args.recorder {
            let key = recorder
                .lock()
                .record(args.cache_parent, self.id, *geometry, visibility.is_hit_testable());
            child_args.cache_parent = Some(key);
        } else if let Some(grid) = &args.hittest {
            if visibility.is_hit_testable() {
                let index = grid.lock().insert(self.id, *geometry, args.hittest_parent);
                child_args.hittest_parent = Some(index);
            }
        }
        if !visibility.are_children_hit_testable() {
            child_args.hittest = None;
        }

        let arranged = self.arrange(geometry);
        let widget = self.widget.read();
        let cx = PaintContext {
            args: &child_args,
            geometry,
            clip,
            layer,
            parent_enabled,
            children: &arranged,
        };
        widget.paint(&cx, out)
    }

    /// Paint a window's root widget after [`tick_widgets`](Self::tick_widgets)
    pub fn paint_widgets(
        self: &Arc<Self>,
        args: &PaintArgs,
        geometry: &Geometry,
        clip: &Rect,
        out: &mut WindowElementList,
        layer: i32,
    ) -> i32 {
        let args = PaintArgs {
            fold_tick: false,
            ..args.clone()
        };
        self.paint(&args, geometry, clip, out, layer, true)
    }

    /// Ticks and paints the subtree in one traversal
    pub fn tick_and_paint(
        self: &Arc<Self>,
        args: &PaintArgs,
        geometry: &Geometry,
        clip: &Rect,
        out: &mut WindowElementList,
        layer: i32,
    ) -> i32 {
        let args = PaintArgs {
            fold_tick: true,
            ..args.clone()
        };
        self.paint(&args, geometry, clip, out, layer, true)
    }
}

impl std::fmt::Debug for WidgetNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetNode")
            .field("id", &self.id)
            .field("widget", &self.widget.read().name())
            .field("children", &self.child_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brush::Brush;
    use crate::element::ElementKind;
    use std::sync::atomic::AtomicBool;
    use tessel_core::Color;

    struct Block {
        size: Vec2,
        volatile: bool,
    }

    impl Paintable for Block {
        fn desired_size(&self, _: &[Vec2], _: f32) -> Vec2 {
            self.size
        }

        fn paint(&self, cx: &PaintContext<'_>, out: &mut WindowElementList) -> i32 {
            out.add_box(cx.placement(cx.layer), &Brush::solid(), Color::RED);
            if cx.children().is_empty() {
                return cx.layer;
            }
            cx.paint_children(out, cx.layer + 1)
        }

        fn compute_volatility(&self) -> bool {
            self.volatile
        }
    }

    fn block(size: f32) -> Block {
        Block {
            size: Vec2::splat(size),
            volatile: false,
        }
    }

    #[derive(Default)]
    struct Owner(AtomicBool);

    impl CacheOwner for Owner {
        fn invalidate_cache(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    fn window() -> (Geometry, Rect) {
        let geometry = Geometry::make_root(Vec2::new(400.0, 300.0), LayoutTransform::IDENTITY);
        (geometry, geometry.layout_bounding_rect())
    }

    #[test]
    fn test_prepass_desired_and_volatility() {
        let leaf = WidgetNode::new(block(10.0));
        let volatile = WidgetNode::with_children(
            Block {
                size: Vec2::splat(30.0),
                volatile: true,
            },
            vec![leaf.clone()],
        );
        let root = WidgetNode::with_children(block(5.0), vec![volatile.clone(), WidgetNode::new(block(40.0))]);
        root.slate_prepass(1.0);

        assert_eq!(root.desired_size(), Vec2::splat(5.0));
        assert!(volatile.is_volatile());
        assert!(!volatile.is_volatile_indirectly());
        assert!(!leaf.is_volatile());
        assert!(leaf.is_volatile_indirectly());
        assert!(!root.is_volatile());
    }

    #[test]
    fn test_paint_returns_max_layer() {
        let root = WidgetNode::with_children(block(10.0), vec![WidgetNode::with_children(block(5.0), vec![WidgetNode::new(block(1.0))])]);
        root.slate_prepass(1.0);

        let (geometry, clip) = window();
        let mut out = WindowElementList::new(geometry.size());
        let max = root.paint(&PaintArgs::default(), &geometry, &clip, &mut out, 0, true);
        assert_eq!(max, 2);
        assert_eq!(out.element_count(), 3);
    }

    #[test]
    fn test_hidden_and_culled_children_skip_paint() {
        struct Offscreen;
        impl Paintable for Offscreen {
            fn arrange_children(&self, _: &Geometry, desired: &[Vec2], out: &mut Vec<ArrangedChild>) {
                for (index, size) in desired.iter().enumerate() {
                    out.push(ArrangedChild::new(index, Vec2::new(1000.0, 1000.0), *size));
                }
            }
        }

        let root = WidgetNode::with_children(Offscreen, vec![WidgetNode::new(block(10.0))]);
        root.slate_prepass(1.0);
        let (geometry, clip) = window();
        let mut out = WindowElementList::new(geometry.size());
        assert_eq!(root.paint(&PaintArgs::default(), &geometry, &clip, &mut out, 3, true), 3);
        assert!(out.is_empty());
    }

    #[test]
    fn test_render_transform_rotates_child_geometry() {
        let child = WidgetNode::new(block(10.0));
        child.set_render_transform(Some(RenderTransform::from_rotation(std::f32::consts::FRAC_PI_2)));
        let root = WidgetNode::with_children(block(100.0), vec![child.clone()]);
        root.slate_prepass(1.0);

        let (geometry, _) = window();
        let arranged = root.arrange(&geometry);
        let (_, child_geometry) = &arranged[0];
        assert!(child_geometry.has_render_transform());
        // Layout position is unaffected by the render transform
        assert_eq!(child_geometry.absolute_position(), Vec2::ZERO);
    }

    #[test]
    fn test_invalidate_reaches_layout_cache() {
        let owner = Arc::new(Owner::default());
        let weak: Weak<dyn CacheOwner> = Arc::downgrade(&owner) as Weak<dyn CacheOwner>;
        let node = WidgetNode::new(block(10.0));
        node.slate_prepass(1.0);

        let (geometry, clip) = window();
        let args = PaintArgs {
            layout_cache: Some(weak),
            ..PaintArgs::default()
        };
        let mut out = WindowElementList::new(geometry.size());
        node.paint(&args, &geometry, &clip, &mut out, 0, true);

        assert!(node.invalidate(WidgetInvalidation::Layout));
        assert!(owner.0.load(Ordering::SeqCst));
    }

    #[test]
    fn test_volatile_widget_invalidation_skips_cache() {
        let owner = Arc::new(Owner::default());
        let weak: Weak<dyn CacheOwner> = Arc::downgrade(&owner) as Weak<dyn CacheOwner>;
        let node = WidgetNode::new(Block {
            size: Vec2::splat(10.0),
            volatile: true,
        });
        node.slate_prepass(1.0);

        let (geometry, clip) = window();
        let args = PaintArgs {
            layout_cache: Some(weak),
            ..PaintArgs::default()
        };
        let mut out = WindowElementList::new(geometry.size());
        node.paint(&args, &geometry, &clip, &mut out, 0, true);

        assert!(!node.invalidate(WidgetInvalidation::Layout));
        assert!(!node.invalidate(WidgetInvalidation::LayoutAndVolatility));
        assert!(!owner.0.load(Ordering::SeqCst));

        // Dropping volatility must reach the cache so the widget gets recorded
        node.replace_widget(block(10.0));
        assert!(owner.0.load(Ordering::SeqCst));
        assert!(!node.is_volatile());
    }

    #[test]
    fn test_volatile_under_recorder_leaves_placeholder() {
        let node = WidgetNode::new(Block {
            size: Vec2::splat(10.0),
            volatile: true,
        });
        node.slate_prepass(1.0);

        let (geometry, clip) = window();
        let arena = Arc::new(Mutex::new(CachedNodeArena::new()));
        let args = PaintArgs {
            recorder: Some(arena.clone()),
            ..PaintArgs::default()
        };
        let mut out = WindowElementList::new(geometry.size());
        assert_eq!(node.paint(&args, &geometry, &clip, &mut out, 4, true), 4);

        let kinds: Vec<ElementKind> = out.layers().flat_map(|(_, e)| e.iter().map(|e| e.kind())).collect();
        assert_eq!(kinds, vec![ElementKind::Layer]);
        assert_eq!(out.volatile_paints().len(), 1);
        assert_eq!(arena.lock().len(), 1);

        out.paint_volatile(&PaintArgs::default());
        assert_eq!(out.draw_layers()[0].element_count(), 1);
    }

    #[test]
    fn test_paint_registers_hittest_chain() {
        let leaf = WidgetNode::new(block(10.0));
        let root = WidgetNode::with_children(block(100.0), vec![leaf.clone()]);
        root.slate_prepass(1.0);

        let (geometry, clip) = window();
        let grid = Arc::new(Mutex::new(HittestGrid::new()));
        let args = PaintArgs::default().with_hittest(grid.clone());
        let mut out = WindowElementList::new(geometry.size());
        root.paint(&args, &geometry, &clip, &mut out, 0, true);

        assert_eq!(grid.lock().hit_test(Vec2::new(5.0, 5.0)), vec![leaf.id(), root.id()]);
    }
}
