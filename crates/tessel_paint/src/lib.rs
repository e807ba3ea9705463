//! Tessel paint
//!
//! The retained half of the renderer. Widgets paint into a
//! [`WindowElementList`]; invalidation panels record a subtree's elements once
//! and replay them on later frames; volatile widgets inside a cached subtree
//! repaint every frame into draw layers that the cached content references.
//!
//! # Example
//!
//! ```ignore
//! use tessel_paint::{ElementPlacement, WindowElementList, Brush, DrawEffects};
//! use tessel_core::{Color, Geometry, LayoutTransform, Vec2};
//!
//! let root = Geometry::make_root(Vec2::new(800.0, 600.0), LayoutTransform::IDENTITY);
//! let mut list = WindowElementList::new(Vec2::new(800.0, 600.0));
//!
//! let at = ElementPlacement::new(0, root.to_paint_geometry(), root.layout_bounding_rect());
//! list.add_box(at, &Brush::solid(), Color::BLUE);
//! ```

pub mod brush;
pub mod element;
pub mod element_list;
pub mod hittest;
pub mod invalidation;
pub mod layer;
pub mod render_handle;
pub mod widget;
pub mod widgets;

pub use brush::{Brush, BrushDrawType, BrushMirroring, BrushTiling, ResourceHandle};
pub use element::{
    BatchHints, BorderPayload, BoxPayload, CachedBufferPayload, CustomDrawer, CustomVertex,
    CustomVertsPayload, DrawEffects, DrawElement, ElementKind, ElementPayload, ElementPlacement,
    GradientOrientation, GradientPayload, GradientStop, LinesPayload, RotationSpace,
    ShapedTextPayload, SplinePayload, TextPayload, ViewportPayload,
};
pub use element_list::{DeferredPaint, VolatilePaint, WindowElementList};
pub use hittest::{HittestEntry, HittestGrid};
pub use invalidation::{
    CachedNodeArena, CachedNodeKey, CachedWidgetNode, InvalidationPanel, PaintType,
};
pub use layer::{DrawLayerHandle, DrawLayerId, ElementLayers};
pub use render_handle::{CacheOwner, CachedRenderData, CachedRenderHandle, RenderDataCacher};
pub use widget::{
    ArrangedChild, PaintArgs, PaintContext, Paintable, Visibility, WidgetId, WidgetInvalidation,
    WidgetNode, WidgetRef,
};

use thiserror::Error;

/// Paint errors
///
/// Painting itself never fails; these surface from the few fallible
/// operations around it (resolving handles, validating element payloads).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PaintError {
    #[error("{kind} element has no {what}")]
    MissingPayload {
        kind: &'static str,
        what: &'static str,
    },

    #[error("Deferred group underflow: end_deferred_group without a matching begin")]
    DeferredGroupUnderflow,

    #[error("Draw layer stack underflow")]
    DrawLayerUnderflow,

    #[error("Custom vertex index {index} out of range for {count} vertices")]
    CustomIndexOutOfRange { index: u32, count: usize },
}

pub type Result<T> = std::result::Result<T, PaintError>;
