//! Draw elements
//!
//! A draw element is one tagged paint command: where it goes (layer, clip,
//! paint geometry, scissor) plus a kind-specific payload. Elements are plain
//! owned values so a finished list can move to the render thread.

use crate::brush::{Brush, ResourceHandle};
use crate::layer::DrawLayerHandle;
use crate::render_handle::CachedRenderHandle;
use bitflags::bitflags;
use smallvec::SmallVec;
use std::sync::Arc;
use tessel_core::{Color, PackedColor, PaintGeometry, Rect, Vec2};
use tessel_text::{FontInfo, ShapedGlyphSequence};

bitflags! {
    /// Per-element shading effects
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DrawEffects: u8 {
        const NONE = 0;
        /// Desaturate, used for disabled widgets
        const DISABLED_EFFECT = 1 << 0;
        const IGNORE_TEXTURE_ALPHA = 1 << 1;
        const NO_BLENDING = 1 << 2;
        const NO_GAMMA = 1 << 3;
        const PRE_MULTIPLIED_ALPHA = 1 << 4;
    }
}

bitflags! {
    /// Hints the element passes on to the batch it lands in
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct BatchHints: u8 {
        const NONE = 0;
        const WIREFRAME = 1 << 0;
        const REQUIRES_VSYNC = 1 << 1;
    }
}

/// Where an element is placed
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ElementPlacement {
    pub layer: i32,
    pub geometry: PaintGeometry,
    /// Window-space clip rect, baked into every vertex
    pub clip_rect: Rect,
    pub effects: DrawEffects,
}

impl ElementPlacement {
    pub fn new(layer: i32, geometry: PaintGeometry, clip_rect: Rect) -> Self {
        Self {
            layer,
            geometry,
            clip_rect,
            effects: DrawEffects::NONE,
        }
    }

    pub fn with_effects(mut self, effects: DrawEffects) -> Self {
        self.effects = effects;
        self
    }
}

/// Space a box rotation is expressed in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RotationSpace {
    /// Rotation point is relative to the element's top-left
    #[default]
    RelativeToElement,
    /// Rotation point is in window space
    RelativeToWorld,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoxPayload {
    pub brush: Brush,
    pub tint: Color,
    /// Radians, clockwise
    pub angle: f32,
    /// Defaults to the element center
    pub rotation_point: Option<Vec2>,
    pub rotation_space: RotationSpace,
}

#[derive(Clone, Debug)]
pub struct TextPayload {
    pub text: String,
    pub font: FontInfo,
    pub tint: Color,
}

#[derive(Clone, Debug)]
pub struct ShapedTextPayload {
    pub sequence: Arc<ShapedGlyphSequence>,
    pub tint: Color,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinesPayload {
    /// Local-space points, joined in order
    pub points: Vec<Vec2>,
    pub tint: Color,
    pub antialias: bool,
    pub thickness: f32,
}

/// Cubic Hermite spline
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplinePayload {
    pub start: Vec2,
    pub start_dir: Vec2,
    pub end: Vec2,
    pub end_dir: Vec2,
    pub thickness: f32,
    pub tint: Color,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GradientOrientation {
    /// Stops vary along x; bands are vertical
    #[default]
    Horizontal,
    /// Stops vary along y
    Vertical,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientStop {
    /// Local-space position; only the axis of the orientation is used
    pub position: Vec2,
    pub color: Color,
}

impl GradientStop {
    pub fn new(position: Vec2, color: Color) -> Self {
        Self { position, color }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GradientPayload {
    pub stops: SmallVec<[GradientStop; 4]>,
    pub orientation: GradientOrientation,
}

/// A texture produced elsewhere (scene view, video) drawn as a quad
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportPayload {
    pub texture: Option<ResourceHandle>,
    pub allow_blending: bool,
    pub gamma_correct: bool,
    /// Single channel texture, drawn with the font shader
    pub alpha_only: bool,
    pub requires_vsync: bool,
    pub tint: Color,
}

impl Default for ViewportPayload {
    fn default() -> Self {
        Self {
            texture: None,
            allow_blending: true,
            gamma_correct: true,
            alpha_only: false,
            requires_vsync: false,
            tint: Color::WHITE,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BorderPayload {
    pub brush: Brush,
    pub tint: Color,
}

/// Arbitrary render-thread drawing inserted between batches
pub trait CustomDrawer: Send + Sync {
    /// Called by the renderer when the entry's turn comes
    fn draw_render_thread(&self, clip_rect: &Rect);

    fn name(&self) -> &str {
        "custom"
    }
}

/// Caller-built vertex for [`ElementPayload::CustomVerts`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CustomVertex {
    pub position: Vec2,
    pub tex_coords: [f32; 4],
    pub color: PackedColor,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CustomVertsPayload {
    pub resource: Option<ResourceHandle>,
    pub vertices: Vec<CustomVertex>,
    pub indices: Vec<u32>,
}

#[derive(Clone, Debug)]
pub struct CachedBufferPayload {
    pub handle: Option<Arc<CachedRenderHandle>>,
    /// Window-space delta applied to the cached content
    pub offset: Vec2,
}

/// Element kind with its data
#[derive(Clone)]
pub enum ElementPayload {
    Box(BoxPayload),
    Text(TextPayload),
    ShapedText(ShapedTextPayload),
    Lines(LinesPayload),
    Spline(SplinePayload),
    Gradient(GradientPayload),
    Viewport(ViewportPayload),
    Border(BorderPayload),
    Custom(Option<Arc<dyn CustomDrawer>>),
    CustomVerts(CustomVertsPayload),
    CachedBuffer(CachedBufferPayload),
    /// Marker whose position the referenced layer's contents take
    Layer(DrawLayerHandle),
    /// Untextured quad covering the element
    DebugQuad { tint: Color },
}

/// Payload discriminant, for statistics and logging
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Box,
    Text,
    ShapedText,
    Lines,
    Spline,
    Gradient,
    Viewport,
    Border,
    Custom,
    CustomVerts,
    CachedBuffer,
    Layer,
    DebugQuad,
}

impl ElementPayload {
    pub fn kind(&self) -> ElementKind {
        match self {
            ElementPayload::Box(_) => ElementKind::Box,
            ElementPayload::Text(_) => ElementKind::Text,
            ElementPayload::ShapedText(_) => ElementKind::ShapedText,
            ElementPayload::Lines(_) => ElementKind::Lines,
            ElementPayload::Spline(_) => ElementKind::Spline,
            ElementPayload::Gradient(_) => ElementKind::Gradient,
            ElementPayload::Viewport(_) => ElementKind::Viewport,
            ElementPayload::Border(_) => ElementKind::Border,
            ElementPayload::Custom(_) => ElementKind::Custom,
            ElementPayload::CustomVerts(_) => ElementKind::CustomVerts,
            ElementPayload::CachedBuffer(_) => ElementKind::CachedBuffer,
            ElementPayload::Layer(_) => ElementKind::Layer,
            ElementPayload::DebugQuad { .. } => ElementKind::DebugQuad,
        }
    }
}

impl std::fmt::Debug for ElementPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementPayload::Box(payload) => f.debug_tuple("Box").field(payload).finish(),
            ElementPayload::Text(payload) => f.debug_tuple("Text").field(&payload.text).finish(),
            ElementPayload::ShapedText(payload) => f
                .debug_tuple("ShapedText")
                .field(&payload.sequence.len())
                .finish(),
            ElementPayload::Custom(drawer) => f
                .debug_tuple("Custom")
                .field(&drawer.as_ref().map(|d| d.name().to_string()))
                .finish(),
            ElementPayload::CachedBuffer(payload) => f
                .debug_tuple("CachedBuffer")
                .field(&payload.handle.as_ref().map(|h| h.id()))
                .finish(),
            ElementPayload::Layer(handle) => f.debug_tuple("Layer").field(handle).finish(),
            other => write!(f, "{:?}", other.kind()),
        }
    }
}

/// One paint command
#[derive(Clone, Debug)]
pub struct DrawElement {
    /// Paint order bucket, not depth
    pub layer: i32,
    pub clip_rect: Rect,
    pub geometry: PaintGeometry,
    pub effects: DrawEffects,
    pub batch_hints: BatchHints,
    /// Coarse per-batch reject; elements whose scissor misses their clip are dropped
    pub scissor_rect: Option<Rect>,
    pub payload: ElementPayload,
}

impl DrawElement {
    pub fn new(at: ElementPlacement, payload: ElementPayload) -> Self {
        Self {
            layer: at.layer,
            clip_rect: at.clip_rect,
            geometry: at.geometry,
            effects: at.effects,
            batch_hints: BatchHints::NONE,
            scissor_rect: None,
            payload,
        }
    }

    pub fn kind(&self) -> ElementKind {
        self.payload.kind()
    }

    /// Nothing drawable survives the clip rect
    pub fn is_clipped_out(&self) -> bool {
        !self.clip_rect.is_valid() || self.clip_rect.is_all_zero()
    }

    /// The scissor rect, when set, misses the clip rect entirely
    pub fn is_scissor_rejected(&self) -> bool {
        self.scissor_rect
            .map(|scissor| !scissor.intersects(&self.clip_rect))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(clip: Rect) -> DrawElement {
        DrawElement::new(
            ElementPlacement::new(0, PaintGeometry::default(), clip),
            ElementPayload::DebugQuad { tint: Color::WHITE },
        )
    }

    #[test]
    fn test_degenerate_clip() {
        assert!(element(Rect::ZERO).is_clipped_out());
        assert!(element(Rect::new(10.0, 10.0, 10.0, 40.0)).is_clipped_out());
        assert!(element(Rect::new(0.0, f32::NAN, 10.0, 10.0)).is_clipped_out());
        assert!(!element(Rect::new(0.0, 0.0, 10.0, 10.0)).is_clipped_out());
    }

    #[test]
    fn test_scissor_rejection() {
        let mut e = element(Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(!e.is_scissor_rejected());

        e.scissor_rect = Some(Rect::new(5.0, 5.0, 20.0, 20.0));
        assert!(!e.is_scissor_rejected());

        e.scissor_rect = Some(Rect::new(50.0, 50.0, 60.0, 60.0));
        assert!(e.is_scissor_rejected());
    }
}
