//! Composite fonts
//!
//! A composite font is a default typeface plus sub-typefaces that override it
//! for particular character ranges (and optionally particular cultures). Each
//! composite font carries a history revision; bumping it makes every cache
//! entry derived from the font stale.

use crate::font::{FontBulkData, FontFace, FontHinting, FontLoadingPolicy};
use crate::RENDER_DPI;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_FONT_DATA_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_COMPOSITE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`FontData`]; clones share it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontDataId(u64);

impl FontDataId {
    /// Id that no loaded font ever has
    pub const INVALID: FontDataId = FontDataId(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// Identity of a [`CompositeFont`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompositeFontId(u64);

/// Where the glyphs of a [`FontData`] come from
#[derive(Clone)]
pub enum FontSource {
    /// Font file bytes, parsed by the cache on first use
    Bulk(Arc<FontBulkData>),
    /// An already constructed face (embedded fonts, synthetic faces)
    Loaded(Arc<dyn GlyphFace>),
}

/// The capability the font cache needs from a face
///
/// Implemented by [`FontFace`] for real font files. All sizes are in pixels.
pub trait GlyphFace: Send + Sync {
    /// Glyph for `c`, or `None` when the face does not cover it
    fn glyph_index(&self, c: char) -> Option<u16>;

    fn advance(&self, glyph: u16, pixel_size: f32) -> f32;

    fn kerning(&self, left: u16, right: u16, pixel_size: f32) -> f32;

    fn has_kerning(&self) -> bool;

    fn ascender(&self, pixel_size: f32) -> f32;

    /// Typically negative
    fn descender(&self, pixel_size: f32) -> f32;

    /// Font file bytes and face index, when the face is backed by a file
    fn font_bytes(&self) -> Option<(&[u8], u32)>;

    fn rasterize(
        &self,
        rasterizer: &mut crate::rasterizer::GlyphRasterizer,
        glyph: u16,
        pixel_size: f32,
    ) -> crate::Result<crate::rasterizer::RasterizedGlyph>;
}

impl GlyphFace for FontFace {
    fn glyph_index(&self, c: char) -> Option<u16> {
        self.glyph_id(c)
    }

    fn advance(&self, glyph: u16, pixel_size: f32) -> f32 {
        self.glyph_advance(glyph).unwrap_or(0) as f32 * self.units_to_pixels(pixel_size)
    }

    fn kerning(&self, left: u16, right: u16, pixel_size: f32) -> f32 {
        FontFace::kerning(self, left, right) as f32 * self.units_to_pixels(pixel_size)
    }

    fn has_kerning(&self) -> bool {
        FontFace::has_kerning(self)
    }

    fn ascender(&self, pixel_size: f32) -> f32 {
        self.metrics().ascender_px(pixel_size)
    }

    fn descender(&self, pixel_size: f32) -> f32 {
        self.metrics().descender_px(pixel_size)
    }

    fn font_bytes(&self) -> Option<(&[u8], u32)> {
        Some((self.data(), self.face_index()))
    }

    fn rasterize(
        &self,
        rasterizer: &mut crate::rasterizer::GlyphRasterizer,
        glyph: u16,
        pixel_size: f32,
    ) -> crate::Result<crate::rasterizer::RasterizedGlyph> {
        rasterizer.rasterize(self, glyph, pixel_size)
    }
}

/// One font file entry with its loading configuration
#[derive(Clone)]
pub struct FontData {
    id: FontDataId,
    name: String,
    source: FontSource,
    face_index: u32,
    hinting: FontHinting,
    loading_policy: FontLoadingPolicy,
}

impl FontData {
    pub fn from_bulk(name: impl Into<String>, bulk: Arc<FontBulkData>) -> Self {
        Self::with_source(name, FontSource::Bulk(bulk))
    }

    pub fn from_face(name: impl Into<String>, face: Arc<dyn GlyphFace>) -> Self {
        let mut data = Self::with_source(name, FontSource::Loaded(face));
        data.loading_policy = FontLoadingPolicy::PreLoad;
        data
    }

    fn with_source(name: impl Into<String>, source: FontSource) -> Self {
        Self {
            id: FontDataId(NEXT_FONT_DATA_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            source,
            face_index: 0,
            hinting: FontHinting::Default,
            loading_policy: FontLoadingPolicy::LazyLoad,
        }
    }

    pub fn with_face_index(mut self, face_index: u32) -> Self {
        self.face_index = face_index;
        self
    }

    pub fn with_hinting(mut self, hinting: FontHinting) -> Self {
        self.hinting = hinting;
        self
    }

    pub fn with_loading_policy(mut self, policy: FontLoadingPolicy) -> Self {
        self.loading_policy = policy;
        self
    }

    pub fn id(&self) -> FontDataId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &FontSource {
        &self.source
    }

    pub fn face_index(&self) -> u32 {
        self.face_index
    }

    pub fn hinting(&self) -> FontHinting {
        self.hinting
    }

    pub fn loading_policy(&self) -> FontLoadingPolicy {
        self.loading_policy
    }
}

impl std::fmt::Debug for FontData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match &self.source {
            FontSource::Bulk(bulk) => format!("bulk({} bytes)", bulk.len()),
            FontSource::Loaded(_) => "loaded".to_string(),
        };
        f.debug_struct("FontData")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("source", &source)
            .field("hinting", &self.hinting)
            .field("loading_policy", &self.loading_policy)
            .finish()
    }
}

/// Named font entries making up one typeface ("Regular", "Bold", ...)
#[derive(Debug, Clone, Default)]
pub struct Typeface {
    fonts: Vec<FontData>,
}

impl Typeface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(font: FontData) -> Self {
        Self { fonts: vec![font] }
    }

    pub fn with_font(mut self, font: FontData) -> Self {
        self.fonts.push(font);
        self
    }

    pub fn fonts(&self) -> &[FontData] {
        &self.fonts
    }

    /// Entry named `name`, or the first entry
    pub fn font_named(&self, name: Option<&str>) -> Option<&FontData> {
        name.and_then(|name| self.fonts.iter().find(|f| f.name() == name))
            .or_else(|| self.fonts.first())
    }
}

/// Typeface override for a set of character ranges
#[derive(Debug, Clone)]
pub struct SubTypeface {
    pub typeface: Typeface,
    pub character_ranges: Vec<RangeInclusive<u32>>,
    /// Cultures this override applies to; empty means all cultures
    pub cultures: Vec<String>,
}

impl SubTypeface {
    pub fn new(typeface: Typeface, character_ranges: Vec<RangeInclusive<u32>>) -> Self {
        Self {
            typeface,
            character_ranges,
            cultures: Vec::new(),
        }
    }

    pub fn for_cultures(mut self, cultures: &[&str]) -> Self {
        self.cultures = cultures.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn covers(&self, c: char) -> bool {
        let cp = c as u32;
        self.character_ranges.iter().any(|r| r.contains(&cp))
    }

    fn matches_culture(&self, culture: &str) -> bool {
        self.cultures
            .iter()
            .any(|c| c == culture || culture.split('-').next() == Some(c.as_str()))
    }
}

/// Default typeface plus range overrides
pub struct CompositeFont {
    id: CompositeFontId,
    default_typeface: Typeface,
    sub_typefaces: Vec<SubTypeface>,
    history_revision: AtomicU32,
}

impl CompositeFont {
    pub fn new(default_typeface: Typeface) -> Self {
        Self {
            id: CompositeFontId(NEXT_COMPOSITE_ID.fetch_add(1, Ordering::Relaxed)),
            default_typeface,
            sub_typefaces: Vec::new(),
            history_revision: AtomicU32::new(0),
        }
    }

    pub fn with_sub_typeface(mut self, sub: SubTypeface) -> Self {
        self.sub_typefaces.push(sub);
        self
    }

    pub fn id(&self) -> CompositeFontId {
        self.id
    }

    pub fn default_typeface(&self) -> &Typeface {
        &self.default_typeface
    }

    pub fn sub_typefaces(&self) -> &[SubTypeface] {
        &self.sub_typefaces
    }

    pub fn history_revision(&self) -> u32 {
        self.history_revision.load(Ordering::Acquire)
    }

    /// Mark every cache entry derived from this font as stale
    pub fn bump_revision(&self) {
        let revision = self.history_revision.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(font = ?self.id, revision, "composite font revision changed");
    }

    /// Typeface responsible for `c` under `culture`.
    ///
    /// Culture-specific overrides beat culture-agnostic ones.
    pub fn typeface_for(&self, c: char, culture: &str) -> &Typeface {
        let covering = || self.sub_typefaces.iter().filter(|s| s.covers(c));
        covering()
            .find(|s| !s.cultures.is_empty() && s.matches_culture(culture))
            .or_else(|| covering().find(|s| s.cultures.is_empty()))
            .map(|s| &s.typeface)
            .unwrap_or(&self.default_typeface)
    }
}

impl std::fmt::Debug for CompositeFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeFont")
            .field("id", &self.id)
            .field("sub_typefaces", &self.sub_typefaces.len())
            .field("history_revision", &self.history_revision())
            .finish()
    }
}

/// A composite font at a point size, optionally picking a named entry
#[derive(Debug, Clone)]
pub struct FontInfo {
    pub composite: Arc<CompositeFont>,
    pub typeface_font_name: Option<String>,
    /// Size in points
    pub size: f32,
}

impl FontInfo {
    pub fn new(composite: Arc<CompositeFont>, size: f32) -> Self {
        Self {
            composite,
            typeface_font_name: None,
            size,
        }
    }

    pub fn with_typeface_font(mut self, name: impl Into<String>) -> Self {
        self.typeface_font_name = Some(name.into());
        self
    }

    /// Rendered pixel size at the given layout scale
    pub fn pixel_size(&self, scale: f32) -> f32 {
        self.size * scale * RENDER_DPI / 72.0
    }

    /// The entry used for `c`, honoring the sub-typeface overrides
    pub fn font_data_for(&self, c: char, culture: &str) -> Option<&FontData> {
        self.composite
            .typeface_for(c, culture)
            .font_named(self.typeface_font_name.as_deref())
    }

    /// The entry used for line metrics
    pub fn default_font_data(&self) -> Option<&FontData> {
        self.composite
            .default_typeface()
            .font_named(self.typeface_font_name.as_deref())
    }

    pub fn key(&self, scale: f32) -> FontKey {
        FontKey {
            composite: self.composite.id(),
            typeface_font_name: self.typeface_font_name.clone(),
            size_bits: self.size.to_bits(),
            scale_bits: scale.to_bits(),
        }
    }
}

/// Hashable identity of a (font, scale) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontKey {
    pub composite: CompositeFontId,
    pub typeface_font_name: Option<String>,
    size_bits: u32,
    scale_bits: u32,
}
