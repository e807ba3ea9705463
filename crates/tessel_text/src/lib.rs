//! Font services for Tessel
//!
//! This crate provides:
//! - Font loading and parsing (TTF/OTF via ttf-parser) from serializable bulk data
//! - Composite fonts with per-range sub-typefaces and history revisions
//! - Text shaping (HarfBuzz via rustybuzz, bidi runs via unicode-bidi)
//! - Per-font character lists with a two-tier kerning table
//! - Glyph rasterization and binary-split atlas pages
//! - [`FontServices`], the context object that owns all of the above

pub mod atlas;
pub mod character_list;
pub mod composite;
pub mod font;
pub mod font_cache;
pub mod rasterizer;
pub mod registry;
pub mod services;
pub mod shaper;

pub use atlas::{AtlasRegion, FontAtlas, TextureAtlas};
pub use character_list::{CharacterEntry, CharacterList, CharacterListMut, KerningTable};
pub use composite::{
    CompositeFont, CompositeFontId, FontData, FontDataId, FontInfo, FontKey, FontSource, GlyphFace,
    SubTypeface, Typeface,
};
pub use font::{FontBulkData, FontFace, FontHinting, FontLoadingPolicy, FontMetrics};
pub use font_cache::{
    AtlasDataSlots, FallbackFonts, FontCache, FontCacheConfig, FontCacheStats, FontCacheThread,
    FontFallback, GlyphAtlasData,
};
pub use rasterizer::{GlyphRasterizer, RasterizedGlyph};
pub use registry::FontRegistry;
pub use services::{FontFrameChanges, FontServices};
pub use shaper::{
    ShapedGlyphEntry, ShapedGlyphSequence, TextDirection, TextShaper, TextShapingMethod,
};

use thiserror::Error;

/// Font and text errors
#[derive(Error, Debug)]
pub enum TextError {
    #[error("Failed to load font: {0}")]
    FontLoadError(String),

    #[error("Failed to parse font: {0}")]
    FontParseError(String),

    #[error("Glyph not found for codepoint: {0}")]
    GlyphNotFound(char),

    #[error("Glyph of {width}x{height} does not fit in an empty {page_size}px atlas page")]
    GlyphTooLarge {
        width: u32,
        height: u32,
        page_size: u32,
    },

    #[error("Font atlas accessed from a thread other than its owner before a flush")]
    WrongThread,

    #[error("Invalid font data")]
    InvalidFontData,

    #[error("Font bulk data serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TextError>;

/// DPI at which font point sizes are converted to pixels
pub const RENDER_DPI: f32 = 96.0;
