//! Font loading and bulk data
//!
//! Provides font parsing via ttf-parser, font metric extraction and the
//! serializable byte blob fonts are persisted as.

use crate::{Result, TextError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Hinting applied when rasterizing a font
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FontHinting {
    /// Use the font's own hinting program
    #[default]
    Default,
    /// Force automatic hinting
    Auto,
    /// Light automatic hinting
    AutoLight,
    /// Render to a monochrome mask
    Monochrome,
    None,
}

/// How font bytes become available to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FontLoadingPolicy {
    /// Load the bytes the first time the font is used
    #[default]
    LazyLoad,
    /// Keep the bytes resident from startup
    PreLoad,
}

/// Raw font file bytes as stored on disk or in a package.
///
/// Cooked data has been through the packaging step and is loaded verbatim;
/// uncooked data still carries its source path for hot reload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontBulkData {
    bytes: Vec<u8>,
    cooked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_path: Option<String>,
}

impl FontBulkData {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            cooked: false,
            source_path: None,
        }
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| TextError::FontLoadError(format!("Failed to read {}: {}", path.display(), e)))?;
        Ok(Self {
            bytes,
            cooked: false,
            source_path: Some(path.display().to_string()),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_cooked(&self) -> bool {
        self.cooked
    }

    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    /// Mark as packaged: the source path is dropped
    pub fn cook(&mut self) {
        self.cooked = true;
        self.source_path = None;
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Font metrics in font units (typically 1000 or 2048 units per em)
#[derive(Debug, Clone, Copy)]
pub struct FontMetrics {
    /// Units per em (typically 1000 or 2048)
    pub units_per_em: u16,
    /// Ascender (distance from baseline to top of tallest glyph)
    pub ascender: i16,
    /// Descender (distance from baseline to bottom, typically negative)
    pub descender: i16,
    /// Line gap (additional spacing between lines)
    pub line_gap: i16,
}

impl FontMetrics {
    /// Calculate line height in font units
    pub fn line_height(&self) -> i16 {
        self.ascender - self.descender + self.line_gap
    }

    /// Scale a value from font units to pixels
    pub fn scale(&self, value: i16, pixel_size: f32) -> f32 {
        value as f32 * pixel_size / self.units_per_em as f32
    }

    pub fn ascender_px(&self, pixel_size: f32) -> f32 {
        self.scale(self.ascender, pixel_size)
    }

    /// Typically negative
    pub fn descender_px(&self, pixel_size: f32) -> f32 {
        self.scale(self.descender, pixel_size)
    }

    pub fn line_height_px(&self, pixel_size: f32) -> f32 {
        self.scale(self.line_height(), pixel_size)
    }
}

/// A parsed font face
pub struct FontFace {
    /// Raw font data (kept alive for ttf-parser)
    data: Arc<FontBulkData>,
    /// Face index within the font file (for TTC files)
    face_index: u32,
    metrics: FontMetrics,
    glyph_count: u16,
    family_name: String,
    has_kerning: bool,
    hinting: FontHinting,
}

impl FontFace {
    /// Parse a face from shared bulk data
    pub fn from_bulk_data(data: Arc<FontBulkData>, face_index: u32, hinting: FontHinting) -> Result<Self> {
        let face = ttf_parser::Face::parse(data.bytes(), face_index)
            .map_err(|e| TextError::FontParseError(format!("{:?}", e)))?;

        let metrics = FontMetrics {
            units_per_em: face.units_per_em(),
            ascender: face.ascender(),
            descender: face.descender(),
            line_gap: face.line_gap(),
        };

        let family_name = face
            .names()
            .into_iter()
            .find(|n| n.name_id == ttf_parser::name_id::FAMILY)
            .and_then(|n| n.to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        let has_kerning = face.tables().kern.is_some();
        let glyph_count = face.number_of_glyphs();

        Ok(Self {
            data,
            face_index,
            metrics,
            glyph_count,
            family_name,
            has_kerning,
            hinting,
        })
    }

    /// Load a font from raw TTF/OTF data (uses face index 0)
    pub fn from_data(bytes: Vec<u8>) -> Result<Self> {
        Self::from_bulk_data(Arc::new(FontBulkData::new(bytes)), 0, FontHinting::Default)
    }

    pub fn metrics(&self) -> &FontMetrics {
        &self.metrics
    }

    pub fn glyph_count(&self) -> u16 {
        self.glyph_count
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    /// Whether the face carries a legacy `kern` table
    pub fn has_kerning(&self) -> bool {
        self.has_kerning
    }

    pub fn hinting(&self) -> FontHinting {
        self.hinting
    }

    /// Raw font bytes for shaping and rasterization
    pub fn data(&self) -> &[u8] {
        self.data.bytes()
    }

    pub fn bulk_data(&self) -> &Arc<FontBulkData> {
        &self.data
    }

    pub fn face_index(&self) -> u32 {
        self.face_index
    }

    /// Create a ttf-parser Face for glyph operations
    pub(crate) fn as_ttf_face(&self) -> Option<ttf_parser::Face<'_>> {
        ttf_parser::Face::parse(self.data.bytes(), self.face_index).ok()
    }

    /// Glyph ID for a character; `None` when the face has no glyph for it
    pub fn glyph_id(&self, c: char) -> Option<u16> {
        self.as_ttf_face()
            .and_then(|face| face.glyph_index(c))
            .map(|id| id.0)
            .filter(|id| *id != 0)
    }

    pub fn has_glyph(&self, c: char) -> bool {
        self.glyph_id(c).is_some()
    }

    /// Horizontal advance width for a glyph in font units
    pub fn glyph_advance(&self, glyph_id: u16) -> Option<u16> {
        self.as_ttf_face()
            .and_then(|face| face.glyph_hor_advance(ttf_parser::GlyphId(glyph_id)))
    }

    /// Pair kerning between two glyphs in font units
    pub fn kerning(&self, left: u16, right: u16) -> i16 {
        if !self.has_kerning {
            return 0;
        }
        let Some(face) = self.as_ttf_face() else {
            return 0;
        };
        let Some(kern) = face.tables().kern else {
            return 0;
        };

        kern.subtables
            .into_iter()
            .filter(|s| s.horizontal && !s.variable)
            .find_map(|s| s.glyphs_kerning(ttf_parser::GlyphId(left), ttf_parser::GlyphId(right)))
            .unwrap_or(0)
    }

    /// Scale factor from font units to pixels
    pub fn units_to_pixels(&self, pixel_size: f32) -> f32 {
        pixel_size / self.metrics.units_per_em as f32
    }
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFace")
            .field("family_name", &self.family_name)
            .field("face_index", &self.face_index)
            .field("glyph_count", &self.glyph_count)
            .field("has_kerning", &self.has_kerning)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_data_serialization() {
        let mut data = FontBulkData::new(vec![0, 1, 0, 0, 42]);
        assert!(!data.is_cooked());

        data.cook();
        let json = data.to_json().unwrap();
        let restored = FontBulkData::from_json(&json).unwrap();

        assert!(restored.is_cooked());
        assert_eq!(restored.bytes(), &[0, 1, 0, 0, 42]);
        assert_eq!(restored.source_path(), None);
    }

    #[test]
    fn test_garbage_data_fails_to_parse() {
        let result = FontFace::from_data(vec![1, 2, 3, 4]);
        assert!(matches!(result, Err(TextError::FontParseError(_))));
    }

    #[test]
    fn test_metrics_scaling() {
        let metrics = FontMetrics {
            units_per_em: 1000,
            ascender: 800,
            descender: -200,
            line_gap: 0,
        };
        assert_eq!(metrics.line_height(), 1000);
        assert_eq!(metrics.ascender_px(20.0), 16.0);
        assert_eq!(metrics.descender_px(20.0), -4.0);
    }
}
