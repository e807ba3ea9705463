//! Coverage bitmaps for atlas slots, rendered with swash

use crate::font::{FontFace, FontHinting};
use crate::{Result, TextError};
use swash::scale::{Render, ScaleContext, Source, StrikeWith};
use swash::zeno::Format;

/// One glyph's coverage plus the metrics needed to place it
#[derive(Debug, Clone, Default)]
pub struct RasterizedGlyph {
    /// Row-major 8-bit coverage, `width * height` bytes
    pub bitmap: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Pen origin to the bitmap's left edge
    pub bearing_x: i16,
    /// Baseline to the bitmap's top edge, positive up
    pub bearing_y: i16,
    /// Pen advance in pixels
    pub advance: f32,
}

impl RasterizedGlyph {
    /// Whitespace and other glyphs without coverage
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Reusable scaler state; one per font cache
pub struct GlyphRasterizer {
    scale_context: ScaleContext,
    rasterized: u64,
}

impl GlyphRasterizer {
    pub fn new() -> Self {
        Self {
            scale_context: ScaleContext::new(),
            rasterized: 0,
        }
    }

    /// Number of glyphs rasterized since creation
    pub fn rasterized_count(&self) -> u64 {
        self.rasterized
    }

    pub(crate) fn note_rasterized(&mut self) {
        self.rasterized += 1;
    }

    /// Rasterize a glyph at the given pixel size
    pub fn rasterize(
        &mut self,
        font: &FontFace,
        glyph_id: u16,
        pixel_size: f32,
    ) -> Result<RasterizedGlyph> {
        let swash_font = swash::FontRef::from_index(font.data(), font.face_index() as usize)
            .ok_or(TextError::InvalidFontData)?;

        let mut scaler = self
            .scale_context
            .builder(swash_font)
            .size(pixel_size)
            .hint(font.hinting() != FontHinting::None)
            .build();

        let metrics = swash_font.metrics(&[]);
        let glyph_metrics = swash_font.glyph_metrics(&[]);
        let scale = pixel_size / metrics.units_per_em as f32;
        let advance = glyph_metrics.advance_width(glyph_id) * scale;

        let mut render = Render::new(&[
            Source::ColorOutline(0),
            Source::ColorBitmap(StrikeWith::BestFit),
            Source::Outline,
        ]);
        render.format(Format::Alpha);

        let glyph = match render.render(&mut scaler, glyph_id) {
            Some(img) => RasterizedGlyph {
                width: img.placement.width,
                height: img.placement.height,
                bearing_x: img.placement.left as i16,
                bearing_y: img.placement.top as i16,
                bitmap: img.data,
                advance,
            },
            // Whitespace: advance only
            None => RasterizedGlyph {
                advance,
                ..RasterizedGlyph::default()
            },
        };
        self.rasterized += 1;
        Ok(glyph)
    }
}

impl Default for GlyphRasterizer {
    fn default() -> Self {
        Self::new()
    }
}
