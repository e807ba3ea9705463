//! Test fonts shared by the integration tests

use std::sync::Arc;
use tessel_text::{CompositeFont, FontData, FontInfo, GlyphFace, GlyphRasterizer, RasterizedGlyph, Typeface};

/// Every covered character is a 6x10 block advancing 8 pixels
pub struct BlockFace;

impl GlyphFace for BlockFace {
    fn glyph_index(&self, c: char) -> Option<u16> {
        c.is_ascii_alphabetic().then(|| c as u16)
    }

    fn advance(&self, _glyph: u16, _pixel_size: f32) -> f32 {
        8.0
    }

    fn kerning(&self, _left: u16, _right: u16, _pixel_size: f32) -> f32 {
        0.0
    }

    fn has_kerning(&self) -> bool {
        false
    }

    fn ascender(&self, _pixel_size: f32) -> f32 {
        10.0
    }

    fn descender(&self, _pixel_size: f32) -> f32 {
        -3.0
    }

    fn font_bytes(&self) -> Option<(&[u8], u32)> {
        None
    }

    fn rasterize(
        &self,
        _rasterizer: &mut GlyphRasterizer,
        _glyph: u16,
        _pixel_size: f32,
    ) -> tessel_text::Result<RasterizedGlyph> {
        Ok(RasterizedGlyph {
            bitmap: vec![255; 6 * 10],
            width: 6,
            height: 10,
            bearing_x: 1,
            bearing_y: 10,
            advance: 8.0,
        })
    }
}

pub fn block_font() -> FontInfo {
    let data = FontData::from_face("Blocks", Arc::new(BlockFace));
    FontInfo::new(Arc::new(CompositeFont::new(Typeface::single(data))), 9.0)
}
