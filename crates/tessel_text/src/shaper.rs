//! Text shaping
//!
//! Text is first split into runs of characters resolved to the same font
//! (own font, localized fallback or last resort). Each run is then shaped
//! either with full HarfBuzz shaping via rustybuzz, or with the cheaper
//! kerning-only path that maps characters through the cmap and applies pair
//! kerning. Bidirectional text is split into directional runs with
//! unicode-bidi and emitted in visual order.

use crate::composite::{FontDataId, FontInfo, GlyphFace};
use crate::font_cache::{FontFallback, GlyphCacher};
use rustc_hash::FxHashMap;
use rustybuzz::{Direction, UnicodeBuffer};
use std::ops::Range;
use std::sync::Arc;
use unicode_bidi::{BidiInfo, Level};

/// Reading direction of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextDirection {
    #[default]
    LeftToRight,
    RightToLeft,
}

/// How glyphs are produced from characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextShapingMethod {
    /// Full shaping when the font provides the tables for it
    #[default]
    Auto,
    /// One glyph per character plus pair kerning
    KerningOnly,
    /// HarfBuzz shaping (ligatures, marks, contextual forms)
    FullShaping,
}

/// One positioned glyph
#[derive(Clone)]
pub struct ShapedGlyphEntry {
    pub glyph_index: u16,
    pub face: Arc<dyn GlyphFace>,
    pub font_data: FontDataId,
    /// Pixels, kerning included
    pub x_advance: f32,
    pub y_advance: f32,
    pub x_offset: f32,
    pub y_offset: f32,
    /// Kerning already folded into `x_advance`
    pub kerning: f32,
    /// Byte offset of the first source character of this glyph
    pub cluster: usize,
    /// Whitespace and control glyphs are not drawn
    pub is_visible: bool,
    pub fallback_level: FontFallback,
    pub direction: TextDirection,
}

impl std::fmt::Debug for ShapedGlyphEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapedGlyphEntry")
            .field("glyph_index", &self.glyph_index)
            .field("font_data", &self.font_data)
            .field("x_advance", &self.x_advance)
            .field("cluster", &self.cluster)
            .field("is_visible", &self.is_visible)
            .field("fallback_level", &self.fallback_level)
            .finish()
    }
}

/// Immutable result of shaping a run of text
#[derive(Debug, Clone)]
pub struct ShapedGlyphSequence {
    glyphs: Vec<ShapedGlyphEntry>,
    base_direction: TextDirection,
    font: FontInfo,
    scale: f32,
    source_len: usize,
    measured_width: f32,
    max_text_height: i16,
    text_baseline: i16,
    /// Cluster byte offset to the first glyph carrying it
    cluster_index: FxHashMap<usize, usize>,
}

impl ShapedGlyphSequence {
    fn new(
        glyphs: Vec<ShapedGlyphEntry>,
        base_direction: TextDirection,
        font: &FontInfo,
        scale: f32,
        source_len: usize,
        line_metrics: (i16, i16),
    ) -> Self {
        let measured_width = glyphs.iter().map(|g| g.x_advance).sum();
        let mut cluster_index = FxHashMap::default();
        for (i, glyph) in glyphs.iter().enumerate() {
            cluster_index.entry(glyph.cluster).or_insert(i);
        }
        Self {
            glyphs,
            base_direction,
            font: font.clone(),
            scale,
            source_len,
            measured_width,
            max_text_height: line_metrics.0,
            text_baseline: line_metrics.1,
            cluster_index,
        }
    }

    pub fn glyphs(&self) -> &[ShapedGlyphEntry] {
        &self.glyphs
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn base_direction(&self) -> TextDirection {
        self.base_direction
    }

    pub fn font(&self) -> &FontInfo {
        &self.font
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn pixel_size(&self) -> f32 {
        self.font.pixel_size(self.scale)
    }

    /// Length in bytes of the shaped source text
    pub fn source_len(&self) -> usize {
        self.source_len
    }

    pub fn measured_width(&self) -> f32 {
        self.measured_width
    }

    /// Line extent (ascender - descender) in pixels
    pub fn max_text_height(&self) -> i16 {
        self.max_text_height
    }

    /// Descender in pixels (negative)
    pub fn text_baseline(&self) -> i16 {
        self.text_baseline
    }

    /// Width of the glyph range `[start, end)`
    pub fn measure(&self, glyphs: Range<usize>) -> f32 {
        let end = glyphs.end.min(self.glyphs.len());
        let start = glyphs.start.min(end);
        self.glyphs[start..end].iter().map(|g| g.x_advance).sum()
    }

    /// First glyph produced from the character at byte offset `cluster`
    pub fn glyph_for_cluster(&self, cluster: usize) -> Option<&ShapedGlyphEntry> {
        self.cluster_index.get(&cluster).map(|i| &self.glyphs[*i])
    }

    /// Every glyph came from a font no further down the chain than `max`
    pub fn fallback_level_at_most(&self, max: FontFallback) -> bool {
        self.glyphs.iter().all(|g| g.fallback_level <= max)
    }
}

/// Run shaper
#[derive(Debug, Default)]
pub struct TextShaper {}

/// Characters resolved to the same font
struct FontRun {
    range: Range<usize>,
    face: Option<Arc<dyn GlyphFace>>,
    font_data: FontDataId,
    fallback: FontFallback,
}

impl TextShaper {
    pub fn new() -> Self {
        Self {}
    }

    pub(crate) fn shape_unidirectional(
        &self,
        cacher: &mut GlyphCacher,
        text: &str,
        font: &FontInfo,
        scale: f32,
        direction: TextDirection,
        method: TextShapingMethod,
    ) -> ShapedGlyphSequence {
        let mut glyphs = Vec::with_capacity(text.len());
        self.shape_directional_run(cacher, text, 0..text.len(), font, scale, direction, method, &mut glyphs);
        let metrics = Self::line_metrics(cacher, font, scale);
        ShapedGlyphSequence::new(glyphs, direction, font, scale, text.len(), metrics)
    }

    pub(crate) fn shape_bidirectional(
        &self,
        cacher: &mut GlyphCacher,
        text: &str,
        font: &FontInfo,
        scale: f32,
        base_direction: TextDirection,
        method: TextShapingMethod,
    ) -> ShapedGlyphSequence {
        let base_level = match base_direction {
            TextDirection::LeftToRight => Level::ltr(),
            TextDirection::RightToLeft => Level::rtl(),
        };
        let bidi = BidiInfo::new(text, Some(base_level));

        let mut glyphs = Vec::with_capacity(text.len());
        for paragraph in &bidi.paragraphs {
            let (levels, runs) = bidi.visual_runs(paragraph, paragraph.range.clone());
            for run in runs {
                let direction = if levels[run.start].is_rtl() {
                    TextDirection::RightToLeft
                } else {
                    TextDirection::LeftToRight
                };
                self.shape_directional_run(cacher, text, run, font, scale, direction, method, &mut glyphs);
            }
        }

        let metrics = Self::line_metrics(cacher, font, scale);
        ShapedGlyphSequence::new(glyphs, base_direction, font, scale, text.len(), metrics)
    }

    fn line_metrics(cacher: &mut GlyphCacher, font: &FontInfo, scale: f32) -> (i16, i16) {
        let pixel_size = font.pixel_size(scale);
        cacher
            .default_face(font)
            .map(|face| {
                let ascender = face.ascender(pixel_size);
                let descender = face.descender(pixel_size);
                ((ascender - descender).round() as i16, descender.round() as i16)
            })
            .unwrap_or((0, 0))
    }

    /// Split a single-direction range into font runs and shape each
    #[allow(clippy::too_many_arguments)]
    fn shape_directional_run(
        &self,
        cacher: &mut GlyphCacher,
        text: &str,
        range: Range<usize>,
        font: &FontInfo,
        scale: f32,
        direction: TextDirection,
        method: TextShapingMethod,
        out: &mut Vec<ShapedGlyphEntry>,
    ) {
        let pixel_size = font.pixel_size(scale);
        let mut runs: Vec<FontRun> = Vec::new();
        for (offset, c) in text[range.clone()].char_indices() {
            let start = range.start + offset;
            let end = start + c.len_utf8();
            let resolved = cacher.resolve(font, c);
            match runs.last_mut() {
                Some(run) if run.font_data == resolved.font_data => run.range.end = end,
                _ => runs.push(FontRun {
                    range: start..end,
                    face: resolved.face,
                    font_data: resolved.font_data,
                    fallback: resolved.fallback,
                }),
            }
        }

        // Font runs inside a right-to-left range are laid out right to left
        if direction == TextDirection::RightToLeft {
            runs.reverse();
        }

        for run in runs {
            let Some(face) = run.face.clone() else {
                tracing::debug!(range = ?run.range, "no font could be loaded for text run; skipping");
                continue;
            };
            let full = match method {
                TextShapingMethod::KerningOnly => false,
                TextShapingMethod::Auto | TextShapingMethod::FullShaping => face.font_bytes().is_some(),
            };
            let shaped = if full {
                self.shape_full(text, &run, &face, pixel_size, direction, out)
            } else {
                false
            };
            if !shaped {
                self.shape_kerning_only(text, &run, &face, pixel_size, direction, out);
            }
        }
    }

    /// HarfBuzz shaping; false when the face cannot be opened by rustybuzz
    fn shape_full(
        &self,
        text: &str,
        run: &FontRun,
        face: &Arc<dyn GlyphFace>,
        pixel_size: f32,
        direction: TextDirection,
        out: &mut Vec<ShapedGlyphEntry>,
    ) -> bool {
        let Some((bytes, index)) = face.font_bytes() else {
            return false;
        };
        let Some(hb_face) = rustybuzz::Face::from_slice(bytes, index) else {
            return false;
        };
        let units_to_px = pixel_size / hb_face.units_per_em() as f32;

        let slice = &text[run.range.clone()];
        let mut buffer = UnicodeBuffer::new();
        buffer.push_str(slice);
        buffer.set_direction(match direction {
            TextDirection::LeftToRight => Direction::LeftToRight,
            TextDirection::RightToLeft => Direction::RightToLeft,
        });
        buffer.guess_segment_properties();

        let output = rustybuzz::shape(&hb_face, &[], buffer);
        for (info, pos) in output.glyph_infos().iter().zip(output.glyph_positions()) {
            let cluster = run.range.start + info.cluster as usize;
            let visible = text[cluster..]
                .chars()
                .next()
                .map(|c| !c.is_whitespace() && !c.is_control())
                .unwrap_or(false);
            out.push(ShapedGlyphEntry {
                glyph_index: info.glyph_id as u16,
                face: face.clone(),
                font_data: run.font_data,
                x_advance: pos.x_advance as f32 * units_to_px,
                y_advance: pos.y_advance as f32 * units_to_px,
                x_offset: pos.x_offset as f32 * units_to_px,
                y_offset: pos.y_offset as f32 * units_to_px,
                kerning: 0.0,
                cluster,
                is_visible: visible,
                fallback_level: run.fallback,
                direction,
            });
        }
        true
    }

    /// One glyph per character with pair kerning folded into the advance
    fn shape_kerning_only(
        &self,
        text: &str,
        run: &FontRun,
        face: &Arc<dyn GlyphFace>,
        pixel_size: f32,
        direction: TextDirection,
        out: &mut Vec<ShapedGlyphEntry>,
    ) {
        let first = out.len();
        let mut previous: Option<u16> = None;
        for (offset, c) in text[run.range.clone()].char_indices() {
            let glyph_index = face.glyph_index(c).unwrap_or(0);
            let visible = !c.is_whitespace() && !c.is_control();

            if let (Some(prev), true) = (previous, face.has_kerning()) {
                let kerning = face.kerning(prev, glyph_index, pixel_size);
                if let Some(last) = out.last_mut() {
                    last.kerning = kerning;
                    last.x_advance += kerning;
                }
            }

            out.push(ShapedGlyphEntry {
                glyph_index,
                face: face.clone(),
                font_data: run.font_data,
                x_advance: face.advance(glyph_index, pixel_size),
                y_advance: 0.0,
                x_offset: 0.0,
                y_offset: 0.0,
                kerning: 0.0,
                cluster: run.range.start + offset,
                is_visible: visible,
                fallback_level: run.fallback,
                direction,
            });
            previous = Some(glyph_index);
        }

        if direction == TextDirection::RightToLeft {
            out[first..].reverse();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::font_cache::test_faces::*;
    use crate::font_cache::{FallbackFonts, FontCache, FontCacheConfig, FontFallback};
    use crate::shaper::{TextDirection, TextShapingMethod};
    use crate::composite::FontData;
    use std::sync::Arc;

    fn cache() -> FontCache {
        FontCache::new(
            FontCacheConfig::default(),
            FallbackFonts::default().with_last_resort(box_font("\u{05D0}\u{05D1}")),
        )
    }

    #[test]
    fn test_kerning_only_advances() {
        let face = BoxFace::new("AV ").with_kerning('A', 'V', -2.0);
        let font = font_info(FontData::from_face("Kern", Arc::new(face)));
        let mut cache = cache();

        let sequence = cache.shape_unidirectional(
            "AV A",
            &font,
            1.0,
            TextDirection::LeftToRight,
            TextShapingMethod::KerningOnly,
        );

        assert_eq!(sequence.len(), 4);
        assert_eq!(sequence.glyphs()[0].x_advance, 6.0);
        assert_eq!(sequence.glyphs()[0].kerning, -2.0);
        assert!(!sequence.glyphs()[2].is_visible);
        assert_eq!(sequence.measured_width(), 30.0);
        assert_eq!(sequence.measure(1..3), 16.0);
        assert_eq!(sequence.glyph_for_cluster(3).map(|g| g.glyph_index), Some(1));
    }

    #[test]
    fn test_shaped_sequences_are_memoised() {
        let font = font_info(box_font("abc"));
        let mut cache = cache();

        let a = cache.shape_unidirectional("abc", &font, 1.0, TextDirection::LeftToRight, TextShapingMethod::Auto);
        let b = cache.shape_unidirectional("abc", &font, 1.0, TextDirection::LeftToRight, TextShapingMethod::Auto);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.stats().shaped_hits, 1);

        font.composite.bump_revision();
        let c = cache.shape_unidirectional("abc", &font, 1.0, TextDirection::LeftToRight, TextShapingMethod::Auto);
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_bidirectional_visual_order() {
        let font = font_info(box_font("ab "));
        let mut cache = cache();

        // "ab " followed by two Hebrew letters
        let text = "ab \u{05D0}\u{05D1}";
        let sequence = cache.shape_bidirectional(
            text,
            &font,
            1.0,
            TextDirection::LeftToRight,
            TextShapingMethod::KerningOnly,
        );

        let clusters: Vec<usize> = sequence.glyphs().iter().map(|g| g.cluster).collect();
        assert_eq!(clusters, vec![0, 1, 2, 5, 3]);

        let rtl = &sequence.glyphs()[3];
        assert_eq!(rtl.direction, TextDirection::RightToLeft);
        assert_eq!(rtl.fallback_level, FontFallback::LastResort);
        assert!(!sequence.fallback_level_at_most(FontFallback::NoFallback));
        assert!(sequence.fallback_level_at_most(FontFallback::LastResort));
    }

    #[test]
    fn test_empty_text() {
        let font = font_info(box_font("a"));
        let mut cache = cache();
        let sequence = cache.shape_bidirectional("", &font, 1.0, TextDirection::LeftToRight, TextShapingMethod::Auto);
        assert!(sequence.is_empty());
        assert_eq!(sequence.measured_width(), 0.0);
    }
}
