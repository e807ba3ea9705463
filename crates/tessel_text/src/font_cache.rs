//! Font cache
//!
//! Owns loaded faces, the glyph atlas, per-(font, scale) character lists and a
//! memo of shaped sequences. Glyph lookups walk the fallback chain:
//!
//! 1. the requested font's typeface for the character
//! 2. the localized fallback font for the active culture
//! 3. the last-resort font
//!
//! The level that produced each glyph is recorded so callers can reject
//! glyphs that fell back further than they allow.

use crate::atlas::FontAtlas;
use crate::character_list::{CharacterList, CharacterListMut};
use crate::composite::{CompositeFont, CompositeFontId, FontData, FontDataId, FontInfo, FontKey, FontSource, GlyphFace};
use crate::font::FontFace;
use crate::rasterizer::GlyphRasterizer;
use crate::shaper::{ShapedGlyphSequence, TextDirection, TextShaper, TextShapingMethod};
use lru::LruCache;
use rustc_hash::FxHashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread::ThreadId;

/// How far down the fallback chain a glyph came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum FontFallback {
    /// The requested font had the glyph
    #[default]
    NoFallback,
    /// Localized fallback font for the active culture
    LocalizedFallback,
    /// Last-resort font
    LastResort,
}

/// Fonts consulted when a composite font lacks a glyph
#[derive(Debug, Clone, Default)]
pub struct FallbackFonts {
    /// Keyed by culture name ("ja", "zh-Hans", ...); "" is the default
    pub localized: FxHashMap<String, FontData>,
    pub last_resort: Option<FontData>,
}

impl FallbackFonts {
    pub fn with_localized(mut self, culture: impl Into<String>, font: FontData) -> Self {
        self.localized.insert(culture.into(), font);
        self
    }

    pub fn with_last_resort(mut self, font: FontData) -> Self {
        self.last_resort = Some(font);
        self
    }

    /// Exact culture, then its language, then the default entry
    pub fn localized_for(&self, culture: &str) -> Option<&FontData> {
        self.localized
            .get(culture)
            .or_else(|| culture.split('-').next().and_then(|lang| self.localized.get(lang)))
            .or_else(|| self.localized.get(""))
    }
}

/// Font cache tuning
#[derive(Debug, Clone)]
pub struct FontCacheConfig {
    pub atlas_page_size: u32,
    pub max_atlas_pages_before_flush: usize,
    pub shaped_cache_capacity: usize,
    pub default_culture: String,
}

impl Default for FontCacheConfig {
    fn default() -> Self {
        Self {
            atlas_page_size: 1024,
            max_atlas_pages_before_flush: 4,
            shaped_cache_capacity: 256,
            default_culture: "en".to_string(),
        }
    }
}

/// Counters exposed for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FontCacheStats {
    pub glyphs_cached: u64,
    pub fallback_glyphs: u64,
    pub shaped_hits: u64,
    pub shaped_misses: u64,
    pub flushes: u64,
    pub atlas_pages: usize,
}

/// Result of walking the fallback chain for one character
#[derive(Clone)]
pub(crate) struct ResolvedGlyph {
    pub face: Option<Arc<dyn GlyphFace>>,
    pub font_data: FontDataId,
    pub glyph_index: u16,
    pub fallback: FontFallback,
}

/// Atlas placement of one rasterized glyph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphAtlasData {
    pub start_u: u16,
    pub start_v: u16,
    pub u_size: u16,
    pub v_size: u16,
    pub vertical_offset: i16,
    pub horizontal_offset: i16,
    pub x_advance: i16,
    pub texture_index: u32,
}

/// Thread context reading glyph atlas data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontCacheThread {
    /// The thread that paints widgets, and any thread when no render thread
    /// is bound
    Game,
    /// The thread bound with [`FontCache::bind_render_thread`]
    Render,
}

/// Atlas data cached on a character entry, one slot per thread context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AtlasDataSlots([Option<GlyphAtlasData>; 2]);

impl AtlasDataSlots {
    fn index(thread: FontCacheThread) -> usize {
        match thread {
            FontCacheThread::Game => 0,
            FontCacheThread::Render => 1,
        }
    }

    pub fn get(&self, thread: FontCacheThread) -> Option<GlyphAtlasData> {
        self.0[Self::index(thread)]
    }

    pub fn set(&mut self, thread: FontCacheThread, data: GlyphAtlasData) {
        self.0[Self::index(thread)] = Some(data);
    }

    pub fn clear(&mut self) {
        self.0 = [None; 2];
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct GlyphKey {
    font_data: FontDataId,
    glyph_index: u16,
    size_bits: u32,
}

/// Faces, atlas and rasterizer: everything a character list fills itself from
pub struct GlyphCacher {
    faces: FxHashMap<FontDataId, Option<Arc<dyn GlyphFace>>>,
    glyphs: FxHashMap<GlyphKey, GlyphAtlasData>,
    atlas: FontAtlas,
    rasterizer: GlyphRasterizer,
    fallback: FallbackFonts,
    culture: String,
    render_thread: Option<ThreadId>,
    stats: FontCacheStats,
}

impl GlyphCacher {
    /// Context of the calling thread
    pub(crate) fn current_thread(&self) -> FontCacheThread {
        match self.render_thread {
            Some(id) if id == std::thread::current().id() => FontCacheThread::Render,
            _ => FontCacheThread::Game,
        }
    }

    /// Face for `data`, parsing bulk data on first use
    ///
    /// A face that fails to load is remembered as missing so the failure is
    /// only logged once.
    pub(crate) fn load_face(&mut self, data: &FontData) -> Option<Arc<dyn GlyphFace>> {
        self.faces
            .entry(data.id())
            .or_insert_with(|| match data.source() {
                FontSource::Loaded(face) => Some(face.clone()),
                FontSource::Bulk(bulk) => {
                    match FontFace::from_bulk_data(bulk.clone(), data.face_index(), data.hinting()) {
                        Ok(face) => {
                            tracing::debug!(font = data.name(), family = face.family_name(), "loaded font face");
                            Some(Arc::new(face) as Arc<dyn GlyphFace>)
                        }
                        Err(e) => {
                            tracing::warn!(font = data.name(), error = %e, "failed to load font face");
                            None
                        }
                    }
                }
            })
            .clone()
    }

    pub(crate) fn face_for(&self, id: FontDataId) -> Option<Arc<dyn GlyphFace>> {
        self.faces.get(&id).cloned().flatten()
    }

    pub(crate) fn default_face(&mut self, font: &FontInfo) -> Option<Arc<dyn GlyphFace>> {
        let data = font.default_font_data()?.clone();
        self.load_face(&data)
    }

    pub(crate) fn resolve(&mut self, font: &FontInfo, c: char) -> ResolvedGlyph {
        let mut candidates: Vec<(FontData, FontFallback)> = Vec::with_capacity(3);
        if let Some(own) = font.font_data_for(c, &self.culture) {
            candidates.push((own.clone(), FontFallback::NoFallback));
        }
        if let Some(localized) = self.fallback.localized_for(&self.culture) {
            candidates.push((localized.clone(), FontFallback::LocalizedFallback));
        }
        if let Some(last_resort) = &self.fallback.last_resort {
            candidates.push((last_resort.clone(), FontFallback::LastResort));
        }

        let mut notdef: Option<ResolvedGlyph> = None;
        for (data, level) in candidates {
            let Some(face) = self.load_face(&data) else {
                continue;
            };
            if let Some(glyph_index) = face.glyph_index(c) {
                if level != FontFallback::NoFallback {
                    self.stats.fallback_glyphs += 1;
                    tracing::debug!(?c, ?level, font = data.name(), "glyph resolved through fallback");
                }
                return ResolvedGlyph {
                    face: Some(face),
                    font_data: data.id(),
                    glyph_index,
                    fallback: level,
                };
            }
            notdef.get_or_insert(ResolvedGlyph {
                face: Some(face),
                font_data: data.id(),
                glyph_index: 0,
                fallback: level,
            });
        }

        // Nothing covers the character: draw the first loadable font's notdef
        notdef.unwrap_or(ResolvedGlyph {
            face: None,
            font_data: FontDataId::INVALID,
            glyph_index: 0,
            fallback: FontFallback::NoFallback,
        })
    }

    /// Rasterize and atlas a glyph once per (font, glyph, size)
    pub(crate) fn cache_glyph(
        &mut self,
        face: &Arc<dyn GlyphFace>,
        font_data: FontDataId,
        glyph_index: u16,
        pixel_size: f32,
    ) -> Option<GlyphAtlasData> {
        let key = GlyphKey {
            font_data,
            glyph_index,
            size_bits: pixel_size.to_bits(),
        };
        if let Some(data) = self.glyphs.get(&key) {
            return Some(*data);
        }

        let glyph = match face.rasterize(&mut self.rasterizer, glyph_index, pixel_size) {
            Ok(glyph) => glyph,
            Err(e) => {
                tracing::warn!(glyph_index, error = %e, "glyph rasterization failed");
                return None;
            }
        };

        let (texture_index, start_u, start_v) = if glyph.is_empty() {
            // Whitespace still has an advance but no atlas space
            if let Err(e) = self.atlas.check_owner_thread() {
                tracing::error!(error = %e, "font atlas owner check failed");
                debug_assert!(false, "font atlas touched from a non-owner thread");
                return None;
            }
            (0, 0, 0)
        } else {
            match self.atlas.insert(glyph.width, glyph.height, &glyph.bitmap) {
                Ok((page, region)) => (page as u32, region.x as u16, region.y as u16),
                Err(e) => {
                    tracing::error!(glyph_index, error = %e, "failed to add glyph to font atlas");
                    debug_assert!(!matches!(e, crate::TextError::WrongThread), "font atlas touched from a non-owner thread");
                    return None;
                }
            }
        };

        let data = GlyphAtlasData {
            start_u,
            start_v,
            u_size: glyph.width as u16,
            v_size: glyph.height as u16,
            vertical_offset: glyph.bearing_y,
            horizontal_offset: glyph.bearing_x,
            x_advance: glyph.advance.round() as i16,
            texture_index,
        };
        self.glyphs.insert(key, data);
        self.stats.glyphs_cached += 1;
        Some(data)
    }

    fn flush(&mut self) {
        self.glyphs.clear();
        self.atlas.flush();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ShapedKey {
    text: String,
    font: FontKey,
    revision: u32,
    direction: TextDirection,
    method: TextShapingMethod,
    bidirectional: bool,
}

/// Glyph, character list and shaping caches for every font in use
pub struct FontCache {
    config: FontCacheConfig,
    glyphs: GlyphCacher,
    character_lists: FxHashMap<FontKey, CharacterList>,
    shaped: LruCache<ShapedKey, Arc<ShapedGlyphSequence>>,
    shaper: TextShaper,
    /// Composite fonts used so far, with the revision last reported
    revisions: FxHashMap<CompositeFontId, (Arc<CompositeFont>, u32)>,
}

impl FontCache {
    pub fn new(config: FontCacheConfig, fallback: FallbackFonts) -> Self {
        let capacity = NonZeroUsize::new(config.shaped_cache_capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            glyphs: GlyphCacher {
                faces: FxHashMap::default(),
                glyphs: FxHashMap::default(),
                atlas: FontAtlas::new(config.atlas_page_size, config.max_atlas_pages_before_flush),
                rasterizer: GlyphRasterizer::new(),
                fallback,
                culture: config.default_culture.clone(),
                render_thread: None,
                stats: FontCacheStats::default(),
            },
            character_lists: FxHashMap::default(),
            shaped: LruCache::new(capacity),
            shaper: TextShaper::new(),
            revisions: FxHashMap::default(),
            config,
        }
    }

    pub fn config(&self) -> &FontCacheConfig {
        &self.config
    }

    pub fn culture(&self) -> &str {
        &self.glyphs.culture
    }

    pub fn atlas(&self) -> &FontAtlas {
        &self.glyphs.atlas
    }

    /// Atlas page size in pixels, for converting entry positions to UVs
    pub fn atlas_page_size(&self) -> u32 {
        self.glyphs.atlas.page_size()
    }

    pub fn stats(&self) -> FontCacheStats {
        FontCacheStats {
            atlas_pages: self.glyphs.atlas.page_count(),
            ..self.glyphs.stats
        }
    }

    pub fn check_owner_thread(&mut self) -> crate::Result<()> {
        self.glyphs.atlas.check_owner_thread()
    }

    /// Atlas data looked up from `thread` goes to the render slot of
    /// character entries
    pub fn bind_render_thread(&mut self, thread: ThreadId) {
        tracing::debug!(?thread, "font cache render thread bound");
        self.glyphs.render_thread = Some(thread);
    }

    /// Context of the calling thread
    pub fn current_thread(&self) -> FontCacheThread {
        self.glyphs.current_thread()
    }

    fn note_font(&mut self, font: &FontInfo) {
        let composite = &font.composite;
        self.revisions
            .entry(composite.id())
            .or_insert_with(|| (composite.clone(), composite.history_revision()));
    }

    /// Composite fonts whose history revision moved since the last call;
    /// character lists built against an older revision are dropped
    pub fn take_revised_fonts(&mut self) -> usize {
        let mut revised = 0;
        for (font, seen) in self.revisions.values_mut() {
            let current = font.history_revision();
            if current != *seen {
                tracing::debug!(font = ?font.id(), from = *seen, to = current, "composite font revised");
                *seen = current;
                revised += 1;
            }
        }
        if revised > 0 {
            self.purge_stale();
        }
        revised
    }

    /// Lazily populated characters of `font` at `scale`
    ///
    /// A list whose composite font revision moved on is rebuilt.
    pub fn character_list(&mut self, font: &FontInfo, scale: f32) -> CharacterListMut<'_> {
        self.note_font(font);
        let key = font.key(scale);
        let list = self
            .character_lists
            .entry(key)
            .or_insert_with(|| CharacterList::new(font, scale));
        if list.is_stale() {
            tracing::debug!(font = ?font.composite.id(), "rebuilding stale character list");
            *list = CharacterList::new(font, scale);
        }
        CharacterListMut {
            list,
            cacher: &mut self.glyphs,
        }
    }

    /// Atlas data for a shaped glyph
    pub fn shaped_glyph_atlas_data(
        &mut self,
        face: &Arc<dyn GlyphFace>,
        font_data: FontDataId,
        glyph_index: u16,
        pixel_size: f32,
    ) -> Option<GlyphAtlasData> {
        self.glyphs.cache_glyph(face, font_data, glyph_index, pixel_size)
    }

    /// Shape a single-direction run
    pub fn shape_unidirectional(
        &mut self,
        text: &str,
        font: &FontInfo,
        scale: f32,
        direction: TextDirection,
        method: TextShapingMethod,
    ) -> Arc<ShapedGlyphSequence> {
        self.shape_cached(text, font, scale, direction, method, false)
    }

    /// Shape mixed-direction text, splitting it into bidi runs in visual order
    pub fn shape_bidirectional(
        &mut self,
        text: &str,
        font: &FontInfo,
        scale: f32,
        base_direction: TextDirection,
        method: TextShapingMethod,
    ) -> Arc<ShapedGlyphSequence> {
        self.shape_cached(text, font, scale, base_direction, method, true)
    }

    fn shape_cached(
        &mut self,
        text: &str,
        font: &FontInfo,
        scale: f32,
        direction: TextDirection,
        method: TextShapingMethod,
        bidirectional: bool,
    ) -> Arc<ShapedGlyphSequence> {
        self.note_font(font);
        let key = ShapedKey {
            text: text.to_string(),
            font: font.key(scale),
            revision: font.composite.history_revision(),
            direction,
            method,
            bidirectional,
        };
        if let Some(sequence) = self.shaped.get(&key) {
            self.glyphs.stats.shaped_hits += 1;
            return sequence.clone();
        }
        self.glyphs.stats.shaped_misses += 1;

        let sequence = Arc::new(if bidirectional {
            self.shaper
                .shape_bidirectional(&mut self.glyphs, text, font, scale, direction, method)
        } else {
            self.shaper
                .shape_unidirectional(&mut self.glyphs, text, font, scale, direction, method)
        });
        self.shaped.put(key, sequence.clone());
        sequence
    }

    /// Apply a new culture; localized fallback results are discarded
    pub fn set_culture(&mut self, culture: &str) -> bool {
        if self.glyphs.culture == culture {
            return false;
        }
        tracing::info!(from = %self.glyphs.culture, to = culture, "font culture changed");
        self.glyphs.culture = culture.to_string();
        self.character_lists.clear();
        self.shaped.clear();
        true
    }

    /// Drop character lists built against an older font revision
    pub fn purge_stale(&mut self) -> usize {
        let before = self.character_lists.len();
        self.character_lists.retain(|_, list| !list.is_stale());
        before - self.character_lists.len()
    }

    /// Drop every cached glyph, list and shaped sequence
    pub fn flush(&mut self) {
        tracing::debug!(pages = self.glyphs.atlas.page_count(), "flushing font cache");
        self.glyphs.flush();
        self.character_lists.clear();
        self.shaped.clear();
        self.glyphs.stats.flushes += 1;
    }

    /// Flush when the atlas asked for it; returns whether a flush happened
    pub fn conditional_flush(&mut self) -> bool {
        if self.glyphs.atlas.needs_flush() {
            self.flush();
            true
        } else {
            false
        }
    }
}

impl std::fmt::Debug for FontCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontCache")
            .field("culture", &self.glyphs.culture)
            .field("character_lists", &self.character_lists.len())
            .field("shaped", &self.shaped.len())
            .field("atlas", &self.glyphs.atlas)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_faces {
    //! Synthetic faces for tests: fixed-size box glyphs for a set of characters

    use super::*;
    use crate::composite::{CompositeFont, Typeface};
    use crate::rasterizer::RasterizedGlyph;

    pub struct BoxFace {
        pub covered: Vec<char>,
        pub advance: f32,
        pub kerning: Vec<((char, char), f32)>,
    }

    impl BoxFace {
        pub fn new(covered: &str) -> Self {
            Self {
                covered: covered.chars().collect(),
                advance: 8.0,
                kerning: Vec::new(),
            }
        }

        pub fn with_kerning(mut self, a: char, b: char, value: f32) -> Self {
            self.kerning.push(((a, b), value));
            self
        }

        fn char_of(&self, glyph: u16) -> Option<char> {
            (glyph as usize)
                .checked_sub(1)
                .and_then(|i| self.covered.get(i))
                .copied()
        }
    }

    impl GlyphFace for BoxFace {
        fn glyph_index(&self, c: char) -> Option<u16> {
            self.covered.iter().position(|x| *x == c).map(|i| i as u16 + 1)
        }

        fn advance(&self, _glyph: u16, _pixel_size: f32) -> f32 {
            self.advance
        }

        fn kerning(&self, left: u16, right: u16, _pixel_size: f32) -> f32 {
            let (Some(a), Some(b)) = (self.char_of(left), self.char_of(right)) else {
                return 0.0;
            };
            self.kerning
                .iter()
                .find(|(pair, _)| *pair == (a, b))
                .map(|(_, v)| *v)
                .unwrap_or(0.0)
        }

        fn has_kerning(&self) -> bool {
            !self.kerning.is_empty()
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

        fn rasterize(&self, rasterizer: &mut GlyphRasterizer, glyph: u16, _pixel_size: f32) -> crate::Result<RasterizedGlyph> {
            rasterizer.note_rasterized();
            let whitespace = self.char_of(glyph).map(char::is_whitespace).unwrap_or(false);
            if whitespace {
                return Ok(RasterizedGlyph {
                    advance: self.advance,
                    ..RasterizedGlyph::default()
                });
            }
            Ok(RasterizedGlyph {
                bitmap: vec![255; 6 * 10],
                width: 6,
                height: 10,
                bearing_x: 1,
                bearing_y: 10,
                advance: self.advance,
            })
        }
    }

    pub fn box_font(covered: &str) -> FontData {
        FontData::from_face("Box", Arc::new(BoxFace::new(covered)))
    }

    pub fn font_info(data: FontData) -> FontInfo {
        FontInfo::new(Arc::new(CompositeFont::new(Typeface::single(data))), 9.0)
    }
}
