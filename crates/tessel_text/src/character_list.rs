//! Per-font character cache for the simple (unshaped) text path
//!
//! A [`CharacterList`] belongs to one (font, scale) pair and is filled lazily:
//! the first lookup of a codepoint resolves the fallback chain and stores the
//! glyph's metrics in a [`CharacterEntry`]. Measuring never touches the atlas.
//! Atlas placement is looked up separately with
//! [`CharacterListMut::atlas_data`], which rasterizes on first use and keeps
//! the result in the entry's slot for the calling thread context.
//!
//! Codepoints below 256 live in flat arrays, the rest in hash maps. The
//! kerning table follows the same split.

use crate::composite::{FontDataId, FontInfo, FontKey};
use crate::font_cache::{AtlasDataSlots, FontFallback, GlyphAtlasData, GlyphCacher};
use rustc_hash::FxHashMap;

/// Codepoints below this are direct-indexed
pub const DIRECT_INDEX_LIMIT: usize = 256;

/// Cached metrics for one character
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacterEntry {
    pub character: char,
    pub glyph_index: u16,
    pub font_data: FontDataId,
    /// Descender of the list's font, shared by every entry
    pub global_descender: i16,
    pub x_advance: i16,
    pub fallback_level: FontFallback,
    pub has_kerning: bool,
    pub valid: bool,
    /// Atlas placement, one slot per thread context
    pub atlas: AtlasDataSlots,
}

impl CharacterEntry {
    pub fn invalid(character: char) -> Self {
        Self {
            character,
            glyph_index: 0,
            font_data: FontDataId::INVALID,
            global_descender: 0,
            x_advance: 0,
            fallback_level: FontFallback::NoFallback,
            has_kerning: false,
            valid: false,
            atlas: AtlasDataSlots::default(),
        }
    }
}

const UNCACHED_KERNING: i16 = i16::MIN;

/// Kerning pairs, direct-indexed for two codepoints below 256
pub struct KerningTable {
    /// Allocated on first direct lookup
    direct: Option<Box<[i16]>>,
    mapped: FxHashMap<(char, char), i16>,
}

impl KerningTable {
    pub fn new() -> Self {
        Self {
            direct: None,
            mapped: FxHashMap::default(),
        }
    }

    /// Cached kerning for the pair, computing it with `compute` on a miss
    pub fn get_or_insert_with(&mut self, first: char, second: char, compute: impl FnOnce() -> i16) -> i16 {
        let (a, b) = (first as usize, second as usize);
        if a < DIRECT_INDEX_LIMIT && b < DIRECT_INDEX_LIMIT {
            let table = self
                .direct
                .get_or_insert_with(|| vec![UNCACHED_KERNING; DIRECT_INDEX_LIMIT * DIRECT_INDEX_LIMIT].into_boxed_slice());
            let slot = &mut table[a * DIRECT_INDEX_LIMIT + b];
            if *slot == UNCACHED_KERNING {
                *slot = compute().max(UNCACHED_KERNING + 1);
            }
            *slot
        } else {
            *self.mapped.entry((first, second)).or_insert_with(compute)
        }
    }

    /// Cached value without computing
    pub fn get(&self, first: char, second: char) -> Option<i16> {
        let (a, b) = (first as usize, second as usize);
        if a < DIRECT_INDEX_LIMIT && b < DIRECT_INDEX_LIMIT {
            self.direct
                .as_ref()
                .map(|t| t[a * DIRECT_INDEX_LIMIT + b])
                .filter(|v| *v != UNCACHED_KERNING)
        } else {
            self.mapped.get(&(first, second)).copied()
        }
    }

    pub fn clear(&mut self) {
        self.direct = None;
        self.mapped.clear();
    }
}

impl Default for KerningTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazily filled characters of one (font, scale)
pub struct CharacterList {
    key: FontKey,
    font: FontInfo,
    scale: f32,
    history_revision: u32,
    direct: Vec<Option<CharacterEntry>>,
    mapped: FxHashMap<char, CharacterEntry>,
    kerning: KerningTable,
    /// (max height, baseline) once computed
    line_metrics: Option<(i16, i16)>,
}

impl CharacterList {
    pub(crate) fn new(font: &FontInfo, scale: f32) -> Self {
        Self {
            key: font.key(scale),
            font: font.clone(),
            scale,
            history_revision: font.composite.history_revision(),
            direct: vec![None; DIRECT_INDEX_LIMIT],
            mapped: FxHashMap::default(),
            kerning: KerningTable::new(),
            line_metrics: None,
        }
    }

    pub fn key(&self) -> &FontKey {
        &self.key
    }

    /// The composite font changed since this list was built
    pub fn is_stale(&self) -> bool {
        self.history_revision != self.font.composite.history_revision()
    }

    pub fn cached_len(&self) -> usize {
        self.direct.iter().filter(|e| e.is_some()).count() + self.mapped.len()
    }

    pub(crate) fn cached(&self, c: char) -> Option<CharacterEntry> {
        let index = c as usize;
        if index < DIRECT_INDEX_LIMIT {
            self.direct[index]
        } else {
            self.mapped.get(&c).copied()
        }
    }

    fn cached_mut(&mut self, c: char) -> Option<&mut CharacterEntry> {
        let index = c as usize;
        if index < DIRECT_INDEX_LIMIT {
            self.direct[index].as_mut()
        } else {
            self.mapped.get_mut(&c)
        }
    }

    fn store(&mut self, entry: CharacterEntry) {
        let index = entry.character as usize;
        if index < DIRECT_INDEX_LIMIT {
            self.direct[index] = Some(entry);
        } else {
            self.mapped.insert(entry.character, entry);
        }
    }
}

/// A character list borrowed together with the glyph cache that fills it
pub struct CharacterListMut<'a> {
    pub(crate) list: &'a mut CharacterList,
    pub(crate) cacher: &'a mut GlyphCacher,
}

impl CharacterListMut<'_> {
    fn pixel_size(&self) -> f32 {
        self.list.font.pixel_size(self.list.scale)
    }

    /// Entry for `c`, caching it on first use
    pub fn get_character(&mut self, c: char) -> CharacterEntry {
        if let Some(entry) = self.list.cached(c) {
            return entry;
        }
        let entry = self.cache_character(c);
        if entry.valid {
            self.list.store(entry);
        }
        entry
    }

    /// Entry for `c` only when its fallback level is within `max_fallback`
    pub fn get_character_with_fallback(&mut self, c: char, max_fallback: FontFallback) -> Option<CharacterEntry> {
        let entry = self.get_character(c);
        (entry.valid && entry.fallback_level <= max_fallback).then_some(entry)
    }

    fn cache_character(&mut self, c: char) -> CharacterEntry {
        let pixel_size = self.pixel_size();
        let global_descender = self.baseline();
        let resolved = self.cacher.resolve(&self.list.font, c);
        let Some(face) = resolved.face else {
            return CharacterEntry::invalid(c);
        };

        CharacterEntry {
            character: c,
            glyph_index: resolved.glyph_index,
            font_data: resolved.font_data,
            global_descender,
            x_advance: face.advance(resolved.glyph_index, pixel_size).round() as i16,
            fallback_level: resolved.fallback,
            has_kerning: face.has_kerning(),
            valid: true,
            atlas: AtlasDataSlots::default(),
        }
    }

    /// Atlas placement of `entry`'s glyph, rasterizing it on first use
    ///
    /// The result is kept in the stored entry's slot for the calling thread
    /// context. `None` for invalid entries and glyphs that failed to
    /// rasterize.
    pub fn atlas_data(&mut self, entry: &CharacterEntry) -> Option<GlyphAtlasData> {
        if !entry.valid {
            return None;
        }
        let thread = self.cacher.current_thread();
        if let Some(data) = self.list.cached(entry.character).and_then(|e| e.atlas.get(thread)) {
            return Some(data);
        }

        let face = self.cacher.face_for(entry.font_data)?;
        let pixel_size = self.pixel_size();
        let data = self
            .cacher
            .cache_glyph(&face, entry.font_data, entry.glyph_index, pixel_size)?;
        if let Some(stored) = self.list.cached_mut(entry.character) {
            stored.atlas.set(thread, data);
        }
        Some(data)
    }

    /// Kerning between two cached entries in pixels
    ///
    /// Pairs from different fonts, or fonts without kerning, never kern.
    pub fn get_kerning(&mut self, first: &CharacterEntry, second: &CharacterEntry) -> i16 {
        if !first.valid
            || !second.valid
            || first.font_data != second.font_data
            || !first.has_kerning
        {
            return 0;
        }

        let pixel_size = self.pixel_size();
        let cacher = &mut *self.cacher;
        let (left, right, font_data) = (first.glyph_index, second.glyph_index, first.font_data);
        self.list
            .kerning
            .get_or_insert_with(first.character, second.character, || {
                cacher
                    .face_for(font_data)
                    .map(|face| face.kerning(left, right, pixel_size).round() as i16)
                    .unwrap_or(0)
            })
    }

    /// Kerning between two characters, caching both entries
    pub fn kerning_between(&mut self, first: char, second: char) -> i16 {
        let a = self.get_character(first);
        let b = self.get_character(second);
        self.get_kerning(&a, &b)
    }

    fn line_metrics(&mut self) -> (i16, i16) {
        if let Some(metrics) = self.list.line_metrics {
            return metrics;
        }
        let pixel_size = self.pixel_size();
        let metrics = self
            .cacher
            .default_face(&self.list.font)
            .map(|face| {
                let ascender = face.ascender(pixel_size);
                let descender = face.descender(pixel_size);
                ((ascender - descender).round() as i16, descender.round() as i16)
            })
            .unwrap_or((0, 0));
        self.list.line_metrics = Some(metrics);
        metrics
    }

    /// Tallest line extent (ascender - descender) in pixels
    pub fn max_height(&mut self) -> i16 {
        self.line_metrics().0
    }

    /// Descender in pixels (negative)
    pub fn baseline(&mut self) -> i16 {
        self.line_metrics().1
    }

    pub fn is_stale(&self) -> bool {
        self.list.is_stale()
    }
}
