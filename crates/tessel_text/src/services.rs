//! Font services context
//!
//! [`FontServices`] is created once at application start and shared (by `Arc`)
//! with everything that measures or draws text. It owns the font cache, the
//! named composite fonts and the active culture. A culture change requested
//! mid-frame is applied at the next [`FontServices::begin_frame`], so a single
//! frame never mixes glyphs from two localized fallback fonts.
//!
//! `begin_frame` reports everything that makes previously batched text
//! wrong: a culture change, an atlas flush (glyph UVs moved) and composite
//! font revisions. Whoever caches batched text invalidates on any of them.

use crate::composite::{CompositeFont, FontInfo};
use crate::font_cache::{FallbackFonts, FontCache, FontCacheConfig, FontCacheStats};
use crate::registry::FontRegistry;
use crate::shaper::{ShapedGlyphSequence, TextDirection, TextShapingMethod};
use parking_lot::{Mutex, MutexGuard, RwLock};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// What changed in the font state at a frame start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FontFrameChanges {
    pub culture_changed: bool,
    /// The atlas was flushed since the previous frame start
    pub atlas_flushed: bool,
    /// Composite fonts in use whose history revision moved
    pub fonts_revised: usize,
}

impl FontFrameChanges {
    /// Text batched before this frame may show the wrong glyphs
    pub fn invalidates_cached_text(&self) -> bool {
        self.culture_changed || self.atlas_flushed || self.fonts_revised > 0
    }
}

pub struct FontServices {
    cache: Mutex<FontCache>,
    composites: RwLock<FxHashMap<String, Arc<CompositeFont>>>,
    pending_culture: Mutex<Option<String>>,
    frame: AtomicU64,
    /// Flush count seen at the last frame start
    seen_flushes: AtomicU64,
}

impl FontServices {
    pub fn new(config: FontCacheConfig, fallback: FallbackFonts) -> Self {
        tracing::debug!(
            page_size = config.atlas_page_size,
            culture = %config.default_culture,
            "creating font services"
        );
        Self {
            cache: Mutex::new(FontCache::new(config, fallback)),
            composites: RwLock::new(FxHashMap::default()),
            pending_culture: Mutex::new(None),
            frame: AtomicU64::new(0),
            seen_flushes: AtomicU64::new(0),
        }
    }

    /// Like [`new`](Self::new), filling a missing last-resort font from the
    /// system family `family`
    pub fn with_system_last_resort(
        config: FontCacheConfig,
        mut fallback: FallbackFonts,
        registry: &mut FontRegistry,
        family: &str,
    ) -> Self {
        if fallback.last_resort.is_none() {
            match registry.find_family(family) {
                Some(font) => fallback.last_resort = Some(font),
                None => tracing::warn!(family, "no last-resort font available"),
            }
        }
        Self::new(config, fallback)
    }

    /// Exclusive access to the font cache
    ///
    /// The atlas inside still enforces its owner thread.
    pub fn font_cache(&self) -> MutexGuard<'_, FontCache> {
        self.cache.lock()
    }

    pub fn register_composite(&self, name: impl Into<String>, font: Arc<CompositeFont>) {
        self.composites.write().insert(name.into(), font);
    }

    pub fn composite(&self, name: &str) -> Option<Arc<CompositeFont>> {
        self.composites.read().get(name).cloned()
    }

    /// Font info for a registered composite font
    pub fn font(&self, name: &str, size: f32) -> Option<FontInfo> {
        self.composite(name).map(|composite| FontInfo::new(composite, size))
    }

    /// Request a culture change, applied at the next frame start
    pub fn request_culture(&self, culture: impl Into<String>) {
        *self.pending_culture.lock() = Some(culture.into());
    }

    pub fn culture(&self) -> String {
        self.cache.lock().culture().to_string()
    }

    /// Frames begun so far
    pub fn frame(&self) -> u64 {
        self.frame.load(Ordering::Relaxed)
    }

    /// Route atlas lookups from the calling thread to the render slots of
    /// character entries; called once by the render thread
    pub fn bind_render_thread(&self) {
        self.cache.lock().bind_render_thread(std::thread::current().id());
    }

    /// The atlas outgrew its page limit and flushes at the next frame start
    pub fn needs_flush(&self) -> bool {
        self.cache.lock().atlas().needs_flush()
    }

    /// Start a frame: apply a pending culture change, flush the cache if the
    /// atlas outgrew its page limit and collect font revisions
    pub fn begin_frame(&self) -> FontFrameChanges {
        self.begin_frame_with(|| true)
    }

    /// Like [`begin_frame`](Self::begin_frame); `before_flush` runs without
    /// the cache lock ahead of a due atlas flush and may veto it
    ///
    /// A renderer batching on another thread waits there for in-flight
    /// frames, so none of them sees the atlas change under it.
    pub fn begin_frame_with(&self, before_flush: impl FnOnce() -> bool) -> FontFrameChanges {
        self.frame.fetch_add(1, Ordering::Relaxed);
        let flush = self.needs_flush() && before_flush();

        let pending = self.pending_culture.lock().take();
        let mut cache = self.cache.lock();
        let culture_changed = pending.map(|c| cache.set_culture(&c)).unwrap_or(false);
        if flush {
            cache.flush();
            tracing::debug!(frame = self.frame(), "font atlas flushed at frame start");
        }
        let flushes = cache.stats().flushes;
        let changes = FontFrameChanges {
            culture_changed,
            atlas_flushed: self.seen_flushes.swap(flushes, Ordering::Relaxed) != flushes,
            fonts_revised: cache.take_revised_fonts(),
        };
        if changes.invalidates_cached_text() {
            tracing::debug!(frame = self.frame(), ?changes, "font state changed");
        }
        changes
    }

    pub fn shape_unidirectional(
        &self,
        text: &str,
        font: &FontInfo,
        scale: f32,
        direction: TextDirection,
        method: TextShapingMethod,
    ) -> Arc<ShapedGlyphSequence> {
        self.cache
            .lock()
            .shape_unidirectional(text, font, scale, direction, method)
    }

    pub fn shape_bidirectional(
        &self,
        text: &str,
        font: &FontInfo,
        scale: f32,
        base_direction: TextDirection,
        method: TextShapingMethod,
    ) -> Arc<ShapedGlyphSequence> {
        self.cache
            .lock()
            .shape_bidirectional(text, font, scale, base_direction, method)
    }

    /// Width of `text` on one line, using the character list path
    pub fn measure(&self, text: &str, font: &FontInfo, scale: f32) -> f32 {
        let mut cache = self.cache.lock();
        let mut list = cache.character_list(font, scale);
        let mut width = 0.0;
        let mut previous = None;
        for c in text.chars() {
            let entry = list.get_character(c);
            if let Some(prev) = previous {
                width += list.get_kerning(&prev, &entry) as f32;
            }
            width += entry.x_advance as f32;
            previous = Some(entry);
        }
        width / scale
    }

    pub fn stats(&self) -> FontCacheStats {
        self.cache.lock().stats()
    }

    pub fn flush(&self) {
        self.cache.lock().flush();
    }
}

impl std::fmt::Debug for FontServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontServices")
            .field("frame", &self.frame())
            .field("composites", &self.composites.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::Typeface;
    use crate::font_cache::test_faces::*;
    use crate::font_cache::FontFallback;

    fn services() -> FontServices {
        let fallback = FallbackFonts::default()
            .with_localized("ja", box_font("\u{3042}"))
            .with_localized("ko", box_font("\u{3042}"));
        let services = FontServices::new(FontCacheConfig::default(), fallback);
        services.register_composite("Box", Arc::new(CompositeFont::new(Typeface::single(box_font("abc")))));
        services
    }

    #[test]
    fn test_culture_applies_at_frame_start() {
        let services = services();
        services.request_culture("ja");
        assert_eq!(services.culture(), "en");

        assert!(services.begin_frame().culture_changed);
        assert_eq!(services.culture(), "ja");
        assert_eq!(services.frame(), 1);

        // Only the last request of a frame is applied
        services.request_culture("fr");
        services.request_culture("ko");
        assert!(services.begin_frame().culture_changed);
        assert_eq!(services.culture(), "ko");

        assert_eq!(services.begin_frame(), FontFrameChanges::default());
    }

    fn small_atlas_services() -> FontServices {
        let config = FontCacheConfig {
            atlas_page_size: 16,
            max_atlas_pages_before_flush: 1,
            ..FontCacheConfig::default()
        };
        FontServices::new(config, FallbackFonts::default())
    }

    /// Rasterize `text` into the atlas through the character list path
    fn fill_atlas(services: &FontServices, font: &FontInfo, text: &str) {
        let mut cache = services.font_cache();
        let mut list = cache.character_list(font, 1.0);
        for c in text.chars() {
            let entry = list.get_character(c);
            list.atlas_data(&entry);
        }
    }

    #[test]
    fn test_atlas_flush_reported_at_frame_start() {
        let services = small_atlas_services();
        let font = crate::font_cache::test_faces::font_info(box_font("abc"));
        assert!(!services.begin_frame().invalidates_cached_text());

        // 6x10 glyphs: two fit a 16px page, the third opens a second page
        fill_atlas(&services, &font, "abc");
        assert_eq!(services.stats().atlas_pages, 2);
        assert!(services.needs_flush());

        let changes = services.begin_frame();
        assert!(changes.atlas_flushed);
        assert!(changes.invalidates_cached_text());
        assert_eq!(services.stats().atlas_pages, 0);
        assert_eq!(services.stats().flushes, 1);
        assert!(!services.begin_frame().atlas_flushed);
    }

    #[test]
    fn test_vetoed_flush_waits_for_next_frame() {
        let services = small_atlas_services();
        let font = crate::font_cache::test_faces::font_info(box_font("abc"));
        fill_atlas(&services, &font, "abc");

        let changes = services.begin_frame_with(|| false);
        assert!(!changes.atlas_flushed);
        assert!(services.needs_flush());

        let mut asked = false;
        let changes = services.begin_frame_with(|| {
            asked = true;
            true
        });
        assert!(asked);
        assert!(changes.atlas_flushed);
    }

    #[test]
    fn test_explicit_flush_reported_at_frame_start() {
        let services = services();
        services.flush();
        assert!(services.begin_frame().atlas_flushed);
        assert!(!services.begin_frame().atlas_flushed);
    }

    #[test]
    fn test_font_revision_reported_at_frame_start() {
        let services = services();
        let font = services.font("Box", 9.0).unwrap();
        services.measure("ab", &font, 1.0);
        assert_eq!(services.begin_frame().fonts_revised, 0);

        font.composite.bump_revision();
        let changes = services.begin_frame();
        assert_eq!(changes.fonts_revised, 1);
        assert!(changes.invalidates_cached_text());
        assert_eq!(services.begin_frame().fonts_revised, 0);
    }

    #[test]
    fn test_registered_font_shapes() {
        let services = services();
        let font = services.font("Box", 9.0).unwrap();
        assert!(services.font("Missing", 9.0).is_none());

        let sequence = services.shape_unidirectional(
            "abc",
            &font,
            1.0,
            TextDirection::LeftToRight,
            TextShapingMethod::Auto,
        );
        assert_eq!(sequence.len(), 3);
        assert!(sequence.fallback_level_at_most(FontFallback::NoFallback));
        assert_eq!(services.measure("abc", &font, 1.0), 24.0);
        assert_eq!(services.measure("abc", &font, 2.0), 12.0);
    }

    #[test]
    fn test_system_last_resort_kept_when_supplied() {
        let mut registry = FontRegistry::without_system_fonts();
        let fallback = FallbackFonts::default().with_last_resort(box_font("z"));
        let services = FontServices::with_system_last_resort(
            FontCacheConfig::default(),
            fallback,
            &mut registry,
            "Missing Family",
        );
        services.register_composite("Box", Arc::new(CompositeFont::new(Typeface::single(box_font("a")))));
        let font = services.font("Box", 9.0).unwrap();

        let mut cache = services.font_cache();
        let entry = cache.character_list(&font, 1.0).get_character('z');
        assert_eq!(entry.fallback_level, FontFallback::LastResort);
    }
}
