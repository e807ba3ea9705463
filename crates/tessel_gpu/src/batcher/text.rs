//! Glyph quads for character-list text and shaped glyph sequences
//!
//! Text is drawn pre-scaled: glyphs are rasterized at the layout scale, so
//! the layout scale is divided back out of the render transform and the
//! quads are built in unscaled pixel space.
//!
//! Atlas placement is looked up per visible glyph. A run whose glyphs sit on
//! several atlas pages adds to one batch per page, and counts once in each.

use super::{BatchSlot, ElementBatcher};
use crate::batch::BatchKey;
use crate::resources::font_atlas_texture;
use crate::shader::{BatchDrawFlags, ShaderType};
use crate::vertex::BatchVertex;
use smallvec::SmallVec;
use std::sync::Arc;
use tessel_core::{LayoutTransform, PackedColor, Rect, RenderTransform, RotatedRect, Vec2};
use tessel_paint::{DrawElement, ShapedTextPayload, TextPayload};
use tessel_text::{CharacterEntry, FontServices};

/// Transforms for drawing glyphs at the font scale
struct GlyphSpace {
    font_scale: f32,
    render: RenderTransform,
    clip: RotatedRect,
    /// Clip rect in glyph space, for culling whole glyphs
    local_clip: Rect,
}

impl GlyphSpace {
    fn of(element: &DrawElement) -> Option<Self> {
        let layout = element.geometry.layout_transform;
        let font_scale = layout.scale();
        if !(font_scale > 0.0) {
            return None;
        }
        let inverse_font_scale = 1.0 / font_scale;
        let inverse_layout = LayoutTransform::from_scale(inverse_font_scale)
            .concat(&layout)
            .inverse();
        let render = RenderTransform::from_scale(inverse_font_scale, inverse_font_scale)
            .concat(&element.geometry.render_transform);
        Some(Self {
            font_scale,
            render,
            clip: RotatedRect::snapped(&element.clip_rect, &inverse_layout, &render),
            local_clip: inverse_layout.transform_rect(&element.clip_rect),
        })
    }
}

/// The batch for the atlas page glyphs currently come from
struct PageBatch {
    page: u32,
    slot: BatchSlot,
}

/// Page batches of one text element
#[derive(Default)]
struct PageBatches {
    current: Option<PageBatch>,
    /// Pages whose batch already counts the element
    counted: SmallVec<[u32; 4]>,
}

/// One glyph quad in glyph space
struct GlyphQuad {
    position: Vec2,
    size: Vec2,
    uv: Vec2,
    size_uv: Vec2,
}

impl ElementBatcher {
    fn font_services(&self, kind: &str) -> Option<Arc<FontServices>> {
        let fonts = self.fonts.clone();
        if fonts.is_none() {
            tracing::warn!(kind, "text element batched without font services; skipping");
        }
        fonts
    }

    /// Batch for `page`, switching only when the page changes
    fn page_batch(&mut self, element: &DrawElement, pages: &mut PageBatches, page: u32) -> BatchSlot {
        if let Some(batch) = pages.current.as_ref().filter(|b| b.page == page) {
            return batch.slot;
        }
        let first_visit = !pages.counted.contains(&page);
        if first_visit {
            pages.counted.push(page);
        }
        let flags = self.draw_flags(element, BatchDrawFlags::NONE);
        let key = BatchKey::new(ShaderType::Font, element.effects, flags, element.scissor_rect.as_ref())
            .with_texture(Some(font_atlas_texture(page)));
        let slot = self.find_batch(element.layer, key, first_visit);
        pages.current = Some(PageBatch { page, slot });
        slot
    }

    fn push_glyph(&mut self, slot: BatchSlot, space: &GlyphSpace, glyph: GlyphQuad, color: PackedColor) {
        let GlyphQuad {
            position,
            size,
            uv,
            size_uv,
        } = glyph;
        let lower_right = position + size;
        let buffers = self.buffers(slot);
        let start = buffers.next_index();
        let vertex = |local: Vec2, uv: Vec2| BatchVertex::with_uv(&space.render, local, uv, color, &space.clip);
        buffers.vertices.extend_from_slice(&[
            vertex(position, uv),
            vertex(Vec2::new(lower_right.x, position.y), Vec2::new(uv.x + size_uv.x, uv.y)),
            vertex(Vec2::new(position.x, lower_right.y), Vec2::new(uv.x, uv.y + size_uv.y)),
            vertex(lower_right, uv + size_uv),
        ]);
        buffers
            .indices
            .extend_from_slice(&[start, start + 1, start + 2, start + 1, start + 3, start + 2]);
    }

    pub(super) fn add_text_element(&mut self, element: &DrawElement, payload: &TextPayload) {
        if payload.text.is_empty() {
            return;
        }
        let Some(color) = self.element_color(payload.tint, None) else {
            return;
        };
        let Some(space) = GlyphSpace::of(element) else {
            return;
        };
        let Some(fonts) = self.font_services("text") else {
            return;
        };

        let mut cache = fonts.font_cache();
        let inverse_page_size = 1.0 / cache.atlas_page_size().max(1) as f32;
        let mut characters = cache.character_list(&payload.font, space.font_scale);
        let max_height = characters.max_height() as f32;

        let mut pages = PageBatches::default();
        let mut previous: Option<CharacterEntry> = None;
        let mut line_x = 0.0;
        let mut pos_y = 0.0;

        for c in payload.text.chars() {
            if c == '\n' {
                pos_y += max_height;
                line_x = 0.0;
                continue;
            }

            let entry = characters.get_character(c);
            let is_whitespace = c.is_whitespace();
            let kerning = match previous {
                Some(prev) if !is_whitespace && prev.valid => characters.get_kerning(&prev, &entry),
                _ => 0,
            };
            line_x += kerning as f32;
            previous = Some(entry);

            if !is_whitespace {
                if let Some(atlas) = characters.atlas_data(&entry) {
                    let x = line_x + atlas.horizontal_offset as f32;
                    // Pen position is the top of the line; this is the glyph top
                    let y = pos_y - atlas.vertical_offset as f32 + max_height + entry.global_descender as f32;
                    let size = Vec2::new(atlas.u_size as f32, atlas.v_size as f32);

                    if Rect::from_position_size(Vec2::new(x, y), size).intersects(&space.local_clip) {
                        let slot = self.page_batch(element, &mut pages, atlas.texture_index);
                        let glyph = GlyphQuad {
                            position: Vec2::new(x, y),
                            size,
                            uv: Vec2::new(atlas.start_u as f32, atlas.start_v as f32) * inverse_page_size,
                            size_uv: size * inverse_page_size,
                        };
                        self.push_glyph(slot, &space, glyph, color);
                    }
                }
            }

            line_x += entry.x_advance as f32;
        }
    }

    pub(super) fn add_shaped_text_element(&mut self, element: &DrawElement, payload: &ShapedTextPayload) {
        let sequence = &payload.sequence;
        if sequence.is_empty() {
            return;
        }
        let Some(color) = self.element_color(payload.tint, None) else {
            return;
        };
        let Some(space) = GlyphSpace::of(element) else {
            return;
        };
        let Some(fonts) = self.font_services("shaped text") else {
            return;
        };

        let max_height = sequence.max_text_height() as f32;
        let baseline = sequence.text_baseline() as f32;
        let pixel_size = sequence.pixel_size();

        let mut cache = fonts.font_cache();
        let inverse_page_size = 1.0 / cache.atlas_page_size().max(1) as f32;

        let mut pages = PageBatches::default();
        let mut line_x = 0.0;

        for glyph in sequence.glyphs() {
            if glyph.is_visible {
                let atlas = cache.shaped_glyph_atlas_data(&glyph.face, glyph.font_data, glyph.glyph_index, pixel_size);
                if let Some(atlas) = atlas {
                    let x = line_x + atlas.horizontal_offset as f32 + glyph.x_offset;
                    let y = glyph.y_offset - atlas.vertical_offset as f32 + max_height + baseline;
                    let size = Vec2::new(atlas.u_size as f32, atlas.v_size as f32);

                    if Rect::from_position_size(Vec2::new(x, y), size).intersects(&space.local_clip) {
                        let slot = self.page_batch(element, &mut pages, atlas.texture_index);
                        let quad = GlyphQuad {
                            position: Vec2::new(x, y),
                            size,
                            uv: Vec2::new(atlas.start_u as f32, atlas.start_v as f32) * inverse_page_size,
                            size_uv: size * inverse_page_size,
                        };
                        self.push_glyph(slot, &space, quad, color);
                    }
                }
            }
            line_x += glyph.x_advance;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::ElementBatcher;
    use crate::resources::font_atlas_texture;
    use crate::shader::ShaderType;
    use std::sync::Arc;
    use tessel_core::{Color, Rect, Vec2};
    use tessel_paint::{ElementPlacement, WindowElementList};
    use tessel_text::{
        CompositeFont, FallbackFonts, FontCacheConfig, FontData, FontInfo, FontServices, GlyphFace,
        GlyphRasterizer, RasterizedGlyph, TextDirection, TextShapingMethod, Typeface,
    };

    /// 6x10 block glyphs with an 8 pixel advance
    struct BlockFace {
        covered: Vec<char>,
        kerning: Option<((char, char), f32)>,
    }

    impl BlockFace {
        fn char_of(&self, glyph: u16) -> Option<char> {
            (glyph as usize).checked_sub(1).and_then(|i| self.covered.get(i)).copied()
        }
    }

    impl GlyphFace for BlockFace {
        fn glyph_index(&self, c: char) -> Option<u16> {
            self.covered.iter().position(|x| *x == c).map(|i| i as u16 + 1)
        }

        fn advance(&self, _glyph: u16, _pixel_size: f32) -> f32 {
            8.0
        }

        fn kerning(&self, left: u16, right: u16, _pixel_size: f32) -> f32 {
            match (self.kerning, self.char_of(left), self.char_of(right)) {
                (Some((pair, value)), Some(a), Some(b)) if pair == (a, b) => value,
                _ => 0.0,
            }
        }

        fn has_kerning(&self) -> bool {
            self.kerning.is_some()
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

        fn rasterize(&self, _rasterizer: &mut GlyphRasterizer, glyph: u16, _pixel_size: f32) -> tessel_text::Result<RasterizedGlyph> {
            if self.char_of(glyph).map(char::is_whitespace).unwrap_or(true) {
                return Ok(RasterizedGlyph {
                    advance: 8.0,
                    ..RasterizedGlyph::default()
                });
            }
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

    fn block_font(covered: &str, kerning: Option<((char, char), f32)>) -> FontInfo {
        let face = BlockFace {
            covered: covered.chars().collect(),
            kerning,
        };
        let data = FontData::from_face("Block", Arc::new(face));
        FontInfo::new(Arc::new(CompositeFont::new(Typeface::single(data))), 9.0)
    }

    fn font(kerning: Option<((char, char), f32)>) -> FontInfo {
        block_font("ab ", kerning)
    }

    fn services() -> Arc<FontServices> {
        Arc::new(FontServices::new(FontCacheConfig::default(), FallbackFonts::default()))
    }

    /// Two block glyphs per atlas page
    fn small_page_services() -> Arc<FontServices> {
        let config = FontCacheConfig {
            atlas_page_size: 16,
            max_atlas_pages_before_flush: 8,
            ..FontCacheConfig::default()
        };
        Arc::new(FontServices::new(config, FallbackFonts::default()))
    }

    fn text_batcher(fonts: &Arc<FontServices>) -> ElementBatcher {
        batcher().with_fonts(fonts.clone())
    }

    fn list() -> WindowElementList {
        WindowElementList::new(Vec2::new(800.0, 600.0))
    }

    #[test]
    fn test_text_glyph_quads() {
        let fonts = services();
        let mut list = list();
        list.add_text(at(0, Vec2::new(10.0, 20.0), Vec2::new(100.0, 20.0)), "ab", &font(None), Color::WHITE);

        let out = batch(&list, &mut text_batcher(&fonts));
        assert_eq!(out.render_batches.len(), 1);
        let key = out.render_batches[0].key;
        assert_eq!(key.shader, ShaderType::Font);
        assert_eq!(key.texture, Some(font_atlas_texture(0)));

        assert_eq!(out.vertices.len(), 8);
        assert_eq!(out.indices, vec![0, 1, 2, 1, 3, 2, 4, 5, 6, 5, 7, 6]);
        // Glyph top sits at max_height (13) + descender (-3) - bearing (10) = 0
        assert_eq!(out.vertices[0].position(), Vec2::new(11.0, 20.0));
        assert_eq!(out.vertices[3].position(), Vec2::new(17.0, 30.0));
        assert_eq!(out.vertices[4].position(), Vec2::new(19.0, 20.0));
    }

    #[test]
    fn test_text_kerning_and_newline() {
        let fonts = services();
        let mut list = list();
        let font = font(Some((('a', 'b'), -2.0)));
        list.add_text(at(0, Vec2::ZERO, Vec2::new(100.0, 40.0)), "ab\na", &font, Color::WHITE);

        let out = batch(&list, &mut text_batcher(&fonts));
        assert_eq!(out.vertices.len(), 12);
        assert_eq!(out.vertices[4].position().x, 8.0 - 2.0 + 1.0);
        // The next line starts at x = 0, one line height down
        assert_eq!(out.vertices[8].position(), Vec2::new(1.0, 13.0));
    }

    #[test]
    fn test_text_culls_glyphs_outside_clip() {
        let fonts = services();
        let mut list = list();
        let mut placement: ElementPlacement = at(0, Vec2::new(10.0, 20.0), Vec2::new(100.0, 20.0));
        placement.clip_rect = Rect::new(10.0, 20.0, 15.0, 40.0);
        list.add_text(placement, "ab", &font(None), Color::WHITE);

        let out = batch(&list, &mut text_batcher(&fonts));
        assert_eq!(out.vertices.len(), 4);
    }

    #[test]
    fn test_whitespace_advances_without_quads() {
        let fonts = services();
        let mut list = list();
        list.add_text(at(0, Vec2::ZERO, Vec2::new(100.0, 20.0)), "a b", &font(None), Color::WHITE);

        let out = batch(&list, &mut text_batcher(&fonts));
        assert_eq!(out.vertices.len(), 8);
        assert_eq!(out.vertices[4].position().x, 16.0 + 1.0);
    }

    #[test]
    fn test_text_counts_once_per_page_batch() {
        let fonts = small_page_services();
        let mut list = list();
        // a and b fill page 0, c opens page 1; the run then alternates pages
        let font = block_font("abc ", None);
        list.add_text(at(0, Vec2::ZERO, Vec2::new(200.0, 20.0)), "abc a c", &font, Color::WHITE);

        let out = batch(&list, &mut text_batcher(&fonts));
        assert_eq!(out.vertices.len(), 5 * 4);
        let batches: Vec<_> = out
            .render_batches
            .iter()
            .map(|b| (b.key.texture, b.element_count))
            .collect();
        assert_eq!(
            batches,
            vec![(Some(font_atlas_texture(0)), 1), (Some(font_atlas_texture(1)), 1)]
        );
        assert_eq!(out.stats.elements, 1);
    }

    #[test]
    fn test_fully_clipped_text_opens_no_batch() {
        let fonts = services();
        let mut list = list();
        let mut placement: ElementPlacement = at(0, Vec2::new(10.0, 20.0), Vec2::new(100.0, 20.0));
        placement.clip_rect = Rect::new(10.0, 200.0, 110.0, 220.0);
        list.add_text(placement, "ab", &font(None), Color::WHITE);
        list.add_text(at(0, Vec2::ZERO, Vec2::new(100.0, 20.0)), "   ", &font(None), Color::WHITE);

        let out = batch(&list, &mut text_batcher(&fonts));
        assert!(out.render_batches.is_empty());
    }

    #[test]
    fn test_empty_or_transparent_text_draws_nothing() {
        let fonts = services();
        let mut list = list();
        list.add_text(at(0, Vec2::ZERO, Vec2::ONE), "", &font(None), Color::WHITE);
        list.add_text(at(0, Vec2::ZERO, Vec2::ONE), "ab", &font(None), Color::TRANSPARENT);

        let out = batch(&list, &mut text_batcher(&fonts));
        assert!(out.render_batches.is_empty());
    }

    #[test]
    fn test_text_without_font_services_is_skipped() {
        let mut list = list();
        list.add_text(at(0, Vec2::ZERO, Vec2::ONE), "ab", &font(None), Color::WHITE);
        let out = batch(&list, &mut batcher());
        assert!(out.render_batches.is_empty());
    }

    #[test]
    fn test_shaped_text_matches_character_path() {
        let fonts = services();
        let font = font(None);
        let sequence = fonts.shape_unidirectional(
            "ab",
            &font,
            1.0,
            TextDirection::LeftToRight,
            TextShapingMethod::KerningOnly,
        );

        let mut shaped = list();
        shaped.add_shaped_text(at(0, Vec2::new(10.0, 20.0), Vec2::new(100.0, 20.0)), sequence, Color::WHITE);
        let mut plain = list();
        plain.add_text(at(0, Vec2::new(10.0, 20.0), Vec2::new(100.0, 20.0)), "ab", &font, Color::WHITE);

        let mut batcher = text_batcher(&fonts);
        let shaped = batch(&shaped, &mut batcher);
        let plain = batch(&plain, &mut batcher);
        assert_eq!(shaped.vertices.len(), 8);
        let positions = |out: &crate::batch::BatchData| out.vertices.iter().map(|v| v.position()).collect::<Vec<_>>();
        assert_eq!(positions(&shaped), positions(&plain));
        assert_eq!(shaped.indices, plain.indices);
    }
}
