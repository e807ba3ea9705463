//! Atlas flushes at frame start re-record cached text
//!
//! Own test binary: the flush invalidates every panel in the process.

use std::sync::Arc;
use tessel_app::prelude::*;

mod common;

use common::block_font;

#[test]
fn atlas_flush_recaches_text_panels() {
    // Two padded 6x10 glyphs per 16px page and a single page allowed
    let mut config = TesselConfig::default();
    config.fonts.atlas_page_size = 16;
    config.fonts.max_atlas_pages_before_flush = 1;
    let fonts = Arc::new(config.font_services(FallbackFonts::default()));
    let mut renderer = FrameRenderer::new(&config, fonts.clone(), NullBackend).unwrap();

    let panel = config.panel.panel();
    let root = WidgetNode::with_children(
        panel.clone(),
        vec![WidgetNode::new(Label::new("abc", block_font(), Color::WHITE))],
    );
    let size = Vec2::new(100.0, 40.0);

    let first = renderer.draw_window(&root, size, 0.0, 0.016).unwrap();
    assert_eq!(panel.last_paint_type(), Some(PaintType::Recached));
    assert!(!first.fonts.atlas_flushed);

    // The third glyph spilled onto a second page while the render thread batched
    renderer.wait_idle().unwrap();
    assert!(fonts.needs_flush());
    assert_eq!(fonts.stats().flushes, 0);

    let second = renderer.draw_window(&root, size, 0.016, 0.016).unwrap();
    assert!(second.fonts.atlas_flushed);
    assert_eq!(fonts.stats().flushes, 1);
    assert_eq!(panel.last_paint_type(), Some(PaintType::Recached));
    assert_eq!(panel.cache_passes(), 2);
    assert_eq!(second.cache_jobs, 1);

    let reports = renderer.shutdown().unwrap();
    assert_eq!(reports.len(), 2);
    // Three glyph quads each frame, batched against the atlas of that frame
    assert!(reports.iter().all(|r| r.vertices == 12));
}
