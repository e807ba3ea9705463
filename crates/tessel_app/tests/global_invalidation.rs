//! Process-wide panel invalidation
//!
//! Lives in its own test binary: bumping the global generation would make
//! panels in concurrently running tests re-record.

use std::sync::Arc;
use tessel_app::prelude::*;
use tessel_text::FontInfo;

mod common;

use common::block_font;

/// Two panels with a block each; the first also holds a label
fn scene(config: &TesselConfig, font: &FontInfo) -> (Vec<InvalidationPanel>, WidgetRef) {
    let panels: Vec<InvalidationPanel> = (0..2).map(|_| config.panel.panel()).collect();
    let children = panels
        .iter()
        .enumerate()
        .map(|(index, panel)| {
            let mut content = vec![WidgetNode::new(ColorBlock::new(Vec2::new(30.0, 10.0), Color::GREEN))];
            if index == 0 {
                content.push(WidgetNode::new(Label::new("ab", font.clone(), Color::WHITE)));
            }
            WidgetNode::with_children(panel.clone(), vec![WidgetNode::with_children(VerticalStack::new(0.0), content)])
        })
        .collect();
    (panels, WidgetNode::with_children(VerticalStack::new(2.0), children))
}

#[test]
fn invalidate_all_panels_recaches_every_panel_once() {
    let config = TesselConfig::default();
    let fonts = Arc::new(config.font_services(FallbackFonts::default()));
    let mut renderer = FrameRenderer::new(&config, fonts.clone(), NullBackend).unwrap();
    let font = block_font();
    let (panels, root) = scene(&config, &font);
    let size = Vec2::new(100.0, 100.0);

    renderer.draw_window(&root, size, 0.0, 0.016).unwrap();
    renderer.draw_window(&root, size, 0.016, 0.016).unwrap();
    assert!(panels.iter().all(|p| p.last_paint_type() == Some(PaintType::Cached)));

    InvalidationPanel::invalidate_all_panels();
    renderer.draw_window(&root, size, 0.032, 0.016).unwrap();
    assert!(panels.iter().all(|p| p.last_paint_type() == Some(PaintType::Recached)));

    renderer.draw_window(&root, size, 0.048, 0.016).unwrap();
    assert!(panels.iter().all(|p| p.last_paint_type() == Some(PaintType::Cached)));
    assert!(panels.iter().all(|p| p.cache_passes() == 2));

    // A culture change lands at the next frame start and invalidates too
    fonts.request_culture("ja");
    let changes = renderer.draw_window(&root, size, 0.064, 0.016).unwrap().fonts;
    assert!(changes.culture_changed);
    assert!(panels.iter().all(|p| p.last_paint_type() == Some(PaintType::Recached)));

    renderer.draw_window(&root, size, 0.080, 0.016).unwrap();
    assert!(panels.iter().all(|p| p.last_paint_type() == Some(PaintType::Cached)));

    // So does a revision of a font the cache has seen
    renderer.wait_idle().unwrap();
    font.composite.bump_revision();
    let changes = renderer.draw_window(&root, size, 0.096, 0.016).unwrap().fonts;
    assert_eq!(changes.fonts_revised, 1);
    assert!(panels.iter().all(|p| p.last_paint_type() == Some(PaintType::Recached)));

    let changes = renderer.draw_window(&root, size, 0.112, 0.016).unwrap().fonts;
    assert!(!changes.invalidates_cached_text());
    assert!(panels.iter().all(|p| p.last_paint_type() == Some(PaintType::Cached)));

    let reports = renderer.shutdown().unwrap();
    assert_eq!(reports.len(), 8);
    // Two blocks plus two glyph quads
    assert!(reports.iter().all(|r| r.vertices == 16));
}
