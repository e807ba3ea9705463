//! Synthetic widget trees for the `run` command

use std::sync::Arc;
use tessel_app::TesselConfig;
use tessel_core::{Color, Vec2};
use tessel_paint::widgets::{ColorBlock, Label, Spinner, VerticalStack};
use tessel_paint::{InvalidationPanel, PaintType, WidgetNode, WidgetRef};
use tessel_text::{FontInfo, FontServices};

const PALETTE: [Color; 4] = [Color::RED, Color::GREEN, Color::BLUE, Color::WHITE];

#[derive(Clone, Debug)]
pub struct SceneOptions {
    pub panels: usize,
    pub blocks_per_panel: usize,
    pub spinners: bool,
    /// Adds a label to every panel
    pub label_font: Option<FontInfo>,
}

pub struct Scene {
    pub root: WidgetRef,
    pub panels: Vec<InvalidationPanel>,
}

/// Paint types of the last frame, counted over all panels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PanelCounts {
    pub cached: usize,
    pub recached: usize,
    pub passthrough: usize,
}

impl Scene {
    pub fn build(config: &TesselConfig, options: &SceneOptions, fonts: &Arc<FontServices>) -> Self {
        let mut panels = Vec::with_capacity(options.panels);
        let mut children = Vec::with_capacity(options.panels);

        for panel_index in 0..options.panels {
            let mut content: Vec<WidgetRef> = (0..options.blocks_per_panel)
                .map(|block| {
                    let color = PALETTE[(panel_index + block) % PALETTE.len()];
                    let width = 40.0 + 8.0 * (block % 5) as f32;
                    WidgetNode::new(ColorBlock::new(Vec2::new(width, 12.0), color))
                })
                .collect();
            if options.spinners {
                content.push(WidgetNode::new(Spinner::new(Vec2::splat(12.0), Color::WHITE, 1.0)));
            }
            if let Some(font) = &options.label_font {
                let label = Label::new(format!("panel {panel_index}"), font.clone(), Color::WHITE)
                    .with_services(fonts.clone());
                content.push(WidgetNode::new(label));
            }

            let panel = config.panel.panel();
            children.push(WidgetNode::with_children(
                panel.clone(),
                vec![WidgetNode::with_children(VerticalStack::new(2.0), content)],
            ));
            panels.push(panel);
        }

        Self {
            root: WidgetNode::with_children(VerticalStack::new(8.0), children),
            panels,
        }
    }

    pub fn panel_counts(&self) -> PanelCounts {
        let mut counts = PanelCounts::default();
        for panel in &self.panels {
            match panel.last_paint_type() {
                Some(PaintType::Cached) => counts.cached += 1,
                Some(PaintType::Recached) => counts.recached += 1,
                Some(PaintType::Passthrough) => counts.passthrough += 1,
                None => {}
            }
        }
        counts
    }
}
