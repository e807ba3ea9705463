//! Basic widgets
//!
//! A handful of [`Paintable`]s covering the common paint shapes: a brush
//! filled block, a text label, a vertical stack and a spinning (volatile)
//! indicator.
//!
//! # Example
//!
//! ```ignore
//! use tessel_paint::widgets::{ColorBlock, Spinner, VerticalStack};
//! use tessel_paint::{InvalidationPanel, WidgetNode};
//!
//! let panel = InvalidationPanel::new();
//! let root = WidgetNode::with_children(panel.clone(), vec![
//!     WidgetNode::with_children(VerticalStack::new(4.0), vec![
//!         WidgetNode::new(ColorBlock::new(Vec2::new(120.0, 24.0), Color::BLUE)),
//!         WidgetNode::new(Spinner::new(Vec2::splat(16.0), Color::WHITE, 1.0)),
//!     ]),
//! ]);
//! ```

use crate::brush::Brush;
use crate::element::RotationSpace;
use crate::element_list::WindowElementList;
use crate::widget::{ArrangedChild, PaintContext, Paintable, Visibility};
use std::sync::Arc;
use tessel_core::{Color, Geometry, Vec2};
use tessel_text::{FontInfo, FontServices};

/// Fixed-size block painted with a brush
#[derive(Clone, Debug)]
pub struct ColorBlock {
    pub size: Vec2,
    pub brush: Brush,
    pub color: Color,
    pub visibility: Visibility,
}

impl ColorBlock {
    pub fn new(size: Vec2, color: Color) -> Self {
        Self {
            size,
            brush: Brush::solid(),
            color,
            visibility: Visibility::Visible,
        }
    }

    pub fn with_brush(mut self, brush: Brush) -> Self {
        self.brush = brush;
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

impl Paintable for ColorBlock {
    fn desired_size(&self, _children_desired: &[Vec2], _layout_scale_multiplier: f32) -> Vec2 {
        self.size
    }

    fn paint(&self, cx: &PaintContext<'_>, out: &mut WindowElementList) -> i32 {
        out.add_box(cx.placement(cx.layer), &self.brush, self.color);
        if cx.children().is_empty() {
            return cx.layer;
        }
        cx.paint_children(out, cx.layer + 1)
    }

    fn visibility(&self) -> Visibility {
        self.visibility
    }

    fn name(&self) -> &str {
        "color_block"
    }
}

/// Single line of text
#[derive(Clone, Debug)]
pub struct Label {
    pub text: String,
    pub font: FontInfo,
    pub color: Color,
    /// Used to measure; without it the label estimates half an em per char
    services: Option<Arc<FontServices>>,
}

impl Label {
    pub fn new(text: impl Into<String>, font: FontInfo, color: Color) -> Self {
        Self {
            text: text.into(),
            font,
            color,
            services: None,
        }
    }

    pub fn with_services(mut self, services: Arc<FontServices>) -> Self {
        self.services = Some(services);
        self
    }
}

impl Paintable for Label {
    fn desired_size(&self, _children_desired: &[Vec2], layout_scale_multiplier: f32) -> Vec2 {
        let height = self.font.pixel_size(1.0);
        let width = match &self.services {
            Some(services) => services.measure(&self.text, &self.font, layout_scale_multiplier),
            None => self.text.chars().count() as f32 * height * 0.5,
        };
        Vec2::new(width, height)
    }

    fn paint(&self, cx: &PaintContext<'_>, out: &mut WindowElementList) -> i32 {
        out.add_text(cx.placement(cx.layer), self.text.as_str(), &self.font, self.color);
        cx.layer
    }

    fn name(&self) -> &str {
        "label"
    }
}

/// Children laid out top to bottom at their desired size
#[derive(Clone, Debug, Default)]
pub struct VerticalStack {
    pub spacing: f32,
}

impl VerticalStack {
    pub fn new(spacing: f32) -> Self {
        Self { spacing }
    }
}

impl Paintable for VerticalStack {
    fn desired_size(&self, children_desired: &[Vec2], _layout_scale_multiplier: f32) -> Vec2 {
        let gaps = children_desired.len().saturating_sub(1) as f32 * self.spacing;
        children_desired
            .iter()
            .fold(Vec2::new(0.0, gaps), |acc, size| Vec2::new(acc.x.max(size.x), acc.y + size.y))
    }

    fn arrange_children(&self, _geometry: &Geometry, children_desired: &[Vec2], out: &mut Vec<ArrangedChild>) {
        let mut y = 0.0;
        for (index, size) in children_desired.iter().enumerate() {
            out.push(ArrangedChild::new(index, Vec2::new(0.0, y), *size));
            y += size.y + self.spacing;
        }
    }

    fn name(&self) -> &str {
        "vertical_stack"
    }
}

/// Rotating square; repaints every frame
#[derive(Clone, Debug)]
pub struct Spinner {
    pub size: Vec2,
    pub color: Color,
    /// Seconds per revolution
    pub period: f64,
    angle: f32,
}

impl Spinner {
    pub fn new(size: Vec2, color: Color, period: f64) -> Self {
        Self {
            size,
            color,
            period,
            angle: 0.0,
        }
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }
}

impl Paintable for Spinner {
    fn desired_size(&self, _children_desired: &[Vec2], _layout_scale_multiplier: f32) -> Vec2 {
        self.size
    }

    fn paint(&self, cx: &PaintContext<'_>, out: &mut WindowElementList) -> i32 {
        out.add_rotated_box(
            cx.placement(cx.layer),
            &Brush::solid(),
            self.color,
            self.angle,
            None,
            RotationSpace::RelativeToElement,
        );
        cx.layer
    }

    fn tick(&mut self, _geometry: &Geometry, current_time: f64, _delta_time: f32) {
        if self.period > 0.0 {
            let turns = (current_time / self.period).fract() as f32;
            self.angle = turns * std::f32::consts::TAU;
        }
    }

    fn compute_volatility(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "spinner"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::WidgetNode;
    use tessel_core::{LayoutTransform, Rect};

    #[test]
    fn test_vertical_stack_layout() {
        let stack = WidgetNode::with_children(
            VerticalStack::new(2.0),
            vec![
                WidgetNode::new(ColorBlock::new(Vec2::new(10.0, 5.0), Color::RED)),
                WidgetNode::new(ColorBlock::new(Vec2::new(30.0, 7.0), Color::RED).with_visibility(Visibility::Collapsed)),
                WidgetNode::new(ColorBlock::new(Vec2::new(20.0, 8.0), Color::RED)),
            ],
        );
        stack.slate_prepass(1.0);
        // Collapsed children take no space but still count a gap
        assert_eq!(stack.desired_size(), Vec2::new(20.0, 17.0));

        let geometry = Geometry::make_root(Vec2::new(100.0, 100.0), LayoutTransform::IDENTITY);
        let arranged = stack.arrange(&geometry);
        assert_eq!(arranged.len(), 2);
        assert_eq!(arranged[1].1.absolute_position(), Vec2::new(0.0, 9.0));
    }

    #[test]
    fn test_spinner_angle_follows_time() {
        let mut spinner = Spinner::new(Vec2::splat(8.0), Color::WHITE, 2.0);
        let geometry = Geometry::make_root(Vec2::splat(8.0), LayoutTransform::IDENTITY);
        spinner.tick(&geometry, 0.5, 0.0);
        assert!((spinner.angle() - std::f32::consts::FRAC_PI_2).abs() < 1.0e-5);
        spinner.tick(&geometry, 2.5, 0.0);
        assert!((spinner.angle() - std::f32::consts::FRAC_PI_2).abs() < 1.0e-5);
    }

    #[test]
    fn test_hidden_block_paints_nothing() {
        let node = WidgetNode::new(ColorBlock::new(Vec2::splat(10.0), Color::RED).with_visibility(Visibility::Hidden));
        node.slate_prepass(1.0);
        assert_eq!(node.desired_size(), Vec2::splat(10.0));

        let geometry = Geometry::make_root(Vec2::splat(50.0), LayoutTransform::IDENTITY);
        let mut out = WindowElementList::new(Vec2::splat(50.0));
        node.paint_widgets(&Default::default(), &geometry, &Rect::new(0.0, 0.0, 50.0, 50.0), &mut out, 0);
        assert!(out.is_empty());
    }
}
