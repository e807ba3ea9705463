//! Tessel Application Layer
//!
//! Wires the core crates into a frame loop: configuration, logging and the
//! [`FrameRenderer`] that paints a widget tree and hands the element list to
//! a render thread that batches and draws it.
//!
//! # Example
//!
//! ```ignore
//! use tessel_app::prelude::*;
//!
//! let config = TesselConfig::load_from_dir(Path::new("."))?;
//! tessel_app::logging::init(config.log_filter.as_deref())?;
//!
//! let fonts = Arc::new(config.font_services(FallbackFonts::default()));
//! let mut renderer = FrameRenderer::new(&config, fonts, NullBackend)?;
//!
//! let panel = config.panel.panel();
//! let root = WidgetNode::with_children(panel, vec![
//!     WidgetNode::new(ColorBlock::new(Vec2::new(120.0, 24.0), Color::BLUE)),
//! ]);
//! renderer.draw_window(&root, Vec2::new(800.0, 600.0), 0.0, 0.016)?;
//! ```

pub mod config;
pub mod error;
pub mod frame;
pub mod logging;

pub use config::{BatchingConfig, FontsConfig, FrameConfig, PanelConfig, TesselConfig, CONFIG_FILE_NAME};
pub use error::{AppError, Result};
pub use frame::{FrameRenderer, FrameReport, FrameSummary, NullBackend, RenderBackend};

/// Prelude module - import everything commonly needed
pub mod prelude {
    pub use crate::config::TesselConfig;
    pub use crate::error::{AppError, Result};
    pub use crate::frame::{FrameRenderer, FrameReport, FrameSummary, NullBackend, RenderBackend};

    pub use tessel_core::{Color, Geometry, LayoutTransform, Rect, Vec2};
    pub use tessel_gpu::{BatchData, BatchStats, ResolvedDraw};
    pub use tessel_paint::widgets::{ColorBlock, Label, Spinner, VerticalStack};
    pub use tessel_paint::{InvalidationPanel, Paintable, PaintType, WidgetNode, WidgetRef};
    pub use tessel_text::{FallbackFonts, FontServices};
}
