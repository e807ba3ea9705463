//! Brushes
//!
//! A brush describes how an image resource is drawn: as a plain image, as a
//! 9-slice box, or as a border, with optional tiling and mirroring.

use serde::{Deserialize, Serialize};
use tessel_core::{Color, Margin, Vec2};

/// Opaque id of a renderer-side resource (texture, material)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ResourceHandle(pub u64);

impl ResourceHandle {
    pub const NONE: ResourceHandle = ResourceHandle(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// How a brush lays its image over the element
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BrushDrawType {
    /// Draws nothing
    NoDrawType,
    /// 9-slice: corners keep their size, edges and center stretch
    Box,
    /// Like box, without the center
    Border,
    /// Stretched image
    #[default]
    Image,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BrushTiling {
    #[default]
    NoTile,
    Horizontal,
    Vertical,
    Both,
}

impl BrushTiling {
    pub fn tiles_u(self) -> bool {
        matches!(self, BrushTiling::Horizontal | BrushTiling::Both)
    }

    pub fn tiles_v(self) -> bool {
        matches!(self, BrushTiling::Vertical | BrushTiling::Both)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BrushMirroring {
    #[default]
    NoMirror,
    Horizontal,
    Vertical,
    Both,
}

impl BrushMirroring {
    pub fn flips_u(self) -> bool {
        matches!(self, BrushMirroring::Horizontal | BrushMirroring::Both)
    }

    pub fn flips_v(self) -> bool {
        matches!(self, BrushMirroring::Vertical | BrushMirroring::Both)
    }
}

/// Image + draw style
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Brush {
    #[serde(default)]
    pub draw_as: BrushDrawType,
    #[serde(default)]
    pub tiling: BrushTiling,
    #[serde(default)]
    pub mirroring: BrushMirroring,
    /// 9-slice margins in UV fractions of the image
    #[serde(default)]
    pub margin: Margin,
    #[serde(default)]
    pub tint: Color,
    /// Name resolved through the resource manager; `None` draws untextured
    #[serde(default)]
    pub resource_name: Option<String>,
    /// Size of the source image in slate units
    #[serde(default)]
    pub image_size: Vec2,
    /// Set once the resource manager resolved `resource_name`
    #[serde(skip)]
    pub resource: Option<ResourceHandle>,
}

impl Default for Brush {
    fn default() -> Self {
        Self {
            draw_as: BrushDrawType::Image,
            tiling: BrushTiling::NoTile,
            mirroring: BrushMirroring::NoMirror,
            margin: Margin::ZERO,
            tint: Color::WHITE,
            resource_name: None,
            image_size: Vec2::new(32.0, 32.0),
            resource: None,
        }
    }
}

impl Brush {
    /// Brush drawing `resource_name` as a stretched image
    pub fn image(resource_name: impl Into<String>, image_size: Vec2) -> Self {
        Self {
            resource_name: Some(resource_name.into()),
            image_size,
            ..Self::default()
        }
    }

    /// Untextured brush; the element tint gives the color
    pub fn solid() -> Self {
        Self::default()
    }

    /// 9-slice box brush
    pub fn boxed(resource_name: impl Into<String>, image_size: Vec2, margin: Margin) -> Self {
        Self {
            draw_as: BrushDrawType::Box,
            margin,
            ..Self::image(resource_name, image_size)
        }
    }

    /// Border brush (9-slice without the center)
    pub fn border(resource_name: impl Into<String>, image_size: Vec2, margin: Margin) -> Self {
        Self {
            draw_as: BrushDrawType::Border,
            margin,
            ..Self::image(resource_name, image_size)
        }
    }

    pub fn with_tiling(mut self, tiling: BrushTiling) -> Self {
        self.tiling = tiling;
        self
    }

    pub fn with_mirroring(mut self, mirroring: BrushMirroring) -> Self {
        self.mirroring = mirroring;
        self
    }

    pub fn with_tint(mut self, tint: Color) -> Self {
        self.tint = tint;
        self
    }

    pub fn with_resource(mut self, resource: ResourceHandle) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn draws_nothing(&self) -> bool {
        self.draw_as == BrushDrawType::NoDrawType
    }

    pub fn has_resource(&self) -> bool {
        self.resource_name.is_some() || self.resource.is_some()
    }

    /// Whether the brush builds a 9-slice mesh rather than a single quad
    pub fn is_nine_slice(&self) -> bool {
        self.draw_as != BrushDrawType::Image && !self.margin.is_zero()
    }
}
