//! Shader selection state
//!
//! The enums and flags here, together with the bound texture and scissor
//! rect, form the state a batch is drawn with. Two elements can share a batch
//! only when all of it matches.

use bitflags::bitflags;

/// Shader programs (must match shader constants)
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ShaderType {
    /// Textured or untextured quads and gradients
    #[default]
    Default = 0,
    /// Tiled 9-slice border without a center
    Border = 1,
    /// Reads only the alpha channel of its texture
    Font = 2,
    /// Prefiltered antialiased line segments
    LineSegment = 3,
    /// Caller-provided geometry
    Custom = 4,
}

/// Primitive topology
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DrawPrimitive {
    LineList = 0,
    #[default]
    TriangleList = 1,
}

bitflags! {
    /// Render state switches carried by a batch
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct BatchDrawFlags: u16 {
        const NONE = 0;
        const NO_BLENDING = 1 << 0;
        const PRE_MULTIPLIED_ALPHA = 1 << 1;
        const NO_GAMMA = 1 << 2;
        const WIREFRAME = 1 << 3;
        /// Wrap addressing on u
        const TILE_U = 1 << 4;
        /// Wrap addressing on v
        const TILE_V = 1 << 5;
        const REQUIRES_VSYNC = 1 << 6;
    }
}

/// Per-batch pixel shader constants
///
/// Compared and hashed by bit pattern so the value can key a batch map.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShaderParams {
    pub pixel_params: [f32; 4],
}

impl ShaderParams {
    pub const NONE: ShaderParams = ShaderParams {
        pixel_params: [0.0; 4],
    };

    pub fn pixel(pixel_params: [f32; 4]) -> Self {
        Self { pixel_params }
    }

    fn bits(&self) -> [u32; 4] {
        self.pixel_params.map(f32::to_bits)
    }
}

impl PartialEq for ShaderParams {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for ShaderParams {}

impl std::hash::Hash for ShaderParams {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}
