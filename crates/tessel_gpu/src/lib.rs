//! Tessel GPU batching
//!
//! Everything between painted draw elements and the GPU upload.
//!
//! # Features
//!
//! - **Batching**: elements sharing texture, shader and render state merge into one draw call
//! - **Boxes**: stretched, tiled, mirrored and nine-slice images, rotated about a pivot
//! - **Text**: glyph quads sampled from the font atlas, for plain and pre-shaped text
//! - **Lines**: antialiased line strips and splines with mitered joins
//! - **Caching**: recorded subtrees batch once and replay as cached buffers
//!
//! The crate does not talk to a graphics API. [`BatchData`] is the upload
//! payload: one bulk vertex buffer, one bulk index buffer and the draw list
//! that slices them.

pub mod batch;
pub mod batcher;
pub mod cacher;
pub mod resources;
pub mod shader;
pub mod stats;
pub mod vertex;

pub use batch::{BatchContent, BatchData, BatchKey, RenderBatch, ResolvedDraw, ScissorRect};
pub use batcher::{line_intersect, BatcherConfig, ElementBatcher};
pub use cacher::{CacheJob, CachedBatch, ElementCacher};
pub use resources::{font_atlas_texture, ResourceManager, ResourceProxy, ResourceTable};
pub use shader::{BatchDrawFlags, DrawPrimitive, ShaderParams, ShaderType};
pub use stats::BatchStats;
pub use vertex::{BatchIndex, BatchVertex};

use thiserror::Error;

/// Batching errors
///
/// Batching skips the offending element and keeps going; these are what
/// gets logged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    #[error("{kind} element has no {what}")]
    MissingPayload {
        kind: &'static str,
        what: &'static str,
    },

    #[error("Index {index} out of range for {count} vertices")]
    IndexOutOfRange { index: u32, count: usize },
}

pub type Result<T> = std::result::Result<T, BatchError>;
