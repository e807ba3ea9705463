//! Resource manager seam
//!
//! The batcher never touches textures. It asks a [`ResourceManager`] where a
//! brush's image lives (which texture, which sub-rectangle when atlased) and
//! keys batches by the returned texture handle.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tessel_core::Vec2;
use tessel_paint::{Brush, ResourceHandle};

/// Font atlas pages use handles above this base, one per page
pub const FONT_ATLAS_HANDLE_BASE: u64 = 1 << 62;

/// Texture handle of font atlas page `page`
pub fn font_atlas_texture(page: u32) -> ResourceHandle {
    ResourceHandle(FONT_ATLAS_HANDLE_BASE | page as u64)
}

/// Where a brush's image lives
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResourceProxy {
    /// Texture to bind; for atlased images this is the atlas
    pub texture: ResourceHandle,
    /// Top-left of the image inside the texture
    pub start_uv: Vec2,
    /// Extent of the image inside the texture
    pub size_uv: Vec2,
    /// Image size in pixels (not the atlas size)
    pub actual_size: Vec2,
    /// Single channel image
    pub alpha_only: bool,
}

impl ResourceProxy {
    /// A whole, non-atlased texture
    pub fn texture(texture: ResourceHandle, actual_size: Vec2) -> Self {
        Self {
            texture,
            start_uv: Vec2::ZERO,
            size_uv: Vec2::ONE,
            actual_size,
            alpha_only: false,
        }
    }

    /// A sub-rectangle of an atlas page
    pub fn atlased(texture: ResourceHandle, start_uv: Vec2, size_uv: Vec2, actual_size: Vec2) -> Self {
        Self {
            texture,
            start_uv,
            size_uv,
            actual_size,
            alpha_only: false,
        }
    }
}

/// Resolves brushes to textures
pub trait ResourceManager: Send + Sync {
    /// `None` draws the brush untextured
    fn shader_resource(&self, brush: &Brush) -> Option<ResourceProxy>;

    /// Proxy for a texture referenced by handle, e.g. a viewport target
    fn texture(&self, handle: ResourceHandle) -> Option<ResourceProxy>;
}

/// Name-keyed resource table
///
/// Brushes resolve by their resolved handle first, then by resource name.
#[derive(Debug, Default)]
pub struct ResourceTable {
    by_name: RwLock<FxHashMap<String, ResourceProxy>>,
    by_handle: RwLock<FxHashMap<ResourceHandle, ResourceProxy>>,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, proxy: ResourceProxy) {
        self.by_handle.write().insert(proxy.texture, proxy);
        self.by_name.write().insert(name.into(), proxy);
    }

    pub fn unregister(&self, name: &str) -> Option<ResourceProxy> {
        self.by_name.write().remove(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.read().is_empty()
    }
}

impl ResourceManager for ResourceTable {
    fn shader_resource(&self, brush: &Brush) -> Option<ResourceProxy> {
        if let Some(handle) = brush.resource.filter(|h| h.is_valid()) {
            if let Some(proxy) = self.by_handle.read().get(&handle) {
                return Some(*proxy);
            }
        }
        let name = brush.resource_name.as_deref()?;
        let proxy = self.by_name.read().get(name).copied();
        if proxy.is_none() {
            tracing::debug!(resource = name, "brush resource not found, drawing untextured");
        }
        proxy
    }

    fn texture(&self, handle: ResourceHandle) -> Option<ResourceProxy> {
        self.by_handle.read().get(&handle).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_by_name_and_handle() {
        let table = ResourceTable::new();
        let proxy = ResourceProxy::atlased(
            ResourceHandle(9),
            Vec2::new(0.5, 0.0),
            Vec2::new(0.25, 0.25),
            Vec2::new(32.0, 32.0),
        );
        table.register("button", proxy);

        let named = Brush::image("button", Vec2::splat(32.0));
        assert_eq!(table.shader_resource(&named), Some(proxy));

        let by_handle = Brush::solid().with_resource(ResourceHandle(9));
        assert_eq!(table.shader_resource(&by_handle), Some(proxy));

        assert_eq!(table.shader_resource(&Brush::solid()), None);
        assert_eq!(table.shader_resource(&Brush::image("missing", Vec2::ONE)), None);
    }

    #[test]
    fn test_font_pages_do_not_collide() {
        assert_ne!(font_atlas_texture(0), font_atlas_texture(1));
        assert!(font_atlas_texture(0).0 >= FONT_ATLAS_HANDLE_BASE);
    }
}
