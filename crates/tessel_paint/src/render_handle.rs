//! Cached render data handles
//!
//! An invalidation panel hands its recorded element list to a
//! [`RenderDataCacher`] (the batcher) and keeps the returned
//! [`CachedRenderHandle`]. The same handle is referenced from the window's
//! element list every frame the cache is replayed, so it is shared: the panel
//! owns one reference, each in-flight frame another.
//!
//! The handle points back at its panel weakly. The panel owns the handle; a
//! strong back reference would keep both alive forever.

use crate::element_list::WindowElementList;
use crate::layer::DrawLayerHandle;
use std::any::Any;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Renderer-specific compiled form of an element list
pub trait CachedRenderData: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Approximate memory held, for statistics
    fn memory_bytes(&self) -> usize {
        0
    }
}

/// Compiles element lists into [`CachedRenderData`]
pub trait RenderDataCacher: Send + Sync {
    fn cache_elements(&self, elements: &WindowElementList) -> Box<dyn CachedRenderData>;
}

/// The producer of a cached handle
pub trait CacheOwner: Send + Sync {
    /// Drop the cache; the next paint records again
    fn invalidate_cache(&self);
}

struct NoOwner;

impl CacheOwner for NoOwner {
    fn invalidate_cache(&self) {}
}

/// Shared snapshot of a subtree's render batches
pub struct CachedRenderHandle {
    id: u64,
    owner: Weak<dyn CacheOwner>,
    data: Box<dyn CachedRenderData>,
    /// Draw layers referenced by layer markers inside the cached data
    layers: Vec<DrawLayerHandle>,
    users: AtomicU32,
}

impl CachedRenderHandle {
    pub fn new(
        data: Box<dyn CachedRenderData>,
        layers: Vec<DrawLayerHandle>,
        owner: Weak<dyn CacheOwner>,
    ) -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            owner,
            data,
            layers,
            users: AtomicU32::new(0),
        }
    }

    /// Handle with no owning panel
    pub fn detached(data: Box<dyn CachedRenderData>, layers: Vec<DrawLayerHandle>) -> Self {
        let owner: Weak<dyn CacheOwner> = Weak::<NoOwner>::new();
        Self::new(data, layers, owner)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn data(&self) -> &dyn CachedRenderData {
        self.data.as_ref()
    }

    /// The cached data as the renderer's concrete type
    pub fn data_as<T: 'static>(&self) -> Option<&T> {
        self.data.as_any().downcast_ref::<T>()
    }

    pub fn layers(&self) -> &[DrawLayerHandle] {
        &self.layers
    }

    /// The owning panel, while it is alive
    pub fn owner(&self) -> Option<Arc<dyn CacheOwner>> {
        self.owner.upgrade()
    }

    /// Ask the owner to re-record, e.g. after the renderer lost the data;
    /// false when the owner is gone
    pub fn invalidate_owner(&self) -> bool {
        match self.owner.upgrade() {
            Some(owner) => {
                owner.invalidate_cache();
                true
            }
            None => false,
        }
    }

    /// The renderer starts drawing from this handle
    pub fn begin_using(&self) {
        self.users.fetch_add(1, Ordering::AcqRel);
    }

    /// The renderer is done with this handle for one frame
    pub fn end_using(&self) {
        let previous = self
            .users
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if previous.is_err() {
            tracing::error!(handle = self.id, "end_using without matching begin_using");
            debug_assert!(false, "end_using without matching begin_using");
        }
    }

    pub fn is_in_use(&self) -> bool {
        self.users.load(Ordering::Acquire) > 0
    }
}

impl std::fmt::Debug for CachedRenderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedRenderHandle")
            .field("id", &self.id)
            .field("layers", &self.layers.len())
            .field("users", &self.users.load(Ordering::Relaxed))
            .field("memory_bytes", &self.data.memory_bytes())
            .finish()
    }
}
