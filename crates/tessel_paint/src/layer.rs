//! Paint layers
//!
//! [`ElementLayers`] buckets draw elements by layer id. Ids are sparse and
//! iterate in ascending order; higher ids paint later.
//!
//! A [`DrawLayerHandle`] is a shared, separately filled set of layers. A
//! layer-marker element references one, and whoever batches the marker
//! batches the handle's current contents at that position. Volatile widgets
//! inside a cached subtree repaint into such handles every frame.

use crate::element::DrawElement;
use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_DRAW_LAYER_ID: AtomicU64 = AtomicU64::new(1);

/// Elements grouped by layer id
#[derive(Clone, Default)]
pub struct ElementLayers {
    layers: BTreeMap<i32, Vec<DrawElement>>,
}

impl ElementLayers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, element: DrawElement) {
        self.layers.entry(element.layer).or_default().push(element);
    }

    /// Non-empty layers in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (i32, &[DrawElement])> + '_ {
        self.layers
            .iter()
            .filter(|(_, elements)| !elements.is_empty())
            .map(|(id, elements)| (*id, elements.as_slice()))
    }

    pub fn layer(&self, id: i32) -> &[DrawElement] {
        self.layers.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn layer_count(&self) -> usize {
        self.iter().count()
    }

    pub fn element_count(&self) -> usize {
        self.layers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.element_count() == 0
    }

    pub fn max_layer(&self) -> Option<i32> {
        self.iter().map(|(id, _)| id).last()
    }

    /// Empty every layer, keeping the allocations of layers used since the
    /// previous clear
    pub fn clear(&mut self) {
        self.layers.retain(|_, elements| !elements.is_empty());
        for elements in self.layers.values_mut() {
            elements.clear();
        }
    }
}

impl std::fmt::Debug for ElementLayers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(id, elements)| (id, elements.len())))
            .finish()
    }
}

/// Identity of a [`DrawLayerHandle`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawLayerId(u64);

/// Shared layer contents referenced by a layer-marker element
#[derive(Clone)]
pub struct DrawLayerHandle {
    id: DrawLayerId,
    contents: Arc<Mutex<ElementLayers>>,
}

impl DrawLayerHandle {
    pub fn new() -> Self {
        Self {
            id: DrawLayerId(NEXT_DRAW_LAYER_ID.fetch_add(1, Ordering::Relaxed)),
            contents: Arc::new(Mutex::new(ElementLayers::new())),
        }
    }

    pub fn id(&self) -> DrawLayerId {
        self.id
    }

    pub fn lock(&self) -> MutexGuard<'_, ElementLayers> {
        self.contents.lock()
    }

    pub fn element_count(&self) -> usize {
        self.contents.lock().element_count()
    }
}

impl Default for DrawLayerHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for DrawLayerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DrawLayerHandle {}

impl std::fmt::Debug for DrawLayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DrawLayerHandle").field(&self.id.0).finish()
    }
}
