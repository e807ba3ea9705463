//! Batching for cached subtrees
//!
//! Invalidation panels hand their recorded element lists to a
//! [`RenderDataCacher`] while painting. Batching belongs to the render
//! thread, so [`ElementCacher`] only snapshots the recording into a
//! [`CacheJob`] and returns a [`CachedBatch`] whose data is filled when the
//! job runs. The frame pipeline ships pending jobs with the frame that first
//! references them and the render thread runs them before batching it.

use crate::batch::BatchData;
use crate::batcher::ElementBatcher;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::{Arc, OnceLock};
use tessel_paint::{CachedRenderData, RenderDataCacher, WindowElementList};

/// Cached render data batched on the render thread
///
/// Empty until its [`CacheJob`] ran.
#[derive(Debug, Default)]
pub struct CachedBatch {
    data: Arc<OnceLock<BatchData>>,
}

impl CachedBatch {
    /// The batched elements, once the job ran
    pub fn data(&self) -> Option<&BatchData> {
        self.data.get()
    }

    pub fn is_ready(&self) -> bool {
        self.data.get().is_some()
    }
}

impl CachedRenderData for CachedBatch {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn memory_bytes(&self) -> usize {
        self.data().map(BatchData::buffer_bytes).unwrap_or(0)
    }
}

/// A recorded element list waiting to be batched
pub struct CacheJob {
    elements: WindowElementList,
    target: Arc<OnceLock<BatchData>>,
}

impl CacheJob {
    /// Batch the recording and publish it to its [`CachedBatch`]
    pub fn run(self, batcher: &mut ElementBatcher) {
        let mut data = BatchData::new();
        batcher.add_cached_elements(&self.elements);
        batcher.fill_batch_buffers(&mut data);
        tracing::debug!(
            batches = data.render_batches.len(),
            vertices = data.vertices.len(),
            "batched cached elements"
        );
        if self.target.set(data).is_err() {
            tracing::warn!("cache job ran twice; keeping the first result");
        }
    }

    pub fn element_count(&self) -> usize {
        self.elements.element_count()
    }
}

impl std::fmt::Debug for CacheJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheJob")
            .field("elements", &self.element_count())
            .field("done", &self.target.get().is_some())
            .finish()
    }
}

/// Queues recorded element lists for batching on the render thread
#[derive(Default)]
pub struct ElementCacher {
    pending: Mutex<Vec<CacheJob>>,
}

impl ElementCacher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs queued since the last call, in recording order
    pub fn take_jobs(&self) -> Vec<CacheJob> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub fn pending_jobs(&self) -> usize {
        self.pending.lock().len()
    }

    /// Run every queued job with `batcher`; returns how many ran
    pub fn run_pending(&self, batcher: &mut ElementBatcher) -> usize {
        let jobs = self.take_jobs();
        let count = jobs.len();
        for job in jobs {
            job.run(batcher);
        }
        count
    }
}

impl RenderDataCacher for ElementCacher {
    fn cache_elements(&self, elements: &WindowElementList) -> Box<dyn CachedRenderData> {
        let target = Arc::new(OnceLock::new());
        self.pending.lock().push(CacheJob {
            elements: elements.snapshot(),
            target: target.clone(),
        });
        Box::new(CachedBatch { data: target })
    }
}

impl std::fmt::Debug for ElementCacher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementCacher")
            .field("pending_jobs", &self.pending_jobs())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchContent;
    use crate::batcher::test_support::batcher;
    use std::sync::Weak;
    use tessel_core::{Color, Geometry, LayoutTransform, Rect, Vec2};
    use tessel_paint::{Brush, CacheOwner, DrawLayerHandle, ElementPlacement};

    fn placement() -> ElementPlacement {
        let geometry = Geometry::make_root(Vec2::new(100.0, 100.0), LayoutTransform::IDENTITY)
            .make_child_at(Vec2::new(10.0, 10.0), Vec2::new(20.0, 20.0));
        ElementPlacement::new(0, geometry.to_paint_geometry(), Rect::new(0.0, 0.0, 100.0, 100.0))
    }

    fn owner() -> Weak<dyn CacheOwner> {
        Weak::<NoopOwner>::new()
    }

    #[test]
    fn test_cached_data_fills_when_job_runs() {
        let mut list = WindowElementList::new(Vec2::new(100.0, 100.0));
        list.add_box(placement(), &Brush::solid(), Color::WHITE);
        list.add_box(placement(), &Brush::solid(), Color::RED);

        let cacher = ElementCacher::new();
        let handle = list.cache_render_data(&cacher, owner());
        let cached = handle.data_as::<CachedBatch>().expect("cached batch");
        assert!(!cached.is_ready());
        assert_eq!(handle.data().memory_bytes(), 0);
        assert_eq!(cacher.pending_jobs(), 1);

        // The recording may be reused for the next frame before the job runs
        list.reset();
        assert_eq!(cacher.run_pending(&mut batcher()), 1);

        let data = cached.data().expect("batched");
        assert_eq!(data.render_batches.len(), 1);
        assert_eq!(data.vertices.len(), 8);
        assert_eq!(data.stats.elements, 2);
        assert!(handle.data().memory_bytes() > 0);
        assert_eq!(cacher.pending_jobs(), 0);
    }

    #[test]
    fn test_cached_layers_stay_references() {
        let mut list = WindowElementList::new(Vec2::new(100.0, 100.0));
        let layer = DrawLayerHandle::new();
        list.add_layer(3, Rect::new(0.0, 0.0, 100.0, 100.0), layer.clone());

        let cacher = ElementCacher::new();
        let cached = cacher.cache_elements(&list);
        for job in cacher.take_jobs() {
            job.run(&mut batcher());
        }
        let data = cached
            .as_any()
            .downcast_ref::<CachedBatch>()
            .and_then(CachedBatch::data)
            .expect("batched");
        assert!(data.layer_batches.is_empty());
        assert!(matches!(data.render_batches[0].content, BatchContent::Layer(id) if id == layer.id()));
    }

    struct NoopOwner;

    impl CacheOwner for NoopOwner {
        fn invalidate_cache(&self) {}
    }
}
