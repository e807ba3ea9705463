//! Frame pipeline
//!
//! ```text
//!  UI thread                                   render thread
//!  ─────────                                   ─────────────
//!  begin font frame
//!  prepass ─► tick/paint ─► deferred paints
//!  freeze draw layers
//!  WindowElementList + cache jobs ─(channel)─► run cache jobs
//!                                              batch elements
//!                                              custom drawers
//!           ◄──(spent element list, reports)── backend.render
//! ```
//!
//! The UI thread hands the painted element list over by value and never
//! touches it again; two or more lists circulate between the threads. The
//! render thread owns the [`ElementBatcher`] and is bound to the font cache
//! as its render context, so glyph atlas lookups made while batching use
//! the render slots of character entries. Panels recorded during paint are
//! batched there too, ahead of the frame that first draws them.
//!
//! An atlas flush due at frame start waits for the render thread to go idle
//! first, then every cached panel re-records.

use crate::config::TesselConfig;
use crate::error::{AppError, Result};
use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use tessel_core::{Geometry, LayoutTransform, Rect, Vec2};
use tessel_gpu::{BatchContent, BatchData, BatchStats, CacheJob, ElementBatcher, ElementCacher, ResolvedDraw, ResourceTable};
use tessel_paint::{HittestGrid, InvalidationPanel, PaintArgs, WidgetId, WidgetRef, WindowElementList};
use tessel_text::{FontFrameChanges, FontServices};

/// Consumer of finished frames on the render thread
pub trait RenderBackend: Send + 'static {
    /// Draw one frame; `draws` is in final order with cached buffers and
    /// draw layers expanded
    fn render(&mut self, frame: u64, draws: &[ResolvedDraw<'_>]);
}

/// Backend that draws nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl RenderBackend for NullBackend {
    fn render(&mut self, _frame: u64, _draws: &[ResolvedDraw<'_>]) {}
}

/// What the UI thread produced for a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSummary {
    pub frame: u64,
    /// Highest layer id painted
    pub max_layer: i32,
    /// Root elements in the window list
    pub elements: usize,
    /// Panels recorded this frame, batched by the render thread
    pub cache_jobs: usize,
    pub fonts: FontFrameChanges,
}

/// What the render thread drew for a frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    pub draws: usize,
    pub custom_draws: usize,
    pub vertices: usize,
    pub indices: usize,
    pub requires_vsync: bool,
    /// Counters of the frame's own batching pass
    pub stats: BatchStats,
}

struct RenderFrame {
    number: u64,
    elements: WindowElementList,
    cache_jobs: Vec<CacheJob>,
}

enum RenderCommand {
    Draw(RenderFrame),
    /// Answered once every earlier frame is drawn
    Flush(Sender<()>),
}

struct RenderThread {
    commands: Option<SyncSender<RenderCommand>>,
    reports: Receiver<FrameReport>,
    recycled: Receiver<WindowElementList>,
    handle: Option<JoinHandle<()>>,
}

impl RenderThread {
    fn spawn(
        frames_in_flight: usize,
        mut batcher: ElementBatcher,
        fonts: Arc<FontServices>,
        mut backend: impl RenderBackend,
    ) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::sync_channel::<RenderCommand>(frames_in_flight);
        let (report_tx, report_rx) = mpsc::channel();
        let (recycle_tx, recycle_rx) = mpsc::channel();

        let handle = std::thread::Builder::new()
            .name("tessel-render".to_string())
            .spawn(move || {
                fonts.bind_render_thread();
                tracing::debug!("render thread started");
                let mut data = BatchData::new();
                while let Ok(command) = command_rx.recv() {
                    match command {
                        RenderCommand::Draw(frame) => {
                            let RenderFrame {
                                number,
                                elements,
                                cache_jobs,
                            } = frame;
                            for job in cache_jobs {
                                job.run(&mut batcher);
                            }
                            data.clear();
                            batcher.batch_frame(&elements, &mut data);
                            tracing::debug!(frame = number, stats = %data.stats, "frame batched");

                            let report = render_frame(&mut backend, number, &data);
                            if report_tx.send(report).is_err() {
                                break;
                            }
                            let _ = recycle_tx.send(elements);
                        }
                        RenderCommand::Flush(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
                tracing::debug!("render thread exiting");
            })?;

        Ok(Self {
            commands: Some(command_tx),
            reports: report_rx,
            recycled: recycle_rx,
            handle: Some(handle),
        })
    }

    fn send(&self, command: RenderCommand) -> Result<()> {
        let commands = self.commands.as_ref().ok_or(AppError::RenderThreadStopped)?;
        commands.send(command).map_err(|_| AppError::RenderThreadStopped)
    }

    fn wait_idle(&self) -> Result<()> {
        let (ack_tx, ack_rx) = mpsc::channel();
        self.send(RenderCommand::Flush(ack_tx))?;
        ack_rx.recv().map_err(|_| AppError::RenderThreadStopped)
    }

    fn join(&mut self) -> Result<()> {
        self.commands = None;
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| AppError::RenderThreadPanicked),
            None => Ok(()),
        }
    }
}

fn render_frame(backend: &mut impl RenderBackend, number: u64, data: &BatchData) -> FrameReport {
    let draws = data.resolve_draws();
    let mut report = FrameReport {
        frame: number,
        draws: draws.len(),
        requires_vsync: data.requires_vsync,
        stats: data.stats,
        ..FrameReport::default()
    };
    for draw in &draws {
        match &draw.batch.content {
            BatchContent::Custom { drawer, clip_rect } => {
                drawer.draw_render_thread(clip_rect);
                report.custom_draws += 1;
            }
            _ => {
                report.vertices += draw.vertices().len();
                report.indices += draw.indices().len();
            }
        }
    }
    backend.render(number, &draws);
    tracing::trace!(frame = number, draws = report.draws, "frame rendered");
    report
}

/// Drives widget trees through paint and hands the element lists to the
/// render thread for batching
pub struct FrameRenderer {
    fonts: Arc<FontServices>,
    resources: Arc<ResourceTable>,
    cacher: Arc<ElementCacher>,
    hittest: Arc<Mutex<HittestGrid>>,
    fused_tick_and_paint: bool,
    frame: u64,
    render: RenderThread,
}

impl FrameRenderer {
    pub fn new(config: &TesselConfig, fonts: Arc<FontServices>, backend: impl RenderBackend) -> Result<Self> {
        let resources = Arc::new(ResourceTable::new());
        let batcher = ElementBatcher::new(config.batcher_config(), resources.clone()).with_fonts(fonts.clone());
        let render = RenderThread::spawn(config.frame.frames_in_flight, batcher, fonts.clone(), backend)?;

        Ok(Self {
            fonts,
            resources,
            cacher: Arc::new(ElementCacher::new()),
            hittest: Arc::new(Mutex::new(HittestGrid::new())),
            fused_tick_and_paint: config.frame.fused_tick_and_paint,
            frame: 0,
            render,
        })
    }

    pub fn fonts(&self) -> &Arc<FontServices> {
        &self.fonts
    }

    /// Brush resources; register textures here before painting with them
    pub fn resources(&self) -> &Arc<ResourceTable> {
        &self.resources
    }

    /// Frames drawn so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Paint `root` for one frame and hand the element list to the render
    /// thread
    ///
    /// Blocks while the render thread is `frames_in_flight` frames behind.
    pub fn draw_window(
        &mut self,
        root: &WidgetRef,
        window_size: Vec2,
        current_time: f64,
        delta_time: f32,
    ) -> Result<FrameSummary> {
        self.frame += 1;
        let render = &self.render;
        let fonts = self.fonts.begin_frame_with(|| match render.wait_idle() {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "font atlas flush postponed");
                false
            }
        });
        if fonts.invalidates_cached_text() {
            // Cached glyph quads point at atlas slots or fonts that moved on
            InvalidationPanel::invalidate_all_panels();
        }

        root.slate_prepass(1.0);
        let mut elements = self
            .render
            .recycled
            .try_recv()
            .unwrap_or_else(|_| WindowElementList::new(window_size));
        elements.reset();
        elements.set_window_size(window_size);
        self.hittest.lock().clear();

        let geometry = Geometry::make_root(window_size, LayoutTransform::IDENTITY);
        let clip = Rect::from_position_size(Vec2::ZERO, window_size);
        let args = PaintArgs::new(current_time, delta_time)
            .with_cacher(self.cacher.clone())
            .with_hittest(self.hittest.clone());

        let max_layer = if self.fused_tick_and_paint {
            root.tick_and_paint(&args, &geometry, &clip, &mut elements, 0)
        } else {
            root.tick_widgets(&geometry, current_time, delta_time);
            root.paint_widgets(&args, &geometry, &clip, &mut elements, 0)
        };
        let max_layer = elements.paint_deferred(max_layer);
        elements.freeze_draw_layers();

        let cache_jobs = self.cacher.take_jobs();
        let summary = FrameSummary {
            frame: self.frame,
            max_layer,
            elements: elements.element_count(),
            cache_jobs: cache_jobs.len(),
            fonts,
        };
        tracing::debug!(frame = self.frame, max_layer, cache_jobs = cache_jobs.len(), "frame painted");

        self.render.send(RenderCommand::Draw(RenderFrame {
            number: self.frame,
            elements,
            cache_jobs,
        }))?;
        Ok(summary)
    }

    /// Widgets under `point` from the last frame, innermost first
    pub fn hit_test(&self, point: Vec2) -> Vec<WidgetId> {
        self.hittest.lock().hit_test(point)
    }

    /// Block until the render thread drew every submitted frame
    pub fn wait_idle(&self) -> Result<()> {
        self.render.wait_idle()
    }

    /// Reports of frames drawn since the last call
    pub fn take_reports(&self) -> Vec<FrameReport> {
        self.render.reports.try_iter().collect()
    }

    /// Stop the render thread and return the reports not taken yet
    pub fn shutdown(mut self) -> Result<Vec<FrameReport>> {
        self.render.join()?;
        Ok(self.take_reports())
    }
}

impl Drop for FrameRenderer {
    fn drop(&mut self) {
        if let Err(err) = self.render.join() {
            tracing::error!(error = %err, "render thread did not shut down cleanly");
        }
    }
}

impl std::fmt::Debug for FrameRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRenderer")
            .field("frame", &self.frame)
            .field("fused_tick_and_paint", &self.fused_tick_and_paint)
            .field("cacher", &self.cacher)
            .finish_non_exhaustive()
    }
}
