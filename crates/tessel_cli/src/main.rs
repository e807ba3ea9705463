//! Tessel CLI
//!
//! Drive synthetic widget trees through the frame pipeline and print
//! batching statistics.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessel_app::{FrameRenderer, NullBackend, TesselConfig, CONFIG_FILE_NAME};
use tessel_core::Vec2;
use tessel_text::{CompositeFont, FallbackFonts, FontInfo, FontRegistry, Typeface};
use tracing::{info, warn};

mod scene;

use scene::{Scene, SceneOptions};

#[derive(Parser)]
#[command(name = "tessel")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tessel UI core CLI", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ./tessel.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Paint a synthetic widget tree for a number of frames
    Run {
        /// Frames to draw
        #[arg(short, long, default_value = "10")]
        frames: u64,

        /// Window width
        #[arg(long, default_value = "800")]
        width: f32,

        /// Window height
        #[arg(long, default_value = "600")]
        height: f32,

        /// Invalidation panels in the tree
        #[arg(long, default_value = "4")]
        panels: usize,

        /// Blocks inside each panel
        #[arg(long, default_value = "8")]
        blocks: usize,

        /// Leave out the volatile spinners
        #[arg(long)]
        no_spinners: bool,

        /// System font family for a label in each panel
        #[arg(long)]
        font: Option<String>,

        /// Invalidate one panel every N frames (0 = never)
        #[arg(long, default_value = "0")]
        invalidate_every: u64,
    },

    /// Print the effective configuration
    Config {
        /// Write a default tessel.toml to the current directory instead
        #[arg(long)]
        init: bool,
    },

    /// List system font families
    Fonts,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TesselConfig::load(path)?,
        None => TesselConfig::load_from_dir(Path::new("."))?,
    };

    let filter = if cli.verbose {
        Some("tessel=debug")
    } else {
        config.log_filter.as_deref()
    };
    tessel_app::logging::init(filter)?;

    match cli.command {
        Commands::Run {
            frames,
            width,
            height,
            panels,
            blocks,
            no_spinners,
            font,
            invalidate_every,
        } => {
            let options = RunOptions {
                frames,
                window_size: Vec2::new(width, height),
                invalidate_every,
            };
            let scene = SceneOptions {
                panels,
                blocks_per_panel: blocks,
                spinners: !no_spinners,
                label_font: font.as_deref().and_then(load_font),
            };
            cmd_run(&config, &options, &scene)
        }

        Commands::Config { init } => cmd_config(&config, init),

        Commands::Fonts => cmd_fonts(),
    }
}

struct RunOptions {
    frames: u64,
    window_size: Vec2,
    invalidate_every: u64,
}

fn load_font(family: &str) -> Option<FontInfo> {
    let mut registry = FontRegistry::new();
    match registry.find_family(family) {
        Some(data) => Some(FontInfo::new(Arc::new(CompositeFont::new(Typeface::single(data))), 12.0)),
        None => {
            warn!("Font family '{}' not found, running without labels", family);
            None
        }
    }
}

fn cmd_run(config: &TesselConfig, options: &RunOptions, scene_options: &SceneOptions) -> Result<()> {
    let fonts = Arc::new(config.font_services(FallbackFonts::default()));
    let scene = Scene::build(config, scene_options, &fonts);
    let mut renderer = FrameRenderer::new(config, fonts, NullBackend).context("Failed to start the renderer")?;

    info!(
        "Running {} frames of {} panels at {}x{}",
        options.frames, scene_options.panels, options.window_size.x, options.window_size.y
    );

    let mut summaries = Vec::with_capacity(options.frames as usize);
    for frame in 0..options.frames {
        if options.invalidate_every > 0 && frame > 0 && frame % options.invalidate_every == 0 {
            if let Some(panel) = scene.panels.get((frame / options.invalidate_every) as usize % scene.panels.len().max(1)) {
                panel.invalidate();
            }
        }
        let time = frame as f64 / 60.0;
        let summary = renderer.draw_window(&scene.root, options.window_size, time, 1.0 / 60.0)?;
        summaries.push((summary, scene.panel_counts()));
    }

    let reports = renderer.shutdown()?;

    println!(
        "{:>6} {:>7} {:>9} {:>6} {:>5} {:>8} {:>6} {:>9} {:>8}",
        "frame", "cached", "recached", "layer", "jobs", "batches", "draws", "vertices", "indices"
    );
    for ((summary, counts), report) in summaries.iter().zip(&reports) {
        println!(
            "{:>6} {:>7} {:>9} {:>6} {:>5} {:>8} {:>6} {:>9} {:>8}",
            summary.frame,
            counts.cached,
            counts.recached,
            summary.max_layer,
            summary.cache_jobs,
            report.stats.batches,
            report.draws,
            report.vertices,
            report.indices,
        );
    }

    if let Some(last) = reports.last() {
        println!();
        println!("Last frame: {}", last.stats);
    }
    Ok(())
}

fn cmd_config(config: &TesselConfig, init: bool) -> Result<()> {
    if init {
        let path = Path::new(CONFIG_FILE_NAME);
        if path.exists() {
            anyhow::bail!("{} already exists", path.display());
        }
        TesselConfig::default().save(path)?;
        info!("Wrote {}", path.display());
        return Ok(());
    }

    print!("{}", config.to_toml_string()?);
    Ok(())
}

fn cmd_fonts() -> Result<()> {
    let families = FontRegistry::new().families();
    if families.is_empty() {
        println!("No system fonts found");
        return Ok(());
    }
    for family in families {
        println!("{family}");
    }
    Ok(())
}
