//! Tessel configuration file handling
//!
//! All settings live in one TOML file, usually `tessel.toml`:
//!
//! ```toml
//! log_filter = "tessel=debug"
//!
//! [fonts]
//! atlas_page_size = 1024
//! last_resort_family = "DejaVu Sans"
//!
//! [batching]
//! max_pooled_arrays = 128
//!
//! [panel]
//! cache_relative_transforms = true
//! ```
//!
//! Every key is optional.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tessel_gpu::BatcherConfig;
use tessel_paint::InvalidationPanel;
use tessel_text::{FallbackFonts, FontCacheConfig, FontRegistry, FontServices};

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "tessel.toml";

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TesselConfig {
    /// `tracing` filter directives; `RUST_LOG` wins when set
    #[serde(default)]
    pub log_filter: Option<String>,
    #[serde(default)]
    pub fonts: FontsConfig,
    #[serde(default)]
    pub batching: BatchingConfig,
    #[serde(default)]
    pub panel: PanelConfig,
    #[serde(default)]
    pub frame: FrameConfig,
}

/// Font cache settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FontsConfig {
    /// Width and height of each atlas page in pixels
    #[serde(default = "default_atlas_page_size")]
    pub atlas_page_size: u32,
    /// Atlas pages allowed before the cache flushes at a frame start
    #[serde(default = "default_max_atlas_pages")]
    pub max_atlas_pages_before_flush: usize,
    /// Shaped sequences kept in the LRU
    #[serde(default = "default_shaped_cache_capacity")]
    pub shaped_cache_capacity: usize,
    #[serde(default = "default_culture")]
    pub default_culture: String,
    /// System family used when no other font has a glyph
    #[serde(default)]
    pub last_resort_family: Option<String>,
}

fn default_atlas_page_size() -> u32 {
    1024
}

fn default_max_atlas_pages() -> usize {
    4
}

fn default_shaped_cache_capacity() -> usize {
    256
}

fn default_culture() -> String {
    "en".to_string()
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            atlas_page_size: default_atlas_page_size(),
            max_atlas_pages_before_flush: default_max_atlas_pages(),
            shaped_cache_capacity: default_shaped_cache_capacity(),
            default_culture: default_culture(),
            last_resort_family: None,
        }
    }
}

/// Element batcher settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BatchingConfig {
    #[serde(default = "default_vertex_reserve")]
    pub vertex_reserve: usize,
    #[serde(default = "default_index_reserve")]
    pub index_reserve: usize,
    /// Per-batch arrays kept in the pools between frames
    #[serde(default = "default_max_pooled_arrays")]
    pub max_pooled_arrays: usize,
    #[serde(default)]
    pub pixel_center_offset: f32,
}

fn default_vertex_reserve() -> usize {
    200
}

fn default_index_reserve() -> usize {
    500
}

fn default_max_pooled_arrays() -> usize {
    256
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            vertex_reserve: default_vertex_reserve(),
            index_reserve: default_index_reserve(),
            max_pooled_arrays: default_max_pooled_arrays(),
            pixel_center_offset: 0.0,
        }
    }
}

/// Defaults applied to invalidation panels
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PanelConfig {
    /// Panels record and replay; off makes every panel paint through
    #[serde(default = "default_true")]
    pub enable_caching: bool,
    /// Moves replay the cache with an offset instead of re-recording
    #[serde(default)]
    pub cache_relative_transforms: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            enable_caching: true,
            cache_relative_transforms: false,
        }
    }
}

impl PanelConfig {
    pub fn apply(&self, panel: &InvalidationPanel) {
        panel.set_can_cache(self.enable_caching);
        panel.set_cache_relative_transforms(self.cache_relative_transforms);
    }

    /// New panel with these settings
    pub fn panel(&self) -> InvalidationPanel {
        let panel = InvalidationPanel::new();
        self.apply(&panel);
        panel
    }
}

/// Frame pipeline settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FrameConfig {
    /// Tick while painting instead of a separate tick traversal
    #[serde(default = "default_true")]
    pub fused_tick_and_paint: bool,
    /// Frames queued for the render thread before the UI thread blocks
    #[serde(default = "default_frames_in_flight")]
    pub frames_in_flight: usize,
}

fn default_frames_in_flight() -> usize {
    2
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            fused_tick_and_paint: true,
            frames_in_flight: default_frames_in_flight(),
        }
    }
}

impl TesselConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Load `tessel.toml` from `dir`, or the defaults when there is none
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::load(&path)
        } else {
            tracing::debug!(dir = %dir.display(), "no {CONFIG_FILE_NAME}, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TesselConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml_string()?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        if self.fonts.atlas_page_size == 0 || !self.fonts.atlas_page_size.is_power_of_two() {
            anyhow::bail!(
                "fonts.atlas_page_size must be a power of two, got {}",
                self.fonts.atlas_page_size
            );
        }
        if self.fonts.max_atlas_pages_before_flush == 0 {
            anyhow::bail!("fonts.max_atlas_pages_before_flush must be at least 1");
        }
        if self.frame.frames_in_flight == 0 {
            anyhow::bail!("frame.frames_in_flight must be at least 1");
        }
        Ok(())
    }

    pub fn font_cache_config(&self) -> FontCacheConfig {
        FontCacheConfig {
            atlas_page_size: self.fonts.atlas_page_size,
            max_atlas_pages_before_flush: self.fonts.max_atlas_pages_before_flush,
            shaped_cache_capacity: self.fonts.shaped_cache_capacity,
            default_culture: self.fonts.default_culture.clone(),
        }
    }

    pub fn batcher_config(&self) -> BatcherConfig {
        BatcherConfig {
            vertex_reserve: self.batching.vertex_reserve,
            index_reserve: self.batching.index_reserve,
            max_pooled_arrays: self.batching.max_pooled_arrays,
            pixel_center_offset: self.batching.pixel_center_offset,
        }
    }

    /// Font services with `fallback`, filling the last-resort font from the
    /// configured system family
    pub fn font_services(&self, fallback: FallbackFonts) -> FontServices {
        match &self.fonts.last_resort_family {
            Some(family) => FontServices::with_system_last_resort(
                self.font_cache_config(),
                fallback,
                &mut FontRegistry::new(),
                family,
            ),
            None => FontServices::new(self.font_cache_config(), fallback),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = TesselConfig::from_toml_str("").unwrap();
        assert_eq!(config, TesselConfig::default());
        assert_eq!(config.fonts.atlas_page_size, 1024);
        assert_eq!(config.batching.max_pooled_arrays, 256);
        assert!(config.panel.enable_caching);
        assert!(config.frame.fused_tick_and_paint);
    }

    #[test]
    fn test_partial_sections() {
        let config = TesselConfig::from_toml_str(
            r#"
            log_filter = "tessel=debug"

            [fonts]
            atlas_page_size = 512
            default_culture = "ja"

            [panel]
            cache_relative_transforms = true
            "#,
        )
        .unwrap();

        assert_eq!(config.log_filter.as_deref(), Some("tessel=debug"));
        assert_eq!(config.fonts.atlas_page_size, 512);
        assert_eq!(config.fonts.max_atlas_pages_before_flush, 4);
        assert!(config.panel.cache_relative_transforms);
        assert!(config.panel.enable_caching);

        let fonts = config.font_cache_config();
        assert_eq!(fonts.atlas_page_size, 512);
        assert_eq!(fonts.default_culture, "ja");
    }

    #[test]
    fn test_rejects_bad_page_size() {
        let err = TesselConfig::from_toml_str("[fonts]\natlas_page_size = 1000\n").unwrap_err();
        assert!(err.to_string().contains("power of two"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("tessel-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let mut config = TesselConfig::default();
        config.batching.vertex_reserve = 64;
        config.frame.frames_in_flight = 3;
        config.save(&dir.join(CONFIG_FILE_NAME)).unwrap();

        let loaded = TesselConfig::load_from_dir(&dir).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.batcher_config().vertex_reserve, 64);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_dir_config_is_default() {
        let dir = std::env::temp_dir().join("tessel-config-missing-dir");
        assert_eq!(TesselConfig::load_from_dir(&dir).unwrap(), TesselConfig::default());
    }

    #[test]
    fn test_panel_settings_apply() {
        let config = PanelConfig {
            enable_caching: false,
            cache_relative_transforms: true,
        };
        assert!(!config.panel().can_cache());
    }
}
