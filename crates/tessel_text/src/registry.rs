//! System font discovery
//!
//! Wraps fontdb to find a face by family name. Used to supply a last-resort
//! font when the application did not embed one. The full system scan is
//! deferred until a lookup misses the fonts loaded explicitly.

use crate::composite::FontData;
use crate::font::{FontBulkData, FontLoadingPolicy};
use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Font registry backed by fontdb
pub struct FontRegistry {
    db: Database,
    /// Lookups by family name (Some = found, None = not found)
    found: FxHashMap<String, Option<FontData>>,
    system_fonts_loaded: bool,
}

impl FontRegistry {
    /// Empty registry; system fonts are scanned on the first miss
    pub fn new() -> Self {
        Self {
            db: Database::new(),
            found: FxHashMap::default(),
            system_fonts_loaded: false,
        }
    }

    /// Registry that never scans the system, only fonts added with
    /// [`load_font_data`](Self::load_font_data)
    pub fn without_system_fonts() -> Self {
        Self {
            system_fonts_loaded: true,
            ..Self::new()
        }
    }

    /// Add font file bytes; returns the number of faces found in them
    pub fn load_font_data(&mut self, data: Vec<u8>) -> usize {
        let before = self.db.len();
        self.db.load_font_data(data);
        let loaded = self.db.len() - before;
        if loaded > 0 {
            tracing::debug!(loaded, "loaded font faces from data");
            // Earlier misses may now resolve
            self.found.retain(|_, v| v.is_some());
        }
        loaded
    }

    fn ensure_system_fonts_loaded(&mut self) {
        if self.system_fonts_loaded {
            return;
        }
        tracing::debug!("scanning system fonts");
        self.db.load_system_fonts();
        self.system_fonts_loaded = true;
        tracing::debug!(faces = self.db.len(), "system fonts loaded");
    }

    fn query(&self, family: &str) -> Option<fontdb::ID> {
        self.db.query(&Query {
            families: &[Family::Name(family)],
            weight: Weight::NORMAL,
            style: Style::Normal,
            stretch: Stretch::Normal,
        })
    }

    /// Regular face of `family`, loaded as pre-loaded bulk data
    pub fn find_family(&mut self, family: &str) -> Option<FontData> {
        if let Some(cached) = self.found.get(family) {
            return cached.clone();
        }

        let id = match self.query(family) {
            Some(id) => Some(id),
            None if !self.system_fonts_loaded => {
                self.ensure_system_fonts_loaded();
                self.query(family)
            }
            None => None,
        };

        let data = id.and_then(|id| {
            self.db
                .with_face_data(id, |bytes, index| (bytes.to_vec(), index))
                .map(|(bytes, index)| {
                    FontData::from_bulk(family, Arc::new(FontBulkData::new(bytes)))
                        .with_face_index(index)
                        .with_loading_policy(FontLoadingPolicy::PreLoad)
                })
        });

        match &data {
            Some(_) => tracing::debug!(family, "found system font"),
            None => tracing::warn!(family, "system font not found"),
        }
        self.found.insert(family.to_string(), data.clone());
        data
    }

    /// Family names known to the registry, sorted and deduplicated
    pub fn families(&mut self) -> Vec<String> {
        self.ensure_system_fonts_loaded();
        let mut families: Vec<String> = self
            .db
            .faces()
            .filter_map(|face| face.families.first().map(|(name, _)| name.clone()))
            .collect();
        families.sort();
        families.dedup();
        families
    }
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FontRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontRegistry")
            .field("faces", &self.db.len())
            .field("system_fonts_loaded", &self.system_fonts_loaded)
            .finish()
    }
}
