//! Glyph atlas management
//!
//! Glyph bitmaps are packed into fixed-size pages. Each page is a binary tree
//! of rects: inserting splits the remaining free space into two children
//! along the axis that leaves the larger leftover. When no page can take a
//! glyph a new page is added, and once the page count passes the configured
//! limit the atlas asks for a flush.

use crate::{Result, TextError};
use std::thread::ThreadId;

/// Region in an atlas page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasRegion {
    /// X position in atlas (pixels)
    pub x: u32,
    /// Y position in atlas (pixels)
    pub y: u32,
    /// Width in atlas (pixels)
    pub width: u32,
    /// Height in atlas (pixels)
    pub height: u32,
}

impl AtlasRegion {
    /// Get UV coordinates for this region given atlas dimensions
    pub fn uv_bounds(&self, atlas_width: u32, atlas_height: u32) -> [f32; 4] {
        let u_min = self.x as f32 / atlas_width as f32;
        let v_min = self.y as f32 / atlas_height as f32;
        let u_max = (self.x + self.width) as f32 / atlas_width as f32;
        let v_max = (self.y + self.height) as f32 / atlas_height as f32;
        [u_min, v_min, u_max, v_max]
    }
}

#[derive(Debug, Clone)]
struct AtlasNode {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    /// Indices of the two children once split
    children: Option<[usize; 2]>,
    occupied: bool,
}

impl AtlasNode {
    fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            children: None,
            occupied: false,
        }
    }
}

/// One fixed-size, single channel atlas page
pub struct TextureAtlas {
    width: u32,
    height: u32,
    /// Padding between glyphs
    padding: u32,
    nodes: Vec<AtlasNode>,
    pixels: Vec<u8>,
    /// Whether atlas data has been modified since last upload
    dirty: bool,
    used_area: u64,
}

impl TextureAtlas {
    pub fn new(width: u32, height: u32, padding: u32) -> Self {
        Self {
            width,
            height,
            padding,
            nodes: vec![AtlasNode::new(0, 0, width, height)],
            pixels: vec![0; (width * height) as usize],
            dirty: true,
            used_area: 0,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark atlas as clean (after GPU upload)
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Fraction of the page covered by allocated rects (padding included)
    pub fn utilization(&self) -> f32 {
        self.used_area as f32 / (self.width as u64 * self.height as u64) as f32
    }

    /// Reserve a padded rect; returns the unpadded region
    fn allocate(&mut self, width: u32, height: u32) -> Option<AtlasRegion> {
        let padded_w = width + self.padding * 2;
        let padded_h = height + self.padding * 2;
        let node = self.insert(0, padded_w, padded_h)?;
        let n = &self.nodes[node];
        self.used_area += padded_w as u64 * padded_h as u64;
        Some(AtlasRegion {
            x: n.x + self.padding,
            y: n.y + self.padding,
            width,
            height,
        })
    }

    fn insert(&mut self, index: usize, width: u32, height: u32) -> Option<usize> {
        if let Some([left, right]) = self.nodes[index].children {
            return self
                .insert(left, width, height)
                .or_else(|| self.insert(right, width, height));
        }

        let node = self.nodes[index].clone();
        if node.occupied || width > node.width || height > node.height {
            return None;
        }

        if width == node.width && height == node.height {
            self.nodes[index].occupied = true;
            return Some(index);
        }

        // Split along the axis with more leftover space, so the first child
        // matches the request exactly in one dimension
        let dw = node.width - width;
        let dh = node.height - height;
        let (first, second) = if dw > dh {
            (
                AtlasNode::new(node.x, node.y, width, node.height),
                AtlasNode::new(node.x + width, node.y, dw, node.height),
            )
        } else {
            (
                AtlasNode::new(node.x, node.y, node.width, height),
                AtlasNode::new(node.x, node.y + height, node.width, dh),
            )
        };

        let first_index = self.nodes.len();
        self.nodes.push(first);
        self.nodes.push(second);
        self.nodes[index].children = Some([first_index, first_index + 1]);

        self.insert(first_index, width, height)
    }

    /// Copy a glyph bitmap into the page; `None` when it does not fit
    pub fn add_bitmap(&mut self, width: u32, height: u32, bitmap: &[u8]) -> Option<AtlasRegion> {
        let region = self.allocate(width, height)?;

        for y in 0..height {
            let src_offset = (y * width) as usize;
            let dst_offset = ((region.y + y) * self.width + region.x) as usize;
            let row_end = src_offset + width as usize;

            if row_end <= bitmap.len() && dst_offset + width as usize <= self.pixels.len() {
                self.pixels[dst_offset..dst_offset + width as usize]
                    .copy_from_slice(&bitmap[src_offset..row_end]);
            }
        }

        self.dirty = true;
        Some(region)
    }
}

impl std::fmt::Debug for TextureAtlas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureAtlas")
            .field("dimensions", &(self.width, self.height))
            .field("nodes", &self.nodes.len())
            .field(
                "utilization",
                &format!("{:.1}%", self.utilization() * 100.0),
            )
            .field("dirty", &self.dirty)
            .finish()
    }
}

/// Set of atlas pages owned by a single thread
pub struct FontAtlas {
    pages: Vec<TextureAtlas>,
    page_size: u32,
    padding: u32,
    max_pages_before_flush: usize,
    needs_flush: bool,
    owner_thread: Option<ThreadId>,
}

impl FontAtlas {
    pub fn new(page_size: u32, max_pages_before_flush: usize) -> Self {
        Self {
            pages: Vec::new(),
            page_size,
            padding: 1,
            max_pages_before_flush,
            needs_flush: false,
            owner_thread: None,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn pages(&self) -> &[TextureAtlas] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Option<&TextureAtlas> {
        self.pages.get(index)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Thread that first touched the atlas since the last flush
    pub fn owner_thread(&self) -> Option<ThreadId> {
        self.owner_thread
    }

    /// Too many pages have been created; the owner should flush soon
    pub fn needs_flush(&self) -> bool {
        self.needs_flush
    }

    /// The first thread to touch the atlas owns it until the next flush
    pub fn check_owner_thread(&mut self) -> Result<()> {
        let current = std::thread::current().id();
        match self.owner_thread {
            None => {
                self.owner_thread = Some(current);
                Ok(())
            }
            Some(owner) if owner == current => Ok(()),
            Some(owner) => {
                tracing::error!(?owner, ?current, "font atlas touched from a non-owner thread");
                Err(TextError::WrongThread)
            }
        }
    }

    /// Place a bitmap into the first page with room, adding a page if none has
    pub fn insert(&mut self, width: u32, height: u32, bitmap: &[u8]) -> Result<(usize, AtlasRegion)> {
        self.check_owner_thread()?;

        let padded = |v: u32| v + self.padding * 2;
        if padded(width) > self.page_size || padded(height) > self.page_size {
            return Err(TextError::GlyphTooLarge {
                width,
                height,
                page_size: self.page_size,
            });
        }

        for (index, page) in self.pages.iter_mut().enumerate() {
            if let Some(region) = page.add_bitmap(width, height, bitmap) {
                return Ok((index, region));
            }
        }

        let mut page = TextureAtlas::new(self.page_size, self.page_size, self.padding);
        let region = page
            .add_bitmap(width, height, bitmap)
            .ok_or(TextError::GlyphTooLarge {
                width,
                height,
                page_size: self.page_size,
            })?;
        self.pages.push(page);
        let index = self.pages.len() - 1;

        tracing::debug!(pages = self.pages.len(), "added font atlas page");
        if self.pages.len() > self.max_pages_before_flush && !self.needs_flush {
            tracing::warn!(
                pages = self.pages.len(),
                limit = self.max_pages_before_flush,
                "too many font atlas pages, requesting flush"
            );
            self.needs_flush = true;
        }

        Ok((index, region))
    }

    /// Drop every page and release thread ownership
    pub fn flush(&mut self) {
        self.pages.clear();
        self.needs_flush = false;
        self.owner_thread = None;
    }
}

impl std::fmt::Debug for FontAtlas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontAtlas")
            .field("pages", &self.pages.len())
            .field("page_size", &self.page_size)
            .field("needs_flush", &self.needs_flush)
            .finish()
    }
}
