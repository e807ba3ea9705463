//! Hit-test grid
//!
//! Widgets register their geometry while painting. The grid buckets entries
//! into fixed-size cells by render bounds; a query checks the cell under the
//! point, newest (topmost) entry first, against the rotated render rect.

use crate::widget::WidgetId;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tessel_core::{Geometry, Vec2};

/// Cell edge length in window units
pub const HITTEST_CELL_SIZE: f32 = 128.0;

#[derive(Clone, Debug, PartialEq)]
pub struct HittestEntry {
    pub widget: WidgetId,
    pub geometry: Geometry,
    /// Index of the enclosing hit-testable widget
    pub parent: Option<usize>,
}

/// Spatial index of the widgets painted this frame
#[derive(Debug, Default)]
pub struct HittestGrid {
    cells: FxHashMap<(i32, i32), SmallVec<[usize; 8]>>,
    entries: Vec<HittestEntry>,
}

impl HittestGrid {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell_of(point: Vec2) -> (i32, i32) {
        (
            (point.x / HITTEST_CELL_SIZE).floor() as i32,
            (point.y / HITTEST_CELL_SIZE).floor() as i32,
        )
    }

    /// Register a widget; returns its index for use as a child's parent
    pub fn insert(&mut self, widget: WidgetId, geometry: Geometry, parent: Option<usize>) -> usize {
        let index = self.entries.len();
        let bounds = geometry.render_bounding_rect();
        self.entries.push(HittestEntry {
            widget,
            geometry,
            parent,
        });
        if !bounds.is_valid() {
            return index;
        }

        let (min_x, min_y) = Self::cell_of(bounds.top_left());
        let (max_x, max_y) = Self::cell_of(bounds.bottom_right());
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                self.cells.entry((x, y)).or_default().push(index);
            }
        }
        index
    }

    /// Widgets under `point`, the topmost hit first followed by its
    /// hit-testable ancestors
    pub fn hit_test(&self, point: Vec2) -> Vec<WidgetId> {
        let Some(cell) = self.cells.get(&Self::cell_of(point)) else {
            return Vec::new();
        };
        let Some(&hit) = cell
            .iter()
            .rev()
            .find(|&&index| self.entries[index].geometry.is_under_location(point))
        else {
            return Vec::new();
        };

        let mut path = Vec::new();
        let mut next = Some(hit);
        while let Some(index) = next {
            let entry = &self.entries[index];
            path.push(entry.widget);
            next = entry.parent;
        }
        path
    }

    pub fn entries(&self) -> &[HittestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.entries.clear();
    }
}
