//! Batching statistics

use std::fmt;

/// Counters for one batching pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Distinct layer ids seen
    pub layers: usize,
    pub batches: usize,
    pub elements: usize,
    pub vertices: usize,
    pub indices: usize,
    /// Elements dropped for an invalid or all-zero clip rect
    pub clipped: usize,
    /// Elements dropped because their scissor rect missed the clip rect
    pub scissor_rejected: usize,
    /// Elements dropped for a fully transparent tint
    pub transparent_skipped: usize,
    /// Bytes copied into the bulk vertex and index buffers
    pub memory_bytes: usize,
}

impl BatchStats {
    /// Fold another pass into this one; `layers` keeps the maximum
    pub fn accumulate(&mut self, other: &BatchStats) {
        self.layers = self.layers.max(other.layers);
        self.batches += other.batches;
        self.elements += other.elements;
        self.vertices += other.vertices;
        self.indices += other.indices;
        self.clipped += other.clipped;
        self.scissor_rejected += other.scissor_rejected;
        self.transparent_skipped += other.transparent_skipped;
        self.memory_bytes += other.memory_bytes;
    }

    pub fn skipped(&self) -> usize {
        self.clipped + self.scissor_rejected + self.transparent_skipped
    }
}

impl fmt::Display for BatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "layers={} batches={} elements={} vertices={} indices={} clipped={} scissored={} transparent={} bytes={}",
            self.layers,
            self.batches,
            self.elements,
            self.vertices,
            self.indices,
            self.clipped,
            self.scissor_rejected,
            self.transparent_skipped,
            self.memory_bytes,
        )
    }
}
