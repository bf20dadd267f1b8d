//! Per-tick chunk index: which entities occupy which chunk.
//!
//! Rebuilt every tick. The coordinator clears it before destroy-observers;
//! the movement and creation phases register entities; render reads it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use meridian_core::{ChunkGrid, ChunkLocation};
use parking_lot::RwLock;

use super::Entity;

/// Chunk to occupants map.
#[derive(Debug, Default)]
pub struct Occupancy {
    cells: RwLock<HashMap<ChunkLocation, Vec<Arc<Entity>>>>,
}

impl Occupancy {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `entity` in every chunk its bounding volume spans.
    pub fn insert(&self, entity: &Arc<Entity>) {
        let chunks = entity.chunks();
        let mut cells = self.cells.write();
        for location in &chunks {
            cells.entry(location).or_default().push(Arc::clone(entity));
        }
    }

    /// Forgets everything.
    pub fn clear(&self) {
        self.cells.write().clear();
    }

    /// Entities occupying any chunk of `grid`, each once, by identifier.
    #[must_use]
    pub fn visible(&self, grid: &ChunkGrid) -> Vec<Arc<Entity>> {
        let cells = self.cells.read();
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        // Small grids are cheaper to walk; big ones cheaper to filter.
        if grid.len() <= cells.len() {
            for location in grid {
                for entity in cells.get(&location).into_iter().flatten() {
                    if seen.insert(entity.id()) {
                        found.push(Arc::clone(entity));
                    }
                }
            }
        } else {
            for (location, occupants) in cells.iter() {
                if !grid.contains(*location) {
                    continue;
                }
                for entity in occupants {
                    if seen.insert(entity.id()) {
                        found.push(Arc::clone(entity));
                    }
                }
            }
        }

        found
    }

    /// Occupied chunks.
    #[must_use]
    pub fn chunks(&self) -> usize {
        self.cells.read().len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.read().is_empty()
    }
}
