//! # Chunk Locations and Grids
//!
//! The world is split horizontally into 16x16 chunks. Visibility is decided
//! at chunk granularity: an observer sees the chunks inside a square grid
//! around its own chunk, and an entity occupies every chunk its bounding
//! volume spans.
//!
//! ```text
//!   z
//!   ▲   ┌───┬───┬───┐ max (cx+d, cz+d)
//!   │   │   │   │   │
//!   │   ├───┼───┼───┤
//!   │   │   │ C │   │     around(C, 1): 9 cells
//!   │   ├───┼───┼───┤
//!   │   │   │   │   │
//!   │   └───┴───┴───┘
//!   │ min (cx-d, cz-d)
//!   └──────────────────► x
//! ```

use std::iter::FusedIterator;

use crate::math::{BoundingBox, Vec3};

/// Chunk width/depth in world units.
pub const CHUNK_WIDTH: i32 = 16;

/// Chunk coordinate (identifies a chunk in the world grid).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkLocation {
    /// X coordinate (in chunks, not units).
    pub x: i32,
    /// Z coordinate (in chunks, not units).
    pub z: i32,
}

impl ChunkLocation {
    /// Creates a new chunk location.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing the integer block coordinates.
    ///
    /// Floors toward negative infinity: block -1 is in chunk -1, not 0.
    #[inline]
    #[must_use]
    pub const fn from_block(block_x: i32, block_z: i32) -> Self {
        Self {
            x: block_x.div_euclid(CHUNK_WIDTH),
            z: block_z.div_euclid(CHUNK_WIDTH),
        }
    }

    /// Chunk containing a continuous world position. The y axis is ignored.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_position(position: Vec3) -> Self {
        Self::from_block(position.x.floor() as i32, position.z.floor() as i32)
    }

    /// World X coordinate of the chunk's origin corner.
    #[inline]
    #[must_use]
    pub const fn world_x(self) -> i32 {
        self.x * CHUNK_WIDTH
    }

    /// World Z coordinate of the chunk's origin corner.
    #[inline]
    #[must_use]
    pub const fn world_z(self) -> i32 {
        self.z * CHUNK_WIDTH
    }
}

/// Inclusive rectangle of chunk locations. `max >= min` on both axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkGrid {
    max: ChunkLocation,
    min: ChunkLocation,
}

impl ChunkGrid {
    /// Creates a grid from its corners.
    ///
    /// # Panics
    ///
    /// Panics if `max` is below `min` on either axis.
    #[must_use]
    pub fn new(max: ChunkLocation, min: ChunkLocation) -> Self {
        assert!(
            max.x >= min.x && max.z >= min.z,
            "chunk grid corners inverted: max {max:?} min {min:?}"
        );
        Self { max, min }
    }

    /// Square grid of `radius` chunks around `center`. Radius 0 is the
    /// single center cell.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn around(center: ChunkLocation, radius: u32) -> Self {
        let d = radius as i32;
        Self {
            max: ChunkLocation::new(center.x + d, center.z + d),
            min: ChunkLocation::new(center.x - d, center.z - d),
        }
    }

    /// Every chunk spanned by `bounds`.
    #[must_use]
    pub fn covering(bounds: &BoundingBox) -> Self {
        Self::new(
            ChunkLocation::from_position(bounds.max),
            ChunkLocation::from_position(bounds.min),
        )
    }

    /// Maximum corner.
    #[inline]
    #[must_use]
    pub const fn max(&self) -> ChunkLocation {
        self.max
    }

    /// Minimum corner.
    #[inline]
    #[must_use]
    pub const fn min(&self) -> ChunkLocation {
        self.min
    }

    /// Returns true if `location` lies inside the rectangle (inclusive).
    #[inline]
    #[must_use]
    pub const fn contains(&self, location: ChunkLocation) -> bool {
        self.min.x <= location.x
            && location.x <= self.max.x
            && self.min.z <= location.z
            && location.z <= self.max.z
    }

    /// Returns true if the grid is a single chunk.
    #[inline]
    #[must_use]
    pub fn is_single(&self) -> bool {
        self.max == self.min
    }

    /// Number of chunks in the grid.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn len(&self) -> usize {
        let width = (i64::from(self.max.x) - i64::from(self.min.x) + 1) as usize;
        let depth = (i64::from(self.max.z) - i64::from(self.min.z) + 1) as usize;
        width * depth
    }

    /// Grids always hold at least one chunk.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Lazy sequence of every location, z outer and x inner.
    ///
    /// Each call starts from the beginning.
    #[must_use]
    pub fn locations(&self) -> Locations {
        if self.is_single() {
            return Locations {
                cursor: Cursor::Single(Some(self.min)),
            };
        }
        Locations {
            cursor: Cursor::Rows {
                grid: *self,
                next: Some(self.min),
                remaining: self.len(),
            },
        }
    }
}

impl IntoIterator for &ChunkGrid {
    type Item = ChunkLocation;
    type IntoIter = Locations;

    fn into_iter(self) -> Locations {
        self.locations()
    }
}

#[derive(Clone, Debug)]
enum Cursor {
    Single(Option<ChunkLocation>),
    Rows {
        grid: ChunkGrid,
        next: Option<ChunkLocation>,
        remaining: usize,
    },
}

/// Iterator over the cells of a [`ChunkGrid`].
#[derive(Clone, Debug)]
pub struct Locations {
    cursor: Cursor,
}

impl Iterator for Locations {
    type Item = ChunkLocation;

    fn next(&mut self) -> Option<ChunkLocation> {
        match &mut self.cursor {
            Cursor::Single(location) => location.take(),
            Cursor::Rows { grid, next, remaining } => {
                let current = (*next)?;
                *remaining -= 1;
                *next = if current.x < grid.max.x {
                    Some(ChunkLocation::new(current.x + 1, current.z))
                } else if current.z < grid.max.z {
                    Some(ChunkLocation::new(grid.min.x, current.z + 1))
                } else {
                    None
                };
                Some(current)
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match &self.cursor {
            Cursor::Single(location) => usize::from(location.is_some()),
            Cursor::Rows { remaining, .. } => *remaining,
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Locations {}

impl FusedIterator for Locations {}
