//! # MERIDIAN Core
//!
//! Leaf data structures for the tick-synchronized world server:
//! - Entity identifier allocation with a coalescing free list
//! - Double-buffered queues and the phase barrier
//! - Chunk locations and chunk grids
//!
//! Nothing in this crate spawns threads. Everything is safe to share
//! between the scheduler's workers.
//!
//! ## Example
//!
//! ```rust
//! use meridian_core::{ChunkGrid, ChunkLocation, IdAllocator, Vec3};
//!
//! let ids = IdAllocator::new();
//! let id = ids.alloc();
//!
//! let here = ChunkLocation::from_position(Vec3::new(-3.0, 64.0, 20.0));
//! let view = ChunkGrid::around(here, 2);
//! assert_eq!(view.len(), 25);
//!
//! ids.dealloc(id);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod ids;
pub mod math;
pub mod spatial;
pub mod sync;

pub use ids::{EntityId, FreeInterval, IdAllocator};
pub use math::{BoundingBox, Look, Vec3};
pub use spatial::{ChunkGrid, ChunkLocation, Locations, CHUNK_WIDTH};
pub use sync::{BarrierWait, Consumer, DoubleBufferedQueue, PhaseBarrier, Producer, Swapper};
