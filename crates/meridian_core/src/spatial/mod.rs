//! # Spatial Partitioning
//!
//! Converts world positions and bounding volumes into chunk locations and
//! rectangular chunk ranges for visibility tests.

mod chunk;

pub use chunk::{ChunkGrid, ChunkLocation, Locations, CHUNK_WIDTH};
