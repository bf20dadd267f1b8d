//! # Entity Identifiers
//!
//! Entities are addressed by small non-negative integers in `[0, i32::MAX)`.
//! An identifier is owned by exactly one live entity at a time and goes back
//! to the [`IdAllocator`] when that entity is destroyed.

mod allocator;

pub use allocator::{FreeInterval, IdAllocator};

use std::fmt;

/// Unique identifier for an entity.
///
/// Values lie in `[0, EntityId::LIMIT)`. Identifiers are recycled, so an
/// `EntityId` is only meaningful while its entity is alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Exclusive upper bound of the identifier space (`INT_MAX`).
    pub const LIMIT: u32 = i32::MAX as u32;

    /// Creates an entity ID from its raw value.
    ///
    /// # Panics
    ///
    /// Panics if `raw` is outside `[0, LIMIT)`.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        assert!(raw < Self::LIMIT, "entity id out of range");
        Self(raw)
    }

    /// Returns the raw integer value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
