//! # Identifier Allocator
//!
//! Issues and reclaims entity identifiers from a bounded integer space.
//!
//! ## Design
//!
//! ```text
//! free list:  [0..=1] -> [3..=3] -> [7..=LIMIT-1]
//!                 ^ alloc() takes the low end of the head
//!
//! dealloc(2): [0..=3] -> [7..=LIMIT-1]      (bridges two intervals)
//! dealloc(5): [0..=1] -> [3..=3] -> [5..=5] -> [7..=LIMIT-1]
//! ```
//!
//! The free list is always sorted, non-overlapping and maximally coalesced:
//! no two intervals touch. A long-running server therefore never fragments
//! beyond the set of identifiers that are actually live.
//!
//! One lock per allocator. `alloc` is O(1), `dealloc` is O(free fragments).

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::EntityId;

/// Inclusive range `[from, to]` of currently unallocated identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreeInterval {
    /// Lowest free value in the interval.
    pub from: u32,
    /// Highest free value in the interval.
    pub to: u32,
}

impl FreeInterval {
    /// Returns true if `value` lies inside the interval.
    #[inline]
    #[must_use]
    pub const fn contains(self, value: u32) -> bool {
        self.from <= value && value <= self.to
    }
}

struct FreeList {
    intervals: VecDeque<FreeInterval>,
    allocated: usize,
}

/// Allocator for [`EntityId`]s.
///
/// Owned by the world and shared by reference with every phase that creates
/// or destroys entities. All methods take `&self`.
///
/// # Example
///
/// ```rust
/// use meridian_core::IdAllocator;
///
/// let ids = IdAllocator::with_limit(100);
/// let a = ids.alloc();
/// let b = ids.alloc();
/// assert_eq!((a.get(), b.get()), (0, 1));
///
/// ids.dealloc(a);
/// assert_eq!(ids.alloc(), a);
/// ```
pub struct IdAllocator {
    limit: u32,
    free: Mutex<FreeList>,
}

impl IdAllocator {
    /// Creates an allocator over the whole identifier space `[0, EntityId::LIMIT)`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(EntityId::LIMIT)
    }

    /// Creates an allocator over `[0, limit)`.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is zero or larger than [`EntityId::LIMIT`].
    #[must_use]
    pub fn with_limit(limit: u32) -> Self {
        assert!(limit > 0, "identifier space must not be empty");
        assert!(limit <= EntityId::LIMIT, "identifier limit exceeds EntityId::LIMIT");

        let mut intervals = VecDeque::with_capacity(64);
        intervals.push_back(FreeInterval { from: 0, to: limit - 1 });

        Self {
            limit,
            free: Mutex::new(FreeList { intervals, allocated: 0 }),
        }
    }

    /// Exclusive upper bound of this allocator's space.
    #[inline]
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Takes the lowest free identifier, or `None` if the space is exhausted.
    pub fn try_alloc(&self) -> Option<EntityId> {
        let mut free = self.free.lock();

        let head = free.intervals.front_mut()?;
        let value = head.from;
        let last_of_head = head.from == head.to;
        if !last_of_head {
            head.from += 1;
        }
        if last_of_head {
            free.intervals.pop_front();
        }

        free.allocated += 1;
        Some(EntityId::new(value))
    }

    /// Takes the lowest free identifier.
    ///
    /// # Panics
    ///
    /// Panics if the identifier space is exhausted. Normal operation must
    /// never get there.
    pub fn alloc(&self) -> EntityId {
        match self.try_alloc() {
            Some(id) => id,
            None => panic!("entity id space exhausted ({} ids live)", self.limit),
        }
    }

    /// Returns `id` to the free list.
    ///
    /// # Panics
    ///
    /// Panics if `id` is already free (double free) or outside this
    /// allocator's space. Both are contract violations that would corrupt
    /// the identifier space for every other entity.
    pub fn dealloc(&self, id: EntityId) {
        let value = id.get();
        assert!(value < self.limit, "dealloc of entity id {value} outside [0, {})", self.limit);

        let mut free = self.free.lock();
        let intervals = &mut free.intervals;

        // First interval that starts strictly after `value`.
        let next = intervals.partition_point(|interval| interval.from <= value);

        if next > 0 {
            assert!(
                !intervals[next - 1].contains(value),
                "double free of entity id {value}"
            );
        }

        let joins_prev = next > 0 && intervals[next - 1].to + 1 == value;
        let joins_next = next < intervals.len() && value + 1 == intervals[next].from;

        match (joins_prev, joins_next) {
            (true, true) => {
                let to = intervals[next].to;
                intervals[next - 1].to = to;
                intervals.remove(next);
            }
            (true, false) => intervals[next - 1].to = value,
            (false, true) => intervals[next].from = value,
            (false, false) => intervals.insert(next, FreeInterval { from: value, to: value }),
        }

        free.allocated -= 1;
    }

    /// Number of identifiers currently handed out.
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.free.lock().allocated
    }

    /// Number of free-list fragments.
    #[must_use]
    pub fn fragments(&self) -> usize {
        self.free.lock().intervals.len()
    }

    /// Snapshot of the free list, in order.
    #[must_use]
    pub fn intervals(&self) -> Vec<FreeInterval> {
        self.free.lock().intervals.iter().copied().collect()
    }

    /// Returns true if every identifier is back in the free list.
    #[must_use]
    pub fn is_whole(&self) -> bool {
        let free = self.free.lock();
        free.allocated == 0
            && free.intervals.len() == 1
            && free.intervals[0] == FreeInterval { from: 0, to: self.limit - 1 }
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for IdAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let free = self.free.lock();
        f.debug_struct("IdAllocator")
            .field("limit", &self.limit)
            .field("allocated", &free.allocated)
            .field("fragments", &free.intervals.len())
            .finish()
    }
}
