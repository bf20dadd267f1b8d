//! # Double-Buffered Queue
//!
//! FIFO container split into two internal queues so that one epoch's
//! consumers drain one buffer while producers fill the other.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌─────────────────────────────┐
//!                    │     DoubleBufferedQueue     │
//!                    │                             │
//!                    │  ┌─────────┐  ┌─────────┐   │
//!                    │  │ Queue A │  │ Queue B │   │
//!                    │  └────┬────┘  └────┬────┘   │
//!                    │       │            │        │
//!                    │  ┌────┴────────────┴────┐   │
//!                    │  │ active-for-removal   │   │
//!                    │  └──────────────────────┘   │
//!                    └─────────────────────────────┘
//!                              │
//!              ┌───────────────┼───────────────┐
//!              ▼               ▼               ▼
//!      ┌──────────────┐ ┌────────────┐ ┌────────────┐
//!      │   Producer   │ │  Consumer  │ │   Swapper  │
//!      │ (other side) │ │  (active)  │ │(coordinator)│
//!      └──────────────┘ └────────────┘ └────────────┘
//! ```
//!
//! ## Drain-then-swap
//!
//! [`DoubleBufferedQueue::swap`] only flips when the active queue is empty.
//! Items enqueued during epoch k are therefore never dequeued before every
//! item of epoch k-1 has been dequeued. A deferred swap has no upper bound;
//! the caller simply tries again later.

use std::fmt;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;

/// One of the two internal queues.
struct Lane<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> Lane<T> {
    fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }
}

/// Two concurrent FIFO queues and a flag selecting the one active for removal.
///
/// All operations take `&self`. Enqueue and dequeue hold a shared lock on the
/// flag, [`swap`](Self::swap) holds it exclusively, so an item can never land
/// in the queue that becomes active halfway through its enqueue.
///
/// # Example
///
/// ```rust
/// use meridian_core::DoubleBufferedQueue;
///
/// let queue = DoubleBufferedQueue::new();
/// queue.enqueue(1);
/// assert!(queue.dequeue().is_none()); // written to the other side
///
/// assert!(queue.swap());
/// assert_eq!(queue.dequeue(), Some(1));
/// ```
pub struct DoubleBufferedQueue<T> {
    lanes: [Lane<T>; 2],
    /// Index of the lane active for removal.
    active: RwLock<usize>,
}

impl<T> DoubleBufferedQueue<T> {
    /// Creates an empty queue. Lane 0 starts active for removal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lanes: [Lane::new(), Lane::new()],
            active: RwLock::new(0),
        }
    }

    /// Appends `item` to the lane that is NOT active for removal.
    pub fn enqueue(&self, item: T) {
        let active = self.active.read();
        let target = &self.lanes[*active ^ 1];
        if target.tx.send(item).is_err() {
            unreachable!("double-buffered queue owns both ends of its lanes");
        }
    }

    /// Removes the head of the active lane, or `None` if it is empty.
    pub fn dequeue(&self) -> Option<T> {
        let active = self.active.read();
        self.lanes[*active].rx.try_recv().ok()
    }

    /// Flips the active lane if it is empty.
    ///
    /// Returns `true` if the flip happened. Returns `false` and changes
    /// nothing while the active lane still holds items.
    pub fn swap(&self) -> bool {
        let mut active = self.active.write();
        if !self.lanes[*active].rx.is_empty() {
            return false;
        }
        *active ^= 1;
        true
    }

    /// Number of items in the active lane.
    #[must_use]
    pub fn len(&self) -> usize {
        let active = self.active.read();
        self.lanes[*active].rx.len()
    }

    /// Returns true if the active lane is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let active = self.active.read();
        self.lanes[*active].rx.is_empty()
    }

    /// Number of items waiting in the inactive lane.
    #[must_use]
    pub fn pending(&self) -> usize {
        let active = self.active.read();
        self.lanes[*active ^ 1].rx.len()
    }

    /// Returns true if both lanes are empty.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.lanes.iter().all(|lane| lane.rx.is_empty())
    }

    /// Removes every item from both lanes, active lane first.
    ///
    /// Only meant for shutdown, when no phase is running.
    pub fn take_all(&self) -> Vec<T> {
        let mut active = self.active.write();
        let mut items: Vec<T> = self.lanes[*active].rx.try_iter().collect();
        items.extend(self.lanes[*active ^ 1].rx.try_iter());
        *active = 0;
        items
    }

    /// Consumes an empty queue.
    ///
    /// # Panics
    ///
    /// Panics if either lane still holds items. Dropping live items on the
    /// floor would leak identifiers and subscriptions.
    pub fn dispose(self) {
        assert!(
            self.is_drained(),
            "disposing a non-empty double-buffered queue ({} active, {} pending)",
            self.len(),
            self.pending()
        );
    }

    /// Enqueue-only view for a phase that produces items.
    #[inline]
    #[must_use]
    pub fn producer(&self) -> Producer<'_, T> {
        Producer { queue: self }
    }

    /// Dequeue-only view for a phase that drains items.
    #[inline]
    #[must_use]
    pub fn consumer(&self) -> Consumer<'_, T> {
        Consumer { queue: self }
    }

    /// Swap-only view, held by the coordinator between phases.
    #[inline]
    #[must_use]
    pub fn swapper(&self) -> Swapper<'_, T> {
        Swapper { queue: self }
    }
}

impl<T> Default for DoubleBufferedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for DoubleBufferedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DoubleBufferedQueue")
            .field("active", &self.len())
            .field("pending", &self.pending())
            .finish()
    }
}

/// Enqueue capability over a [`DoubleBufferedQueue`].
pub struct Producer<'a, T> {
    queue: &'a DoubleBufferedQueue<T>,
}

impl<T> Producer<'_, T> {
    /// Appends `item` for the next epoch.
    #[inline]
    pub fn enqueue(&self, item: T) {
        self.queue.enqueue(item);
    }
}

impl<T> Clone for Producer<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Producer<'_, T> {}

/// Dequeue capability over a [`DoubleBufferedQueue`].
///
/// Iterating a consumer drains the active lane until it is empty.
pub struct Consumer<'a, T> {
    queue: &'a DoubleBufferedQueue<T>,
}

impl<T> Consumer<'_, T> {
    /// Removes the head of the active lane.
    #[inline]
    pub fn dequeue(&self) -> Option<T> {
        self.queue.dequeue()
    }
}

impl<T> Iterator for Consumer<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.queue.dequeue()
    }
}

/// Swap capability over a [`DoubleBufferedQueue`].
pub struct Swapper<'a, T> {
    queue: &'a DoubleBufferedQueue<T>,
}

impl<T> Swapper<'_, T> {
    /// Flips the active lane if it is empty. See [`DoubleBufferedQueue::swap`].
    #[inline]
    pub fn swap(&self) -> bool {
        self.queue.swap()
    }
}
