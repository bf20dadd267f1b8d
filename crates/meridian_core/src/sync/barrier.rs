//! # Phase Barrier
//!
//! Reusable cyclic rendezvous for a fixed number of participants.
//!
//! ```text
//! generation 7:  worker0 ──┐
//!                worker1 ──┼──► all released ──► generation 8
//!                coord   ──┘
//! ```
//!
//! The same barrier instance is reused every phase of every tick. Waiting
//! goes through a mutex, so every write made before `wait` is visible to
//! every participant after it returns.

use parking_lot::{Condvar, Mutex};

struct Rendezvous {
    arrived: usize,
    generation: u64,
}

/// Cyclic barrier with a generation counter.
pub struct PhaseBarrier {
    participants: usize,
    state: Mutex<Rendezvous>,
    released: Condvar,
}

/// Outcome of one [`PhaseBarrier::wait`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BarrierWait {
    /// Generation that was completed by this rendezvous.
    pub generation: u64,
    /// True for exactly one participant per generation: the last to arrive.
    pub leader: bool,
}

impl PhaseBarrier {
    /// Creates a barrier for `participants` threads.
    ///
    /// # Panics
    ///
    /// Panics if `participants` is zero.
    #[must_use]
    pub fn new(participants: usize) -> Self {
        assert!(participants > 0, "barrier needs at least one participant");
        Self {
            participants,
            state: Mutex::new(Rendezvous { arrived: 0, generation: 0 }),
            released: Condvar::new(),
        }
    }

    /// Number of participants per rendezvous.
    #[inline]
    #[must_use]
    pub const fn participants(&self) -> usize {
        self.participants
    }

    /// Number of rendezvous completed so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Blocks until all participants have called `wait` for this generation.
    pub fn wait(&self) -> BarrierWait {
        let mut state = self.state.lock();
        let generation = state.generation;
        state.arrived += 1;

        if state.arrived < self.participants {
            while state.generation == generation {
                self.released.wait(&mut state);
            }
            BarrierWait { generation, leader: false }
        } else {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.released.notify_all();
            BarrierWait { generation, leader: true }
        }
    }
}

impl std::fmt::Debug for PhaseBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PhaseBarrier")
            .field("participants", &self.participants)
            .field("arrived", &state.arrived)
            .field("generation", &state.generation)
            .finish()
    }
}
