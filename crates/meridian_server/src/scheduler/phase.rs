//! # Tick Phases
//!
//! ## Tick Order (every 50ms)
//!
//! ```text
//!  1. StartObserverRoutines   apply queued client input
//!  2. HandleConnections       notice dropped connections
//!  3. DestroyEntities         flush + free dead entities
//!  4. DestroyObservers        flush + free dead observers
//!  5. MoveEntities            apply motion intents, visibility eviction
//!  6. CreateEntities          spawn requested entities
//!  7. AdmitConnections        join waiting connections
//!  8. Render                  observers subscribe to visible entities
//!  9. WorldRoutine            world clock
//! 10. StartEntityRoutines     entity behaviours
//! ```

use std::fmt;

/// One barrier-synchronized stage of a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// Observers apply the input their connection queued since last tick.
    StartObserverRoutines,
    /// Observers whose connection dropped are marked dead.
    HandleConnections,
    /// Dead entities are flushed and their identifiers freed.
    DestroyEntities,
    /// Dead observers are flushed, freed and closed.
    DestroyObservers,
    /// Entities apply their motion intent and evict invisible renderers.
    MoveEntities,
    /// Spawn requests become entities.
    CreateEntities,
    /// Waiting connections are admitted or rejected.
    AdmitConnections,
    /// Observers subscribe to the entities they can see.
    Render,
    /// World-wide routine, run by a single worker.
    WorldRoutine,
    /// Entity behaviours decide the next tick's intents.
    StartEntityRoutines,
}

impl Phase {
    /// Every phase, in execution order.
    pub const ALL: [Phase; 10] = [
        Phase::StartObserverRoutines,
        Phase::HandleConnections,
        Phase::DestroyEntities,
        Phase::DestroyObservers,
        Phase::MoveEntities,
        Phase::CreateEntities,
        Phase::AdmitConnections,
        Phase::Render,
        Phase::WorldRoutine,
        Phase::StartEntityRoutines,
    ];

    /// Number of phases per tick.
    pub const COUNT: usize = Self::ALL.len();

    /// Position of this phase in [`Phase::ALL`].
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Short name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Phase::StartObserverRoutines => "start-observer-routines",
            Phase::HandleConnections => "handle-connections",
            Phase::DestroyEntities => "destroy-entities",
            Phase::DestroyObservers => "destroy-observers",
            Phase::MoveEntities => "move-entities",
            Phase::CreateEntities => "create-entities",
            Phase::AdmitConnections => "admit-connections",
            Phase::Render => "render",
            Phase::WorldRoutine => "world-routine",
            Phase::StartEntityRoutines => "start-entity-routines",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_is_in_declaration_order() {
        for (i, phase) in Phase::ALL.iter().enumerate() {
            assert_eq!(phase.index(), i);
        }
        assert!(Phase::ALL.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<_> = Phase::ALL.iter().map(|p| p.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Phase::COUNT);
        assert_eq!(Phase::Render.to_string(), "render");
    }
}
