//! Entity routines, run once per tick in start-entity-routines.

use meridian_core::{EntityId, Producer, Vec3};

use super::entity::{Intent, Motion, SpawnRequest};

/// What an entity does on its own.
pub trait Behavior: Send {
    /// Decides this tick's intent. Effects apply on the next move phase.
    fn tick(&mut self, ctx: &mut RoutineContext<'_>);
}

impl<F> Behavior for F
where
    F: FnMut(&mut RoutineContext<'_>) + Send,
{
    fn tick(&mut self, ctx: &mut RoutineContext<'_>) {
        self(ctx);
    }
}

/// Everything a routine may read or request.
pub struct RoutineContext<'a> {
    tick: u64,
    id: EntityId,
    motion: Motion,
    intent: Option<Intent>,
    despawn: bool,
    spawner: Producer<'a, SpawnRequest>,
}

impl<'a> RoutineContext<'a> {
    pub(crate) fn new(
        tick: u64,
        id: EntityId,
        motion: Motion,
        spawner: Producer<'a, SpawnRequest>,
    ) -> Self {
        Self {
            tick,
            id,
            motion,
            intent: None,
            despawn: false,
            spawner,
        }
    }

    /// Tick being executed.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Entity running the routine.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Motion at the start of the routine.
    #[must_use]
    pub const fn motion(&self) -> &Motion {
        &self.motion
    }

    /// Sets where the entity goes on the next move phase.
    pub fn set_intent(&mut self, intent: Intent) {
        self.intent = Some(intent);
    }

    /// Moves by `delta`, keeping look and ground flag.
    pub fn translate(&mut self, delta: Vec3) {
        let base = self.intent.map_or(self.motion.position, |i| i.position);
        self.intent = Some(Intent {
            position: base + delta,
            look: self.motion.look,
            on_ground: self.motion.on_ground,
        });
    }

    /// Requests a new entity. It appears in the next create phase.
    pub fn spawn(&self, request: SpawnRequest) {
        self.spawner.enqueue(request);
    }

    /// Marks the entity for destruction.
    pub fn despawn(&mut self) {
        self.despawn = true;
    }

    pub(crate) fn finish(self) -> (Option<Intent>, bool) {
        (self.intent, self.despawn)
    }
}

/// Does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct Idle;

impl Behavior for Idle {
    fn tick(&mut self, _ctx: &mut RoutineContext<'_>) {}
}

/// Constant velocity, optionally for a limited number of ticks.
#[derive(Clone, Copy, Debug)]
pub struct Linear {
    /// Displacement per tick.
    pub velocity: Vec3,
    /// Ticks left before despawning. `None` runs forever.
    pub lifetime: Option<u32>,
}

impl Linear {
    /// Moves forever at `velocity` per tick.
    #[must_use]
    pub const fn new(velocity: Vec3) -> Self {
        Self {
            velocity,
            lifetime: None,
        }
    }

    /// Despawns after `ticks` steps.
    #[must_use]
    pub const fn for_ticks(velocity: Vec3, ticks: u32) -> Self {
        Self {
            velocity,
            lifetime: Some(ticks),
        }
    }
}

impl Behavior for Linear {
    fn tick(&mut self, ctx: &mut RoutineContext<'_>) {
        match self.lifetime {
            Some(0) => ctx.despawn(),
            Some(ref mut left) => {
                *left -= 1;
                ctx.translate(self.velocity);
            }
            None => ctx.translate(self.velocity),
        }
    }
}
