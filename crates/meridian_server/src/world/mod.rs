//! # World
//!
//! The ten phase bodies, run by every scheduler worker.
//!
//! ## Collections
//!
//! ```text
//!  queue       swapped before              drained (and refilled) in
//!  ─────       ──────────────              ─────────────────────────
//!  observers   1, 2, 4, 8                  1, 2, 4, 8   (+ 7 fills)
//!  entities    3, 5, 10                    3, 5, 10     (+ 6 fills)
//!  spawns      6                           6            (10 + any thread fill)
//!  occupancy   cleared before 4            filled 4 5 6 7, read 8
//! ```
//!
//! Each phase drains the active lane of a queue and re-enqueues survivors
//! into the other lane, so workers split the items between them without
//! ever seeing the same item twice. Only the coordinator swaps.
//!
//! Observers own their player entity. Player entities live in the
//! observer queue, not the entity queue.

mod admission;
mod behavior;
mod entity;
mod observer;
mod occupancy;

pub use admission::{AdmissionPolicy, MaxObservers};
pub use behavior::{Behavior, Idle, Linear, RoutineContext};
pub use entity::{Entity, EntityKind, Forms, Intent, Motion, SpawnRequest};
pub use observer::Observer;
pub use occupancy::Occupancy;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use meridian_core::{DoubleBufferedQueue, IdAllocator, Look};

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::render::Renderer;
use crate::scheduler::{Phase, TickHandler, WorkerContext};

/// World counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorldStats {
    /// Connections admitted.
    pub admitted: u64,
    /// Connections turned away.
    pub rejected: u64,
    /// Non-player entities created.
    pub spawned: u64,
    /// Non-player entities destroyed.
    pub destroyed: u64,
    /// Observers currently joined.
    pub observers: usize,
    /// Non-player entities currently alive or awaiting destruction.
    pub entities: usize,
    /// World-routine executions.
    pub age: u64,
}

#[derive(Default)]
struct Counters {
    admitted: AtomicU64,
    rejected: AtomicU64,
    spawned: AtomicU64,
    destroyed: AtomicU64,
    entities: AtomicUsize,
    age: AtomicU64,
}

/// Shared simulation state plus the phase bodies that advance it.
pub struct World {
    config: ServerConfig,
    ids: IdAllocator,
    entities: DoubleBufferedQueue<Arc<Entity>>,
    observers: DoubleBufferedQueue<Arc<Observer>>,
    spawns: DoubleBufferedQueue<SpawnRequest>,
    occupancy: Occupancy,
    arrivals_tx: Sender<Arc<dyn Connection>>,
    arrivals_rx: Receiver<Arc<dyn Connection>>,
    policy: Box<dyn AdmissionPolicy>,
    online: AtomicUsize,
    counters: Counters,
}

impl World {
    /// Creates an empty world admitting up to `config.max_observers`.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let policy = MaxObservers(config.max_observers);
        Self::with_policy(config, policy)
    }

    /// Creates an empty world with a custom admission policy.
    #[must_use]
    pub fn with_policy(config: ServerConfig, policy: impl AdmissionPolicy + 'static) -> Self {
        let (arrivals_tx, arrivals_rx) = unbounded();
        Self {
            ids: IdAllocator::with_limit(config.id_limit),
            config,
            entities: DoubleBufferedQueue::new(),
            observers: DoubleBufferedQueue::new(),
            spawns: DoubleBufferedQueue::new(),
            occupancy: Occupancy::new(),
            arrivals_tx,
            arrivals_rx,
            policy: Box::new(policy),
            online: AtomicUsize::new(0),
            counters: Counters::default(),
        }
    }

    /// Queues a connection for the next admit-connections phase.
    ///
    /// Callable from any thread.
    pub fn connect(&self, connection: Arc<dyn Connection>) {
        tracing::debug!(name = connection.name(), "connection waiting for admission");
        let _ = self.arrivals_tx.send(connection);
    }

    /// Queues an entity for the next create-entities phase.
    ///
    /// Callable from any thread.
    pub fn spawn(&self, request: SpawnRequest) {
        self.spawns.enqueue(request);
    }

    /// Configuration the world was built with.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The identifier space.
    #[must_use]
    pub const fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    /// Counters.
    #[must_use]
    pub fn stats(&self) -> WorldStats {
        let c = &self.counters;
        WorldStats {
            admitted: c.admitted.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            spawned: c.spawned.load(Ordering::Relaxed),
            destroyed: c.destroyed.load(Ordering::Relaxed),
            observers: self.online.load(Ordering::Relaxed),
            entities: c.entities.load(Ordering::Relaxed),
            age: c.age.load(Ordering::Relaxed),
        }
    }

    fn swap<T>(queue: &DoubleBufferedQueue<T>, name: &'static str, phase: Phase) {
        if !queue.swapper().swap() {
            tracing::warn!(
                queue = name,
                %phase,
                remaining = queue.len(),
                "swap deferred, active lane not drained"
            );
        }
    }

    fn start_observer_routines(&self) {
        let next = self.observers.producer();
        for observer in self.observers.consumer() {
            if observer.is_alive() {
                observer.start_routine();
            }
            next.enqueue(observer);
        }
    }

    fn handle_connections(&self) {
        let next = self.observers.producer();
        for observer in self.observers.consumer() {
            if observer.is_alive() && !observer.connection().is_connected() {
                observer.kill();
                tracing::info!(
                    name = observer.connection().name(),
                    id = %observer.player().id(),
                    "connection dropped"
                );
            }
            next.enqueue(observer);
        }
    }

    fn destroy_entities(&self) {
        let next = self.entities.producer();
        for entity in self.entities.consumer() {
            if entity.is_alive() {
                next.enqueue(entity);
                continue;
            }

            let despawned = entity.renderers().flush();
            self.ids.dealloc(entity.id());
            self.counters.destroyed.fetch_add(1, Ordering::Relaxed);
            self.counters.entities.fetch_sub(1, Ordering::Relaxed);
            tracing::trace!(id = %entity.id(), despawned, "entity destroyed");
        }
    }

    fn destroy_observers(&self) {
        let next = self.observers.producer();
        for observer in self.observers.consumer() {
            if observer.is_alive() {
                let player = observer.player();
                let position = player.relocate();
                player.renderers().handle_rendering(position, true);
                self.occupancy.insert(player);
                next.enqueue(observer);
                continue;
            }

            let player = observer.player();
            player.renderers().flush();
            self.ids.dealloc(player.id());
            observer.connection().close();
            self.online.fetch_sub(1, Ordering::AcqRel);
            tracing::info!(
                name = observer.connection().name(),
                id = %player.id(),
                "observer left"
            );
        }
    }

    fn move_entities(&self) {
        let next = self.entities.producer();
        for entity in self.entities.consumer() {
            let alive = entity.is_alive();
            let position = if alive { entity.relocate() } else { entity.position() };
            entity.renderers().handle_rendering(position, alive);
            if alive {
                self.occupancy.insert(&entity);
            }
            next.enqueue(entity);
        }
    }

    fn create_entities(&self) {
        let next = self.entities.producer();
        for request in self.spawns.consumer() {
            let Some(id) = self.ids.try_alloc() else {
                tracing::warn!(kind = ?request.kind(), "entity id space exhausted, spawn dropped");
                continue;
            };

            let entity = Arc::new(Entity::from_request(id, request));
            self.occupancy.insert(&entity);
            self.counters.spawned.fetch_add(1, Ordering::Relaxed);
            self.counters.entities.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(%id, kind = ?entity.kind(), "entity created");
            next.enqueue(entity);
        }
    }

    fn admit_connections(&self) {
        while let Ok(connection) = self.arrivals_rx.try_recv() {
            if !connection.is_connected() {
                tracing::debug!(name = connection.name(), "connection gone before admission");
                continue;
            }

            let reserved = self
                .online
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |online| {
                    self.policy.admit(online, &*connection).then_some(online + 1)
                })
                .is_ok();

            if !reserved {
                self.reject(&*connection, "world is full");
                continue;
            }

            let Some(id) = self.ids.try_alloc() else {
                self.online.fetch_sub(1, Ordering::AcqRel);
                self.reject(&*connection, "entity id space exhausted");
                continue;
            };

            let view_distance = connection
                .view_distance()
                .clamp(1, self.config.view_distance);
            let player = Arc::new(Entity::new(
                id,
                EntityKind::Player,
                self.config.spawn_point,
                Look::default(),
            ));
            let observer = Arc::new(Observer::new(Arc::clone(&connection), player, view_distance));

            self.occupancy.insert(observer.player());
            self.counters.admitted.fetch_add(1, Ordering::Relaxed);
            tracing::info!(name = connection.name(), %id, view_distance, "observer joined");
            self.observers.producer().enqueue(observer);
        }
    }

    fn reject(&self, connection: &dyn Connection, reason: &'static str) {
        connection.close();
        self.counters.rejected.fetch_add(1, Ordering::Relaxed);
        tracing::info!(name = connection.name(), reason, "connection rejected");
    }

    fn render(&self) {
        let next = self.observers.producer();
        for observer in self.observers.consumer() {
            if observer.is_connected() {
                let view = observer.view();
                let renderer: Arc<dyn Renderer> = Arc::clone(&observer) as Arc<dyn Renderer>;
                // Occupancy matches on bounds; eviction tests the position.
                // Subscribe on the same test or border entities flap.
                for entity in self.occupancy.visible(&view) {
                    if entity.is_alive()
                        && observer.can_render(entity.position())
                        && entity.renderers().apply(&renderer)
                    {
                        observer.deliver(&entity.spawn_notice());
                    }
                }
            }
            next.enqueue(observer);
        }
    }

    fn world_routine(&self, ctx: &WorkerContext) {
        if ctx.is_leader() {
            self.counters.age.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn start_entity_routines(&self, ctx: &WorkerContext) {
        let next = self.entities.producer();
        let spawner = self.spawns.producer();
        for entity in self.entities.consumer() {
            entity.run_routine(ctx.tick, spawner);
            next.enqueue(entity);
        }
    }

    /// Tears the world down.
    ///
    /// Must only be called once no scheduler is driving the world. Every
    /// renderer set is flushed, every connection closed and every
    /// identifier returned.
    ///
    /// # Panics
    ///
    /// Panics if an identifier is still allocated afterwards.
    pub fn close(self) -> WorldStats {
        let stats = self.stats();
        let World {
            ids,
            entities,
            observers,
            spawns,
            occupancy,
            arrivals_rx,
            ..
        } = self;

        // Clear the index first; it holds entity handles.
        occupancy.clear();

        for observer in observers.take_all() {
            observer.kill();
            observer.player().renderers().flush();
            ids.dealloc(observer.player().id());
            observer.connection().close();
        }
        for entity in entities.take_all() {
            entity.despawn();
            entity.renderers().flush();
            ids.dealloc(entity.id());
        }
        let dropped = spawns.take_all().len();
        while let Ok(connection) = arrivals_rx.try_recv() {
            connection.close();
        }

        observers.dispose();
        entities.dispose();
        spawns.dispose();

        assert!(
            ids.is_whole(),
            "entity ids leaked at world close: {} still allocated",
            ids.allocated()
        );

        tracing::info!(
            admitted = stats.admitted,
            spawned = stats.spawned,
            dropped_spawns = dropped,
            "world closed"
        );
        WorldStats {
            observers: 0,
            entities: 0,
            ..stats
        }
    }
}

impl TickHandler for World {
    fn run_phase(&self, phase: Phase, ctx: &WorkerContext) {
        match phase {
            Phase::StartObserverRoutines => self.start_observer_routines(),
            Phase::HandleConnections => self.handle_connections(),
            Phase::DestroyEntities => self.destroy_entities(),
            Phase::DestroyObservers => self.destroy_observers(),
            Phase::MoveEntities => self.move_entities(),
            Phase::CreateEntities => self.create_entities(),
            Phase::AdmitConnections => self.admit_connections(),
            Phase::Render => self.render(),
            Phase::WorldRoutine => self.world_routine(ctx),
            Phase::StartEntityRoutines => self.start_entity_routines(ctx),
        }
    }

    fn prepare_phase(&self, phase: Phase) {
        match phase {
            Phase::StartObserverRoutines | Phase::HandleConnections | Phase::Render => {
                Self::swap(&self.observers, "observers", phase);
            }
            Phase::DestroyObservers => {
                self.occupancy.clear();
                Self::swap(&self.observers, "observers", phase);
            }
            Phase::DestroyEntities | Phase::MoveEntities | Phase::StartEntityRoutines => {
                Self::swap(&self.entities, "entities", phase);
            }
            Phase::CreateEntities => Self::swap(&self.spawns, "spawns", phase),
            Phase::AdmitConnections | Phase::WorldRoutine => {}
        }
    }

    fn end_tick(&self, completed: u64) {
        if completed % 200 == 0 {
            let stats = self.stats();
            tracing::debug!(
                tick = completed,
                observers = stats.observers,
                entities = stats.entities,
                "world tick"
            );
        }
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("stats", &self.stats())
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{LoopbackConnection, ObserverInput};
    use crate::render::Notice;
    use meridian_core::Vec3;

    /// Runs one tick on a single simulated worker.
    fn tick(world: &World, tick: u64) {
        let ctx = WorkerContext {
            index: 0,
            workers: 1,
            tick,
        };
        for phase in Phase::ALL {
            world.prepare_phase(phase);
            world.run_phase(phase, &ctx);
        }
    }

    fn small_world() -> World {
        World::new(ServerConfig {
            max_observers: 2,
            view_distance: 2,
            ..ServerConfig::default()
        })
    }

    fn join(world: &World, name: &str) -> Arc<LoopbackConnection> {
        let conn = LoopbackConnection::new(name, 8);
        world.connect(Arc::clone(&conn) as Arc<dyn Connection>);
        conn
    }

    fn walk_to(conn: &LoopbackConnection, x: f64, z: f64) {
        conn.push_input(ObserverInput {
            position: Vec3::new(x, 64.0, z),
            look: Look::default(),
            on_ground: true,
            forms: Forms::default(),
        });
    }

    #[test]
    fn test_observers_see_each_other() {
        let world = small_world();
        let a = join(&world, "a");
        let b = join(&world, "b");

        tick(&world, 0);

        assert_eq!(world.stats().observers, 2);
        assert_eq!(a.visible().len(), 1);
        assert_eq!(b.visible().len(), 1);

        // Nothing new to announce on the next tick.
        a.take_received();
        tick(&world, 1);
        assert!(a.received().is_empty());

        world.close();
    }

    #[test]
    fn test_capacity_rejects_extra_connection() {
        let world = small_world();
        let _a = join(&world, "a");
        let _b = join(&world, "b");
        let c = join(&world, "c");

        tick(&world, 0);

        let stats = world.stats();
        assert_eq!(stats.admitted, 2);
        assert_eq!(stats.rejected, 1);
        assert!(c.was_closed());
        assert!(c.received().is_empty());

        world.close();
    }

    #[test]
    fn test_walking_out_of_view_despawns() {
        let world = small_world();
        let a = join(&world, "a");
        let b = join(&world, "b");
        tick(&world, 0);
        assert_eq!(a.visible().len(), 1);

        // b walks ten chunks away: a gets b's movement, then a despawn.
        walk_to(&b, 160.0, 0.0);
        tick(&world, 1);
        assert!(a.visible().is_empty());
        assert!(b.visible().is_empty());

        // And back again.
        walk_to(&b, 4.0, 4.0);
        tick(&world, 2);
        assert_eq!(a.visible().len(), 1);
        assert_eq!(b.visible().len(), 1);

        world.close();
    }

    #[test]
    fn test_disconnect_frees_observer() {
        let world = small_world();
        let a = join(&world, "a");
        let b = join(&world, "b");
        tick(&world, 0);

        // b knows a's player by id.
        let a_id = *b.visible().iter().next().unwrap();
        a.disconnect();
        tick(&world, 1);

        let stats = world.stats();
        assert_eq!(stats.observers, 1);
        assert!(a.was_closed());
        assert_eq!(world.ids().allocated(), 1);
        assert!(b.received().contains(&Notice::Despawn { id: a_id }));

        world.close();
    }

    #[test]
    fn test_spawn_render_despawn() {
        let world = small_world();
        let a = join(&world, "a");
        tick(&world, 0);

        world.spawn(
            SpawnRequest::new(EntityKind::Item, Vec3::new(4.0, 64.0, 4.0))
                .with_behavior(Linear::for_ticks(Vec3::new(0.5, 0.0, 0.0), 2)),
        );
        tick(&world, 1);

        let spawned: Vec<_> = a
            .received()
            .into_iter()
            .filter_map(|n| match n {
                Notice::Spawn {
                    id,
                    kind: EntityKind::Item,
                    ..
                } => Some(id),
                _ => None,
            })
            .collect();
        assert_eq!(spawned.len(), 1);
        let item = spawned[0];

        // Two moves, then the routine despawns it and destroy-entities flushes.
        for t in 2..6 {
            tick(&world, t);
        }

        let received = a.received();
        let moves = received
            .iter()
            .filter(|n| matches!(n, Notice::Move { id, .. } if *id == item))
            .count();
        assert_eq!(moves, 2);
        assert!(received.contains(&Notice::Despawn { id: item }));

        let stats = world.stats();
        assert_eq!(stats.spawned, 1);
        assert_eq!(stats.destroyed, 1);
        assert_eq!(stats.entities, 0);

        world.close();
    }

    #[test]
    fn test_entity_straddling_view_border_stays_unseen() {
        let world = small_world();
        let a = join(&world, "a");

        // Bounds reach into chunk x=2 (in view), feet sit in chunk x=3.
        world.spawn(SpawnRequest::new(
            EntityKind::Mob { type_id: 0 },
            Vec3::new(48.2, 64.0, 8.0),
        ));
        for t in 0..6 {
            tick(&world, t);
        }

        let received = a.received();
        let spawns = received
            .iter()
            .filter(|n| matches!(n, Notice::Spawn { kind: EntityKind::Mob { .. }, .. }))
            .count();
        let despawns = received
            .iter()
            .filter(|n| matches!(n, Notice::Despawn { .. }))
            .count();
        assert_eq!((spawns, despawns), (0, 0));

        // One step inside and it is spawned exactly once.
        world.spawn(SpawnRequest::new(
            EntityKind::Mob { type_id: 1 },
            Vec3::new(46.0, 64.0, 8.0),
        ));
        a.take_received();
        for t in 6..12 {
            tick(&world, t);
        }
        let spawns = a
            .received()
            .iter()
            .filter(|n| matches!(n, Notice::Spawn { .. }))
            .count();
        assert_eq!(spawns, 1);
        assert!(!a.received().iter().any(|n| matches!(n, Notice::Despawn { .. })));

        world.close();
    }

    #[test]
    fn test_custom_admission_policy() {
        let not_banned = |_online: usize, conn: &dyn Connection| conn.name() != "banned";
        let world = World::with_policy(ServerConfig::default(), not_banned);
        let ok = join(&world, "ok");
        let banned = join(&world, "banned");
        tick(&world, 0);

        assert!(!ok.was_closed());
        assert!(banned.was_closed());
        world.close();
    }

    #[test]
    fn test_close_returns_every_id() {
        let world = small_world();
        let a = join(&world, "a");
        for x in 0..5 {
            let at = Vec3::new(f64::from(x), 64.0, 0.0);
            world.spawn(SpawnRequest::new(EntityKind::Mob { type_id: 1 }, at));
        }
        tick(&world, 0);
        world.spawn(SpawnRequest::new(EntityKind::Item, Vec3::ZERO));
        let _late = join(&world, "late");

        let stats = world.close();
        assert_eq!(stats.spawned, 5);
        assert_eq!(stats.observers, 0);
        assert!(a.was_closed());
    }

    #[test]
    fn test_world_age_counts_ticks() {
        let world = small_world();
        for t in 0..3 {
            tick(&world, t);
        }
        assert_eq!(world.stats().age, 3);
        world.close();
    }
}
