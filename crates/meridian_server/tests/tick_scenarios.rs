//! Whole-tick scenarios through the real scheduler and worker pool.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use meridian_core::{EntityId, Look, Vec3};
use meridian_server::{
    Connection, EntityKind, Forms, Linear, LoopbackConnection, ManualClock, Notice, ObserverInput,
    Phase, Renderer, RendererSet, Scheduler, SchedulerConfig, ServerConfig, SpawnRequest,
    TickHandler, World, WorkerContext,
};
use parking_lot::Mutex;

fn config(workers: usize, max_observers: usize) -> ServerConfig {
    ServerConfig {
        workers,
        max_observers,
        view_distance: 4,
        ..ServerConfig::default()
    }
}

fn start(config: &ServerConfig) -> (Arc<World>, Scheduler<World, ManualClock>, ManualClock) {
    let world = Arc::new(World::new(config.clone()));
    let clock = ManualClock::new();
    let scheduler = Scheduler::with_clock(config.scheduler(), Arc::clone(&world), clock.clone())
        .expect("scheduler starts");
    (world, scheduler, clock)
}

fn finish(world: Arc<World>, scheduler: Scheduler<World, ManualClock>) {
    drop(scheduler);
    let world = Arc::try_unwrap(world).ok().expect("scheduler released the world");
    let stats = world.close();
    assert_eq!(stats.observers, 0);
}

fn join(world: &World, name: &str) -> Arc<LoopbackConnection> {
    let conn = LoopbackConnection::new(name, 8);
    world.connect(Arc::clone(&conn) as Arc<dyn Connection>);
    conn
}

#[test]
fn test_half_second_of_debt_runs_ten_ticks_on_two_workers() {
    let (world, mut scheduler, clock) = start(&config(2, 8));
    let _a = join(&world, "a");

    clock.advance(Duration::from_millis(500));
    let executed = scheduler.pump();

    assert!((9..=11).contains(&executed), "executed {executed}");
    assert_eq!(world.stats().age, u64::from(executed));
    assert_eq!(scheduler.stats().total_ticks, u64::from(executed));

    finish(world, scheduler);
}

/// Renderer whose connection can be cut from the test.
struct Watcher {
    id: EntityId,
    connected: AtomicBool,
    received: Mutex<Vec<Notice>>,
}

impl Renderer for Watcher {
    fn id(&self) -> EntityId {
        self.id
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn can_render(&self, _position: Vec3) -> bool {
        true
    }

    fn deliver(&self, notice: &Notice) {
        if self.is_connected() {
            self.received.lock().push(*notice);
        }
    }
}

#[test]
fn test_disconnected_subscriber_evicted_other_unaffected() {
    let entity = RendererSet::new(EntityId::new(100));
    let a = Arc::new(Watcher {
        id: EntityId::new(1),
        connected: AtomicBool::new(true),
        received: Mutex::new(Vec::new()),
    });
    let b = Arc::new(Watcher {
        id: EntityId::new(2),
        connected: AtomicBool::new(true),
        received: Mutex::new(Vec::new()),
    });
    let a_handle: Arc<dyn Renderer> = Arc::clone(&a) as Arc<dyn Renderer>;
    let b_handle: Arc<dyn Renderer> = Arc::clone(&b) as Arc<dyn Renderer>;

    assert!(entity.apply(&a_handle));
    assert!(entity.apply(&b_handle));
    assert!(!entity.apply(&b_handle));

    a.connected.store(false, Ordering::SeqCst);
    let pass = entity.handle_rendering(Vec3::ZERO, true);

    assert_eq!(pass.disconnected, 1);
    assert!(!entity.contains(a.id));
    assert!(entity.contains(b.id));
    assert!(a.received.lock().is_empty());
    assert!(b.received.lock().is_empty());
}

#[test]
fn test_world_capacity_rejects_and_closes() {
    let (world, mut scheduler, _clock) = start(&config(3, 2));
    let conns: Vec<_> = (0..4).map(|i| join(&world, &format!("bot-{i}"))).collect();

    scheduler.step();

    let stats = world.stats();
    assert_eq!(stats.admitted, 2);
    assert_eq!(stats.rejected, 2);
    assert_eq!(conns.iter().filter(|c| c.was_closed()).count(), 2);

    // A freed slot is reusable.
    let admitted = conns.iter().find(|c| !c.was_closed()).expect("one admitted");
    admitted.disconnect();
    scheduler.step();
    let late = join(&world, "late");
    scheduler.step();
    assert!(!late.was_closed());
    assert_eq!(world.stats().observers, 2);

    finish(world, scheduler);
}

#[test]
fn test_every_observer_sees_every_other() {
    let (world, mut scheduler, _clock) = start(&config(4, 64));
    let conns: Vec<_> = (0..24).map(|i| join(&world, &format!("bot-{i}"))).collect();

    scheduler.step();
    scheduler.step();

    for conn in &conns {
        let visible = conn.visible();
        assert_eq!(visible.len(), conns.len() - 1);

        // Exactly one spawn per peer, never a duplicate.
        let spawns = conn
            .received()
            .iter()
            .filter(|n| matches!(n, Notice::Spawn { .. }))
            .count();
        assert_eq!(spawns, conns.len() - 1);
    }

    finish(world, scheduler);
}

#[test]
fn test_spawned_projectile_flies_and_expires() {
    let (world, mut scheduler, _clock) = start(&config(2, 8));
    let a = join(&world, "a");
    scheduler.step();
    a.take_received();

    world.spawn(
        SpawnRequest::new(EntityKind::Projectile, Vec3::new(2.0, 65.0, 2.0))
            .with_behavior(Linear::for_ticks(Vec3::new(1.0, 0.0, 0.0), 3)),
    );
    for _ in 0..8 {
        scheduler.step();
    }

    let received = a.received();
    let id = match received.first() {
        Some(Notice::Spawn {
            id,
            kind: EntityKind::Projectile,
            ..
        }) => *id,
        other => panic!("expected projectile spawn first, got {other:?}"),
    };

    let moves = received
        .iter()
        .filter(|n| matches!(n, Notice::Move { id: m, .. } if *m == id))
        .count();
    assert_eq!(moves, 3);
    assert_eq!(received.last(), Some(&Notice::Despawn { id }));

    let stats = world.stats();
    assert_eq!((stats.spawned, stats.destroyed, stats.entities), (1, 1, 0));
    assert_eq!(world.ids().allocated(), 1);

    finish(world, scheduler);
}

#[test]
fn test_walking_away_and_back() {
    let (world, mut scheduler, _clock) = start(&config(2, 8));
    let a = join(&world, "a");
    let b = join(&world, "b");
    scheduler.step();

    let walk = |conn: &LoopbackConnection, x: f64| {
        conn.push_input(ObserverInput {
            position: Vec3::new(x, 64.0, 0.0),
            look: Look::default(),
            on_ground: true,
            forms: Forms {
                sneaking: false,
                sprinting: true,
            },
        });
    };

    walk(&b, 500.0);
    scheduler.step();
    assert!(a.visible().is_empty());
    assert!(a
        .received()
        .iter()
        .any(|n| matches!(n, Notice::ChangeForms { .. })));

    walk(&b, 6.0);
    scheduler.step();
    assert_eq!(a.visible().len(), 1);
    assert_eq!(b.visible().len(), 1);

    finish(world, scheduler);
}

/// World that cuts one connection while move-entities is running.
struct DropDuringMove {
    world: World,
    victim: Mutex<Option<Arc<LoopbackConnection>>>,
}

impl TickHandler for DropDuringMove {
    fn run_phase(&self, phase: Phase, ctx: &WorkerContext) {
        self.world.run_phase(phase, ctx);
        if phase == Phase::MoveEntities && ctx.is_leader() {
            if let Some(conn) = self.victim.lock().take() {
                conn.disconnect();
            }
        }
    }

    fn prepare_phase(&self, phase: Phase) {
        self.world.prepare_phase(phase);
    }

    fn end_tick(&self, completed: u64) {
        self.world.end_tick(completed);
    }
}

#[test]
fn test_connection_dropped_mid_tick_is_destroyed_next_tick() {
    let config = config(2, 8);
    let handler = Arc::new(DropDuringMove {
        world: World::new(config.clone()),
        victim: Mutex::new(None),
    });
    let mut scheduler =
        Scheduler::with_clock(config.scheduler(), Arc::clone(&handler), ManualClock::new())
            .expect("scheduler starts");
    let world = &handler.world;

    let a = join(world, "a");
    let b = join(world, "b");
    let c = join(world, "c");
    scheduler.step();

    let c_id = *a
        .visible()
        .intersection(&b.visible())
        .next()
        .expect("a and b both see c");
    for conn in [&a, &b, &c] {
        conn.take_received();
    }

    // c drops after handle-connections has already run this tick.
    *handler.victim.lock() = Some(Arc::clone(&c));
    scheduler.step();

    assert!(!c.is_connected());
    assert!(!c.was_closed());
    assert!(a.received().is_empty());
    assert!(b.received().is_empty());
    assert!(c.received().is_empty());
    assert_eq!(world.ids().allocated(), 3);
    assert_eq!(world.stats().observers, 3);

    // Next tick: killed, flushed, closed and its id returned.
    scheduler.step();

    assert!(c.was_closed());
    assert!(c.received().is_empty());
    assert_eq!(a.received(), vec![Notice::Despawn { id: c_id }]);
    assert_eq!(b.received(), vec![Notice::Despawn { id: c_id }]);
    assert_eq!(world.ids().allocated(), 2);
    assert_eq!(world.stats().observers, 2);

    drop(scheduler);
    let handler = Arc::try_unwrap(handler)
        .ok()
        .expect("scheduler released the world");
    handler.world.close();
}

#[test]
fn test_run_stops_on_shutdown_from_another_thread() {
    let config = config(2, 8);
    let world = Arc::new(World::new(config.clone()));
    let mut scheduler =
        Scheduler::new(config.scheduler(), Arc::clone(&world)).expect("scheduler starts");
    let shutdown = scheduler.shutdown_handle();

    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(300));
        shutdown.raise();
    });
    scheduler.run();
    stopper.join().expect("stopper thread");

    assert!(scheduler.tick() >= 2, "ran {} ticks", scheduler.tick());
    assert_eq!(scheduler.workers(), 0);

    drop(scheduler);
    let world = Arc::try_unwrap(world).ok().expect("scheduler released the world");
    world.close();
}

#[test]
fn test_ids_are_unique_across_workers() {
    let (world, mut scheduler, _clock) = start(&config(4, 8));
    for i in 0..200 {
        let at = Vec3::new(f64::from(i % 20), 64.0, f64::from(i / 20));
        world.spawn(SpawnRequest::new(EntityKind::Item, at));
    }
    let a = join(&world, "a");
    scheduler.step();

    let seen: HashSet<_> = a.visible();
    assert_eq!(seen.len(), 200);
    assert_eq!(world.ids().allocated(), 201);

    finish(world, scheduler);
}

#[test]
fn test_scheduler_config_from_server_config() {
    let config = config(3, 8);
    assert_eq!(
        config.scheduler(),
        SchedulerConfig {
            workers: 3,
            max_catch_up_ticks: 20
        }
    );
}
