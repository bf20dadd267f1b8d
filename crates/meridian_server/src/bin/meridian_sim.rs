//! # MERIDIAN Simulation Harness
//!
//! Runs the full tick pipeline headless, with in-memory bot connections
//! wandering around the spawn point, joining and leaving.
//!
//! ```text
//! RUST_LOG=meridian_server=debug meridian_sim --bots 200 --seconds 30
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use meridian_core::{Look, Vec3};
use meridian_server::{
    Connection, EntityKind, Forms, Linear, LoopbackConnection, ObserverInput, Scheduler,
    ServerConfig, ServerResult, ShutdownHandle, SpawnRequest, World, TICK_INTERVAL,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "meridian_sim", about = "Headless tick pipeline simulation")]
struct Cli {
    /// Server config file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of bot connections kept online.
    #[arg(short, long, default_value_t = 64)]
    bots: usize,

    /// Wall-clock duration of the run.
    #[arg(short, long, default_value_t = 10)]
    seconds: u64,

    /// Seed for bot movement.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Enable debug logging when RUST_LOG is unset.
    #[arg(short, long)]
    verbose: bool,
}

/// Side length of the square bots wander in.
const ARENA: f64 = 256.0;

/// Bot speed in world units per tick.
const BOT_SPEED: f64 = 0.4;

/// Chance per tick that a bot drops its connection.
const DROP_CHANCE: f64 = 0.002;

struct Bot {
    conn: Arc<LoopbackConnection>,
    position: Vec3,
    heading: f64,
    forms: Forms,
}

impl Bot {
    fn join(world: &World, index: usize, spawn: Vec3, view_distance: u32) -> Self {
        let conn = LoopbackConnection::new(format!("bot-{index}"), view_distance);
        world.connect(Arc::clone(&conn) as Arc<dyn Connection>);
        Self {
            conn,
            position: spawn,
            heading: 0.0,
            forms: Forms::default(),
        }
    }

    fn wander(&mut self, rng: &mut StdRng) {
        self.heading += rng.gen_range(-0.3..0.3);
        let step = if self.forms.sprinting { BOT_SPEED * 2.0 } else { BOT_SPEED };
        let half = ARENA / 2.0;

        self.position.x = (self.position.x + self.heading.cos() * step).clamp(-half, half);
        self.position.z = (self.position.z + self.heading.sin() * step).clamp(-half, half);
        if rng.gen_bool(0.01) {
            self.forms.sprinting = !self.forms.sprinting;
        }

        #[allow(clippy::cast_possible_truncation)]
        let yaw = self.heading.to_degrees() as f32;
        self.conn.push_input(ObserverInput {
            position: self.position,
            look: Look::new(yaw, 0.0),
            on_ground: true,
            forms: self.forms,
        });
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let fallback = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "simulation failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> ServerResult<()> {
    let config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    tracing::info!(?config, bots = cli.bots, seconds = cli.seconds, "starting simulation");

    let world = Arc::new(World::new(config.clone()));
    let mut scheduler = Scheduler::new(config.scheduler(), Arc::clone(&world))?;

    let driver = {
        let world = Arc::clone(&world);
        let shutdown = scheduler.shutdown_handle();
        let bots = cli.bots;
        let duration = Duration::from_secs(cli.seconds);
        let seed = cli.seed;
        thread::Builder::new()
            .name("sim-driver".into())
            .spawn(move || drive(&world, &shutdown, bots, duration, seed))?
    };

    let started = Instant::now();
    scheduler.run();

    let stats = scheduler.stats();
    tracing::info!(
        ticks = scheduler.tick(),
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        avg_tick_us = stats.avg_tick_us,
        max_tick_us = stats.max_tick_us,
        late_ticks = stats.late_ticks,
        clamped_debt = stats.clamped_debt,
        "scheduler finished"
    );
    drop(scheduler);

    if driver.join().is_err() {
        tracing::error!("simulation driver panicked");
    }

    match Arc::try_unwrap(world) {
        Ok(world) => {
            let stats = world.close();
            tracing::info!(?stats, "world closed cleanly");
        }
        Err(_) => tracing::warn!("world still shared at exit, skipping close"),
    }
    Ok(())
}

/// Feeds bot input once per tick interval until `duration` has passed.
fn drive(world: &World, shutdown: &ShutdownHandle, count: usize, duration: Duration, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let spawn = world.config().spawn_point;
    let view_distance = world.config().view_distance;

    let mut next_index = count;
    let mut bots: Vec<Bot> = (0..count)
        .map(|i| Bot::join(world, i, spawn, view_distance))
        .collect();

    // A few wandering mobs and a stream of short-lived projectiles.
    for i in 0..16u16 {
        let velocity = Vec3::new(rng.gen_range(-0.2..0.2), 0.0, rng.gen_range(-0.2..0.2));
        world.spawn(
            SpawnRequest::new(EntityKind::Mob { type_id: i % 4 }, spawn)
                .with_behavior(Linear::new(velocity)),
        );
    }

    let started = Instant::now();
    let mut last_report = Instant::now();

    while started.elapsed() < duration {
        for bot in &mut bots {
            bot.wander(&mut rng);
            if rng.gen_bool(DROP_CHANCE) {
                bot.conn.disconnect();
            }
        }

        // Replace dropped bots so the population stays put.
        for bot in &mut bots {
            if !bot.conn.is_connected() {
                *bot = Bot::join(world, next_index, spawn, view_distance);
                next_index += 1;
            }
        }

        if !bots.is_empty() && rng.gen_bool(0.1) {
            let from = bots[rng.gen_range(0..bots.len())].position;
            world.spawn(
                SpawnRequest::new(EntityKind::Projectile, from)
                    .with_behavior(Linear::for_ticks(Vec3::new(1.5, 0.0, 0.0), 40)),
            );
        }

        if last_report.elapsed() >= Duration::from_secs(2) {
            let stats = world.stats();
            tracing::info!(
                observers = stats.observers,
                entities = stats.entities,
                admitted = stats.admitted,
                rejected = stats.rejected,
                age = stats.age,
                "world status"
            );
            last_report = Instant::now();
        }

        thread::sleep(TICK_INTERVAL);
    }

    shutdown.raise();
}
