//! # MERIDIAN Server - The Tick Pipeline
//!
//! Tick-synchronized simulation and visibility fan-out for a multiplayer
//! world server.
//!
//! ## Architecture
//!
//! This crate implements everything that runs once per tick:
//!
//! - **Scheduler**: n workers plus one coordinator, ten barrier-bounded
//!   phases, drift-compensated 50ms cadence
//! - **World**: entities, observers, admission and the phase bodies
//! - **Render**: per-entity renderer sets, visibility eviction, notices
//! - **Connection**: the contract with the network layer
//!
//! ## Tick Pipeline
//!
//! ```text
//! COORDINATOR                      WORKERS (n)
//!   |                                 |
//!   |-- swap queues for phase k ----->|
//!   |======== barrier (enter) ========|
//!   |                                 | <- phase k, in parallel
//!   |======== barrier (exit) =========|
//!   |-- swap queues for phase k+1 --->|
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use meridian_server::{LoopbackConnection, Scheduler, ServerConfig, World};
//!
//! let config = ServerConfig::default();
//! let world = Arc::new(World::new(config.clone()));
//! world.connect(LoopbackConnection::new("bot-0", 8));
//!
//! let mut scheduler = Scheduler::new(config.scheduler(), Arc::clone(&world))?;
//! let shutdown = scheduler.shutdown_handle();
//! std::thread::spawn(move || {
//!     std::thread::sleep(std::time::Duration::from_secs(1));
//!     shutdown.raise();
//! });
//! scheduler.run(); // Blocks, ticks every 50ms
//! # Ok::<(), meridian_server::SchedulerError>(())
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod connection;
pub mod error;
pub mod render;
pub mod scheduler;
pub mod world;

use std::time::Duration;

// Re-exports for convenience
pub use config::{SchedulerConfig, ServerConfig};
pub use connection::{Connection, LoopbackConnection, ObserverInput};
pub use error::{ConfigError, SchedulerError, ServerError, ServerResult};
pub use render::{MovementFrame, MovementNotice, Notice, RenderPass, Renderer, RendererSet};
pub use scheduler::{
    Clock, ManualClock, Phase, Scheduler, ShutdownHandle, SystemClock, TickHandler, TickLoop,
    TickStats, WorkerContext,
};
pub use world::{
    AdmissionPolicy, Behavior, Entity, EntityKind, Forms, Idle, Intent, Linear, MaxObservers,
    Motion, Observer, Occupancy, RoutineContext, SpawnRequest, World, WorldStats,
};

/// Wall time between tick starts.
///
/// Fixed; not part of the configuration.
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Default number of phase worker threads.
pub const DEFAULT_WORKERS: usize = 4;

/// Default world capacity.
pub const MAX_OBSERVERS: usize = 500;

/// Largest render distance an observer may be given, in chunks.
pub const MAX_VIEW_DISTANCE: u32 = 32;

/// Moves longer than this (world units) are sent as teleports.
pub const MAX_RELATIVE_MOVE: f64 = 8.0;
