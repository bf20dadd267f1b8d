//! # Tick Scheduler
//!
//! Drives a fixed pool of worker threads through the ten [`Phase`]s of a
//! tick, once per [`TICK_INTERVAL`](crate::TICK_INTERVAL).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TICK SCHEDULER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  coordinator            barrier (n + 1)        workers 0..n │
//! │  ───────────            ───────────────        ──────────── │
//! │  running? ─────────────────► start ◄────────── check flag   │
//! │  prepare(phase) (swaps)                                     │
//! │                 ─────────────► enter ◄─────────             │
//! │                                                run(phase)   │
//! │                 ─────────────► exit  ◄─────────             │
//! │  ... repeated for every phase ...                           │
//! │  tick += 1                                                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The coordinator is the only thread that swaps double-buffered queues,
//! and it only does so while every worker is parked between two phases.
//! The barrier is a full fence, so writes made in phase k are visible to
//! every worker in phase k+1.
//!
//! Cancellation is checked at the start rendezvous only. A sequence that
//! has begun always runs to the end, unless a phase body panics: the
//! faulting phase is recorded, every participant leaves the sequence at
//! that phase's exit rendezvous and the coordinator re-raises the panic.

mod phase;
mod tick;

pub use phase::Phase;
pub use tick::{Clock, ManualClock, SystemClock, TickLoop, TickStats};

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use meridian_core::PhaseBarrier;
use parking_lot::Mutex;

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;

/// Per-worker view handed to every phase body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerContext {
    /// Index of this worker, `0..workers`.
    pub index: usize,
    /// Size of the worker pool.
    pub workers: usize,
    /// Tick being executed. The first tick is 0.
    pub tick: u64,
}

impl WorkerContext {
    /// True for exactly one worker per phase.
    #[inline]
    #[must_use]
    pub const fn is_leader(&self) -> bool {
        self.index == 0
    }
}

/// The work a scheduler runs.
///
/// `run_phase` is called concurrently by every worker. `prepare_phase` and
/// `end_tick` are called by the coordinator while all workers are parked.
pub trait TickHandler: Send + Sync + 'static {
    /// Executes one phase on one worker.
    fn run_phase(&self, phase: Phase, ctx: &WorkerContext);

    /// Called before workers are released into `phase`. Buffer swaps go here.
    fn prepare_phase(&self, phase: Phase) {
        let _ = phase;
    }

    /// Called after the last phase of a tick. `completed` is the new tick count.
    fn end_tick(&self, completed: u64) {
        let _ = completed;
    }
}

/// External cancellation signal for [`Scheduler::run`].
#[derive(Clone, Debug, Default)]
pub struct ShutdownHandle {
    raised: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Creates a lowered signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the scheduler to stop after the in-flight sequence.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// True once [`raise`](Self::raise) has been called.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

struct Shared<H> {
    barrier: PhaseBarrier,
    /// Written only by the coordinator, before the start rendezvous.
    running: AtomicBool,
    tick: AtomicU64,
    /// First phase whose body panicked. Sticky.
    fault: Mutex<Option<Phase>>,
    handler: Arc<H>,
}

impl<H> Shared<H> {
    fn fault(&self) -> Option<Phase> {
        *self.fault.lock()
    }
}

/// Worker pool plus coordinator-side cadence loop.
pub struct Scheduler<H: TickHandler, C: Clock = SystemClock> {
    shared: Arc<Shared<H>>,
    workers: Vec<JoinHandle<()>>,
    tick_loop: TickLoop<C>,
    shutdown: ShutdownHandle,
}

impl<H: TickHandler> Scheduler<H, SystemClock> {
    /// Starts the worker pool on the wall clock.
    ///
    /// # Errors
    ///
    /// See [`with_clock`](Self::with_clock).
    pub fn new(config: SchedulerConfig, handler: Arc<H>) -> Result<Self, SchedulerError> {
        Self::with_clock(config, handler, SystemClock)
    }
}

impl<H: TickHandler, C: Clock> Scheduler<H, C> {
    /// Starts the worker pool with an explicit clock.
    ///
    /// Workers are parked at the start rendezvous until the first tick.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NoWorkers`] for an empty pool and
    /// [`SchedulerError::Spawn`] if a thread cannot be started. Workers
    /// already started are released and joined before returning.
    pub fn with_clock(
        config: SchedulerConfig,
        handler: Arc<H>,
        clock: C,
    ) -> Result<Self, SchedulerError> {
        let count = config.workers;
        if count == 0 {
            return Err(SchedulerError::NoWorkers);
        }

        let shared = Arc::new(Shared {
            barrier: PhaseBarrier::new(count + 1),
            running: AtomicBool::new(true),
            tick: AtomicU64::new(0),
            fault: Mutex::new(None),
            handler,
        });

        // Workers hold here until the whole pool exists.
        let (go_tx, go_rx) = crossbeam_channel::unbounded::<()>();
        let mut workers = Vec::with_capacity(count);

        for index in 0..count {
            let shared = Arc::clone(&shared);
            let go = go_rx.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("tick-worker-{index}"))
                .spawn(move || {
                    if go.recv().is_ok() {
                        worker_loop(&shared, index, count);
                    }
                });

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(source) => {
                    drop(go_tx);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    tracing::error!(index, %source, "failed to spawn tick worker");
                    return Err(SchedulerError::Spawn { index, source });
                }
            }
        }

        for _ in 0..count {
            let _ = go_tx.send(());
        }

        tracing::info!(workers = count, "scheduler started");

        Ok(Self {
            shared,
            workers,
            tick_loop: TickLoop::new(crate::TICK_INTERVAL, config.max_catch_up_ticks, clock),
            shutdown: ShutdownHandle::new(),
        })
    }

    /// Runs the cadence loop until the shutdown handle is raised, then
    /// joins every worker.
    pub fn run(&mut self) {
        while !self.shutdown.is_raised() && !self.workers.is_empty() {
            self.tick_loop.wait_for_next_tick();
            self.pump();
        }
        self.stop();
    }

    /// One measurement followed by the catch-up burst it allows.
    ///
    /// Returns how many phase sequences ran.
    pub fn pump(&mut self) -> u32 {
        if self.workers.is_empty() {
            return 0;
        }

        let mut executed = 0;
        while !self.shutdown.is_raised() && self.tick_loop.should_tick() {
            let start = self.tick_loop.begin_tick();
            self.run_sequence();
            self.tick_loop.end_tick(start);
            executed += 1;
        }

        if executed > 1 {
            tracing::debug!(executed, "catch-up burst");
        }
        executed
    }

    /// Executes one full phase sequence immediately, ignoring cadence.
    ///
    /// # Panics
    ///
    /// Panics if the scheduler has already been stopped.
    pub fn step(&mut self) {
        assert!(!self.workers.is_empty(), "stepping a stopped scheduler");
        self.run_sequence();
    }

    fn run_sequence(&self) {
        let shared = &*self.shared;

        // Start: workers read `running == true`.
        shared.barrier.wait();

        for phase in Phase::ALL {
            shared.handler.prepare_phase(phase);
            shared.barrier.wait();
            // Workers run the phase.
            shared.barrier.wait();

            // Workers are back at the start rendezvous; Drop can still join.
            if let Some(failed) = shared.fault() {
                let tick = shared.tick.load(Ordering::Acquire);
                panic!("tick {tick} aborted: a worker panicked in {failed}");
            }
        }

        let completed = shared.tick.fetch_add(1, Ordering::AcqRel) + 1;
        shared.handler.end_tick(completed);
        tracing::trace!(tick = completed, "tick complete");
    }

    /// Releases workers from the start rendezvous with `running == false`
    /// and joins them. Idempotent.
    pub fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        self.shared.running.store(false, Ordering::Release);
        self.shared.barrier.wait();

        for (index, handle) in self.workers.drain(..).enumerate() {
            if handle.join().is_err() {
                tracing::error!(index, "tick worker panicked");
            }
        }

        tracing::info!(
            ticks = self.tick(),
            late = self.tick_loop.stats().late_ticks,
            "scheduler stopped"
        );
    }

    /// Completed phase sequences.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.shared.tick.load(Ordering::Acquire)
    }

    /// Cadence statistics.
    #[must_use]
    pub fn stats(&self) -> TickStats {
        *self.tick_loop.stats()
    }

    /// Cancellation signal for [`run`](Self::run).
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// The handler every worker runs.
    #[must_use]
    pub fn handler(&self) -> &Arc<H> {
        &self.shared.handler
    }

    /// Number of live worker threads. Zero once stopped.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers.len()
    }
}

impl<H: TickHandler, C: Clock> Drop for Scheduler<H, C> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop<H: TickHandler>(shared: &Shared<H>, index: usize, workers: usize) {
    loop {
        shared.barrier.wait();
        if !shared.running.load(Ordering::Acquire) {
            break;
        }

        let ctx = WorkerContext {
            index,
            workers,
            tick: shared.tick.load(Ordering::Acquire),
        };

        for phase in Phase::ALL {
            shared.barrier.wait();
            let ran = panic::catch_unwind(AssertUnwindSafe(|| {
                shared.handler.run_phase(phase, &ctx);
            }));
            if ran.is_err() {
                tracing::error!(worker = index, %phase, tick = ctx.tick, "phase body panicked");
                shared.fault.lock().get_or_insert(phase);
            }
            shared.barrier.wait();

            if shared.fault().is_some() {
                break;
            }
        }
    }
}
