//! # Tick Cadence
//!
//! Fixed-timestep loop controller with drift compensation.
//!
//! ## Design
//!
//! The controller keeps a time debt:
//! - Every measurement adds the wall time elapsed since the previous one
//! - Each executed tick pays back one interval
//! - While debt >= one interval, ticks run back-to-back without sleeping
//! - Debt is clamped to `max_catch_up` intervals so a long stall cannot
//!   queue an unbounded burst
//!
//! Time comes from a [`Clock`], so tests can drive the loop with a
//! [`ManualClock`] instead of sleeping.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::TICK_INTERVAL;

/// Source of time for the cadence loop.
pub trait Clock: Send {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Blocks for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Wall clock. Sleeps, then spin-waits the last half millisecond.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;

        // Sleep for most of the time
        if duration > Duration::from_micros(1000) {
            std::thread::sleep(duration - Duration::from_micros(500));
        }

        // Spin-wait for precision
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }
}

/// Clock that only moves when told to. `sleep` advances it instantly.
#[derive(Clone, Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Moves time forward. Shared by every clone.
    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Tick timing statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Minimum tick duration observed.
    pub min_tick_us: u64,
    /// Maximum tick duration observed.
    pub max_tick_us: u64,
    /// Average tick duration (rolling).
    pub avg_tick_us: u64,
    /// Number of late ticks (took longer than the interval).
    pub late_ticks: u64,
    /// Total ticks measured.
    pub total_ticks: u64,
    /// Number of measurements whose debt had to be clamped.
    pub clamped_debt: u64,
}

impl TickStats {
    fn fresh(interval: Duration) -> Self {
        Self {
            min_tick_us: u64::MAX,
            max_tick_us: 0,
            avg_tick_us: duration_us(interval),
            late_ticks: 0,
            total_ticks: 0,
            clamped_debt: 0,
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn duration_us(duration: Duration) -> u64 {
    duration.as_micros() as u64
}

/// Fixed-timestep tick loop controller.
///
/// Ensures a consistent tick rate regardless of processing time.
pub struct TickLoop<C: Clock = SystemClock> {
    clock: C,
    /// Target tick duration.
    interval: Duration,
    /// Debt never exceeds this.
    max_debt: Duration,
    /// Time of the last measurement.
    last_measure: Instant,
    /// Accumulated time not yet paid back by ticks.
    debt: Duration,
    /// Total ticks executed.
    tick_count: u64,
    /// Frame time statistics.
    stats: TickStats,
}

impl TickLoop<SystemClock> {
    /// Creates a wall-clock loop at the fixed [`TICK_INTERVAL`].
    #[must_use]
    pub fn standard(max_catch_up: u32) -> Self {
        Self::new(TICK_INTERVAL, max_catch_up, SystemClock)
    }
}

impl<C: Clock> TickLoop<C> {
    /// Creates a loop with the given interval, debt clamp and clock.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero or `max_catch_up` is zero.
    #[must_use]
    pub fn new(interval: Duration, max_catch_up: u32, clock: C) -> Self {
        assert!(!interval.is_zero(), "tick interval must be positive");
        assert!(max_catch_up > 0, "catch-up clamp must allow at least one tick");

        let last_measure = clock.now();
        Self {
            clock,
            interval,
            max_debt: interval * max_catch_up,
            last_measure,
            debt: Duration::ZERO,
            tick_count: 0,
            stats: TickStats::fresh(interval),
        }
    }

    /// Measures elapsed time and returns true if a tick is due.
    ///
    /// Call this in a loop until it returns false.
    #[must_use]
    pub fn should_tick(&mut self) -> bool {
        let now = self.clock.now();
        self.debt += now.saturating_duration_since(self.last_measure);
        self.last_measure = now;

        if self.debt > self.max_debt {
            tracing::warn!(
                debt_us = duration_us(self.debt),
                clamp_us = duration_us(self.max_debt),
                "tick debt clamped, dropping catch-up ticks"
            );
            self.debt = self.max_debt;
            self.stats.clamped_debt += 1;
        }

        self.debt >= self.interval
    }

    /// Marks the start of a tick and pays one interval of debt.
    ///
    /// Returns the tick start time for duration measurement.
    #[must_use]
    pub fn begin_tick(&mut self) -> Instant {
        self.debt = self.debt.saturating_sub(self.interval);
        self.tick_count += 1;
        self.clock.now()
    }

    /// Marks the end of a tick.
    ///
    /// Records statistics and logs a soft overrun if the tick took longer
    /// than the interval. The loop keeps going either way.
    pub fn end_tick(&mut self, start: Instant) {
        let duration = self.clock.now().saturating_duration_since(start);
        let elapsed_us = duration_us(duration);

        // Update stats
        self.stats.total_ticks += 1;
        self.stats.min_tick_us = self.stats.min_tick_us.min(elapsed_us);
        self.stats.max_tick_us = self.stats.max_tick_us.max(elapsed_us);

        // Rolling average
        self.stats.avg_tick_us = (self.stats.avg_tick_us * 15 + elapsed_us) / 16;

        if duration > self.interval {
            self.stats.late_ticks += 1;
            tracing::warn!(
                tick = self.tick_count,
                elapsed_us,
                budget_us = duration_us(self.interval),
                "tick overran its interval"
            );
        }
    }

    /// Sleeps until the next tick is due. Returns at once if debt is owed.
    pub fn wait_for_next_tick(&self) {
        let elapsed = self.clock.now().saturating_duration_since(self.last_measure);
        let owed = self.debt + elapsed;

        if owed < self.interval {
            self.clock.sleep(self.interval - owed);
        }
    }

    /// Returns the current tick count.
    #[inline]
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Returns tick statistics.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Returns the target tick duration.
    #[inline]
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Time owed but not yet paid back by ticks.
    #[inline]
    #[must_use]
    pub const fn debt(&self) -> Duration {
        self.debt
    }

    /// Resets statistics.
    pub fn reset_stats(&mut self) {
        self.stats = TickStats::fresh(self.interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual(interval_ms: u64) -> (TickLoop<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let tick_loop = TickLoop::new(Duration::from_millis(interval_ms), 20, clock.clone());
        (tick_loop, clock)
    }

    fn burst(tick_loop: &mut TickLoop<ManualClock>) -> u32 {
        let mut executed = 0;
        while tick_loop.should_tick() {
            let start = tick_loop.begin_tick();
            tick_loop.end_tick(start);
            executed += 1;
        }
        executed
    }

    #[test]
    fn test_tick_loop_creation() {
        let tick_loop = TickLoop::standard(20);
        assert_eq!(tick_loop.tick_count(), 0);
        assert_eq!(tick_loop.interval(), Duration::from_millis(50));
        assert_eq!(tick_loop.debt(), Duration::ZERO);
    }

    #[test]
    fn test_no_tick_before_interval() {
        let (mut tick_loop, clock) = manual(50);
        clock.advance(Duration::from_millis(49));
        assert!(!tick_loop.should_tick());

        clock.advance(Duration::from_millis(1));
        assert!(tick_loop.should_tick());
    }

    #[test]
    fn test_burst_pays_back_debt() {
        let (mut tick_loop, clock) = manual(50);
        clock.advance(Duration::from_millis(500));

        assert_eq!(burst(&mut tick_loop), 10);
        assert_eq!(tick_loop.tick_count(), 10);
        assert!(tick_loop.debt() < tick_loop.interval());
    }

    #[test]
    fn test_remainder_carries_over() {
        let (mut tick_loop, clock) = manual(50);
        clock.advance(Duration::from_millis(70));
        assert_eq!(burst(&mut tick_loop), 1);
        assert_eq!(tick_loop.debt(), Duration::from_millis(20));

        clock.advance(Duration::from_millis(30));
        assert_eq!(burst(&mut tick_loop), 1);
        assert_eq!(tick_loop.debt(), Duration::ZERO);
    }

    #[test]
    fn test_debt_is_clamped() {
        let (mut tick_loop, clock) = manual(50);
        clock.advance(Duration::from_secs(60));

        assert_eq!(burst(&mut tick_loop), 20);
        assert_eq!(tick_loop.stats().clamped_debt, 1);
    }

    #[test]
    fn test_overrun_is_counted_not_fatal() {
        let (mut tick_loop, clock) = manual(50);
        clock.advance(Duration::from_millis(50));
        assert!(tick_loop.should_tick());

        let start = tick_loop.begin_tick();
        clock.advance(Duration::from_millis(120));
        tick_loop.end_tick(start);

        let stats = *tick_loop.stats();
        assert_eq!(stats.late_ticks, 1);
        assert_eq!(stats.max_tick_us, 120_000);

        // The slow tick left two intervals of debt: catch up back-to-back.
        assert_eq!(burst(&mut tick_loop), 2);
    }

    #[test]
    fn test_wait_sleeps_remaining_interval() {
        let (mut tick_loop, clock) = manual(50);
        clock.advance(Duration::from_millis(20));
        assert!(!tick_loop.should_tick());

        tick_loop.wait_for_next_tick();
        assert!(tick_loop.should_tick());
        assert_eq!(tick_loop.debt(), Duration::from_millis(50));
    }

    #[test]
    fn test_stats_tracking() {
        let (mut tick_loop, clock) = manual(10);
        for _ in 0..10 {
            clock.advance(Duration::from_millis(10));
            while tick_loop.should_tick() {
                let start = tick_loop.begin_tick();
                clock.advance(Duration::from_millis(2));
                tick_loop.end_tick(start);
            }
        }

        let stats = tick_loop.stats();
        assert!(stats.total_ticks > 0);
        assert_eq!(stats.min_tick_us, 2000);
        assert!(stats.min_tick_us <= stats.max_tick_us);
        assert_eq!(stats.late_ticks, 0);

        tick_loop.reset_stats();
        assert_eq!(tick_loop.stats().total_ticks, 0);
    }
}
