//! # Tick Loop
//!
//! Fixed-rate pacing for the server loop and for headless clients.
//!
//! ```rust,ignore
//! let mut ticks = TickLoop::new(60);
//! loop {
//!     while ticks.should_tick() {
//!         let start = ticks.begin_tick();
//!         server.pump();
//!         ticks.end_tick(start);
//!     }
//!     ticks.wait_for_next_tick();
//! }
//! ```

use std::time::{Duration, Instant};

use tarmac_shared::TICK_RATE;

/// Fixed-timestep loop controller.
pub struct TickLoop {
    tick_duration: Duration,
    last_poll: Instant,
    accumulator: Duration,
    tick_count: u64,
    stats: TickStats,
}

/// Tick timing statistics.
#[derive(Clone, Copy, Debug)]
pub struct TickStats {
    /// Shortest tick body, microseconds.
    pub min_tick_us: u64,
    /// Longest tick body, microseconds.
    pub max_tick_us: u64,
    /// Exponential moving average, microseconds.
    pub avg_tick_us: u64,
    /// Ticks whose body overran the budget.
    pub late_ticks: u64,
    /// Ticks measured.
    pub total_ticks: u64,
}

impl TickStats {
    fn fresh(budget: Duration) -> Self {
        Self {
            min_tick_us: u64::MAX,
            max_tick_us: 0,
            avg_tick_us: budget.as_micros() as u64,
            late_ticks: 0,
            total_ticks: 0,
        }
    }
}

impl TickLoop {
    /// Loop running `tick_rate` times per second (at least once).
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        let tick_duration = Duration::from_micros(1_000_000 / u64::from(tick_rate.max(1)));
        Self {
            tick_duration,
            last_poll: Instant::now(),
            accumulator: Duration::ZERO,
            tick_count: 0,
            stats: TickStats::fresh(tick_duration),
        }
    }

    /// True while a tick is owed. Call in a loop until it returns false.
    #[must_use]
    pub fn should_tick(&mut self) -> bool {
        let now = Instant::now();
        self.accumulator += now.duration_since(self.last_poll);
        self.last_poll = now;
        self.accumulator >= self.tick_duration
    }

    /// Consumes one tick from the accumulator.
    #[must_use]
    pub fn begin_tick(&mut self) -> Instant {
        self.accumulator = self.accumulator.saturating_sub(self.tick_duration);
        self.tick_count += 1;
        Instant::now()
    }

    /// Records how long the tick body took.
    pub fn end_tick(&mut self, start: Instant) {
        let took = start.elapsed();
        let took_us = took.as_micros() as u64;

        let stats = &mut self.stats;
        stats.total_ticks += 1;
        stats.min_tick_us = stats.min_tick_us.min(took_us);
        stats.max_tick_us = stats.max_tick_us.max(took_us);
        stats.avg_tick_us = (stats.avg_tick_us * 15 + took_us) / 16;
        if took > self.tick_duration {
            stats.late_ticks += 1;
        }
    }

    /// Sleeps until the next tick is due.
    pub fn wait_for_next_tick(&self) {
        let since = self.last_poll.elapsed() + self.accumulator;
        if let Some(remaining) = self.tick_duration.checked_sub(since) {
            std::thread::sleep(remaining);
        }
    }

    /// Ticks executed so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Timing statistics.
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Length of one tick.
    #[must_use]
    pub const fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Length of one tick in whole milliseconds, as fed to `Level::update`.
    #[must_use]
    pub fn tick_millis(&self) -> u32 {
        u32::try_from(self.tick_duration.as_millis()).unwrap_or(u32::MAX)
    }

    /// Clears the statistics.
    pub fn reset_stats(&mut self) {
        self.stats = TickStats::fresh(self.tick_duration);
    }
}

impl Default for TickLoop {
    fn default() -> Self {
        Self::new(TICK_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_duration() {
        let ticks = TickLoop::new(60);
        assert_eq!(ticks.tick_count(), 0);
        assert_eq!(ticks.tick_duration(), Duration::from_micros(16_666));
        assert_eq!(ticks.tick_millis(), 16);

        // zero rate is treated as 1 Hz
        assert_eq!(TickLoop::new(0).tick_duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_ticks_become_due() {
        let mut ticks = TickLoop::new(1000);
        std::thread::sleep(Duration::from_millis(5));

        assert!(ticks.should_tick());
        let start = ticks.begin_tick();
        ticks.end_tick(start);

        assert_eq!(ticks.tick_count(), 1);
        assert_eq!(ticks.stats().total_ticks, 1);
    }

    #[test]
    fn test_stats_reset() {
        let mut ticks = TickLoop::new(1000);
        for _ in 0..5 {
            let start = ticks.begin_tick();
            std::thread::sleep(Duration::from_micros(50));
            ticks.end_tick(start);
        }

        let stats = *ticks.stats();
        assert_eq!(stats.total_ticks, 5);
        assert!(stats.min_tick_us <= stats.max_tick_us);

        ticks.reset_stats();
        assert_eq!(ticks.stats().total_ticks, 0);
        assert_eq!(ticks.stats().min_tick_us, u64::MAX);
    }
}
