//! Fixed-timestep time
//!
//! Wall-clock time is accumulated and consumed in whole Δt steps so update
//! logic always observes the same step length. Leftover time is exposed as
//! an interpolation factor for rendering.

use std::time::Duration;

/// Default simulation tick rate (60 Hz = 16.666ms per tick)
pub const DEFAULT_TICK_RATE_HZ: f64 = 60.0;

/// Default cap on catch-up updates per frame
pub const DEFAULT_MAX_CATCH_UP: u32 = 5;

/// Tick counter plus the not-yet-simulated time remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimulationTick {
    count: u64,
    accumulator: Duration,
}

impl SimulationTick {
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn accumulator(&self) -> Duration {
        self.accumulator
    }
}

/// Outcome of feeding elapsed time into a [`FixedTimestep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepPlan {
    /// Updates to run now.
    pub steps: u32,
    /// Whole steps discarded because the catch-up cap was hit.
    pub dropped: u64,
}

/// Accumulator for a fixed Δt.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    dt: Duration,
    max_catch_up: u32,
    tick: SimulationTick,
}

impl FixedTimestep {
    /// # Panics
    /// If `tick_rate_hz` is not a positive finite number or `max_catch_up` is zero.
    pub fn new(tick_rate_hz: f64, max_catch_up: u32) -> Self {
        assert!(
            tick_rate_hz.is_finite() && tick_rate_hz > 0.0,
            "tick rate must be positive and finite, got {tick_rate_hz}"
        );
        Self::from_duration(Duration::from_secs_f64(1.0 / tick_rate_hz), max_catch_up)
    }

    /// # Panics
    /// If `dt` is zero or `max_catch_up` is zero.
    pub fn from_duration(dt: Duration, max_catch_up: u32) -> Self {
        assert!(!dt.is_zero(), "fixed timestep must be non-zero");
        assert!(max_catch_up > 0, "max catch-up steps must be at least 1");
        Self {
            dt,
            max_catch_up,
            tick: SimulationTick::default(),
        }
    }

    pub fn dt(&self) -> Duration {
        self.dt
    }

    pub fn max_catch_up(&self) -> u32 {
        self.max_catch_up
    }

    pub fn tick(&self) -> SimulationTick {
        self.tick
    }

    /// Add elapsed time and work out how many updates are due.
    ///
    /// At most `max_catch_up` steps are granted; any further whole steps are
    /// discarded, keeping only the fractional remainder.
    pub fn accumulate(&mut self, elapsed: Duration) -> StepPlan {
        self.tick.accumulator += elapsed;

        let mut plan = StepPlan::default();
        while self.tick.accumulator >= self.dt && plan.steps < self.max_catch_up {
            self.tick.accumulator -= self.dt;
            plan.steps += 1;
        }

        if self.tick.accumulator >= self.dt {
            let dt = self.dt.as_nanos();
            let pending = self.tick.accumulator.as_nanos();
            plan.dropped = u64::try_from(pending / dt).unwrap_or(u64::MAX);
            self.tick.accumulator = Duration::from_nanos((pending % dt) as u64);
        }
        plan
    }

    /// Record that one update of Δt ran.
    pub fn advance_tick(&mut self) {
        self.tick.count += 1;
    }

    /// Leftover fraction of a step, in `[0, 1)`.
    pub fn alpha(&self) -> f64 {
        self.tick.accumulator.as_secs_f64() / self.dt.as_secs_f64()
    }

    /// Forget accumulated time, keeping the tick count.
    pub fn discard_accumulator(&mut self) {
        self.tick.accumulator = Duration::ZERO;
    }

    pub fn reset(&mut self) {
        self.tick = SimulationTick::default();
    }
}

impl Default for FixedTimestep {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_RATE_HZ, DEFAULT_MAX_CATCH_UP)
    }
}
